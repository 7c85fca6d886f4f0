//! One-time verification codes bound to a referral.
use super::referral::TimeStamp;
use chrono::Utc;
use rand::Rng;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

/// Digits in a generated code.
pub const CODE_LENGTH: usize = 6;
/// Failed submissions allowed before the referral fails.
pub const ATTEMPT_LIMIT: u32 = 5;
/// Validity window, fixed and constant across the system.
pub const VALIDITY_WINDOW_SECS: i64 = 300;

/// A single issued code. At most one non-consumed code exists per referral;
/// issuing a new one marks the previous code consumed.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct VerificationCode {
    #[n(0)]
    pub referral_id: String,
    #[n(1)]
    pub code: String, // never logged, exposed only to the delivery gateway
    #[n(2)]
    pub issued_at: TimeStamp<Utc>,
    #[n(3)]
    pub expires_at: TimeStamp<Utc>,
    #[n(4)]
    pub attempts_remaining: u32,
    #[n(5)]
    pub consumed: bool,
}

impl VerificationCode {
    pub fn issue(referral_id: String, code: String, now: &TimeStamp<Utc>) -> Self {
        Self {
            referral_id,
            code,
            issued_at: now.clone(),
            expires_at: now.plus_seconds(VALIDITY_WINDOW_SECS),
            attempts_remaining: ATTEMPT_LIMIT,
            consumed: false,
        }
    }

    pub fn is_expired(&self, now: &TimeStamp<Utc>) -> bool {
        *now > self.expires_at
    }

    /// Countdown is always derived from the expiry timestamp, never stored
    /// as mutable counted-down state.
    pub fn remaining_secs(&self, now: &TimeStamp<Utc>) -> i64 {
        now.seconds_until(&self.expires_at).max(0)
    }

    /// Constant-time comparison of a submitted code against this one.
    /// Timing-attack resistance is a requirement here, not an optimisation.
    pub fn matches(&self, submitted: &str) -> bool {
        self.code.as_bytes().ct_eq(submitted.as_bytes()).into()
    }
}

/// Source of fresh numeric codes, injected so tests can pin the value.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Cryptographically strong source backed by OS entropy.
pub struct OsRandomCodes;

impl CodeSource for OsRandomCodes {
    fn next_code(&self) -> String {
        let n: u32 = OsRng.gen_range(0..1_000_000);
        format!("{:0width$}", n, width = CODE_LENGTH)
    }
}

/// Test double that always hands out the same code.
pub struct FixedCodes(pub String);

impl CodeSource for FixedCodes {
    fn next_code(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_fixed_length_numeric() {
        for _ in 0..64 {
            let code = OsRandomCodes.next_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn expiry_is_derived_from_the_window() {
        let now = TimeStamp::new_with(2025, 3, 1, 12, 0, 0);
        let code = VerificationCode::issue("ref_1x".into(), "123456".into(), &now);

        assert_eq!(code.attempts_remaining, ATTEMPT_LIMIT);
        assert!(!code.is_expired(&now));
        assert_eq!(code.remaining_secs(&now), VALIDITY_WINDOW_SECS);

        let later = now.plus_seconds(VALIDITY_WINDOW_SECS + 1);
        assert!(code.is_expired(&later));
        assert_eq!(code.remaining_secs(&later), 0);
    }

    #[test]
    fn boundary_of_the_window_is_still_valid() {
        let now = TimeStamp::new_with(2025, 3, 1, 12, 0, 0);
        let code = VerificationCode::issue("ref_1x".into(), "123456".into(), &now);

        let edge = now.plus_seconds(VALIDITY_WINDOW_SECS);
        assert!(!code.is_expired(&edge));
    }

    #[test]
    fn matches_compares_exact_value() {
        let now = TimeStamp::new();
        let code = VerificationCode::issue("ref_1x".into(), "042517".into(), &now);

        assert!(code.matches("042517"));
        assert!(!code.matches("042518"));
        assert!(!code.matches("04251"));
        assert!(!code.matches(""));
    }
}
