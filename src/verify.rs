//! Verification engine: the pure decision over a referral's code history.
//!
//! The service layer feeds the stored history in and persists whatever
//! [`CodeUpdate`] comes back inside a single storage transaction, so the
//! decision itself stays free of I/O and fully unit-testable.
use super::otp::VerificationCode;
use super::referral::TimeStamp;
use chrono::Utc;

/// Result of submitting a code, surfaced verbatim to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Accepted,
    Rejected,
    Expired,
    Exhausted,
    NotFound,
}

/// Mutation the store must apply for the outcome to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUpdate {
    /// Nothing to persist.
    None,
    /// The active code lapsed, move a still-unverified referral to `Expired`.
    MarkExpired,
    /// Wrong guess, burn one attempt.
    Decrement,
    /// Wrong guess burnt the last attempt, fail the referral.
    DecrementAndFail,
    /// Match: consume the code and move the referral to `Verified`.
    Consume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub outcome: VerificationOutcome,
    pub update: CodeUpdate,
}

impl Evaluation {
    fn terminal(outcome: VerificationOutcome) -> Self {
        Self {
            outcome,
            update: CodeUpdate::None,
        }
    }
}

/// Judge a submitted code against the referral's code history.
///
/// Only the last entry of the history may be active; earlier entries are
/// consumed (used up or superseded). A submission matching a consumed code
/// is `NotFound` rather than `Rejected` — it references a dead code, it is
/// not a fresh guess at the live one, and one-shot consumption must hold.
pub fn evaluate(
    history: &[VerificationCode],
    submitted: &str,
    now: &TimeStamp<Utc>,
) -> Evaluation {
    let Some(active) = history.last().filter(|code| !code.consumed) else {
        return Evaluation::terminal(VerificationOutcome::NotFound);
    };

    if active.is_expired(now) {
        return Evaluation {
            outcome: VerificationOutcome::Expired,
            update: CodeUpdate::MarkExpired,
        };
    }
    if active.attempts_remaining == 0 {
        return Evaluation::terminal(VerificationOutcome::Exhausted);
    }
    if active.matches(submitted) {
        return Evaluation {
            outcome: VerificationOutcome::Accepted,
            update: CodeUpdate::Consume,
        };
    }
    if history
        .iter()
        .filter(|code| code.consumed)
        .any(|code| code.matches(submitted))
    {
        return Evaluation::terminal(VerificationOutcome::NotFound);
    }
    if active.attempts_remaining == 1 {
        return Evaluation {
            outcome: VerificationOutcome::Exhausted,
            update: CodeUpdate::DecrementAndFail,
        };
    }
    Evaluation {
        outcome: VerificationOutcome::Rejected,
        update: CodeUpdate::Decrement,
    }
}
