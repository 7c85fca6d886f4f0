//! Property-based tests for the verification decision
//!
//! The decision over a code history is a pure function, which makes it a
//! good target for proptest: whatever history the store hands over, the
//! one-shot and single-active-code invariants must hold.

use proptest::prelude::*;
use referral_verify::{
    otp::{ATTEMPT_LIMIT, CodeSource, OsRandomCodes, VerificationCode},
    referral::TimeStamp,
    verify::{CodeUpdate, VerificationOutcome, evaluate},
};

fn six_digits_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(0u32..=9, 6)
        .prop_map(|ds| ds.into_iter().map(|d| char::from(b'0' + d as u8)).collect())
}

/// A stored history: zero or more consumed codes, optionally topped by one
/// active code. This is the only shape the store ever produces.
fn history_strategy() -> impl Strategy<Value = Vec<VerificationCode>> {
    let issued = TimeStamp::new_with(2025, 3, 1, 12, 0, 0);
    (
        prop::collection::vec(six_digits_strategy(), 0..4),
        prop::option::of((six_digits_strategy(), 0u32..=ATTEMPT_LIMIT)),
    )
        .prop_map(move |(dead_values, active)| {
            let mut history: Vec<VerificationCode> = dead_values
                .into_iter()
                .map(|value| {
                    let mut code = VerificationCode::issue("ref_1p".into(), value, &issued);
                    code.consumed = true;
                    code
                })
                .collect();
            if let Some((value, attempts)) = active {
                let mut code = VerificationCode::issue("ref_1p".into(), value, &issued);
                code.attempts_remaining = attempts;
                history.push(code);
            }
            history
        })
}

proptest! {
    /// Property: generated codes are always exactly six decimal digits.
    #[test]
    fn prop_generated_codes_are_six_digits(_seed in 0u8..) {
        let code = OsRandomCodes.next_code();
        prop_assert_eq!(code.len(), 6);
        prop_assert!(code.bytes().all(|b| b.is_ascii_digit()));
    }

    /// Property: a history with no active code never accepts anything.
    #[test]
    fn prop_dead_histories_are_not_found(
        history in history_strategy(),
        submitted in six_digits_strategy(),
    ) {
        prop_assume!(history.last().map_or(true, |code| code.consumed));
        let now = TimeStamp::new_with(2025, 3, 1, 12, 1, 0);

        let eval = evaluate(&history, &submitted, &now);
        prop_assert_eq!(eval.outcome, VerificationOutcome::NotFound);
        prop_assert_eq!(eval.update, CodeUpdate::None);
    }

    /// Property: Accepted happens exactly when the active code has attempts
    /// left, is inside its window, and the submitted value matches it.
    #[test]
    fn prop_accept_iff_live_match(
        history in history_strategy(),
        submitted in six_digits_strategy(),
    ) {
        let now = TimeStamp::new_with(2025, 3, 1, 12, 1, 0);
        let eval = evaluate(&history, &submitted, &now);

        let live_match = history
            .last()
            .is_some_and(|code| {
                !code.consumed && code.attempts_remaining > 0 && code.code == submitted
            });

        prop_assert_eq!(
            eval.outcome == VerificationOutcome::Accepted,
            live_match,
            "history: {:?}, submitted: {}",
            history,
            submitted
        );
        if live_match {
            prop_assert_eq!(eval.update, CodeUpdate::Consume);
        }
    }

    /// Property: a value belonging to a consumed code is reported dead, it
    /// never burns an attempt of the live code.
    #[test]
    fn prop_superseded_values_never_burn_attempts(
        dead_value in six_digits_strategy(),
        active_value in six_digits_strategy(),
    ) {
        prop_assume!(dead_value != active_value);
        let issued = TimeStamp::new_with(2025, 3, 1, 12, 0, 0);

        let mut dead = VerificationCode::issue("ref_1p".into(), dead_value.clone(), &issued);
        dead.consumed = true;
        let active = VerificationCode::issue("ref_1p".into(), active_value, &issued);

        let eval = evaluate(&[dead, active], &dead_value, &issued);
        prop_assert_eq!(eval.outcome, VerificationOutcome::NotFound);
        prop_assert_eq!(eval.update, CodeUpdate::None);
    }

    /// Property: past the window the answer is Expired no matter the value.
    #[test]
    fn prop_expiry_beats_everything(
        value in six_digits_strategy(),
        submitted in six_digits_strategy(),
        late_by in 1i64..=86_400,
    ) {
        let issued = TimeStamp::new_with(2025, 3, 1, 12, 0, 0);
        let code = VerificationCode::issue("ref_1p".into(), value, &issued);
        let now = code.expires_at.plus_seconds(late_by);

        let eval = evaluate(&[code], &submitted, &now);
        prop_assert_eq!(eval.outcome, VerificationOutcome::Expired);
        prop_assert_eq!(eval.update, CodeUpdate::MarkExpired);
    }
}
