//! Verified hand-off of citizen medical-referral forms.
//!
//! A clerk registers referral details, the system proves control of the
//! citizen's phone number with a one-time code, and only then exposes the
//! editable form to the citizen. The crate owns the referral lifecycle state
//! machine and the one-time-code rules; delivery transport, presentation and
//! clerk authentication are injected or external.

pub mod clock;
pub mod delivery;
pub mod error;
pub mod identity;
pub mod otp;
pub mod referral;
pub mod service;
pub mod utils;
pub mod verify;
