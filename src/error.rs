use crate::referral::ReferralState;

/// Field-level validation failures surfaced to the clerk.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("national id number failed checksum validation")]
    InvalidNationalId,
    #[error("phone number does not match the local mobile pattern")]
    InvalidPhone,
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("{0} is not set")]
    MissingField(&'static str),
}

/// Faults crossing the service boundary. Verification outcomes such as
/// `Expired` or `Exhausted` are plain values, not errors.
#[derive(thiserror::Error, Debug)]
pub enum ReferralError {
    #[error("referral {0} not found")]
    NotFound(String),
    #[error("operation not permitted while referral is {0:?}")]
    InvalidState(ReferralState),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("code delivery to {0} failed")]
    DeliveryFailure(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sled::Error> for ReferralError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
