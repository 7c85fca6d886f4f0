//! Service layer API for the referral hand-off workflow.
//!
//! All state transitions that touch both the referral and its code history
//! run inside a single `sled` transaction, so "at most one active code" and
//! one-shot consumption hold under concurrent citizen retries and clerk
//! re-issuance, and a storage failure never leaves a half-transitioned
//! record.
use super::clock::{Clock, SystemClock};
use super::delivery::DeliveryGateway;
use super::error::ReferralError;
use super::otp::{CodeSource, OsRandomCodes, VerificationCode};
use super::referral::{FormSubmission, ReferralDetails, ReferralRecord, ReferralState};
use super::utils;
use super::verify::{self, CodeUpdate, VerificationOutcome};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only identity view shown on the citizen form once the phone number
/// has been proven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitizenFormView {
    pub referral_id: String,
    pub first_name: String,
    pub last_name: String,
    pub id_number: String,
    pub state: ReferralState,
}

pub struct ReferralService {
    instance: Arc<sled::Db>,
    delivery: Arc<dyn DeliveryGateway>,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeSource>,
}

type TxError = ConflictableTransactionError<ReferralError>;

fn abort<T>(err: ReferralError) -> Result<T, TxError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, ReferralError> {
    minicbor::to_vec(value).map_err(|e| ReferralError::Storage(e.to_string()))
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(raw: &[u8]) -> Result<T, ReferralError> {
    minicbor::decode(raw).map_err(|e| ReferralError::Storage(e.to_string()))
}

fn code_key(referral_id: &str) -> Vec<u8> {
    format!("otp/{referral_id}").into_bytes()
}

impl ReferralService {
    /// Production wiring: wall clock and OS-entropy code generation.
    pub fn new(instance: Arc<sled::Db>, delivery: Arc<dyn DeliveryGateway>) -> Self {
        Self::with_ports(
            instance,
            delivery,
            Arc::new(SystemClock),
            Arc::new(OsRandomCodes),
        )
    }

    /// Wiring with every port injected, used by tests to pin time and codes.
    pub fn with_ports(
        instance: Arc<sled::Db>,
        delivery: Arc<dyn DeliveryGateway>,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeSource>,
    ) -> Self {
        Self {
            instance,
            delivery,
            clock,
            codes,
        }
    }

    fn run_tx<T>(
        &self,
        f: impl Fn(&TransactionalTree) -> Result<T, TxError>,
    ) -> Result<T, ReferralError> {
        self.instance.transaction(f).map_err(|err| match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => ReferralError::Storage(e.to_string()),
        })
    }

    fn load_referral_tx(
        tx: &TransactionalTree,
        referral_id: &str,
    ) -> Result<ReferralRecord, TxError> {
        match tx.get(referral_id.as_bytes())? {
            Some(raw) => decode(&raw).map_err(ConflictableTransactionError::Abort),
            None => abort(ReferralError::NotFound(referral_id.to_owned())),
        }
    }

    fn load_history_tx(
        tx: &TransactionalTree,
        referral_id: &str,
    ) -> Result<Vec<VerificationCode>, TxError> {
        match tx.get(code_key(referral_id))? {
            Some(raw) => decode(&raw).map_err(ConflictableTransactionError::Abort),
            None => Ok(vec![]),
        }
    }

    fn store_referral_tx(tx: &TransactionalTree, record: &ReferralRecord) -> Result<(), TxError> {
        let bytes = encode(record).map_err(ConflictableTransactionError::Abort)?;
        tx.insert(record.id.as_bytes(), bytes)?;
        Ok(())
    }

    fn store_history_tx(
        tx: &TransactionalTree,
        referral_id: &str,
        history: &Vec<VerificationCode>,
    ) -> Result<(), TxError> {
        let bytes = encode(history).map_err(ConflictableTransactionError::Abort)?;
        tx.insert(code_key(referral_id), bytes)?;
        Ok(())
    }

    /// Register a clerk-entered referral. The caller is a clerk by
    /// precondition; authorization lives outside this core.
    pub fn create_referral(
        &self,
        details: ReferralDetails,
    ) -> Result<ReferralRecord, ReferralError> {
        let record = details.into_record(utils::new_referral_id(), self.clock.now())?;

        let bytes = encode(&record)?;
        self.instance.insert(record.id.as_bytes(), bytes)?;

        info!(referral = %record.id, branch = record.branch.code(), "referral created");
        Ok(record)
    }

    /// Fetch a referral by id.
    pub fn get_referral(&self, referral_id: &str) -> Result<ReferralRecord, ReferralError> {
        match self.instance.get(referral_id.as_bytes())? {
            Some(raw) => decode(&raw),
            None => Err(ReferralError::NotFound(referral_id.to_owned())),
        }
    }

    /// The single non-consumed code for a referral, if any.
    pub fn active_code(
        &self,
        referral_id: &str,
    ) -> Result<Option<VerificationCode>, ReferralError> {
        let history: Vec<VerificationCode> = match self.instance.get(code_key(referral_id))? {
            Some(raw) => decode(&raw)?,
            None => return Ok(None),
        };
        Ok(history.into_iter().next_back().filter(|code| !code.consumed))
    }

    /// Issue a fresh one-time code and hand it to the delivery gateway.
    ///
    /// Any previously active code is consumed in the same transaction, so at
    /// most one code is ever outstanding. A delivery failure is reported to
    /// the caller but the referral stays `CodeIssued` and re-issuable.
    pub fn issue_code(&self, referral_id: &str) -> Result<VerificationCode, ReferralError> {
        let now = self.clock.now();
        let value = self.codes.next_code();

        let (fresh, phone) = self.run_tx(|tx| {
            let mut record = Self::load_referral_tx(tx, referral_id)?;
            if !record.state.permits_code_issue() {
                return abort(ReferralError::InvalidState(record.state));
            }

            let mut history = Self::load_history_tx(tx, referral_id)?;
            if let Some(prior) = history.last_mut() {
                prior.consumed = true;
            }
            let fresh = VerificationCode::issue(referral_id.to_owned(), value.clone(), &now);
            history.push(fresh.clone());
            Self::store_history_tx(tx, referral_id, &history)?;

            if record.state == ReferralState::Created {
                record.state = ReferralState::CodeIssued;
                Self::store_referral_tx(tx, &record)?;
            }
            Ok((fresh, record.phone))
        })?;

        // The code value itself goes to the gateway only, never to the log.
        if !self.delivery.send_code(&phone, &fresh.code) {
            warn!(referral = %referral_id, "code delivery failed, awaiting re-issue");
            return Err(ReferralError::DeliveryFailure(phone));
        }

        info!(referral = %referral_id, "verification code issued");
        Ok(fresh)
    }

    /// Judge a citizen-submitted code and persist the consequences
    /// atomically. Outcomes are values, not faults; only missing referrals
    /// and storage trouble surface as errors.
    pub fn submit_code(
        &self,
        referral_id: &str,
        submitted: &str,
    ) -> Result<VerificationOutcome, ReferralError> {
        let now = self.clock.now();

        let outcome = self.run_tx(|tx| {
            let mut record = Self::load_referral_tx(tx, referral_id)?;
            let mut history = Self::load_history_tx(tx, referral_id)?;

            let eval = verify::evaluate(&history, submitted, &now);
            match eval.update {
                CodeUpdate::None => {}
                CodeUpdate::MarkExpired => {
                    if record.state == ReferralState::CodeIssued {
                        record.state = ReferralState::Expired;
                        Self::store_referral_tx(tx, &record)?;
                    }
                }
                CodeUpdate::Decrement => {
                    if let Some(active) = history.last_mut() {
                        active.attempts_remaining -= 1;
                    }
                    Self::store_history_tx(tx, referral_id, &history)?;
                }
                CodeUpdate::DecrementAndFail => {
                    if let Some(active) = history.last_mut() {
                        active.attempts_remaining -= 1;
                    }
                    Self::store_history_tx(tx, referral_id, &history)?;
                    if record.state == ReferralState::CodeIssued {
                        record.state = ReferralState::Failed;
                        Self::store_referral_tx(tx, &record)?;
                    }
                }
                CodeUpdate::Consume => {
                    if let Some(active) = history.last_mut() {
                        active.consumed = true;
                    }
                    Self::store_history_tx(tx, referral_id, &history)?;
                    record.state = ReferralState::Verified;
                    Self::store_referral_tx(tx, &record)?;
                }
            }
            Ok(eval.outcome)
        })?;

        info!(referral = %referral_id, ?outcome, "code submission judged");
        Ok(outcome)
    }

    /// Citizen form data, accepted only while the referral is `Verified`.
    pub fn submit_form(
        &self,
        referral_id: &str,
        submission: FormSubmission,
    ) -> Result<ReferralRecord, ReferralError> {
        let record = self.run_tx(|tx| {
            let mut record = Self::load_referral_tx(tx, referral_id)?;
            if record.state != ReferralState::Verified {
                return abort(ReferralError::InvalidState(record.state));
            }
            record.additional_info = Some(submission.additional_info.clone());
            record.documents = submission.documents.clone();
            record.state = ReferralState::Submitted;
            Self::store_referral_tx(tx, &record)?;
            Ok(record)
        })?;

        info!(referral = %referral_id, documents = record.documents.len(), "form submitted");
        Ok(record)
    }

    /// Document processing finished, close the referral out.
    pub fn complete_referral(&self, referral_id: &str) -> Result<ReferralRecord, ReferralError> {
        let record = self.run_tx(|tx| {
            let mut record = Self::load_referral_tx(tx, referral_id)?;
            if record.state != ReferralState::Submitted {
                return abort(ReferralError::InvalidState(record.state));
            }
            record.state = ReferralState::Completed;
            Self::store_referral_tx(tx, &record)?;
            Ok(record)
        })?;

        info!(referral = %referral_id, "referral completed");
        Ok(record)
    }

    /// Operator cancel from any non-terminal state.
    pub fn cancel_referral(&self, referral_id: &str) -> Result<ReferralRecord, ReferralError> {
        let record = self.run_tx(|tx| {
            let mut record = Self::load_referral_tx(tx, referral_id)?;
            if record.state.is_terminal() {
                return abort(ReferralError::InvalidState(record.state));
            }
            record.state = ReferralState::Failed;
            Self::store_referral_tx(tx, &record)?;
            Ok(record)
        })?;

        info!(referral = %referral_id, "referral cancelled");
        Ok(record)
    }

    /// Retry path for a dead referral: clone a fresh `Created` record that
    /// references the original as superseded. The terminal record itself is
    /// never mutated.
    pub fn reissue_referral(&self, referral_id: &str) -> Result<ReferralRecord, ReferralError> {
        let original = self.get_referral(referral_id)?;
        if !matches!(
            original.state,
            ReferralState::Expired | ReferralState::Failed
        ) {
            return Err(ReferralError::InvalidState(original.state));
        }

        let clone = ReferralRecord {
            id: utils::new_referral_id(),
            state: ReferralState::Created,
            created_at: self.clock.now(),
            supersedes: Some(original.id.clone()),
            additional_info: None,
            documents: vec![],
            ..original
        };
        let bytes = encode(&clone)?;
        self.instance.insert(clone.id.as_bytes(), bytes)?;

        info!(superseded = %referral_id, referral = %clone.id, "referral re-issued");
        Ok(clone)
    }

    /// Read-only citizen view, visible only once the phone number has been
    /// proven.
    pub fn citizen_form(&self, referral_id: &str) -> Result<CitizenFormView, ReferralError> {
        let record = self.get_referral(referral_id)?;
        if !record.state.form_visible() {
            return Err(ReferralError::InvalidState(record.state));
        }
        Ok(CitizenFormView {
            referral_id: record.id,
            first_name: record.first_name,
            last_name: record.last_name,
            id_number: record.id_number,
            state: record.state,
        })
    }

    /// Seconds left on the active code, derived on demand for display.
    pub fn code_remaining_secs(&self, referral_id: &str) -> Result<Option<i64>, ReferralError> {
        let now = self.clock.now();
        Ok(self
            .active_code(referral_id)?
            .map(|code| code.remaining_secs(&now)))
    }
}
