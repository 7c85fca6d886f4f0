//! Referral record, clerk-entered details and the lifecycle state machine.
use super::error::ValidationError;
use super::identity;
use chrono::{DateTime, TimeZone, Utc};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReferralReason {
    #[n(0)]
    Age,
    #[n(1)]
    Medical,
    #[n(2)]
    Accident,
    #[n(3)]
    Vision,
    #[n(4)]
    Renewal,
}

/// Issuing branch, a closed set of office codes.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Branch {
    #[n(0)]
    Tlv,
    #[n(1)]
    Jlm,
    #[n(2)]
    Hfa,
    #[n(3)]
    Bsh,
}

impl Branch {
    pub fn code(&self) -> &'static str {
        match self {
            Branch::Tlv => "TLV",
            Branch::Jlm => "JLM",
            Branch::Hfa => "HFA",
            Branch::Bsh => "BSH",
        }
    }
}

/// Lifecycle of a referral. The state only advances forward; `Expired`,
/// `Failed` and `Completed` are terminal and are never mutated again, a
/// re-issue clones a fresh `Created` record instead.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReferralState {
    #[n(0)]
    Created,
    #[n(1)]
    CodeIssued,
    #[n(2)]
    Verified,
    #[n(3)]
    Submitted,
    #[n(4)]
    Completed,
    #[n(5)]
    Expired,
    #[n(6)]
    Failed,
}

impl ReferralState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Failed | Self::Completed)
    }

    /// States from which a fresh one-time code may be issued. Terminal
    /// referrals go through the re-issue clone path instead.
    pub fn permits_code_issue(&self) -> bool {
        matches!(self, Self::Created | Self::CodeIssued)
    }

    /// The citizen form is visible once the phone number has been proven.
    pub fn form_visible(&self) -> bool {
        matches!(self, Self::Verified | Self::Submitted | Self::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    pub fn plus_seconds(&self, secs: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(secs))
    }
    pub fn seconds_until(&self, later: &Self) -> i64 {
        (later.0 - self.0).num_seconds()
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

// Clerk-entered draft, validated on submission. Field checks mirror the
// intake form: checksum-valid id number, local mobile phone, non-empty names
// and a chosen reason and branch.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ReferralDetails {
    id_number: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    reason: Option<ReferralReason>,
    branch: Option<Branch>,
}

impl ReferralDetails {
    /// Construct a new draft, the basis for a clerk submission.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_id_number(mut self, id_number: &str) -> Self {
        self.id_number = Some(id_number.to_owned());
        self
    }
    pub fn set_first_name(mut self, first_name: &str) -> Self {
        self.first_name = Some(first_name.to_owned());
        self
    }
    pub fn set_last_name(mut self, last_name: &str) -> Self {
        self.last_name = Some(last_name.to_owned());
        self
    }
    pub fn set_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_owned());
        self
    }
    pub fn set_reason(mut self, reason: ReferralReason) -> Self {
        self.reason = Some(reason);
        self
    }
    pub fn set_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Checks every field and returns the first failure with field-level
    /// detail. Validation never panics on malformed input.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let id_number = self
            .id_number
            .as_deref()
            .ok_or(ValidationError::MissingField("id_number"))?;
        if !identity::validate_national_id(id_number) {
            return Err(ValidationError::InvalidNationalId);
        }
        let phone = self
            .phone
            .as_deref()
            .ok_or(ValidationError::MissingField("phone"))?;
        if !identity::validate_phone(phone) {
            return Err(ValidationError::InvalidPhone);
        }
        match self.first_name.as_deref() {
            None => return Err(ValidationError::MissingField("first_name")),
            Some(name) if name.trim().is_empty() => {
                return Err(ValidationError::EmptyField("first_name"));
            }
            Some(_) => {}
        }
        match self.last_name.as_deref() {
            None => return Err(ValidationError::MissingField("last_name")),
            Some(name) if name.trim().is_empty() => {
                return Err(ValidationError::EmptyField("last_name"));
            }
            Some(_) => {}
        }
        if self.reason.is_none() {
            return Err(ValidationError::MissingField("reason"));
        }
        if self.branch.is_none() {
            return Err(ValidationError::MissingField("branch"));
        }
        Ok(())
    }

    /// Validate and turn the draft into a persistable record.
    pub fn into_record(
        self,
        id: String,
        created_at: TimeStamp<Utc>,
    ) -> Result<ReferralRecord, ValidationError> {
        self.validate()?;
        let Self {
            id_number: Some(id_number),
            first_name: Some(first_name),
            last_name: Some(last_name),
            phone: Some(phone),
            reason: Some(reason),
            branch: Some(branch),
        } = self
        else {
            // validate() has already rejected any missing field
            return Err(ValidationError::MissingField("referral details"));
        };
        Ok(ReferralRecord {
            id,
            id_number,
            first_name,
            last_name,
            phone,
            reason,
            branch,
            state: ReferralState::Created,
            created_at,
            supersedes: None,
            additional_info: None,
            documents: vec![],
        })
    }
}

/// A citizen referral, keyed by `id` in the store.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct ReferralRecord {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded with the `ref_` prefix
    #[n(1)]
    pub id_number: String,
    #[n(2)]
    pub first_name: String,
    #[n(3)]
    pub last_name: String,
    #[n(4)]
    pub phone: String, // immutable once a code has been issued for it
    #[n(5)]
    pub reason: ReferralReason,
    #[n(6)]
    pub branch: Branch,
    #[n(7)]
    pub state: ReferralState,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub supersedes: Option<String>, // set on re-issued clones of a terminal record
    #[n(10)]
    pub additional_info: Option<String>,
    #[n(11)]
    pub documents: Vec<String>, // opaque blob references
}

impl ReferralRecord {
    /// Opaque link handed to the citizen by the clerk.
    pub fn access_link(&self) -> String {
        format!("/forms/{}", self.id)
    }
}

/// Citizen-entered payload, accepted only while the referral is `Verified`.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct FormSubmission {
    pub additional_info: String,
    pub documents: Vec<String>,
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}
