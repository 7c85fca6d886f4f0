//! Delivery port for handing a code to the citizen's phone. The transport
//! itself (SMS, push) is an external collaborator; the core only needs a
//! send-code capability that reports success or failure.
use std::sync::Mutex;

pub trait DeliveryGateway: Send + Sync {
    /// Dispatch `code` to `phone`. Returns whether the gateway accepted the
    /// message. A `false` here never strands the referral, re-issue remains
    /// available.
    fn send_code(&self, phone: &str, code: &str) -> bool;
}

/// Gateway double that records every dispatch. Tests read the delivered
/// code from here, the same way a citizen reads it off their phone.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_code(&self) -> Option<String> {
        self.sent
            .lock()
            .expect("gateway lock poisoned")
            .last()
            .map(|(_, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("gateway lock poisoned").len()
    }
}

impl DeliveryGateway for RecordingGateway {
    fn send_code(&self, phone: &str, code: &str) -> bool {
        self.sent
            .lock()
            .expect("gateway lock poisoned")
            .push((phone.to_owned(), code.to_owned()));
        true
    }
}

/// Gateway double that refuses every dispatch.
pub struct FailingGateway;

impl DeliveryGateway for FailingGateway {
    fn send_code(&self, _phone: &str, _code: &str) -> bool {
        false
    }
}
