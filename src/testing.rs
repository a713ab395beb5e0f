//! Test doubles for the outbound collaborators.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::models::AttendeeRecord;
use crate::ledger::{LedgerEntry, LedgerError, LedgerSync};
use crate::notify::{NotificationSink, NotifyError};

/// A complete attendee record for `register_number`.
pub fn attendee(register_number: &str) -> AttendeeRecord {
    AttendeeRecord {
        name: "Asha".to_string(),
        degree: "B.E".to_string(),
        class_section: "CSE-A".to_string(),
        year: "3".to_string(),
        register_number: register_number.to_string(),
        email: "a@x.com".to_string(),
        phone: "9000000000".to_string(),
    }
}

/// Ledger that keeps every accepted entry and can be switched into failure.
#[derive(Default)]
pub struct RecordingLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    failing: AtomicBool,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerSync for RecordingLedger {
    async fn push(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected(500));
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(())
    }
}

/// Notifier that records recipients instead of sending mail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, usize)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Recipient address and attachment size of every delivered message.
    pub fn sent(&self) -> Vec<(String, usize)> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send_confirmation(
        &self,
        attendee: &AttendeeRecord,
        qr_png: Vec<u8>,
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Address(
                lettre::address::AddressError::MissingParts,
            ));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((attendee.email.clone(), qr_png.len()));
        }
        Ok(())
    }
}
