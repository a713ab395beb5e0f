//! Check-in desk: decides whether a scanned QR payload is a valid, unused ticket.
//!
//! A scan is either ACCEPTED, which is terminal for that register number, or
//! REJECTED with a reason. Rejections never consume the ticket, except
//! [`AppError::LedgerSyncFailed`], which is reported after the check-in row has
//! already been written and queued for a later ledger retry.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::models::ValidationRecord;
use crate::db::{AttendeeStore, DatabaseError};
use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerEntry, LedgerSync};
use crate::qr;

pub struct CheckInDesk {
    store: Arc<dyn AttendeeStore>,
    ledger: Arc<dyn LedgerSync>,
}

impl CheckInDesk {
    pub fn new(store: Arc<dyn AttendeeStore>, ledger: Arc<dyn LedgerSync>) -> Self {
        Self { store, ledger }
    }

    /// Validate a scanned payload, recording the check-in on success.
    pub async fn validate(&self, payload: &str) -> AppResult<ValidationRecord> {
        let attendee = qr::decode(payload)?;
        let register_number = attendee.register_number.clone();

        if self.store.find_registration(&register_number).await?.is_none() {
            return Err(AppError::UnknownRegistration(register_number));
        }

        // Fast path only. The unique index decides races below.
        if self.store.find_validation(&register_number).await?.is_some() {
            return Err(AppError::AlreadyUsed(register_number));
        }

        let record = match self.store.insert_validation(&attendee).await {
            Ok(record) => record,
            Err(DatabaseError::Duplicate) => return Err(AppError::AlreadyUsed(register_number)),
            Err(DatabaseError::MissingRegistration) => {
                return Err(AppError::UnknownRegistration(register_number))
            }
            Err(err) => return Err(err.into()),
        };

        let entry = LedgerEntry::CheckIn(record.clone());
        if let Err(err) = self.ledger.push(&entry).await {
            warn!(
                register_number = %register_number,
                error = %err,
                "Check-in stored but ledger sync failed, leaving it for the reconciler"
            );
            return Err(AppError::LedgerSyncFailed(err));
        }

        if let Err(err) = self.store.mark_synced(entry.sheet(), record.id).await {
            // The reconciler will push it again; the ledger sees a duplicate row at worst.
            warn!(register_number = %register_number, error = %err, "Failed to mark check-in as synced");
        }

        info!(register_number = %register_number, "Check-in accepted");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AttendeeRecord, Registration};
    use crate::db::MemoryStore;
    use crate::ledger::Sheet;
    use crate::testing::{attendee, RecordingLedger};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    struct Desk {
        store: Arc<MemoryStore>,
        ledger: Arc<RecordingLedger>,
        desk: CheckInDesk,
    }

    async fn desk_with(registered: &[&str]) -> Desk {
        let store = Arc::new(MemoryStore::new());
        for register_number in registered {
            store.insert_registration(&attendee(register_number)).await.unwrap();
        }
        let ledger = Arc::new(RecordingLedger::new());
        let desk = CheckInDesk::new(store.clone(), ledger.clone());
        Desk { store, ledger, desk }
    }

    #[tokio::test]
    async fn first_scan_is_accepted_and_later_scans_are_already_used() {
        let Desk { store, ledger, desk } = desk_with(&["R100"]).await;
        let payload = qr::encode(&attendee("R100"));

        let record = desk.validate(&payload).await.unwrap();
        assert_eq!(record.attendee, attendee("R100"));
        assert!(store.find_validation("R100").await.unwrap().is_some());
        assert_eq!(ledger.entries(), vec![LedgerEntry::CheckIn(record)]);
        assert!(store.unsynced_validations(Utc::now(), 10).await.unwrap().is_empty());

        for _ in 0..3 {
            let err = desk.validate(&payload).await.unwrap_err();
            assert!(matches!(err, AppError::AlreadyUsed(ref r) if r == "R100"));
        }
        assert_eq!(ledger.entries().len(), 1);
    }

    #[tokio::test]
    async fn any_payload_for_a_used_number_is_rejected() {
        let Desk { desk, .. } = desk_with(&["R100"]).await;
        desk.validate(&qr::encode(&attendee("R100"))).await.unwrap();

        let mut other = attendee("R100");
        other.name = "Different Name".to_string();
        let err = desk.validate(&qr::encode(&other)).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyUsed(_)));
    }

    #[tokio::test]
    async fn unknown_register_number_is_rejected_without_writing() {
        let Desk { store, ledger, desk } = desk_with(&["R100"]).await;

        let err = desk.validate(&qr::encode(&attendee("R999"))).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownRegistration(ref r) if r == "R999"));
        assert!(store.find_validation("R999").await.unwrap().is_none());
        assert!(ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn undecodable_payloads_are_rejected() {
        let Desk { desk, .. } = desk_with(&["R100"]).await;

        let err = desk.validate("definitely not json").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload(_)));

        let err = desk
            .validate(r#"{"name": "Asha", "register_number": "R100"}"#)
            .await
            .unwrap_err();
        match err {
            AppError::IncompleteRecord(missing) => {
                assert_eq!(missing, vec!["degree", "class_section", "year", "email", "phone"])
            }
            other => panic!("expected IncompleteRecord, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ledger_failure_keeps_the_check_in_for_retry() {
        let Desk { store, ledger, desk } = desk_with(&["R100"]).await;
        ledger.set_failing(true);
        let payload = qr::encode(&attendee("R100"));

        let err = desk.validate(&payload).await.unwrap_err();
        assert!(matches!(err, AppError::LedgerSyncFailed(_)));

        let pending = store.unsynced_validations(Utc::now(), 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attendee.register_number, "R100");

        ledger.set_failing(false);
        let err = desk.validate(&payload).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyUsed(_)));
    }

    #[tokio::test]
    async fn storage_outage_is_reported_as_unavailable() {
        let Desk { store, desk, .. } = desk_with(&["R100"]).await;
        store.set_unavailable(true);

        let err = desk.validate(&qr::encode(&attendee("R100"))).await.unwrap_err();
        assert!(matches!(err, AppError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn concurrent_scans_accept_exactly_once() {
        let Desk { desk, .. } = desk_with(&["R100"]).await;
        let desk = Arc::new(desk);
        let payload = qr::encode(&attendee("R100"));

        let scans: Vec<_> = (0..8)
            .map(|_| {
                let desk = desk.clone();
                let payload = payload.clone();
                tokio::spawn(async move { desk.validate(&payload).await })
            })
            .collect();

        let mut accepted = 0;
        let mut already_used = 0;
        for scan in scans {
            match scan.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AppError::AlreadyUsed(_)) => already_used += 1,
                Err(other) => panic!("unexpected rejection: {other:?}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(already_used, 7);
    }

    /// Store whose existence check never sees a prior check-in, so every racer
    /// reaches the insert.
    struct BlindStore(MemoryStore);

    #[async_trait]
    impl AttendeeStore for BlindStore {
        async fn find_registration(
            &self,
            register_number: &str,
        ) -> Result<Option<Registration>, DatabaseError> {
            self.0.find_registration(register_number).await
        }

        async fn insert_registration(
            &self,
            attendee: &AttendeeRecord,
        ) -> Result<Registration, DatabaseError> {
            self.0.insert_registration(attendee).await
        }

        async fn find_validation(
            &self,
            _register_number: &str,
        ) -> Result<Option<ValidationRecord>, DatabaseError> {
            Ok(None)
        }

        async fn insert_validation(
            &self,
            attendee: &AttendeeRecord,
        ) -> Result<ValidationRecord, DatabaseError> {
            self.0.insert_validation(attendee).await
        }

        async fn unsynced_registrations(
            &self,
            settled_before: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<Registration>, DatabaseError> {
            self.0.unsynced_registrations(settled_before, limit).await
        }

        async fn unsynced_validations(
            &self,
            settled_before: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<ValidationRecord>, DatabaseError> {
            self.0.unsynced_validations(settled_before, limit).await
        }

        async fn mark_synced(&self, sheet: Sheet, id: Uuid) -> Result<(), DatabaseError> {
            self.0.mark_synced(sheet, id).await
        }

        async fn ping(&self) -> Result<(), DatabaseError> {
            self.0.ping().await
        }
    }

    #[tokio::test]
    async fn losing_insert_is_reported_as_already_used() {
        let inner = MemoryStore::new();
        inner.insert_registration(&attendee("R100")).await.unwrap();
        let desk = CheckInDesk::new(Arc::new(BlindStore(inner)), Arc::new(RecordingLedger::new()));
        let payload = qr::encode(&attendee("R100"));

        desk.validate(&payload).await.unwrap();
        let err = desk.validate(&payload).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyUsed(_)));
    }
}
