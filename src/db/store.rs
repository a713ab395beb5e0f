use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{AttendeeRecord, Registration, ValidationRecord};
use super::DatabaseError;
use crate::ledger::Sheet;

/// Persistence for registrations and check-ins, keyed by register number.
///
/// Both inserts must be atomic with respect to the register number: when two
/// callers race, exactly one succeeds and the other gets
/// [`DatabaseError::Duplicate`].
#[async_trait]
pub trait AttendeeStore: Send + Sync {
    async fn find_registration(
        &self,
        register_number: &str,
    ) -> Result<Option<Registration>, DatabaseError>;

    async fn insert_registration(
        &self,
        attendee: &AttendeeRecord,
    ) -> Result<Registration, DatabaseError>;

    async fn find_validation(
        &self,
        register_number: &str,
    ) -> Result<Option<ValidationRecord>, DatabaseError>;

    /// Fails with [`DatabaseError::MissingRegistration`] when no registration
    /// exists for the attendee's register number.
    async fn insert_validation(
        &self,
        attendee: &AttendeeRecord,
    ) -> Result<ValidationRecord, DatabaseError>;

    /// Oldest registrations not yet delivered to the external ledger and
    /// stored no later than `settled_before`.
    async fn unsynced_registrations(
        &self,
        settled_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Registration>, DatabaseError>;

    /// Oldest check-ins not yet delivered to the external ledger and stored no
    /// later than `settled_before`.
    async fn unsynced_validations(
        &self,
        settled_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ValidationRecord>, DatabaseError>;

    async fn mark_synced(&self, sheet: Sheet, id: Uuid) -> Result<(), DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}
