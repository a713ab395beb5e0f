use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{AttendeeRecord, Registration, ValidationRecord};
use super::{AttendeeStore, DatabaseError};
use crate::ledger::Sheet;

#[derive(Default)]
struct Tables {
    registrations: HashMap<String, (Registration, bool)>,
    validations: HashMap<String, (ValidationRecord, bool)>,
}

/// Process-local [`AttendeeStore`] with the same uniqueness rules as the SQL
/// schema. Used to exercise the services without a database.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backing database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionError(
                "memory store marked unavailable".to_string(),
            ));
        }
        self.tables
            .lock()
            .map_err(|_| DatabaseError::ConnectionError("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl AttendeeStore for MemoryStore {
    async fn find_registration(
        &self,
        register_number: &str,
    ) -> Result<Option<Registration>, DatabaseError> {
        let tables = self.tables()?;
        Ok(tables
            .registrations
            .get(register_number)
            .map(|(registration, _)| registration.clone()))
    }

    async fn insert_registration(
        &self,
        attendee: &AttendeeRecord,
    ) -> Result<Registration, DatabaseError> {
        let mut tables = self.tables()?;
        if tables.registrations.contains_key(&attendee.register_number) {
            return Err(DatabaseError::Duplicate);
        }

        let registration = Registration {
            id: Uuid::now_v7(),
            attendee: attendee.clone(),
            registered_at: Utc::now(),
        };
        tables.registrations.insert(
            attendee.register_number.clone(),
            (registration.clone(), false),
        );
        Ok(registration)
    }

    async fn find_validation(
        &self,
        register_number: &str,
    ) -> Result<Option<ValidationRecord>, DatabaseError> {
        let tables = self.tables()?;
        Ok(tables
            .validations
            .get(register_number)
            .map(|(record, _)| record.clone()))
    }

    async fn insert_validation(
        &self,
        attendee: &AttendeeRecord,
    ) -> Result<ValidationRecord, DatabaseError> {
        let mut tables = self.tables()?;
        if !tables.registrations.contains_key(&attendee.register_number) {
            return Err(DatabaseError::MissingRegistration);
        }
        if tables.validations.contains_key(&attendee.register_number) {
            return Err(DatabaseError::Duplicate);
        }

        let record = ValidationRecord {
            id: Uuid::now_v7(),
            attendee: attendee.clone(),
            validated_at: Utc::now(),
        };
        tables
            .validations
            .insert(attendee.register_number.clone(), (record.clone(), false));
        Ok(record)
    }

    async fn unsynced_registrations(
        &self,
        settled_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Registration>, DatabaseError> {
        let tables = self.tables()?;
        let mut pending: Vec<Registration> = tables
            .registrations
            .values()
            .filter(|(registration, synced)| {
                !synced && registration.registered_at <= settled_before
            })
            .map(|(registration, _)| registration.clone())
            .collect();
        pending.sort_by_key(|registration| registration.registered_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn unsynced_validations(
        &self,
        settled_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<ValidationRecord>, DatabaseError> {
        let tables = self.tables()?;
        let mut pending: Vec<ValidationRecord> = tables
            .validations
            .values()
            .filter(|(record, synced)| !synced && record.validated_at <= settled_before)
            .map(|(record, _)| record.clone())
            .collect();
        pending.sort_by_key(|record| record.validated_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_synced(&self, sheet: Sheet, id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables()?;
        match sheet {
            Sheet::Registrations => {
                if let Some((_, synced)) = tables
                    .registrations
                    .values_mut()
                    .find(|(registration, _)| registration.id == id)
                {
                    *synced = true;
                }
            }
            Sheet::CheckIns => {
                if let Some((_, synced)) = tables
                    .validations
                    .values_mut()
                    .find(|(record, _)| record.id == id)
                {
                    *synced = true;
                }
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.tables().map(|_| ())
    }
}
