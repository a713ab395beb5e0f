//! Forwarding of stored records to the external spreadsheet webhooks.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::db::models::{Registration, ValidationRecord};

/// Which spreadsheet an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    Registrations,
    CheckIns,
}

impl Sheet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sheet::Registrations => "registrations",
            Sheet::CheckIns => "check_ins",
        }
    }
}

/// A record as posted to the ledger: the JSON body is the record itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LedgerEntry {
    Registration(Registration),
    CheckIn(ValidationRecord),
}

impl LedgerEntry {
    pub fn sheet(&self) -> Sheet {
        match self {
            LedgerEntry::Registration(_) => Sheet::Registrations,
            LedgerEntry::CheckIn(_) => Sheet::CheckIns,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LedgerEntry::Registration(registration) => registration.id,
            LedgerEntry::CheckIn(record) => record.id,
        }
    }

    pub fn register_number(&self) -> &str {
        match self {
            LedgerEntry::Registration(registration) => &registration.attendee.register_number,
            LedgerEntry::CheckIn(record) => &record.attendee.register_number,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ledger responded with HTTP {0}")]
    Rejected(u16),
}

/// External system of record that receives a copy of every stored entry.
#[async_trait]
pub trait LedgerSync: Send + Sync {
    async fn push(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;
}

/// Posts entries as JSON to one webhook per sheet. Any non-2xx status is a failure.
pub struct HttpLedger {
    client: reqwest::Client,
    registration_url: String,
    validation_url: String,
}

impl HttpLedger {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            registration_url: config.registration_url.clone(),
            validation_url: config.validation_url.clone(),
        })
    }

    fn url_for(&self, sheet: Sheet) -> &str {
        match sheet {
            Sheet::Registrations => &self.registration_url,
            Sheet::CheckIns => &self.validation_url,
        }
    }
}

#[async_trait]
impl LedgerSync for HttpLedger {
    async fn push(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let response = self
            .client
            .post(self.url_for(entry.sheet()))
            .json(entry)
            .send()
            .await?;

        let status = response.status();
        debug!(
            sheet = entry.sheet().as_str(),
            register_number = entry.register_number(),
            status = status.as_u16(),
            "Ledger responded"
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(LedgerError::Rejected(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AttendeeRecord;
    use chrono::Utc;

    #[test]
    fn entry_serializes_as_the_bare_record() {
        let registration = Registration {
            id: Uuid::now_v7(),
            attendee: AttendeeRecord {
                name: "Asha".to_string(),
                degree: "B.E".to_string(),
                class_section: "CSE-A".to_string(),
                year: "3".to_string(),
                register_number: "R100".to_string(),
                email: "a@x.com".to_string(),
                phone: "9000000000".to_string(),
            },
            registered_at: Utc::now(),
        };
        let entry = LedgerEntry::Registration(registration.clone());

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["_id"], registration.id.to_string());
        assert_eq!(json["register_number"], "R100");
        assert_eq!(json["class_section"], "CSE-A");
        assert!(json.get("attendee").is_none());
        assert_eq!(entry.sheet(), Sheet::Registrations);
    }
}
