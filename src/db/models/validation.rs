use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AttendeeRecord;

/// Terminal marker proving a registration number's QR code has been consumed.
///
/// The attendee fields are copied from the scanned payload, not from the stored
/// registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub attendee: AttendeeRecord,
    pub validated_at: DateTime<Utc>,
}
