use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Names of the fields every attendee record carries, in declaration order.
pub const ATTENDEE_FIELDS: [&str; 7] = [
    "name",
    "degree",
    "class_section",
    "year",
    "register_number",
    "email",
    "phone",
];

/// Personal details captured at registration. `register_number` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub name: String,
    pub degree: String,
    pub class_section: String,
    pub year: String,
    pub register_number: String,
    pub email: String,
    pub phone: String,
}

/// A stored attendee record together with its system-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub attendee: AttendeeRecord,
    pub registered_at: DateTime<Utc>,
}

/// Registration form submission. Only presence is checked, matching the
/// `required` attributes on the HTML form.
#[derive(Debug, Deserialize, Validate)]
pub struct NewAttendee {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub degree: String,
    #[validate(length(min = 1))]
    pub class_section: String,
    #[validate(length(min = 1))]
    pub year: String,
    #[validate(length(min = 1))]
    pub register_number: String,
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

impl From<NewAttendee> for AttendeeRecord {
    fn from(form: NewAttendee) -> Self {
        Self {
            name: form.name,
            degree: form.degree,
            class_section: form.class_section,
            year: form.year,
            register_number: form.register_number,
            email: form.email,
            phone: form.phone,
        }
    }
}
