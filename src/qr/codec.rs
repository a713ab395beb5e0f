use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::db::models::AttendeeRecord;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload is missing required fields: {}", .0.join(", "))]
    Incomplete(Vec<&'static str>),
}

/// Serialize a record into the JSON text embedded in its QR code.
///
/// Keys are emitted in a fixed order so the same record always yields the same
/// payload.
pub fn encode(record: &AttendeeRecord) -> String {
    json!({
        "name": record.name,
        "degree": record.degree,
        "class_section": record.class_section,
        "year": record.year,
        "register_number": record.register_number,
        "email": record.email,
        "phone": record.phone,
    })
    .to_string()
}

/// Parse a scanned payload back into a record.
///
/// Only presence of the required fields is checked. Unknown keys are ignored,
/// and numbers or booleans are accepted as their JSON text.
pub fn decode(payload: &str) -> Result<AttendeeRecord, DecodeError> {
    let value: Value = serde_json::from_str(payload)?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let mut missing = Vec::new();
    let mut take = |name: &'static str| match scalar_text(&fields, name) {
        Some(text) => text,
        None => {
            missing.push(name);
            String::new()
        }
    };

    let record = AttendeeRecord {
        name: take("name"),
        degree: take("degree"),
        class_section: take("class_section"),
        year: take("year"),
        register_number: take("register_number"),
        email: take("email"),
        phone: take("phone"),
    };

    if !missing.is_empty() {
        return Err(DecodeError::Incomplete(missing));
    }
    Ok(record)
}

// null, arrays and objects count as absent
fn scalar_text(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ATTENDEE_FIELDS;

    fn asha() -> AttendeeRecord {
        AttendeeRecord {
            name: "Asha".to_string(),
            degree: "B.E".to_string(),
            class_section: "CSE-A".to_string(),
            year: "3".to_string(),
            register_number: "R100".to_string(),
            email: "a@x.com".to_string(),
            phone: "9000000000".to_string(),
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let record = asha();
        assert_eq!(decode(&encode(&record)).unwrap(), record);

        let mut awkward = asha();
        awkward.name = "Zoë \"Z\" O'Neil, Jr.\n".to_string();
        awkward.phone = String::new();
        assert_eq!(decode(&encode(&awkward)).unwrap(), awkward);
    }

    #[test]
    fn encode_is_deterministic() {
        assert_eq!(encode(&asha()), encode(&asha()));
    }

    #[test]
    fn key_order_and_extra_keys_do_not_matter() {
        let payload = r#"{
            "_id": "665f1c2e9b1e8a0012345678",
            "phone": "9000000000",
            "email": "a@x.com",
            "register_number": "R100",
            "year": "3",
            "class_section": "CSE-A",
            "degree": "B.E",
            "name": "Asha"
        }"#;
        assert_eq!(decode(payload).unwrap(), asha());
    }

    #[test]
    fn non_json_text_is_malformed() {
        for payload in ["", "R100", "{name: Asha}", "{\"name\": \"Asha\""] {
            assert!(
                matches!(decode(payload), Err(DecodeError::Malformed(_))),
                "{payload:?} should be malformed"
            );
        }
    }

    #[test]
    fn json_that_is_not_an_object_is_rejected() {
        for payload in ["42", "\"R100\"", "[1, 2]", "null"] {
            assert!(matches!(decode(payload), Err(DecodeError::NotAnObject)));
        }
    }

    #[test]
    fn each_missing_field_is_reported() {
        for field in ATTENDEE_FIELDS {
            let mut value: Value = serde_json::from_str(&encode(&asha())).unwrap();
            value.as_object_mut().unwrap().remove(field);

            match decode(&value.to_string()) {
                Err(DecodeError::Incomplete(missing)) => assert_eq!(missing, vec![field]),
                other => panic!("expected Incomplete for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn null_and_nested_values_count_as_missing() {
        let payload = r#"{"name": null, "degree": [], "class_section": {}, "year": "3",
            "register_number": "R100", "email": "a@x.com", "phone": "9000000000"}"#;
        match decode(payload) {
            Err(DecodeError::Incomplete(missing)) => {
                assert_eq!(missing, vec!["name", "degree", "class_section"])
            }
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn scalar_values_are_kept_as_text() {
        let payload = r#"{"name": "Asha", "degree": "B.E", "class_section": "CSE-A",
            "year": 3, "register_number": "R100", "email": "a@x.com", "phone": 9000000000}"#;
        let record = decode(payload).unwrap();
        assert_eq!(record.year, "3");
        assert_eq!(record.phone, "9000000000");
    }
}
