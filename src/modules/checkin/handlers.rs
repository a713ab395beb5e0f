use askama::Template;
use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app_state::AppState;
use crate::db::models::ValidationRecord;
use crate::modules::HtmlTemplate;

const NO_QR_DATA: &str = "No QR data provided.";
const ACCEPTED: &str = "Validation successful. Data saved.";

#[derive(Template)]
#[template(path = "checkin/scan.html")]
struct ScanTemplate<'a> {
    event_name: &'a str,
    validate_path: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub qr_data: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendee: Option<ValidationRecord>,
}

impl ScanResponse {
    fn rejected(message: &str, reason: &str) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
            reason: Some(reason.to_string()),
            attendee: None,
        }
    }
}

pub async fn scan_page(State(state): State<AppState>) -> impl IntoResponse {
    HtmlTemplate(ScanTemplate {
        event_name: &state.env.app.name,
        validate_path: &state.env.app.validation_path,
    })
    .into_response()
}

/// Every outcome, including unreadable bodies, is answered with `valid: false`
/// and a message rather than an error status.
pub async fn validate_scan(State(state): State<AppState>, body: Bytes) -> Json<ScanResponse> {
    let qr_data = serde_json::from_slice::<ScanRequest>(&body)
        .ok()
        .and_then(|request| request.qr_data)
        .filter(|data| !data.is_empty());

    let Some(qr_data) = qr_data else {
        return Json(ScanResponse::rejected(NO_QR_DATA, "missing_qr_data"));
    };

    match state.check_in.validate(&qr_data).await {
        Ok(record) => Json(ScanResponse {
            valid: true,
            message: ACCEPTED.to_string(),
            reason: None,
            attendee: Some(record),
        }),
        Err(err) => {
            info!(reason = err.code(), "Scan rejected: {}", err);
            Json(ScanResponse::rejected(err.user_message(), err.code()))
        }
    }
}
