use axum::{routing::get, Router};

use super::handlers::{scan_page, validate_scan};
use crate::app_state::AppState;

/// Scanner page and validation endpoint, mounted at the configured path.
pub fn checkin_routes(path: &str) -> Router<AppState> {
    Router::new().route(path, get(scan_page).post(validate_scan))
}
