use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{register, registration_form};
use crate::app_state::AppState;

pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(registration_form))
        .route("/register", post(register))
}
