use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::json;

use crate::{
    app_state::AppState,
    middleware::tracing::observability_middleware,
    modules::{checkin::routes::checkin_routes, registration::routes::registration_routes},
};

pub fn create_router(state: AppState) -> Router {
    let static_dir = state.env.app.static_dir.clone();
    let validation_path = state.env.app.validation_path.clone();

    Router::new()
        .merge(registration_routes())
        .merge(checkin_routes(&validation_path))
        .route("/health", get(health_check))
        .nest_service("/static", tower_http::services::ServeDir::new(static_dir))
        .layer(middleware::from_fn(observability_middleware))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let storage_status = match state.store.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Storage health check failed: {}", e);
            "unhealthy"
        }
    };

    let telemetry_health = crate::telemetry::telemetry_health_check();

    Json(json!({
        "status": if storage_status == "healthy" { "ok" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.env.app.environment.as_str(),
        "services": {
            "storage": storage_status,
            "telemetry": telemetry_health
        }
    }))
}
