use anyhow::{Context, Result};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, Resource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Environment;

static OTLP_EXPORT_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Telemetry configuration structure
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub otlp_endpoint: Option<String>,
    pub enable_tracing: bool,
    pub export_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::default().as_str().to_string(),
            otlp_endpoint: None,
            enable_tracing: true,
            export_timeout: Duration::from_secs(30),
        }
    }
}

impl TelemetryConfig {
    /// Tag exported spans with the deployment environment and read the OTLP
    /// settings from the standard `OTEL_*` variables.
    pub fn for_environment(environment: Environment) -> Self {
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(environment: Environment, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            environment: environment.as_str().to_string(),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|url| !url.is_empty()),
            enable_tracing: lookup("OTEL_TRACES_ENABLED")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
            ..Self::default()
        }
    }
}

/// Held by `main` until shutdown.
pub struct TelemetryHandles {
    exporting: bool,
}

impl TelemetryHandles {
    /// Flush pending spans and shut down the global tracer provider
    pub async fn shutdown(self) -> Result<()> {
        if self.exporting {
            info!("Flushing OTLP spans");
            global::shutdown_tracer_provider();
            OTLP_EXPORT_ACTIVE.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Install the tracing subscriber and, when an endpoint is configured, the OTLP exporter
pub async fn init_telemetry(config: Option<TelemetryConfig>) -> Result<TelemetryHandles> {
    let config = config.unwrap_or_default();

    setup_tracing_subscriber()?;

    info!(
        "Initializing telemetry for service: {} v{} in environment: {}",
        config.service_name, config.service_version, config.environment
    );

    let exporting = if config.enable_tracing {
        let resource = create_resource(&config);
        init_tracing(&config, resource)?
    } else {
        false
    };

    Ok(TelemetryHandles { exporting })
}

fn create_resource(config: &TelemetryConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ])
}

/// Returns whether spans are being exported.
fn init_tracing(config: &TelemetryConfig, resource: Resource) -> Result<bool> {
    let Some(endpoint) = &config.otlp_endpoint else {
        info!("No OTLP endpoint configured, using console-only tracing");
        return Ok(false);
    };

    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_timeout(config.export_timeout),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_resource(resource)
                .with_sampler(opentelemetry_sdk::trace::Sampler::AlwaysOn),
        )
        .install_batch(runtime::Tokio)
        .context("Failed to initialize OTLP tracer")?;

    global::set_tracer_provider(provider);
    OTLP_EXPORT_ACTIVE.store(true, Ordering::SeqCst);

    info!("Distributed tracing initialized with OTLP exporter at {}", endpoint);
    Ok(true)
}

fn setup_tracing_subscriber() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=debug,tower_http=info", env!("CARGO_CRATE_NAME")).into());

    Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// Health check for telemetry components
pub fn telemetry_health_check() -> HashMap<String, bool> {
    let mut health = HashMap::new();
    health.insert(
        "otlp_export".to_string(),
        OTLP_EXPORT_ACTIVE.load(Ordering::SeqCst),
    );
    health
}
