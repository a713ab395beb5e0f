use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing::{info, warn};

use event_checkin::{
    app::create_router,
    app_state::AppState,
    config::Config,
    db::{self, AttendeeStore, SqliteStore},
    ledger::{HttpLedger, LedgerSync},
    notify::{LogOnlyNotifier, NotificationSink, SmtpMailer},
    reconcile::LedgerReconciler,
    telemetry::{init_telemetry, TelemetryConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Arc::new(Config::from_env().context("Failed to load configuration")?);

    let telemetry = init_telemetry(Some(TelemetryConfig::for_environment(
        config.app.environment,
    )))
    .await?;

    let pool = db::init_pool(&config.database).await?;
    let store: Arc<dyn AttendeeStore> = Arc::new(SqliteStore::new(pool));

    let ledger: Arc<dyn LedgerSync> =
        Arc::new(HttpLedger::new(&config.ledger).context("Failed to build ledger client")?);

    let notifier: Arc<dyn NotificationSink> = match &config.mail {
        Some(mail) => Arc::new(
            SmtpMailer::new(mail, &config.app.name).context("Failed to configure SMTP")?,
        ),
        None => {
            warn!("SMTP_USER/SMTP_PASSWORD not set, confirmation emails will only be logged");
            Arc::new(LogOnlyNotifier)
        }
    };

    if config.session.secret.is_none() {
        if config.is_production() {
            warn!("SECRET_KEY not set in production, flash cookies will not survive a restart");
        } else {
            info!("SECRET_KEY not set, using a per-process cookie key");
        }
    }

    let reconciler = config.ledger.retry_interval.map(|interval| {
        LedgerReconciler::new(
            store.clone(),
            ledger.clone(),
            interval,
            config.ledger.retry_batch,
            config.ledger.retry_settle,
        )
        .spawn()
    });

    let state = AppState::new(config.clone(), store, ledger, notifier);
    let app = create_router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!(
        "{} Listening on {} (check-in at {})",
        config.app.name, addr, config.app.validation_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to serve application")?;

    if let Some(reconciler) = reconciler {
        reconciler.abort();
    }
    telemetry.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
