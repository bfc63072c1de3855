//! Lesson Confirmation service (lessonloop-confirm) - Main entry point
//!
//! Exposes the teacher acknowledge/decline actions and the auto-escalation
//! sweep over HTTP, and runs the sweep on an internal interval as well.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lessonloop_common::config::resolve_database_path;
use lessonloop_common::db::{init_database, Settings};
use lessonloop_confirm::services::credits::HttpCreditLedger;
use lessonloop_confirm::services::escalation;
use lessonloop_confirm::services::notifier::{HttpNotifier, LogNotifier, Notifier};
use lessonloop_confirm::services::ConfirmationService;
use lessonloop_confirm::{build_router, AppState};

/// Command-line arguments for lessonloop-confirm
#[derive(Parser, Debug)]
#[command(name = "lessonloop-confirm")]
#[command(about = "Lesson Confirmation workflow service for LessonLoop")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5760", env = "LESSONLOOP_CONFIRM_PORT")]
    port: u16,

    /// Path to the LessonLoop database (falls back to config file / default)
    #[arg(short, long)]
    database: Option<String>,

    /// Base URL of the credit ledger service
    #[arg(long, env = "LESSONLOOP_LEDGER_URL")]
    ledger_url: String,

    /// Base URL of the notification dispatcher (logs only when unset)
    #[arg(long, env = "LESSONLOOP_NOTIFIER_URL")]
    notifier_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lessonloop_confirm=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    info!(
        "Starting LessonLoop Confirmation service v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        args.port
    );

    let db_path = resolve_database_path(args.database.as_deref(), "LESSONLOOP_DATABASE")
        .context("Failed to resolve database path")?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let settings = Settings::load(&pool)
        .await
        .context("Failed to load settings")?;
    info!(
        "Acknowledgment timeout: {}h, sweep interval: {}m, refund: {} credit(s)",
        settings.acknowledgment_timeout_hours,
        settings.sweep_interval_minutes,
        settings.refund_credits
    );

    // External collaborators, injected so tests can substitute fakes
    let ledger = Arc::new(HttpCreditLedger::new(args.ledger_url.clone()));
    let notifier: Arc<dyn Notifier> = match &args.notifier_url {
        Some(url) => Arc::new(HttpNotifier::new(url.clone())),
        None => {
            info!("No notifier URL configured, notifications will be logged only");
            Arc::new(LogNotifier)
        }
    };

    let service = Arc::new(ConfirmationService::new(
        pool.clone(),
        ledger,
        notifier,
        settings.clone(),
    ));

    // Internal escalation schedule, in addition to the external POST /sweep
    tokio::spawn(escalation::run_scheduler(
        service.clone(),
        settings.sweep_interval_minutes,
    ));

    let state = AppState::new(pool, service);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
