//! Backend for a student-productivity app: user profiles, a dashboard feed,
//! class schedule, budget ledger, quiz bank, a date-keyed planner with
//! email reminders, and AI study tips.
//!
//! Every resource is a JSON document collection in a single SQLite-backed
//! [`store::Store`], opened once at startup and shared through [`api::AppState`].

use std::sync::Arc;

use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod ai;
pub mod api;
pub mod config;
pub mod error;
pub mod mail;
pub mod planner;
pub mod store;

use ai::OpenAiGenerator;
use api::AppState;
use config::Config;
use mail::SmtpMailer;
use store::Store;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!(database = %config.database_url, "Opening store...");
    let store = Arc::new(Store::open(&config.database_url)?);

    if config.email_user.is_empty() {
        warn!("EMAIL_USER not set; reminder emails will fail");
    }
    let mailer = SmtpMailer::new(&config.smtp_host, &config.email_user, &config.email_pass)?;
    let tips = OpenAiGenerator::new(&config.ai_base_url, &config.ai_api_key, &config.ai_model);

    let state = AppState {
        store,
        mailer: Arc::new(mailer),
        tips: Arc::new(tips),
        mail_from: config.email_user.clone(),
        notify_to: config.default_recipient(),
    };

    let app = api::build_router(state).layer(api::cors_layer(&config.client_origin)?);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
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
}
