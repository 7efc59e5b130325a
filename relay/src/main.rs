//! Form Relay web server.
//!
//! Receives contact-form webhooks, stores each submission in Notion and sends
//! a best-effort thank-you email.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use form_relay::{router, AppState, Config, Notifier, NotionSink, RecordSink, SmtpMailer};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal in production
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(dotenv_loaded, "web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        notion_configured = config.notion_configured(),
        notion_api_url = %config.notion_api_url,
        email_configured = config.mail.is_some(),
        email_auth = config.mail.as_ref().map(|m| m.auth.kind()).unwrap_or("none"),
        "config_loaded"
    );

    if !config.notion_configured() {
        warn!("notion_not_configured");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http_timeout_ms))
        .build()
        .context("Failed to build HTTP client")?;

    let sink: Arc<dyn RecordSink> = Arc::new(NotionSink::new(http.clone(), &config));

    // Email stays optional: a bad mail setup must not stop form capture
    let notifier: Option<Arc<dyn Notifier>> = match config.mail.clone() {
        Some(mail) => match SmtpMailer::new(mail, http.clone()) {
            Ok(mailer) => {
                info!(auth = mailer.kind(), "email_service_created");
                Some(Arc::new(mailer) as Arc<dyn Notifier>)
            }
            Err(e) => {
                warn!(error = %e, "email_service_disabled");
                None
            }
        },
        None => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(sink, notifier);
    let app = router(state);

    // Bind to address
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
