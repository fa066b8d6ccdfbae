//! Clinic intake bot
//!
//! Walks patients through booking a visit over Telegram: specialty, doctor,
//! name, national id, insurance, then a simulated payment that commits the
//! appointment to SQLite and hands back a visit code.

mod api;
mod catalog;
mod config;
mod db;
mod prompts;
mod registry;
mod runtime;
mod state_machine;
mod telegram;

use api::{create_router, AppState};
use catalog::Catalog;
use config::BotConfig;
use db::Database;
use registry::SessionRegistry;
use runtime::{DatabaseStore, DispatchLoop, Dispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use telegram::TelegramClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Updates buffered between the poller and the dispatch loop
const INBOUND_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal in production
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_intake_bot=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = BotConfig::from_env()?;
    tracing::info!(config = ?config, "Configuration loaded");

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // The bot never starts without a working store
    let db = Database::open(&config.db_path).map_err(|e| {
        tracing::error!(error = %e, "Appointment store unavailable");
        e
    })?;
    tracing::info!(
        path = %config.db_path.display(),
        appointments = db.appointment_count()?,
        "Appointment store ready"
    );

    let catalog = Arc::new(Catalog::clinic());
    let store = DatabaseStore::new(db);

    // HTTP conversations live in their own registry; a Telegram chat id posted
    // to the API names a fresh HTTP conversation, not that chat's form
    let http_dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&catalog),
        Arc::new(SessionRegistry::new()),
        store.clone(),
    ));
    let mut state = AppState::new(http_dispatcher);

    let cancel = CancellationToken::new();
    let mut background = Vec::new();

    match &config.bot_token {
        Some(token) => {
            let client =
                TelegramClient::new(&config.telegram_api_url, token, config.poll_timeout)?;
            let (tx, rx) = mpsc::channel(INBOUND_QUEUE);

            let telegram_sessions = Arc::new(SessionRegistry::new());
            let dispatcher = Arc::new(Dispatcher::new(
                catalog,
                Arc::clone(&telegram_sessions),
                store,
            ));
            state = state.with_sessions(telegram_sessions);

            let dispatch = Arc::new(DispatchLoop::new(dispatcher, client.clone()));
            background.push(tokio::spawn(dispatch.run(rx, cancel.clone())));

            let poll_cancel = cancel.clone();
            background.push(tokio::spawn(async move { client.poll(tx, poll_cancel).await }));
        }
        None => {
            tracing::warn!("BOT_TOKEN is not set; Telegram polling disabled, serving HTTP only");
        }
    }

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Clinic intake bot listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown requested");
            cancel.cancel();
        });
    }

    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    // Covers the server exiting on its own
    cancel.cancel();
    for task in background {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }

    tracing::info!("Clinic intake bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
