//! Askdesk chat server binary.
//!
//! Serves the chat page and JSON API, forwarding questions to the configured
//! serving endpoint.

use std::sync::Arc;
use std::time::Duration;

use askdesk_api::config::{ApiConfig, DEFAULT_BIND_ADDR};
use askdesk_api::services::sessions::SessionStore;
use askdesk_core::adapter::EndpointAdapter;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on how often idle sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// CLI arguments for the chat server.
#[derive(Parser, Debug)]
#[command(name = "askdesk_server", about = "Askdesk chat server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Serving endpoint to query. Overrides `SERVING_ENDPOINT`.
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,askdesk_api=debug,askdesk_core=debug".into()),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ApiConfig::from_lookup(|key| match (key, &args.endpoint) {
        ("SERVING_ENDPOINT", Some(name)) => Some(name.clone()),
        ("BIND_ADDR", _) => Some(args.bind.clone()),
        (other, _) => std::env::var(other).ok(),
    })?;
    config.chat.endpoint_name = config.chat.endpoint_name.trim().to_string();

    info!(
        endpoint = %config.chat.endpoint_name,
        bind = %config.bind_addr,
        strategy_timeout = ?config.chat.strategy_timeout,
        "starting askdesk_server"
    );

    let adapter = Arc::new(EndpointAdapter::from_config(
        &config.chat,
        reqwest::Client::new(),
    ));

    if !adapter.endpoint_supported(&config.chat.endpoint_name).await {
        warn!(
            endpoint = %config.chat.endpoint_name,
            "endpoint declares an unsupported task type; the page will report it unavailable"
        );
    }

    let state = askdesk_api::AppState::new(config.clone(), adapter);
    let sessions = state.sessions.clone();
    let app = askdesk_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "chat server listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
            }
            shutdown.cancel();
        }
    });
    tokio::spawn(sweep_sessions(sessions, shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Evicts idle sessions until shutdown.
async fn sweep_sessions(sessions: SessionStore, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL.min(sessions.idle_timeout()));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("session sweeper stopped");
                return;
            }
            _ = interval.tick() => {
                sessions.evict_idle();
            }
        }
    }
}
