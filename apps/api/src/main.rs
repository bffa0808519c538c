mod agents;
mod config;
mod errors;
mod notifications;
mod poller;
mod remote;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agents::views::ViewRegistry;
use crate::config::Config;
use crate::notifications::NotificationCenter;
use crate::poller::{PollSettings, Poller};
use crate::remote::RemoteClient;
use crate::routes::build_router;
use crate::session::SessionService;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Launchpad API v{}", env!("CARGO_PKG_VERSION"));

    // One outbound client: agents and the session API share its cookie jar
    let remote = Arc::new(RemoteClient::new(&config)?);
    info!("Session API at {}", config.session_api_url);

    let notifications = NotificationCenter::new(config.notification_ttl);

    let session = Arc::new(SessionService::new(
        remote.clone(),
        config.http_timeout,
        notifications.clone(),
    ));

    let poller = Poller::new(
        remote,
        PollSettings {
            interval: config.poll_interval,
            max_attempts: config.poll_max_attempts,
        },
        notifications.clone(),
    );
    info!(
        "Poller: every {}s, at most {} attempts",
        config.poll_interval.as_secs(),
        config.poll_max_attempts
    );

    // Initial session probe; guarded routes answer "loading" until it settles
    tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.check_session().await }
    });

    let state = AppState {
        config: config.clone(),
        session,
        poller,
        views: ViewRegistry::new(),
        notifications,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the UI origin once it has a fixed host

    let addr: SocketAddr = format!("127.0.0.1:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
