//! Neon Beat Trivia binary entrypoint wiring REST, SSE, the audio player and the member store.

use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use neon_beat_trivia::{
    audio::lavalink::{LavalinkConfig, LavalinkPlayer},
    config::AppConfig,
    dao::member_store::memory::InMemoryMemberStore,
    routes,
    state::{AppState, SharedState},
};
use tokio::{net::TcpListener, time::interval};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let lavalink = LavalinkConfig::from_env().context("reading Lavalink settings")?;
    let player = LavalinkPlayer::new(lavalink).context("building Lavalink client")?;

    let app_state = AppState::new(config, Arc::new(player));
    install_member_store(&app_state).await;
    tokio::spawn(purge_resolution_cache(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Use MongoDB when `MONGO_URI` is set, keeping the connection supervised; memory otherwise.
async fn install_member_store(state: &SharedState) {
    #[cfg(feature = "mongo-store")]
    {
        use neon_beat_trivia::{
            dao::{
                member_store::{
                    MemberStore,
                    mongodb::{MongoConfig, MongoMemberStore},
                },
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        if env::var("MONGO_URI").is_ok() {
            tokio::spawn(storage_supervisor::run(state.clone(), || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoMemberStore::connect(config).await?;
                Ok::<Arc<dyn MemberStore>, StorageError>(Arc::new(store))
            }));
            return;
        }
    }

    warn!("MONGO_URI not set; member statistics are kept in memory only");
    state
        .set_member_store(Arc::new(InMemoryMemberStore::new()))
        .await;
}

/// Drop expired entries from the shared track resolution cache.
async fn purge_resolution_cache(state: SharedState) {
    let mut ticker = interval(CACHE_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        let purged = state.cache().purge_expired();
        if purged > 0 {
            debug!(purged, "purged expired track resolutions");
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
