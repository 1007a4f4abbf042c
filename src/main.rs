//! Tally Train binary entrypoint wiring REST, WebSocket, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_train::{
    config::{AppConfig, StoreKind},
    dao::game_store::memory::MemoryGameStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store_kind = StoreKind::from_env().map_err(anyhow::Error::msg)?;

    let app_state = match store_kind {
        StoreKind::Memory => {
            info!("using in-memory storage; games are lost on restart");
            AppState::with_store(config, Arc::new(MemoryGameStore::new()))
        }
        StoreKind::Mongo => {
            let state = AppState::new(config);
            spawn_mongo_supervisor(&state)?;
            state
        }
        StoreKind::Couch => {
            let state = AppState::new(config);
            spawn_couch_supervisor(&state)?;
            state
        }
    };

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, store = ?store_kind, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use tally_train::{
        dao::{
            game_store::{
                GameStore,
                mongodb::{MongoConfig, MongoGameStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    async fn connect() -> Result<Arc<dyn GameStore>, StorageError> {
        let config = MongoConfig::from_env().await?;
        let store = MongoGameStore::connect(config).await?;
        Ok(Arc::new(store))
    }

    tokio::spawn(storage_supervisor::run(state.storage_handle(), connect));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    anyhow::bail!("MongoDB storage requested but the `mongo-store` feature is disabled")
}

#[cfg(feature = "couch-store")]
fn spawn_couch_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use tally_train::{
        dao::{
            game_store::{
                GameStore,
                couchdb::{CouchConfig, CouchGameStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    async fn connect() -> Result<Arc<dyn GameStore>, StorageError> {
        let config = CouchConfig::from_env()?;
        let store = CouchGameStore::connect(config).await?;
        Ok(Arc::new(store))
    }

    tokio::spawn(storage_supervisor::run(state.storage_handle(), connect));
    Ok(())
}

#[cfg(not(feature = "couch-store"))]
fn spawn_couch_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    anyhow::bail!("CouchDB storage requested but the `couch-store` feature is disabled")
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
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
