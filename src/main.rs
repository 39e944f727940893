//! Spotlight Back binary entrypoint wiring REST, WebSocket, SSE and storage layers.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spotlight_back::{
    config::{AppConfig, StorageBackend},
    dao::room_store::memory::MemoryRoomStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.server.port;
    let app_state = AppState::new(config);

    start_storage(&app_state).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.hub().shutdown();
    info!("server stopped");
    Ok(())
}

/// Install the configured storage backend, supervising it when it is remote.
async fn start_storage(state: &SharedState) {
    let backend = state.config().storage.backend;
    match backend {
        StorageBackend::Memory => install_memory_store(state).await,
        StorageBackend::Mongo => start_mongo_store(state).await,
    }
}

async fn install_memory_store(state: &SharedState) {
    let store = MemoryRoomStore::new(state.config().code_space());
    state.install_room_store(Arc::new(store)).await;
    info!("using in-memory storage; data is lost on restart");
}

#[cfg(feature = "mongo-store")]
async fn start_mongo_store(state: &SharedState) {
    use spotlight_back::{
        dao::{
            room_store::{
                RoomStore,
                mongodb::{MongoConfig, MongoRoomStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let settings = state.config().storage.clone();
    let codes = state.config().code_space();

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let settings = settings.clone();
        async move {
            let config = MongoConfig::from_settings(&settings).await?;
            let store = MongoRoomStore::connect(config, codes).await?;
            Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store))
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
async fn start_mongo_store(state: &SharedState) {
    warn!("built without the `mongo-store` feature; falling back to in-memory storage");
    install_memory_store(state).await;
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
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
