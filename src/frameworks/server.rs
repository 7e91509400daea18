// Framework bootstrap for the game server runtime.

use crate::domain::{GameTuning, ProfileStore, WorldMode};
use crate::frameworks::{config, db};
use crate::interface_adapters::clients::auth::AuthClient;
use crate::interface_adapters::net::{create_world_handler, spawn_world_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::stores::{InMemoryProfileStore, PostgresProfileStore};
use crate::use_cases::{WorldRegistry, WorldSettings};

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state().await?;
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/worlds", post(create_world_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn load_tuning() -> Result<GameTuning> {
    let Some(path) = config::tuning_path() else {
        tracing::debug!("no tuning file configured; using defaults");
        return Ok(GameTuning::default());
    };
    let tuning = GameTuning::load(&path).map_err(|e| {
        std::io::Error::other(format!(
            "failed to load tuning from {}: {e:?}",
            path.display()
        ))
    })?;
    tracing::info!(path = %path.display(), "tuning loaded");
    Ok(tuning)
}

async fn build_profile_store() -> Result<Arc<dyn ProfileStore>> {
    let Some(database_url) = config::database_url() else {
        tracing::warn!("DATABASE_URL not set; profiles are kept in memory only");
        return Ok(Arc::new(InMemoryProfileStore::new()));
    };

    let pool = db::connect_pool(&database_url)
        .await
        .map_err(|e| std::io::Error::other(format!("failed to connect to database: {e}")))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| std::io::Error::other(format!("failed to run migrations: {e}")))?;
    tracing::info!("profile store connected");
    Ok(Arc::new(PostgresProfileStore::new(pool)))
}

async fn build_state() -> Result<Arc<AppState>> {
    let auth_base_url = config::auth_service_url();
    let auth_verify_timeout = config::auth_verify_timeout();
    let auth_client = AuthClient::new(auth_base_url.clone(), auth_verify_timeout)
        .map_err(|e| std::io::Error::other(format!("failed to initialize auth client: {e}")))?;
    tracing::debug!(
        auth_base_url = %auth_base_url,
        auth_verify_timeout_ms = auth_verify_timeout.as_millis(),
        "auth client configured"
    );

    let tuning = Arc::new(load_tuning()?);
    let store = build_profile_store().await?;

    // Owns every world task and its profile worker.
    let world_registry = Arc::new(WorldRegistry::new(
        WorldSettings {
            input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
            world_broadcast_capacity: config::WORLD_BROADCAST_CAPACITY,
            action_queue_capacity: config::ACTION_QUEUE_CAPACITY,
            profile_queue_capacity: config::PROFILE_QUEUE_CAPACITY,
            tick_interval: config::tick_interval(),
            tuning,
        },
        store,
    ));

    let default_world = world_registry
        .create_world(config::DEFAULT_WORLD_ID, WorldMode::default())
        .await
        .map_err(|e| std::io::Error::other(format!("default world failed to start: {e:?}")))?;
    spawn_world_serializer(&default_world);

    Ok(Arc::new(AppState {
        world_registry,
        default_world_id: Arc::from(config::DEFAULT_WORLD_ID),
        auth_client: Arc::new(auth_client),
    }))
}
