//! Streamgate - unified application entry point
//!
//! Orchestrates startup: configuration, database migrations, service
//! construction (fetch client, aggregator, swarm engine or helper proxy,
//! repositories), the axum HTTP server, and the session eviction sweep.

use std::net::SocketAddr;
use std::sync::Arc;
use streamgate_api::{AppState, AuthService, SwarmBackend};
use streamgate_connectors::{BuiltinEndpoints, StreamAggregator};
use streamgate_core::{GatewayError, Result};
use streamgate_fetch::{FetchClient, FetchConfig};
use streamgate_infrastructure::{
    create_pool, AddonRepository, DatabaseConfig, LibraryRepository, MetadataClient,
    SubtitlesClient, UserRepository,
};
use streamgate_media::HelperClient;
use streamgate_swarm::{RqbitEngine, SessionManager, SessionManagerConfig, SwarmTuning};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    info!("🚀 Starting Streamgate");

    let config = AppConfig::from_env()?;
    config.validate()?;
    info!("✅ Configuration loaded");

    let pool = create_pool(DatabaseConfig {
        database_url: config.database_url.clone(),
        ..DatabaseConfig::default()
    })
    .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| GatewayError::DatabaseError {
            message: format!("migrations failed: {}", e),
        })?;
    info!("✅ Database ready");

    let fetch = Arc::new(FetchClient::new(FetchConfig::default())?);
    let aggregator = Arc::new(StreamAggregator::new(
        fetch.clone(),
        BuiltinEndpoints::default(),
    ));

    let backend = match &config.helper_url {
        Some(helper_url) => {
            info!(helper = %helper_url, "using external torrent helper");
            SwarmBackend::Helper(Arc::new(HelperClient::new(helper_url.clone())?))
        }
        None => {
            let engine = Arc::new(
                RqbitEngine::new(&config.download_dir, SwarmTuning::default()).await?,
            );
            let sessions = Arc::new(SessionManager::new(
                engine,
                SessionManagerConfig {
                    download_dir: config.download_dir.clone(),
                    ..SessionManagerConfig::default()
                },
            ));
            let _sweeper = sessions.spawn_sweeper();
            info!(dir = %config.download_dir.display(), "embedded swarm engine ready");
            SwarmBackend::Embedded(sessions)
        }
    };

    let state = AppState {
        auth: Arc::new(AuthService::new(&config.jwt_secret)),
        fetch: fetch.clone(),
        aggregator,
        backend,
        metadata: Arc::new(MetadataClient::new(config.metadata_base.clone(), fetch.clone())),
        subtitles: Arc::new(SubtitlesClient::new(
            config.subtitles_base.clone(),
            fetch.clone(),
        )),
        users: Arc::new(UserRepository::new(pool.clone())),
        addons: Arc::new(AddonRepository::new(pool.clone())),
        library: Arc::new(LibraryRepository::new(pool)),
        tv_addon_base: config.tv_addon_base.clone(),
    };

    let app = streamgate_api::create_router(state);
    info!("✅ HTTP router configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| GatewayError::ValidationError {
            field: "HOST/PORT".to_string(),
            message: format!("{}", e),
        })?;
    info!("🌐 Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Internal {
            message: format!("failed to bind {}: {}", addr, e),
        })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Internal {
            message: format!("server error: {}", e),
        })?;

    info!("👋 Streamgate shutting down");
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,streamgate=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
