use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use copiloto::backend_client::SupabaseClient;
use copiloto::config::Config;
use copiloto::handlers::AppState;
use copiloto::kv_store::{FileKvStore, KvStore};
use copiloto::routes;
use copiloto::session::SessionManager;
use copiloto::user_data::UserDataCache;

/// Main entry point for the application.
///
/// Initializes logging, configuration (fails fast when the backend URL or
/// key is missing), the backend client, the persistent store, sessions and
/// the per-seller cache, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "copiloto=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let backend = SupabaseClient::new(
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
        config.backend_timeout(),
    )?;
    tracing::info!("✓ Backend client initialized: {}", config.supabase_url);

    let store: Arc<dyn KvStore> = Arc::new(FileKvStore::open(&config.data_dir).await?);
    tracing::info!("Persistent store at {}", config.data_dir.display());

    let app_state = Arc::new(AppState {
        config: config.clone(),
        sessions: SessionManager::new(backend.clone(), store.clone()),
        user_data: UserDataCache::new(backend.clone(), store),
        backend,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = routes::app(app_state)
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB, every request body here is a small form
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
