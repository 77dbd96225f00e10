use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vps_api::config::AppConfig;
use vps_api::orders::OrderLifecycleManager;
use vps_api::reaper::spawn_reaper;
use vps_api::routes::api_router;
use vps_api::state::AppState;
use vps_store::ServerRecordStore;

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");

    // Provisioning backend
    let backend =
        vps_infra::build_backend(config.backend).expect("failed to build provisioning backend");

    let manager =
        OrderLifecycleManager::new(ServerRecordStore::new(), backend, config.order_limits);

    // Liveness reaper
    match config.provision_timeout() {
        Some(timeout) => {
            tracing::info!(timeout_secs = timeout.as_secs(), "starting pending-order reaper");
            spawn_reaper(manager.clone(), timeout, config.reaper_interval());
        }
        None => tracing::info!("pending-order reaper disabled"),
    }

    let state = AppState {
        manager,
        config: config.clone(),
    };

    let app = api_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(addr = %config.listen_addr, backend = %config.backend, "starting VPS portal API");

    axum::serve(listener, app).await.expect("server error");
}
