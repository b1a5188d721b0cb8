mod api;
mod engine;
mod error;
mod provider;
mod scheduler;
mod trigger;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use evsync_common::types::ServiceInfo;
use evsync_config::{init_tracing, AppConfig};
use evsync_db::events::pg_repository::PgEventRepository;
use evsync_db::events::repositories::EventRepository;
use evsync_db::sync::pg_repository::PgSyncRepository;
use evsync_db::sync::repositories::SyncWatermarkRepository;
use tower_http::trace::TraceLayer;

use crate::engine::SyncEngine;
use crate::provider::client::{ProviderClient, ProviderClientConfig};
use crate::scheduler::SyncScheduler;
use crate::trigger::SyncTrigger;

#[derive(Clone)]
pub struct AppState {
    pub trigger: Arc<SyncTrigger>,
    pub sync_repo: Arc<dyn SyncWatermarkRepository>,
    pub event_repo: Arc<dyn EventRepository>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("evsync-ingest"))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/info", get(info))
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = AppConfig::from_env().expect("failed to load config");
    let provider_config = ProviderClientConfig::from_env().expect("failed to load provider config");
    tracing::info!(service = "evsync-ingest", provider = %provider_config.base_url, "starting");

    let pool = evsync_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    evsync_db::schema::ensure_schema(&pool)
        .await
        .expect("failed to prepare database schema");

    let sync_repo = Arc::new(PgSyncRepository::new(pool.clone()));
    let watermark = sync_repo
        .ensure_watermark()
        .await
        .expect("failed to initialize sync watermark");
    tracing::info!(
        last_changed_at = %watermark.last_changed_at,
        last_status = watermark.last_status.as_str(),
        "loaded sync watermark"
    );

    let client = ProviderClient::new(provider_config).expect("failed to create provider client");
    let event_repo = Arc::new(PgEventRepository::new(pool));
    let engine = SyncEngine::new(Arc::new(client), event_repo.clone(), sync_repo.clone());
    let trigger = Arc::new(SyncTrigger::new(engine));

    let scheduler = match config.sync_cron.as_deref() {
        Some(expr) => {
            let scheduler = SyncScheduler::new(expr, trigger.clone()).expect("invalid sync schedule");
            Some(Arc::new(scheduler).start())
        }
        None => {
            tracing::info!("SYNC_CRON is empty, scheduled sync disabled");
            None
        }
    };

    let app = build_router(AppState {
        trigger,
        sync_repo,
        event_repo,
    });
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    if let Some(handle) = scheduler {
        handle.abort();
    }
    tracing::info!("shutting down");
}
