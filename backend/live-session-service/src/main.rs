use actix_web::{web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use live_session_service::config::Config;
use live_session_service::routes::configure_routes;
use live_session_service::services::live::plans::{ConfigPlanProvider, PlanProvider};
use live_session_service::services::live::recording::{
    CloudRecordingClient, DisabledRecordingBackend, RecordingBackend, RecordingController,
};
use live_session_service::services::live::repository::PgStreamStore;
use live_session_service::services::live::session_cache::RedisSessionStore;
use live_session_service::services::live::{LiveStreamService, SessionStore, StreamStore};
use live_session_service::state::AppState;
use rtc_token::TokenIssuer;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("database migrations failed")?;
    info!("Database connected, migrations applied");

    let redis_client =
        redis::Client::open(config.redis_url.clone()).context("invalid REDIS_URL")?;
    let redis = redis_client
        .get_connection_manager()
        .await
        .context("failed to connect to Redis")?;
    info!("Redis connected");

    let store: Arc<dyn StreamStore> = Arc::new(PgStreamStore::new(pool));
    let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(redis));
    let plans: Arc<dyn PlanProvider> = Arc::new(ConfigPlanProvider::new(
        config.premium_owner_ids.iter().copied().collect(),
        config.free_plan,
        config.premium_plan,
    ));

    let recording_backend: Arc<dyn RecordingBackend> =
        match (&config.recording_api_url, &config.recording_api_key) {
            (Some(url), Some(key)) => {
                info!("Cloud recording backend enabled at {}", url);
                Arc::new(CloudRecordingClient::new(url.clone(), key.clone()))
            }
            _ => {
                warn!("Recording backend not configured; streams will not be recorded");
                Arc::new(DisabledRecordingBackend)
            }
        };

    let tokens = TokenIssuer::new(config.rtc_app_id.clone(), config.rtc_app_secret.clone());

    let live = Arc::new(LiveStreamService::new(
        store,
        sessions,
        plans,
        RecordingController::new(recording_backend),
        tokens,
        config.session_ttl_seconds,
        config.token_ttl_seconds,
    ));

    // The viewer counter is derived state: sweep live streams so sessions
    // that expired without an explicit leave stop being counted.
    {
        let live = live.clone();
        let interval = Duration::from_secs(config.reconcile_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = live.reconcile_all_live().await {
                    warn!(error = %err, "viewer reconciliation sweep failed");
                }
            }
        });
    }

    let state = AppState {
        live,
        config: config.clone(),
    };
    let bind_addr = format!("{}:{}", config.host, config.port);
    info!("live-session-service listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind on {bind_addr}"))?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}
