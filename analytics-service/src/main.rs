mod config;
mod consumer;
mod events;
mod handlers;
mod store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use shared::messaging::{QueueDescriptor, RedisStreamTransport};

use crate::config::Config;
use crate::consumer::{
    ConnectionSupervisor, ConsumerStatus, EventDispatcher, RetryPolicy, ANALYTICS_QUEUE,
    CONSUMER_GROUP,
};
use crate::events::AnalyticsEventHandler;
use crate::store::AnalyticsStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AnalyticsStore>,
    pub consumer_status: ConsumerStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Pathfinder Analytics Service...");

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;
    info!("Configuration loaded successfully");

    let store = Arc::new(AnalyticsStore::new());

    // Wire up the event consumer
    let transport = Arc::new(RedisStreamTransport::new(
        &config.broker.url,
        CONSUMER_GROUP,
        &config.broker.consumer_name,
    )?);
    let dispatcher = EventDispatcher::new(Arc::new(AnalyticsEventHandler::new(store.clone())));
    let supervisor = ConnectionSupervisor::new(
        transport,
        dispatcher,
        QueueDescriptor::durable(ANALYTICS_QUEUE),
        RetryPolicy {
            max_connect_attempts: config.consumer.max_connect_attempts,
            retry_delay: Duration::from_secs(config.consumer.retry_delay_seconds),
        },
    );
    let consumer_status = supervisor.status();

    // The supervisor runs on its own task; broker downtime never blocks the
    // HTTP surface, and its terminal states are logged, not propagated.
    tokio::spawn(supervisor.run());
    info!("Event consumer started");

    // Build application state
    let app_state = AppState {
        store,
        consumer_status,
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/api/analytics/health", get(handlers::health::health_check))
        .route("/api/analytics/ready", get(handlers::health::readiness))
        .route(
            "/api/analytics/:user_id/kpis",
            get(handlers::analytics::get_user_kpis),
        )
        .route(
            "/api/analytics/:user_id/activity",
            get(handlers::analytics::get_user_activity),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Analytics Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
