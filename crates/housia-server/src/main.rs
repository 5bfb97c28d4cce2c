use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use housia_client::{BrokerConfig, RabbitBroker, RedisStatusStore, StatusStoreConfig};
use housia_core::traits::Broker;
use housia_core::{SubmissionConfig, SubmissionGateway};
use housia_db::{Database, DatabaseConfig};
use housia_server::routes;
use housia_server::state::AppState;

const MAX_BODY_BYTES: usize = 16 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("housia=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let port = std::env::var("HOUSIA_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let submission = SubmissionConfig::from_env()?;
    let broker = RabbitBroker::connect(&BrokerConfig::from_env()?.with_queue(&submission.queue)).await?;
    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    let status = RedisStatusStore::connect(&StatusStoreConfig::from_env()?).await?;

    let gateway = SubmissionGateway::new(broker.clone(), db.listing_repo(), status, submission);
    let state = Arc::new(AppState { gateway });

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    broker.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received");
}
