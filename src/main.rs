//! Campus Market API server

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_market::api::{router, AppState};
use campus_market::config::AppConfig;
use campus_market::events::EventPublisher;
use campus_market::store::{MemoryRepository, PgRepository, Repository};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let repo: Arc<dyn Repository> = match &config.database_url {
        Some(url) => Arc::new(PgRepository::connect(url, config.max_db_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
            Arc::new(MemoryRepository::new())
        }
    };
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    let address = config.bind_address();
    let app = router(AppState::new(repo, events, config));
    tracing::info!("campus market listening on {}", address);
    axum::serve(tokio::net::TcpListener::bind(&address).await?, app).await?;
    Ok(())
}
