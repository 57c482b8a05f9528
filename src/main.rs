//! Furniture shop API server

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use furniture_shop::api::{self, AppState};
use furniture_shop::config::Config;
use furniture_shop::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "furniture_shop=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.token_secret_generated {
        tracing::warn!("TOKEN_SECRET is not set; using a per-process secret, tokens will not survive a restart");
    }
    if config.chat.api_key.is_none() {
        tracing::warn!("CHAT_API_KEY is not set; chat replies will be a fixed notice");
    }

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; using the in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let addr = config.socket_addr();
    let app = api::router(AppState::new(config, store)?);

    tracing::info!("furniture shop listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
