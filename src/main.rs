use anyhow::Result;
use dotenvy::dotenv;
use stock_ledger::auth::PasswordHasher;
use stock_ledger::config::Config;
use stock_ledger::storage::database::DatabaseStorage;
use stock_ledger::{web, StockLedger};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stock_ledger=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    if let Some(dir) = config.sqlite_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
    }

    let storage = DatabaseStorage::connect(config.database_url(), *config.max_db_connections()).await?;
    let hasher = PasswordHasher::new(*config.password_iterations());
    let session_ttl = chrono::Duration::seconds(*config.session_ttl_secs());
    let ledger = Arc::new(StockLedger::with_hasher(storage, hasher).with_session_ttl(session_ttl));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "listening");
    axum::serve(listener, web::router(ledger)).await?;

    Ok(())
}
