use crate::config;
use crate::error::AppError;
use anyhow::Context;
use mongodb::{Client, Database};
use once_cell::sync::OnceCell;
use std::future::Future;
use tokio::time::timeout;
use tracing::{info, warn};

static DB: OnceCell<Database> = OnceCell::new();

pub async fn connect(uri: &str, name: &str) -> anyhow::Result<()> {
    let client = Client::with_uri_str(uri)
        .await
        .context("Failed to connect to database")?;
    DB.set(client.database(name))
        .map_err(|_| anyhow::anyhow!("Database is already connected"))?;
    info!(database = name, "Connected to document store");
    Ok(())
}

pub fn get_db() -> Database {
    DB.get().expect("Database is not available yet!").clone()
}

/// Every store round trip goes through this guard. An elapsed timeout or a
/// driver error surfaces as a retryable store failure, never as a silent
/// success; the caller decides whether to retry.
pub async fn guarded<T, F>(op: F, failure: &'static str) -> Result<T, AppError>
where
    F: Future<Output = Result<T, mongodb::error::Error>>,
{
    match timeout(config::get().store_timeout, op).await {
        Ok(result) => result.map_err(|error| {
            warn!(%error, code = failure, "Store operation failed");
            AppError::Store(failure)
        }),
        Err(_) => Err(AppError::Store("STORE_TIMEOUT")),
    }
}
