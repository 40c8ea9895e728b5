use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DbConfig;

/// Ceiling for a single store operation. A slow database must not be able to
/// stall a request indefinitely.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
        .connect(&cfg.url)
        .await
        .context("connect to database")?;
    Ok(pool)
}

/// Store-level error taxonomy. Raw sqlx errors are translated here, once, so
/// handlers never inspect database error text themselves.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("unsafe sort parameter: {0}")]
    UnsafeSort(String),
    #[error("store operation timed out")]
    Timeout,
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::DuplicateEmail
            }
            _ => StoreError::Sqlx(err),
        }
    }
}

/// Runs a store operation under [`STORE_TIMEOUT`], folding both the timeout
/// and the sqlx error into [`StoreError`].
pub(crate) async fn with_timeout<F, T>(fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(STORE_TIMEOUT, fut).await {
        Err(_) => Err(StoreError::Timeout),
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
    }
}
