use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::{auth::repo::UserStore, countries::repo::CountryStore, posts::repo::PostStore};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the constraint's subject.
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                let subject = match db_err.constraint() {
                    Some(c) if c.contains("email") => "email",
                    Some(c) if c.contains("reset_token") => "reset_token",
                    _ => "record",
                };
                return StoreError::Conflict(subject);
            }
        }
        StoreError::Other(err.into())
    }
}

/// Everything the handlers need from persistence.
pub trait Store: UserStore + CountryStore + PostStore + Send + Sync {}

impl<T> Store for T where T: UserStore + CountryStore + PostStore + Send + Sync {}

/// Postgres-backed store. Per-domain queries live in each module's `repo.rs`.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending migrations. Failure is logged, not fatal.
    pub async fn migrate(&self) {
        if let Err(e) = sqlx::migrate!("./migrations").run(&self.pool).await {
            tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
        }
    }
}
