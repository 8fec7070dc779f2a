pub mod models;
pub mod queries;

use crate::config;
use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Client-local persisted state: session profile, token pair, selected team
#[derive(Clone)]
pub struct Store {
    pool: Arc<SqlitePool>,
}

impl Store {
    pub async fn open() -> Result<Self> {
        let db_path = db_path()?;
        Self::open_at(&db_path).await
    }

    pub async fn open_at(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_exists = db_path.exists();
        debug!(path = %db_path.display(), existing = db_exists, "Opening local store");

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                if db_exists {
                    Error::DatabaseCorrupted {
                        path: db_path.to_path_buf(),
                        suggestion: format!(
                            "Try: mv {} {}.bak && opsdeck login",
                            db_path.display(),
                            db_path.display()
                        ),
                    }
                } else {
                    Error::DatabaseOpen {
                        path: db_path.to_path_buf(),
                        source: e,
                    }
                }
            })?;

        Self::migrate(pool).await
    }

    /// Throwaway store for tests
    pub async fn in_memory() -> Result<Self> {
        // A single connection that never expires, or the database vanishes
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_path() -> Result<PathBuf> {
    Ok(config::ensure_config_dir()?.join("opsdeck.db"))
}

pub use models::{SelectedTeamRow, SessionRow, TokensRow};
pub use queries::*;
