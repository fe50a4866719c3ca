//! Pooled in-memory DuckDB engine.
//!
//! All checkouts share one in-memory database, so a table created by the
//! dataset loader is visible to every panel. Checking a connection out and
//! dropping it back models the open -> use -> close lifecycle of one
//! logical unit of work.

use std::sync::Arc;

use duckdb::{Config, DuckdbConnectionManager};
use r2d2::Pool;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::engine::connection::EngineConnection;
use crate::engine::SqlEngine;
use crate::error::AppError;

#[derive(Clone)]
pub struct EnginePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    pool: Pool<DuckdbConnectionManager>,
    init_sql: String,
}

impl EnginePool {
    #[instrument(skip(config))]
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let manager = DuckdbConnectionManager::memory_with_flags(
            Config::default()
                .enable_autoload_extension(true)?
                .allow_unsigned_extensions()?,
        )?;

        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .build(manager)?;

        let init_sql = extension_init_sql(&config.extensions);
        info!(
            pool_size = config.pool_size,
            extensions = ?config.extensions,
            "analytical engine initialized"
        );

        Ok(Self {
            inner: Arc::new(PoolInner { pool, init_sql }),
        })
    }
}

impl SqlEngine for EnginePool {
    type Conn = EngineConnection;

    fn connect(&self) -> Result<EngineConnection, AppError> {
        let conn = self.inner.pool.get()?;
        // INSTALL is shared across the database; LOAD is per-connection and
        // must run on every checkout.
        if !self.inner.init_sql.is_empty() {
            conn.execute_batch(&self.inner.init_sql)?;
        }
        Ok(EngineConnection::new(conn))
    }
}

fn extension_init_sql(extensions: &[String]) -> String {
    extensions
        .iter()
        .map(|ext| format!("INSTALL {ext}; LOAD {ext};"))
        .collect::<Vec<_>>()
        .join(" ")
}
