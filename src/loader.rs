//! One-time bulk ingestion of the base countries dataset.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::engine::{SqlConnection, SqlEngine};
use crate::error::AppError;
use crate::gate::{ReadyGate, ReadyWatch};

/// Loads the world-countries table into the engine exactly once and signals
/// "base data ready" through its gate. On failure the gate is never opened:
/// dependent panels stay in their loading state, and no automatic retry is
/// attempted.
pub struct DatasetLoader<E> {
    engine: Arc<E>,
    gate: ReadyGate,
    started: AtomicBool,
}

impl<E: SqlEngine> DatasetLoader<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            gate: ReadyGate::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Gate observed by panels that query the countries table.
    pub fn watch(&self) -> ReadyWatch {
        self.gate.subscribe()
    }

    /// Reads the external geo file at `source` into the `countries` table
    /// over one connection. At most one load runs per engine instance;
    /// later calls are no-ops.
    #[instrument(skip(self))]
    pub async fn load(&self, source: &str) -> Result<(), AppError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("base dataset load already started");
            return Ok(());
        }

        let engine = Arc::clone(&self.engine);
        let script = load_script(source);
        tokio::task::spawn_blocking(move || {
            let mut conn = engine.connect()?;
            conn.execute_batch(&script)
        })
        .await
        .map_err(|err| AppError::Internal(format!("base load task failed: {err}")))??;

        self.gate.open();
        info!(source, "base dataset ready");
        Ok(())
    }
}

fn load_script(source: &str) -> String {
    // The source location comes from operator configuration, not user input.
    format!(
        "CREATE TABLE countries AS SELECT * FROM ST_Read('{}');",
        source.replace('\'', "''")
    )
}
