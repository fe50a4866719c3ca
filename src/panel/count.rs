//! Country-count panel: the simplest query against the base table.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::engine::{Row, SqlEngine};
use crate::error::AppError;
use crate::gate::ReadyWatch;
use crate::panel::{run_query, PanelState, ResultSlot};

pub const COUNT_QUERY: &str = "SELECT COUNT(*) AS total FROM countries;";

pub struct CountPanel<E> {
    engine: Arc<E>,
    base: ReadyWatch,
    slot: ResultSlot<u64>,
}

impl<E: SqlEngine> CountPanel<E> {
    pub fn new(engine: Arc<E>, base: ReadyWatch) -> Self {
        Self {
            engine,
            base,
            slot: ResultSlot::new(),
        }
    }

    pub fn state(&self) -> PanelState<u64> {
        self.slot.state()
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) {
        self.base.ready().await;
        let ticket = self.slot.begin();
        let state = match run_query(Arc::clone(&self.engine), COUNT_QUERY.to_string(), Vec::new())
            .await
            .and_then(parse_count)
        {
            Ok(total) => PanelState::Ready(total),
            Err(err) => {
                warn!(%err, "count query failed");
                PanelState::Failed(err.to_string())
            }
        };
        self.slot.complete(ticket, state);
    }
}

fn parse_count(rows: Vec<Row>) -> Result<u64, AppError> {
    let row = rows
        .first()
        .ok_or_else(|| AppError::Decode("count query returned no rows".to_string()))?;
    let total = row.require_i64("total")?;
    u64::try_from(total)
        .map_err(|_| AppError::Decode(format!("negative count from engine: {total}")))
}
