//! Top-N panel: the largest countries by polygon area.

use std::sync::Arc;

use duckdb::types::Value;
use tracing::{instrument, warn};

use crate::engine::{Row, SqlEngine};
use crate::error::AppError;
use crate::gate::ReadyWatch;
use crate::panel::{run_query, PanelState, ResultSlot};

pub const LARGEST_QUERY: &str =
    "SELECT name, ST_Area(geom) AS area FROM countries ORDER BY area DESC LIMIT ?;";

#[derive(Debug, Clone, PartialEq)]
pub struct CountryArea {
    pub name: String,
    pub area: f64,
}

pub struct LargestPanel<E> {
    engine: Arc<E>,
    base: ReadyWatch,
    slot: ResultSlot<Vec<CountryArea>>,
}

impl<E: SqlEngine> LargestPanel<E> {
    pub fn new(engine: Arc<E>, base: ReadyWatch) -> Self {
        Self {
            engine,
            base,
            slot: ResultSlot::new(),
        }
    }

    pub fn state(&self) -> PanelState<Vec<CountryArea>> {
        self.slot.state()
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self, limit: u32) {
        self.base.ready().await;
        let ticket = self.slot.begin();
        let params = vec![Value::BigInt(i64::from(limit))];
        let state = match run_query(Arc::clone(&self.engine), LARGEST_QUERY.to_string(), params)
            .await
            .and_then(parse_areas)
        {
            Ok(areas) => PanelState::Ready(areas),
            Err(err) => {
                warn!(%err, limit, "largest-countries query failed");
                PanelState::Failed(err.to_string())
            }
        };
        self.slot.complete(ticket, state);
    }
}

fn parse_areas(rows: Vec<Row>) -> Result<Vec<CountryArea>, AppError> {
    rows.iter()
        .map(|row| {
            Ok(CountryArea {
                name: row.require("name")?.to_string(),
                area: row.require_f64("area")?,
            })
        })
        .collect()
}
