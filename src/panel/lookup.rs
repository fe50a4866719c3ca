//! Lookup panel: one country by exact name, as a GeoJSON feature.

use std::sync::Arc;

use duckdb::types::Value;
use geojson::{Feature, JsonObject};
use tracing::{instrument, warn};

use crate::engine::{Row, SqlEngine};
use crate::error::AppError;
use crate::gate::ReadyWatch;
use crate::panel::{run_query, PanelState, ResultSlot};

pub const LOOKUP_QUERY: &str =
    "SELECT name, ST_AsGeoJSON(geom) AS geom FROM countries WHERE name = ?;";

pub struct LookupPanel<E> {
    engine: Arc<E>,
    base: ReadyWatch,
    slot: ResultSlot<Feature>,
}

impl<E: SqlEngine> LookupPanel<E> {
    pub fn new(engine: Arc<E>, base: ReadyWatch) -> Self {
        Self {
            engine,
            base,
            slot: ResultSlot::new(),
        }
    }

    pub fn state(&self) -> PanelState<Feature> {
        self.slot.state()
    }

    /// Re-queries for the given country name. A name absent from the
    /// dataset produces the explicit no-result state, never a degenerate
    /// feature.
    #[instrument(skip(self))]
    pub async fn refresh(&self, country_name: &str) {
        self.base.ready().await;
        let ticket = self.slot.begin();
        let params = vec![Value::Text(country_name.to_string())];
        let state = match run_query(Arc::clone(&self.engine), LOOKUP_QUERY.to_string(), params)
            .await
            .and_then(parse_feature)
        {
            Ok(Some(feature)) => PanelState::Ready(feature),
            Ok(None) => PanelState::NoResult,
            Err(err) => {
                warn!(%err, country_name, "lookup query failed");
                PanelState::Failed(err.to_string())
            }
        };
        self.slot.complete(ticket, state);
    }
}

fn parse_feature(rows: Vec<Row>) -> Result<Option<Feature>, AppError> {
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    let name = row.require("name")?;
    let geometry = row.require_geometry("geom")?;

    let mut properties = JsonObject::new();
    properties.insert(
        "name".to_string(),
        serde_json::Value::String(name.to_string()),
    );
    Ok(Some(Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }))
}
