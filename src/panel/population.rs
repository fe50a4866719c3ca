//! Threshold panel: countries with population strictly above a slider value.

use std::sync::Arc;

use duckdb::types::Value;
use geojson::{Feature, FeatureCollection, JsonObject};
use tracing::{instrument, warn};

use crate::engine::{Row, SqlEngine};
use crate::error::AppError;
use crate::gate::ReadyWatch;
use crate::panel::{run_query, PanelState, ResultSlot};

pub const POPULATION_QUERY: &str =
    "SELECT name, POP_EST AS population, ST_AsGeoJSON(geom) AS geom \
     FROM countries WHERE POP_EST > ?;";

pub struct PopulationPanel<E> {
    engine: Arc<E>,
    base: ReadyWatch,
    slot: ResultSlot<FeatureCollection>,
}

impl<E: SqlEngine> PopulationPanel<E> {
    pub fn new(engine: Arc<E>, base: ReadyWatch) -> Self {
        Self {
            engine,
            base,
            slot: ResultSlot::new(),
        }
    }

    pub fn state(&self) -> PanelState<FeatureCollection> {
        self.slot.state()
    }

    /// Re-queries with a new threshold. An empty result set is the explicit
    /// no-result state, distinct from loading.
    #[instrument(skip(self))]
    pub async fn refresh(&self, min_population: i64) {
        self.base.ready().await;
        let ticket = self.slot.begin();
        let params = vec![Value::BigInt(min_population)];
        let state = match run_query(
            Arc::clone(&self.engine),
            POPULATION_QUERY.to_string(),
            params,
        )
        .await
        .and_then(parse_features)
        {
            Ok(collection) if collection.features.is_empty() => PanelState::NoResult,
            Ok(collection) => PanelState::Ready(collection),
            Err(err) => {
                warn!(%err, min_population, "population query failed");
                PanelState::Failed(err.to_string())
            }
        };
        self.slot.complete(ticket, state);
    }
}

fn parse_features(rows: Vec<Row>) -> Result<FeatureCollection, AppError> {
    let features = rows
        .iter()
        .map(|row| {
            let name = row.require("name")?;
            let population = row.require_f64("population")?;
            let geometry = row.require_geometry("geom")?;

            let mut properties = JsonObject::new();
            properties.insert(
                "name".to_string(),
                serde_json::Value::String(name.to_string()),
            );
            properties.insert(
                "population".to_string(),
                serde_json::Number::from_f64(population)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| {
                        AppError::Decode(format!("population is not finite: {population}"))
                    })?,
            );
            Ok(Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
