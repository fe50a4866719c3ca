//! Choropleth aggregator: two-stage external ingestion plus spatial join.
//!
//! Two Overpass loads run concurrently — administrative regions and point
//! features — each into its own table over its own connection. The join
//! query that counts contained points per region is fixed up front but its
//! issuance is gated behind both completion gates; it emits each region's
//! geometry as serialized JSON together with the count, which parse into a
//! feature collection with a numeric `count` property per region.

use std::sync::{Arc, Mutex};

use duckdb::types::Value;
use geojson::{Feature, FeatureCollection, JsonObject};
use tracing::{error, info, instrument, warn};

use crate::engine::{Row, SqlConnection, SqlEngine};
use crate::error::AppError;
use crate::gate::{all_open, ReadyGate, ReadyWatch};
use crate::osm;
use crate::overpass::OsmFetcher;
use crate::panel::{run_query, PanelState, ResultSlot};

/// Overpass QL: Japanese prefecture boundaries (admin_level 4 relations).
pub const REGION_QUERY: &str = r#"[out:json];
area["ISO3166-1"="JP"][admin_level=2];
relation["boundary"="administrative"]["admin_level"="4"](area);
out geom;"#;

/// Overpass QL: wayside shrines across Japan.
pub const POINT_QUERY: &str = r#"[out:json];
area["ISO3166-1"="JP"][admin_level=2];
node["historic"="wayside_shrine"](area);
out;"#;

const REGION_TABLE: &str = "admin_regions";
const POINT_TABLE: &str = "poi_points";

/// Counts contained points per region; LEFT JOIN keeps zero-point regions
/// in the result with a count of 0.
pub const JOIN_QUERY: &str = "SELECT region.name AS name, COUNT(pt.name) AS count, \
     ST_AsGeoJSON(region.geom) AS geom \
     FROM admin_regions AS region \
     LEFT JOIN poi_points AS pt ON ST_Contains(region.geom, pt.geom) \
     GROUP BY region.name, region.geom;";

const PLACEHOLDER_NAME: &str = "NoName";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Joining,
    Rendered,
    Failed,
}

/// Outcome of one ingestion stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    /// Features with no usable name property.
    pub skipped_unnamed: usize,
    /// Features whose geometry the engine rejected; the batch continues.
    pub skipped_invalid: usize,
}

pub struct ChoroplethPanel<E, F> {
    engine: Arc<E>,
    fetcher: F,
    regions_loaded: ReadyGate,
    points_loaded: ReadyGate,
    phase: Mutex<Phase>,
    slot: ResultSlot<FeatureCollection>,
}

impl<E: SqlEngine, F: OsmFetcher> ChoroplethPanel<E, F> {
    pub fn new(engine: Arc<E>, fetcher: F) -> Self {
        Self {
            engine,
            fetcher,
            regions_loaded: ReadyGate::new(),
            points_loaded: ReadyGate::new(),
            phase: Mutex::new(Phase::Idle),
            slot: ResultSlot::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> PanelState<FeatureCollection> {
        self.slot.state()
    }

    pub fn regions_loaded(&self) -> ReadyWatch {
        self.regions_loaded.subscribe()
    }

    pub fn points_loaded(&self) -> ReadyWatch {
        self.points_loaded.subscribe()
    }

    /// Runs both ingestion stages concurrently, then the gated join.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        self.set_phase(Phase::Loading);
        let ticket = self.slot.begin();
        let state = match self.run_inner().await {
            Ok(collection) if collection.features.is_empty() => {
                self.set_phase(Phase::Rendered);
                PanelState::NoResult
            }
            Ok(collection) => {
                self.set_phase(Phase::Rendered);
                PanelState::Ready(collection)
            }
            Err(err) => {
                error!(%err, "choropleth pipeline failed");
                self.set_phase(Phase::Failed);
                PanelState::Failed(err.to_string())
            }
        };
        self.slot.complete(ticket, state);
    }

    async fn run_inner(&self) -> Result<FeatureCollection, AppError> {
        let regions = self.load_stage(REGION_QUERY, REGION_TABLE, &self.regions_loaded);
        let points = self.load_stage(POINT_QUERY, POINT_TABLE, &self.points_loaded);
        let (region_report, point_report) = tokio::try_join!(regions, points)?;
        info!(
            regions = region_report.inserted,
            points = point_report.inserted,
            "both ingestion stages complete"
        );
        self.join_when_ready().await
    }

    /// Fetches one Overpass dataset, converts it to GeoJSON, and inserts it
    /// feature by feature into `table` over a single connection. Opens the
    /// stage's gate on success.
    async fn load_stage(
        &self,
        ql: &str,
        table: &'static str,
        done: &ReadyGate,
    ) -> Result<IngestReport, AppError> {
        let payload = self.fetcher.fetch(ql).await?;
        let collection = osm::to_feature_collection(&payload)?;

        let engine = Arc::clone(&self.engine);
        let report = tokio::task::spawn_blocking(move || {
            ingest_features(engine.as_ref(), table, &collection)
        })
        .await
        .map_err(|err| AppError::Internal(format!("ingest task failed: {err}")))??;

        info!(table, ?report, "ingestion stage complete");
        done.open();
        Ok(report)
    }

    /// Issues the join query only once both ingestion gates are open.
    pub async fn join_when_ready(&self) -> Result<FeatureCollection, AppError> {
        all_open(&[
            self.regions_loaded.subscribe(),
            self.points_loaded.subscribe(),
        ])
        .await;
        self.set_phase(Phase::Joining);
        let rows = run_query(Arc::clone(&self.engine), JOIN_QUERY.to_string(), Vec::new()).await?;
        parse_regions(rows)
    }

    fn set_phase(&self, phase: Phase) {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
    }
}

/// Validated per-feature insert. Features without a usable name are
/// skipped; a present-but-empty name gets a placeholder so the geometry is
/// not lost; a geometry the engine rejects skips that feature only.
fn ingest_features<E: SqlEngine>(
    engine: &E,
    table: &str,
    collection: &FeatureCollection,
) -> Result<IngestReport, AppError> {
    let mut conn = engine.connect()?;
    conn.execute_batch(&format!("CREATE TABLE {table} (name TEXT, geom GEOMETRY);"))?;
    let insert = format!("INSERT INTO {table} VALUES (?, ST_GeomFromGeoJSON(?));");

    let mut report = IngestReport::default();
    for feature in &collection.features {
        let Some(name) = feature_name(feature) else {
            report.skipped_unnamed += 1;
            continue;
        };
        let name = if name.is_empty() {
            PLACEHOLDER_NAME
        } else {
            name
        };
        let Some(geometry) = feature.geometry.as_ref() else {
            report.skipped_invalid += 1;
            continue;
        };
        let geometry_json = serde_json::to_string(geometry)?;

        let params = [
            Value::Text(name.to_string()),
            Value::Text(geometry_json),
        ];
        match conn.execute(&insert, &params) {
            Ok(_) => report.inserted += 1,
            Err(err) => {
                warn!(%err, name, "skipping feature with rejected geometry");
                report.skipped_invalid += 1;
            }
        }
    }
    Ok(report)
}

fn feature_name(feature: &Feature) -> Option<&str> {
    feature.properties.as_ref()?.get("name")?.as_str()
}

fn parse_regions(rows: Vec<Row>) -> Result<FeatureCollection, AppError> {
    let features = rows
        .iter()
        .map(|row| {
            let name = row.require("name")?;
            let count = row.require_i64("count")?;
            let geometry = row.require_geometry("geom")?;

            let mut properties = JsonObject::new();
            properties.insert(
                "name".to_string(),
                serde_json::Value::String(name.to_string()),
            );
            properties.insert("count".to_string(), serde_json::Value::Number(count.into()));
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
