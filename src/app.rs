//! Application wiring: one shared engine, the base dataset loader, the
//! query panels, and one map view per geometry-bearing panel.
//!
//! Panels that read the countries table all watch the loader's gate, so a
//! failed base load leaves them loading instead of erroring one by one.
//! Map views are updated from the owning panel's state after each refresh;
//! a panel with nothing to show clears its layer without touching the
//! viewport.

use std::sync::{Arc, Mutex, MutexGuard};

use geojson::FeatureCollection;
use tracing::{info, instrument};

use crate::config::AppConfig;
use crate::engine::{EnginePool, SqlEngine};
use crate::error::AppError;
use crate::loader::DatasetLoader;
use crate::map::MapView;
use crate::overpass::{OsmFetcher, OverpassClient};
use crate::panel::choropleth::ChoroplethPanel;
use crate::panel::count::CountPanel;
use crate::panel::largest::LargestPanel;
use crate::panel::lookup::LookupPanel;
use crate::panel::population::PopulationPanel;
use crate::panel::PanelState;

/// Row limit for the initial largest-countries query.
pub const DEFAULT_TOP_COUNTRIES: u32 = 5;

pub struct App<E: SqlEngine, F: OsmFetcher> {
    loader: DatasetLoader<E>,
    dataset_source: String,
    pub count: CountPanel<E>,
    pub largest: LargestPanel<E>,
    pub lookup: LookupPanel<E>,
    pub population: PopulationPanel<E>,
    pub choropleth: ChoroplethPanel<E, F>,
    lookup_map: Mutex<MapView>,
    population_map: Mutex<MapView>,
    choropleth_map: Mutex<MapView>,
}

impl App<EnginePool, OverpassClient> {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let engine = Arc::new(EnginePool::new(config)?);
        let fetcher = OverpassClient::new(config)?;
        Ok(Self::new(config, engine, fetcher))
    }
}

impl<E: SqlEngine, F: OsmFetcher> App<E, F> {
    pub fn new(config: &AppConfig, engine: Arc<E>, fetcher: F) -> Self {
        let loader = DatasetLoader::new(Arc::clone(&engine));
        let style = config.map_style_url.clone();
        Self {
            dataset_source: config.dataset_source(),
            count: CountPanel::new(Arc::clone(&engine), loader.watch()),
            largest: LargestPanel::new(Arc::clone(&engine), loader.watch()),
            lookup: LookupPanel::new(Arc::clone(&engine), loader.watch()),
            population: PopulationPanel::new(Arc::clone(&engine), loader.watch()),
            choropleth: ChoroplethPanel::new(engine, fetcher),
            lookup_map: Mutex::new(MapView::new("country-lookup", style.clone())),
            population_map: Mutex::new(MapView::new("population-threshold", style.clone())),
            choropleth_map: Mutex::new(MapView::new("shrine-density", style)),
            loader,
        }
    }

    /// Loads the base dataset and runs the queries that take no user input.
    /// A load failure is returned to the caller; the gated panels simply
    /// stay in their loading state.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), AppError> {
        self.loader.load(&self.dataset_source).await?;
        self.count.refresh().await;
        self.largest.refresh(DEFAULT_TOP_COUNTRIES).await;
        info!("initial queries complete");
        Ok(())
    }

    /// Looks up one country by name and mirrors the result onto its map.
    pub async fn lookup_country(&self, name: &str) {
        self.lookup.refresh(name).await;
        let data = match self.lookup.state() {
            PanelState::Ready(feature) => Some(FeatureCollection {
                bbox: None,
                features: vec![feature],
                foreign_members: None,
            }),
            _ => None,
        };
        self.lookup_map().set_data(data);
    }

    /// Re-filters the population panel and mirrors the matching countries
    /// onto its map.
    pub async fn filter_population(&self, min_population: i64) {
        self.population.refresh(min_population).await;
        let data = match self.population.state() {
            PanelState::Ready(collection) => Some(collection),
            _ => None,
        };
        self.population_map().set_data(data);
    }

    /// Runs the full choropleth pipeline and mirrors the per-region counts
    /// onto its map.
    pub async fn build_choropleth(&self) {
        self.choropleth.run().await;
        let data = match self.choropleth.state() {
            PanelState::Ready(collection) => Some(collection),
            _ => None,
        };
        self.choropleth_map().set_data(data);
    }

    pub fn lookup_map(&self) -> MutexGuard<'_, MapView> {
        lock(&self.lookup_map)
    }

    pub fn population_map(&self) -> MutexGuard<'_, MapView> {
        lock(&self.population_map)
    }

    pub fn choropleth_map(&self) -> MutexGuard<'_, MapView> {
        lock(&self.choropleth_map)
    }
}

fn lock(view: &Mutex<MapView>) -> MutexGuard<'_, MapView> {
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
