//! Map display state.
//!
//! A [`MapView`] is one map instance: it holds the feature collection to
//! render and the viewport command for the external renderer. When new
//! non-empty data arrives the viewport refits to the data's bounding box;
//! absent data clears the layer but leaves the viewport untouched.
//! Instances are independent; commands never leak across views.

use geo::BoundingRect;
use geojson::FeatureCollection;
use tracing::debug;

pub const FIT_PADDING: u32 = 10;
pub const FIT_DURATION_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Instruction to the renderer to animate the viewport to fit `bounds`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: Bounds,
    pub padding: u32,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct MapView {
    id: String,
    style_url: String,
    data: Option<FeatureCollection>,
    viewport: Option<Viewport>,
}

impl MapView {
    pub fn new(id: impl Into<String>, style_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            style_url: style_url.into(),
            data: None,
            viewport: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn style_url(&self) -> &str {
        &self.style_url
    }

    pub fn data(&self) -> Option<&FeatureCollection> {
        self.data.as_ref()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Replaces the rendered layer. Non-empty data refits the viewport to
    /// its bounding box; `None` renders nothing and keeps the viewport.
    pub fn set_data(&mut self, data: Option<FeatureCollection>) {
        if let Some(collection) = &data {
            if let Some(bounds) = feature_bounds(collection) {
                debug!(id = %self.id, ?bounds, "fitting viewport to layer data");
                self.viewport = Some(Viewport {
                    bounds,
                    padding: FIT_PADDING,
                    duration_ms: FIT_DURATION_MS,
                });
            }
        }
        self.data = data;
    }
}

/// Bounding box over every feature in the collection. Features whose
/// geometry cannot be interpreted are skipped; `None` when nothing
/// contributes a box.
pub fn feature_bounds(collection: &FeatureCollection) -> Option<Bounds> {
    let mut acc: Option<Bounds> = None;
    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let Ok(geom) = geo::Geometry::<f64>::try_from(geometry) else {
            continue;
        };
        let Some(rect) = geom.bounding_rect() else {
            continue;
        };
        let bounds = Bounds {
            min_lon: rect.min().x,
            min_lat: rect.min().y,
            max_lon: rect.max().x,
            max_lat: rect.max().y,
        };
        acc = Some(match acc {
            None => bounds,
            Some(current) => Bounds {
                min_lon: current.min_lon.min(bounds.min_lon),
                min_lat: current.min_lat.min(bounds.min_lat),
                max_lon: current.max_lon.max(bounds.max_lon),
                max_lat: current.max_lat.max(bounds.max_lat),
            },
        });
    }
    acc
}
