//! Conversion of Overpass `out geom` OSM JSON into GeoJSON features.
//!
//! Covers the element shapes the app's queries produce: tagged nodes become
//! points, ways become linestrings (or polygons when closed), and boundary
//! relations have their member ways stitched into rings and emitted as
//! polygons. Unclosed rings are dropped with a warning.

use std::collections::HashMap;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
struct OsmResponse {
    #[serde(default)]
    elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OsmElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<LonLat>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<OsmMember>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct LonLat {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OsmMember {
    #[serde(rename = "type")]
    member_type: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<LonLat>,
}

/// Converts a raw Overpass JSON payload into a GeoJSON feature collection.
/// Elements without a usable geometry are dropped.
pub fn to_feature_collection(payload: &serde_json::Value) -> Result<FeatureCollection, AppError> {
    let response = OsmResponse::deserialize(payload)?;
    let features = response
        .elements
        .iter()
        .filter_map(convert_element)
        .collect();
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn convert_element(element: &OsmElement) -> Option<Feature> {
    match element {
        OsmElement::Node { id, lat, lon, tags } => Some(feature(
            format!("node/{id}"),
            geojson::Value::Point(vec![*lon, *lat]),
            tags,
        )),
        OsmElement::Way {
            id,
            geometry,
            tags,
        } => {
            if geometry.len() < 2 {
                return None;
            }
            let ring = positions(geometry);
            let value = if is_closed(&ring) && ring.len() >= 4 {
                geojson::Value::Polygon(vec![ring])
            } else {
                geojson::Value::LineString(ring)
            };
            Some(feature(format!("way/{id}"), value, tags))
        }
        OsmElement::Relation { id, members, tags } => {
            let value = relation_geometry(members)?;
            Some(feature(format!("relation/{id}"), value, tags))
        }
    }
}

fn feature(id: String, value: geojson::Value, tags: &HashMap<String, String>) -> Feature {
    let mut properties = JsonObject::new();
    for (key, val) in tags {
        properties.insert(key.clone(), serde_json::Value::String(val.clone()));
    }
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(geojson::feature::Id::String(id)),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn positions(geometry: &[LonLat]) -> Vec<Position> {
    geometry.iter().map(|p| vec![p.lon, p.lat]).collect()
}

fn is_closed(ring: &[Position]) -> bool {
    ring.first() == ring.last()
}

/// Builds a polygon (or multipolygon) from a boundary relation's way
/// members. Outer members are stitched into closed rings; each inner ring
/// is attached to the outer polygon whose bounding box contains its first
/// point.
fn relation_geometry(members: &[OsmMember]) -> Option<geojson::Value> {
    let segments_for = |wanted: &[&str]| -> Vec<Vec<Position>> {
        members
            .iter()
            .filter(|m| {
                m.member_type == "way" && wanted.contains(&m.role.as_str()) && m.geometry.len() >= 2
            })
            .map(|m| positions(&m.geometry))
            .collect()
    };

    // Untagged roles on boundary relations are treated as outer.
    let outer_rings = assemble_rings(segments_for(&["outer", ""]));
    if outer_rings.is_empty() {
        return None;
    }
    let inner_rings = assemble_rings(segments_for(&["inner"]));

    let mut polygons: Vec<Vec<Vec<Position>>> =
        outer_rings.into_iter().map(|ring| vec![ring]).collect();
    for ring in inner_rings {
        let Some(first) = ring.first().cloned() else {
            continue;
        };
        match polygons
            .iter_mut()
            .find(|polygon| bbox_contains(&polygon[0], &first))
        {
            Some(polygon) => polygon.push(ring),
            None => warn!("dropping inner ring outside every outer ring"),
        }
    }

    if polygons.len() == 1 {
        Some(geojson::Value::Polygon(polygons.remove(0)))
    } else {
        Some(geojson::Value::MultiPolygon(polygons))
    }
}

/// Stitches way segments into closed rings by matching endpoints,
/// reversing segments as needed. Segments that cannot be closed are
/// dropped.
fn assemble_rings(mut segments: Vec<Vec<Position>>) -> Vec<Vec<Position>> {
    let mut rings = Vec::new();
    while let Some(mut ring) = segments.pop() {
        loop {
            if ring.len() >= 4 && is_closed(&ring) {
                rings.push(ring);
                break;
            }
            let Some(tail) = ring.last().cloned() else {
                break;
            };
            let next = segments
                .iter()
                .position(|seg| seg.first() == Some(&tail) || seg.last() == Some(&tail));
            match next {
                Some(idx) => {
                    let mut seg = segments.remove(idx);
                    if seg.last() == Some(&tail) {
                        seg.reverse();
                    }
                    ring.extend(seg.into_iter().skip(1));
                }
                None => {
                    warn!(points = ring.len(), "dropping unclosed boundary ring");
                    break;
                }
            }
        }
    }
    rings
}

fn bbox_contains(ring: &[Position], point: &Position) -> bool {
    let (mut min_lon, mut min_lat) = (f64::INFINITY, f64::INFINITY);
    let (mut max_lon, mut max_lat) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for pos in ring {
        if pos.len() < 2 {
            continue;
        }
        min_lon = min_lon.min(pos[0]);
        max_lon = max_lon.max(pos[0]);
        min_lat = min_lat.min(pos[1]);
        max_lat = max_lat.max(pos[1]);
    }
    point.len() >= 2
        && point[0] >= min_lon
        && point[0] <= max_lon
        && point[1] >= min_lat
        && point[1] <= max_lat
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tagged_node_becomes_a_point_feature() {
        let payload = json!({
            "elements": [
                {"type": "node", "id": 42, "lat": 35.0, "lon": 139.0,
                 "tags": {"historic": "wayside_shrine", "name": "稲荷社"}}
            ]
        });
        let collection = to_feature_collection(&payload).unwrap();
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        assert_eq!(
            feature.geometry.as_ref().unwrap().value,
            geojson::Value::Point(vec![139.0, 35.0])
        );
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["name"], "稲荷社");
        assert_eq!(
            feature.id,
            Some(geojson::feature::Id::String("node/42".to_string()))
        );
    }

    #[test]
    fn node_without_tags_keeps_empty_properties() {
        let payload = json!({
            "elements": [{"type": "node", "id": 1, "lat": 0.0, "lon": 0.0}]
        });
        let collection = to_feature_collection(&payload).unwrap();
        assert!(collection.features[0]
            .properties
            .as_ref()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn closed_way_becomes_a_polygon_open_way_a_linestring() {
        let payload = json!({
            "elements": [
                {"type": "way", "id": 7, "tags": {},
                 "geometry": [
                     {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 1.0},
                     {"lat": 1.0, "lon": 1.0}, {"lat": 0.0, "lon": 0.0}
                 ]},
                {"type": "way", "id": 8, "tags": {},
                 "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 2.0, "lon": 2.0}]}
            ]
        });
        let collection = to_feature_collection(&payload).unwrap();
        assert!(matches!(
            collection.features[0].geometry.as_ref().unwrap().value,
            geojson::Value::Polygon(_)
        ));
        assert!(matches!(
            collection.features[1].geometry.as_ref().unwrap().value,
            geojson::Value::LineString(_)
        ));
    }

    #[test]
    fn relation_members_are_stitched_into_a_closed_ring() {
        // Two open way segments that only close when joined, the second
        // oriented backwards.
        let payload = json!({
            "elements": [
                {"type": "relation", "id": 5, "tags": {"name": "Testshire"},
                 "members": [
                     {"type": "way", "role": "outer", "geometry": [
                         {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 2.0}, {"lat": 2.0, "lon": 2.0}
                     ]},
                     {"type": "way", "role": "outer", "geometry": [
                         {"lat": 0.0, "lon": 0.0}, {"lat": 2.0, "lon": 0.0}, {"lat": 2.0, "lon": 2.0}
                     ]}
                 ]}
            ]
        });
        let collection = to_feature_collection(&payload).unwrap();
        assert_eq!(collection.features.len(), 1);

        let geometry = collection.features[0].geometry.as_ref().unwrap();
        let geojson::Value::Polygon(rings) = &geometry.value else {
            panic!("expected polygon, got {:?}", geometry.value);
        };
        assert_eq!(rings.len(), 1);
        assert!(is_closed(&rings[0]));
        assert_eq!(rings[0].len(), 5);
    }

    #[test]
    fn relation_with_unclosable_members_is_dropped() {
        let payload = json!({
            "elements": [
                {"type": "relation", "id": 6, "tags": {},
                 "members": [
                     {"type": "way", "role": "outer", "geometry": [
                         {"lat": 0.0, "lon": 0.0}, {"lat": 1.0, "lon": 1.0}
                     ]}
                 ]}
            ]
        });
        let collection = to_feature_collection(&payload).unwrap();
        assert!(collection.features.is_empty());
    }

    #[test]
    fn inner_rings_attach_to_their_containing_outer() {
        let outer = json!([
            {"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 10.0},
            {"lat": 10.0, "lon": 10.0}, {"lat": 10.0, "lon": 0.0},
            {"lat": 0.0, "lon": 0.0}
        ]);
        let inner = json!([
            {"lat": 4.0, "lon": 4.0}, {"lat": 4.0, "lon": 6.0},
            {"lat": 6.0, "lon": 6.0}, {"lat": 4.0, "lon": 4.0}
        ]);
        let payload = json!({
            "elements": [
                {"type": "relation", "id": 9, "tags": {},
                 "members": [
                     {"type": "way", "role": "outer", "geometry": outer},
                     {"type": "way", "role": "inner", "geometry": inner}
                 ]}
            ]
        });
        let collection = to_feature_collection(&payload).unwrap();
        let geometry = collection.features[0].geometry.as_ref().unwrap();
        let geojson::Value::Polygon(rings) = &geometry.value else {
            panic!("expected polygon");
        };
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn empty_payload_yields_an_empty_collection() {
        let collection = to_feature_collection(&json!({"elements": []})).unwrap();
        assert!(collection.features.is_empty());
    }
}
