//! Spatial selection of point features inside a drawn polygon.
//!
//! Containment is boundary-inclusive: a point strictly inside the polygon or
//! lying on any of its edges is selected, a point inside a hole is not.
//! Results always keep the candidates' input order.

mod index;
mod polygon;

pub use index::SpatialIndex;
pub use polygon::SelectionPolygon;

use geo::{Intersects, Point};

use crate::features::{FeatureId, PointFeature};

/// Errors raised while turning draw output into a selection polygon.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
    #[error("GeoJSON carries no geometry")]
    MissingGeometry,
    #[error("Expected a Polygon geometry, got {0}")]
    NotAPolygon(String),
}

/// Containment rule shared by the linear scan and the index.
pub(crate) fn polygon_covers(polygon: &SelectionPolygon, longitude: f64, latitude: f64) -> bool {
    polygon
        .as_geo()
        .intersects(&Point::new(longitude, latitude))
}

/// Return the candidates that lie inside or on `polygon`.
pub fn select_contained<'a>(
    polygon: &SelectionPolygon,
    candidates: &'a [PointFeature],
) -> Vec<&'a PointFeature> {
    if polygon.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    candidates
        .iter()
        .filter(|feature| polygon_covers(polygon, feature.longitude(), feature.latitude()))
        .collect()
}

/// Ids of the candidates that lie inside or on `polygon`.
pub fn select_contained_ids(polygon: &SelectionPolygon, candidates: &[PointFeature]) -> Vec<FeatureId> {
    select_contained(polygon, candidates)
        .into_iter()
        .map(|feature| feature.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: u64, lon: f64, lat: f64) -> PointFeature {
        PointFeature::new(FeatureId(id), "", lat, lon, true)
    }

    fn unit_square() -> SelectionPolygon {
        SelectionPolygon::from_ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)])
    }

    #[test]
    fn selects_interior_points_in_input_order() {
        let candidates = vec![
            feature(3, 5.0, 5.0),
            feature(1, 20.0, 5.0),
            feature(2, 1.0, 9.0),
        ];
        let ids = select_contained_ids(&unit_square(), &candidates);
        assert_eq!(ids, vec![FeatureId(3), FeatureId(2)]);
    }

    #[test]
    fn boundary_points_are_selected() {
        let candidates = vec![
            feature(1, 0.0, 5.0),
            feature(2, 10.0, 10.0),
            feature(3, 5.0, 0.0),
            feature(4, 10.000_001, 5.0),
        ];
        let ids = select_contained_ids(&unit_square(), &candidates);
        assert_eq!(ids, vec![FeatureId(1), FeatureId(2), FeatureId(3)]);
    }

    #[test]
    fn points_inside_holes_are_excluded() {
        let polygon = SelectionPolygon::from_geojson_value(&geojson::Value::Polygon(vec![
            vec![
                vec![0.0, 0.0],
                vec![10.0, 0.0],
                vec![10.0, 10.0],
                vec![0.0, 10.0],
                vec![0.0, 0.0],
            ],
            vec![
                vec![4.0, 4.0],
                vec![6.0, 4.0],
                vec![6.0, 6.0],
                vec![4.0, 6.0],
                vec![4.0, 4.0],
            ],
        ]))
        .unwrap();
        let candidates = vec![feature(1, 5.0, 5.0), feature(2, 2.0, 2.0)];
        assert_eq!(select_contained_ids(&polygon, &candidates), vec![FeatureId(2)]);
    }

    #[test]
    fn concave_polygon_excludes_notch() {
        let polygon = SelectionPolygon::from_ring(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 5.0),
            (0.0, 10.0),
        ]);
        let candidates = vec![feature(1, 5.0, 8.0), feature(2, 5.0, 2.0)];
        assert_eq!(select_contained_ids(&polygon, &candidates), vec![FeatureId(2)]);
    }

    #[test]
    fn empty_inputs_yield_empty_result() {
        let candidates = vec![feature(1, 0.0, 0.0)];
        assert!(select_contained(&SelectionPolygon::from_ring(&[]), &candidates).is_empty());
        assert!(select_contained(&unit_square(), &[]).is_empty());
    }

    #[test]
    fn result_is_a_subset_of_candidates() {
        let candidates: Vec<PointFeature> = (0..50)
            .map(|i| feature(i, (i as f64) * 0.5 - 5.0, (i % 7) as f64 * 2.0))
            .collect();
        let selected = select_contained(&unit_square(), &candidates);
        for picked in &selected {
            assert!(candidates.iter().any(|candidate| candidate == *picked));
            assert!((0.0..=10.0).contains(&picked.longitude()));
            assert!((0.0..=10.0).contains(&picked.latitude()));
        }
    }
}
