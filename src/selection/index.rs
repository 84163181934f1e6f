use geo::BoundingRect;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use super::{SelectionPolygon, polygon_covers};
use crate::features::{FeatureCache, FeatureId};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over the cache's feature coordinates.
///
/// Query results match [`super::select_contained_ids`] exactly, including
/// order; the index only prunes candidates by bounding box first.
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
    revision: u64,
}

impl SpatialIndex {
    pub fn build(cache: &FeatureCache) -> Self {
        let points = cache
            .features()
            .iter()
            .enumerate()
            .map(|(idx, feature)| GeomWithData::new([feature.longitude(), feature.latitude()], idx))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
            revision: cache.revision(),
        }
    }

    /// Whether the index was built from the cache's current working set.
    pub fn is_current(&self, cache: &FeatureCache) -> bool {
        self.revision == cache.revision() && self.tree.size() == cache.len()
    }

    pub fn select(&self, polygon: &SelectionPolygon, cache: &FeatureCache) -> Vec<FeatureId> {
        if polygon.is_empty() {
            return Vec::new();
        }
        let Some(bounds) = polygon.as_geo().bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners(
            [bounds.min().x, bounds.min().y],
            [bounds.max().x, bounds.max().y],
        );
        let features = cache.features();
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|point| point.data)
            .filter(|&idx| {
                features.get(idx).is_some_and(|feature| {
                    polygon_covers(polygon, feature.longitude(), feature.latitude())
                })
            })
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|idx| features[idx].id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ServedRecord;
    use crate::selection::select_contained_ids;

    fn grid_cache() -> FeatureCache {
        let mut cache = FeatureCache::new();
        let records = (0..400u64).map(|i| ServedRecord {
            address: String::new(),
            location_id: 1000 - i,
            latitude: (i / 20) as f64 * 0.5,
            longitude: (i % 20) as f64 * 0.5,
            served: i % 3 == 0,
        });
        cache.replace(records);
        cache
    }

    #[test]
    fn index_matches_linear_scan() {
        let cache = grid_cache();
        let index = SpatialIndex::build(&cache);
        let polygons = [
            SelectionPolygon::from_ring(&[(1.0, 1.0), (4.0, 1.0), (4.0, 4.0), (1.0, 4.0)]),
            SelectionPolygon::from_ring(&[(0.2, 0.2), (9.0, 1.0), (3.3, 8.1)]),
            SelectionPolygon::from_ring(&[(-5.0, -5.0), (-1.0, -5.0), (-1.0, -1.0)]),
        ];
        for polygon in &polygons {
            assert_eq!(
                index.select(polygon, &cache),
                select_contained_ids(polygon, cache.features())
            );
        }
    }

    #[test]
    fn index_goes_stale_after_replace() {
        let mut cache = grid_cache();
        let index = SpatialIndex::build(&cache);
        assert!(index.is_current(&cache));
        cache.replace(Vec::new());
        assert!(!index.is_current(&cache));
    }
}
