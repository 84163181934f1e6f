//! In-memory working set of addressable locations.
//!
//! The cache is the single owner of every [`PointFeature`]. Other components
//! refer to features by [`FeatureId`] so a `served` change made through the
//! cache is seen by the staging store and the map alike.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Stable location identifier; the join key for map feature-state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One addressable location.
#[derive(Clone, Debug, PartialEq)]
pub struct PointFeature {
    pub id: FeatureId,
    pub address: String,
    latitude: f64,
    longitude: f64,
    pub served: bool,
}

impl PointFeature {
    pub fn new(id: FeatureId, address: impl Into<String>, latitude: f64, longitude: f64, served: bool) -> Self {
        Self {
            id,
            address: address.into(),
            latitude,
            longitude,
            served,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Wire shape of one row from `GET /served-data`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServedRecord {
    #[serde(default)]
    pub address: String,
    pub location_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub served: bool,
}

impl From<ServedRecord> for PointFeature {
    fn from(record: ServedRecord) -> Self {
        PointFeature::new(
            FeatureId(record.location_id),
            record.address,
            record.latitude,
            record.longitude,
            record.served,
        )
    }
}

/// Owner of the loaded feature set, indexed by id.
#[derive(Debug, Default)]
pub struct FeatureCache {
    features: Vec<PointFeature>,
    index: HashMap<FeatureId, usize>,
    revision: u64,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working set with freshly fetched records.
    ///
    /// Rows with a non-finite coordinate or a repeated id are dropped; the
    /// first occurrence of an id wins. Returns the number of features kept.
    pub fn replace(&mut self, records: impl IntoIterator<Item = ServedRecord>) -> usize {
        self.features.clear();
        self.index.clear();
        let mut dropped = 0usize;
        for record in records {
            if !record.latitude.is_finite() || !record.longitude.is_finite() {
                dropped += 1;
                continue;
            }
            let feature = PointFeature::from(record);
            if self.index.contains_key(&feature.id) {
                dropped += 1;
                continue;
            }
            self.index.insert(feature.id, self.features.len());
            self.features.push(feature);
        }
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped invalid or duplicate served-data rows");
        }
        self.revision = self.revision.wrapping_add(1);
        self.features.len()
    }

    pub fn get(&self, id: FeatureId) -> Option<&PointFeature> {
        self.index.get(&id).map(|&idx| &self.features[idx])
    }

    /// Set `served` on one feature, returning the previous value.
    pub fn set_served(&mut self, id: FeatureId, served: bool) -> Option<bool> {
        let idx = *self.index.get(&id)?;
        let feature = &mut self.features[idx];
        Some(std::mem::replace(&mut feature.served, served))
    }

    pub fn features(&self) -> &[PointFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Counter bumped on every [`FeatureCache::replace`]; used to detect stale indexes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn served_count(&self) -> usize {
        self.features.iter().filter(|feature| feature.served).count()
    }

    /// Render the working set as a GeoJSON point collection for the map.
    pub fn to_feature_collection(&self) -> geojson::FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|feature| {
                let mut properties = serde_json::Map::new();
                properties.insert("location_id".into(), feature.id.0.into());
                properties.insert("address".into(), feature.address.clone().into());
                properties.insert("served".into(), feature.served.into());
                geojson::Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                        feature.longitude,
                        feature.latitude,
                    ]))),
                    id: Some(geojson::feature::Id::Number(feature.id.0.into())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();
        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, lat: f64, lon: f64, served: bool) -> ServedRecord {
        ServedRecord {
            address: format!("{id} Main St"),
            location_id: id,
            latitude: lat,
            longitude: lon,
            served,
        }
    }

    #[test]
    fn parses_served_data_rows() {
        let body = r#"[{"address":"1 Main St","location_id":7,"latitude":40.1,"longitude":-105.2,"served":true}]"#;
        let rows: Vec<ServedRecord> = serde_json::from_str(body).unwrap();
        let mut cache = FeatureCache::new();
        assert_eq!(cache.replace(rows), 1);
        let feature = cache.get(FeatureId(7)).unwrap();
        assert_eq!(feature.longitude(), -105.2);
        assert!(feature.served);
    }

    #[test]
    fn replace_drops_duplicates_and_bad_coordinates() {
        let mut cache = FeatureCache::new();
        let kept = cache.replace(vec![
            record(1, 1.0, 1.0, true),
            record(1, 2.0, 2.0, false),
            record(2, f64::NAN, 0.0, true),
            record(3, 3.0, 3.0, false),
        ]);
        assert_eq!(kept, 2);
        assert_eq!(cache.get(FeatureId(1)).unwrap().latitude(), 1.0);
        assert!(cache.get(FeatureId(2)).is_none());
        assert_eq!(cache.revision(), 1);
    }

    #[test]
    fn set_served_returns_previous_value() {
        let mut cache = FeatureCache::new();
        cache.replace(vec![record(1, 0.0, 0.0, true)]);
        assert_eq!(cache.set_served(FeatureId(1), false), Some(true));
        assert_eq!(cache.set_served(FeatureId(9), false), None);
        assert_eq!(cache.served_count(), 0);
    }

    #[test]
    fn feature_collection_carries_ids_and_served_flag() {
        let mut cache = FeatureCache::new();
        cache.replace(vec![record(42, 10.0, 20.0, false)]);
        let collection = cache.to_feature_collection();
        let feature = &collection.features[0];
        assert_eq!(
            feature.id,
            Some(geojson::feature::Id::Number(42u64.into()))
        );
        assert_eq!(
            feature.property("served").and_then(|value| value.as_bool()),
            Some(false)
        );
    }
}
