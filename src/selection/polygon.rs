use geo::{Area, Coord, LineString, Polygon};
use geojson::GeoJson;

use super::SelectionError;

/// A drawn selection area in longitude/latitude degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionPolygon {
    polygon: Polygon<f64>,
}

impl SelectionPolygon {
    /// Build from an exterior ring of `(longitude, latitude)` vertices.
    ///
    /// The ring is closed automatically. Fewer than three distinct vertices
    /// or a zero-area ring yields an empty polygon that selects nothing.
    pub fn from_ring(vertices: &[(f64, f64)]) -> Self {
        let exterior = close_ring(vertices.iter().map(|&(x, y)| Coord { x, y }).collect());
        Self {
            polygon: Polygon::new(exterior, Vec::new()),
        }
    }

    /// Parse a GeoJSON `Polygon` geometry, a `Feature` carrying one, or the
    /// first feature of a `FeatureCollection`.
    pub fn from_geojson_str(text: &str) -> Result<Self, SelectionError> {
        let parsed: GeoJson = text
            .parse()
            .map_err(|err: geojson::Error| SelectionError::InvalidGeoJson(err.to_string()))?;
        let geometry = match parsed {
            GeoJson::Geometry(geometry) => Some(geometry),
            GeoJson::Feature(feature) => feature.geometry,
            GeoJson::FeatureCollection(collection) => collection
                .features
                .into_iter()
                .next()
                .and_then(|feature| feature.geometry),
        };
        let geometry = geometry.ok_or(SelectionError::MissingGeometry)?;
        Self::from_geojson_value(&geometry.value)
    }

    pub fn from_geojson_value(value: &geojson::Value) -> Result<Self, SelectionError> {
        let geojson::Value::Polygon(rings) = value else {
            return Err(SelectionError::NotAPolygon(value_kind(value).to_string()));
        };
        let mut rings = rings.iter().map(|ring| {
            ring.iter()
                .filter(|position| position.len() >= 2)
                .map(|position| Coord {
                    x: position[0],
                    y: position[1],
                })
                .collect::<Vec<_>>()
        });
        let exterior = rings.next().map(close_ring).unwrap_or_else(|| LineString::new(Vec::new()));
        let interiors = rings.map(close_ring).collect();
        Ok(Self {
            polygon: Polygon::new(exterior, interiors),
        })
    }

    /// True when the polygon cannot contain anything.
    pub fn is_empty(&self) -> bool {
        let distinct = distinct_vertex_count(self.polygon.exterior());
        distinct < 3 || self.polygon.unsigned_area() == 0.0
    }

    pub fn as_geo(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Exterior vertices without the closing repeat.
    pub fn exterior_vertices(&self) -> Vec<(f64, f64)> {
        let coords = &self.polygon.exterior().0;
        let open_len = coords.len().saturating_sub(1);
        coords[..open_len].iter().map(|coord| (coord.x, coord.y)).collect()
    }
}

fn value_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn close_ring(mut coords: Vec<Coord<f64>>) -> LineString<f64> {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    LineString::new(coords)
}

fn distinct_vertex_count(ring: &LineString<f64>) -> usize {
    let mut seen: Vec<Coord<f64>> = Vec::new();
    for coord in &ring.0 {
        if !seen.contains(coord) {
            seen.push(*coord);
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_closed_automatically() {
        let polygon = SelectionPolygon::from_ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let coords = &polygon.as_geo().exterior().0;
        assert_eq!(coords.first(), coords.last());
        assert_eq!(polygon.exterior_vertices().len(), 3);
        assert!(!polygon.is_empty());
    }

    #[test]
    fn degenerate_rings_are_empty() {
        assert!(SelectionPolygon::from_ring(&[]).is_empty());
        assert!(SelectionPolygon::from_ring(&[(0.0, 0.0), (1.0, 1.0)]).is_empty());
        assert!(SelectionPolygon::from_ring(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).is_empty());
    }

    #[test]
    fn parses_draw_feature_geojson() {
        let text = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]],[[1,1],[2,1],[2,2],[1,2],[1,1]]]
            }
        }"#;
        let polygon = SelectionPolygon::from_geojson_str(text).unwrap();
        assert_eq!(polygon.as_geo().interiors().len(), 1);
        assert!(!polygon.is_empty());
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let err = SelectionPolygon::from_geojson_str(r#"{"type":"Point","coordinates":[1,2]}"#)
            .unwrap_err();
        assert!(matches!(err, SelectionError::NotAPolygon(kind) if kind == "Point"));
    }
}
