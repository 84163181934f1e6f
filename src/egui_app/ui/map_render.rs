use eframe::egui::{self, Color32, Pos2, Rect, Shape, Stroke};

use super::map_math;
use super::style;
use crate::map::{CanvasEngine, LngLat, MapEngine, Paint, SourceData};

const GRATICULE_TARGET_PX: f64 = 120.0;
const GRATICULE_STEPS: [f64; 8] = [0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 45.0];

/// Draw a lon/lat grid in place of base-map tiles.
pub(super) fn paint_graticule(painter: &egui::Painter, rect: Rect, center: LngLat, zoom: f64) {
    let palette = style::palette();
    let target_deg = map_math::degrees_per_pixel(zoom) * GRATICULE_TARGET_PX;
    let step = GRATICULE_STEPS
        .iter()
        .copied()
        .find(|step| *step >= target_deg)
        .unwrap_or(90.0);
    let top_left = map_math::to_lnglat(rect.left_top(), rect, center, zoom);
    let bottom_right = map_math::to_lnglat(rect.right_bottom(), rect, center, zoom);
    let stroke = Stroke::new(1.0, palette.grid_soft);

    let mut lon = (top_left.lon / step).floor() * step;
    while lon <= bottom_right.lon.min(180.0) {
        let x = map_math::to_screen(LngLat::new(lon, center.lat), rect, center, zoom).x;
        let strong = (lon / 10.0).fract() == 0.0;
        let color = if strong { palette.grid_strong } else { stroke.color };
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], (1.0, color));
        lon += step;
    }
    let mut lat = (bottom_right.lat / step).floor() * step;
    while lat <= top_left.lat.min(85.0) {
        let y = map_math::to_screen(LngLat::new(center.lon, lat), rect, center, zoom).y;
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        lat += step;
    }
}

/// Paint every visible GeoJSON layer in engine order.
pub(super) fn paint_layers(
    painter: &egui::Painter,
    rect: Rect,
    center: LngLat,
    zoom: f64,
    engine: &CanvasEngine,
) -> usize {
    let mut drawn = 0usize;
    for layer in engine.layers().iter().filter(|layer| layer.visible) {
        let Some(SourceData::GeoJson(collection)) = engine.source(&layer.source) else {
            continue;
        };
        match &layer.paint {
            Paint::Choropleth {
                property,
                stops,
                opacity,
            } => {
                for feature in &collection.features {
                    let Some(geometry) = feature.geometry.as_ref() else {
                        continue;
                    };
                    let value = feature
                        .property(property)
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(0.0);
                    let fill = style::with_opacity(style::parse_hex_color(step_color(stops, value)), *opacity);
                    drawn += paint_polygons(painter, rect, center, zoom, &geometry.value, fill);
                }
            }
            Paint::Markers {
                radius,
                served_color,
                unserved_color,
                pending_color,
            } => {
                let served_fill = style::parse_hex_color(served_color);
                let unserved_fill = style::parse_hex_color(unserved_color);
                let pending_ring = Stroke::new(2.0, style::parse_hex_color(pending_color));
                for feature in &collection.features {
                    let Some(geojson::Value::Point(position)) =
                        feature.geometry.as_ref().map(|geometry| &geometry.value)
                    else {
                        continue;
                    };
                    if position.len() < 2 {
                        continue;
                    }
                    let pos = map_math::to_screen(LngLat::new(position[0], position[1]), rect, center, zoom);
                    if !rect.expand(*radius).contains(pos) {
                        continue;
                    }
                    let state = crate::map::feature_id(feature)
                        .and_then(|id| engine.feature_state(&layer.source, id))
                        .unwrap_or_default();
                    let served = state.served.unwrap_or_else(|| {
                        feature
                            .property("served")
                            .and_then(serde_json::Value::as_bool)
                            .unwrap_or(false)
                    });
                    let fill = if served { served_fill } else { unserved_fill };
                    painter.circle_filled(pos, *radius, fill);
                    if state.pending {
                        painter.circle_stroke(pos, *radius + 2.0, pending_ring);
                    }
                    drawn += 1;
                }
            }
        }
    }
    drawn
}

fn step_color(stops: &[(f64, String)], value: f64) -> &str {
    stops
        .iter()
        .rev()
        .find(|(breakpoint, _)| value >= *breakpoint)
        .or(stops.first())
        .map(|(_, color)| color.as_str())
        .unwrap_or("#808080")
}

fn paint_polygons(
    painter: &egui::Painter,
    rect: Rect,
    center: LngLat,
    zoom: f64,
    value: &geojson::Value,
    fill: Color32,
) -> usize {
    match value {
        geojson::Value::Polygon(rings) => paint_ring(painter, rect, center, zoom, rings, fill),
        geojson::Value::MultiPolygon(parts) => parts
            .iter()
            .map(|rings| paint_ring(painter, rect, center, zoom, rings, fill))
            .sum(),
        _ => 0,
    }
}

/// Fill the exterior ring only; hex cells carry no holes.
fn paint_ring(
    painter: &egui::Painter,
    rect: Rect,
    center: LngLat,
    zoom: f64,
    rings: &[Vec<geojson::Position>],
    fill: Color32,
) -> usize {
    let Some(exterior) = rings.first() else {
        return 0;
    };
    let points: Vec<Pos2> = exterior
        .iter()
        .filter(|position| position.len() >= 2)
        .map(|position| map_math::to_screen(LngLat::new(position[0], position[1]), rect, center, zoom))
        .collect();
    if points.len() < 3 {
        return 0;
    }
    let bounds = Rect::from_points(&points);
    if !bounds.intersects(rect) {
        return 0;
    }
    painter.add(Shape::convex_polygon(points, fill, Stroke::new(0.5, style::with_opacity(fill, 1.0))));
    1
}
