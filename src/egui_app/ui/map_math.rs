//! Web Mercator conversions between map coordinates and screen pixels.

use std::f64::consts::PI;

use eframe::egui::{Pos2, Rect, Vec2};

use crate::map::LngLat;

pub(crate) const TILE_SIZE: f64 = 256.0;
pub(crate) const MIN_ZOOM: f64 = 0.0;
pub(crate) const MAX_ZOOM: f64 = 22.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

pub(crate) fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// World pixel coordinates of `at` at `zoom`.
pub(crate) fn project(at: LngLat, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = at.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (at.lon + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

pub(crate) fn unproject(x: f64, y: f64, zoom: f64) -> LngLat {
    let size = world_size(zoom);
    let lon = x / size * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / size)).sinh().atan().to_degrees();
    LngLat::new(lon, lat)
}

pub(crate) fn to_screen(at: LngLat, rect: Rect, center: LngLat, zoom: f64) -> Pos2 {
    let (cx, cy) = project(center, zoom);
    let (x, y) = project(at, zoom);
    Pos2::new(
        rect.center().x + (x - cx) as f32,
        rect.center().y + (y - cy) as f32,
    )
}

pub(crate) fn to_lnglat(pos: Pos2, rect: Rect, center: LngLat, zoom: f64) -> LngLat {
    let (cx, cy) = project(center, zoom);
    unproject(
        cx + f64::from(pos.x - rect.center().x),
        cy + f64::from(pos.y - rect.center().y),
        zoom,
    )
}

/// Longitude degrees covered by one screen pixel.
pub(crate) fn degrees_per_pixel(zoom: f64) -> f64 {
    360.0 / world_size(zoom)
}

/// New center after dragging the map by `delta` pixels.
pub(crate) fn pan(center: LngLat, delta: Vec2, zoom: f64) -> LngLat {
    let (cx, cy) = project(center, zoom);
    clamp_center(unproject(cx - f64::from(delta.x), cy - f64::from(delta.y), zoom))
}

/// Center that keeps the point under `pointer` fixed while zooming.
pub(crate) fn zoom_about(pointer: Pos2, rect: Rect, center: LngLat, zoom: f64, new_zoom: f64) -> LngLat {
    let anchor = to_lnglat(pointer, rect, center, zoom);
    let (ax, ay) = project(anchor, new_zoom);
    clamp_center(unproject(
        ax - f64::from(pointer.x - rect.center().x),
        ay - f64::from(pointer.y - rect.center().y),
        new_zoom,
    ))
}

fn clamp_center(center: LngLat) -> LngLat {
    LngLat::new(center.lon.clamp(-180.0, 180.0), center.lat.clamp(-85.0, 85.0))
}
