use eframe::egui::{self, Pos2, Rect, Stroke};

use super::EguiApp;
use super::map_math;
use super::map_render;
use super::style;
use crate::features::FeatureId;
use crate::map::LngLat;

const MAP_ZOOM_SPEED: f64 = 0.002;
/// Pointer distance, in pixels, that still counts as touching a marker.
const HIT_RADIUS_PX: f32 = 6.0;

impl EguiApp {
    pub(super) fn render_map_canvas(&mut self, ui: &mut egui::Ui) {
        let palette = style::palette();
        let available = ui.available_size();
        let (rect, response) = ui.allocate_exact_size(available, egui::Sense::click_and_drag());
        self.handle_map_zoom(ui, rect, &response);
        self.handle_map_drag(&response);
        self.handle_map_clicks(ui, rect, &response);

        let center = self.controller.ui.map.center;
        let zoom = self.controller.ui.map.zoom;
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, palette.bg_primary);
        map_render::paint_graticule(&painter, rect, center, zoom);
        if let Some(engine) = self.controller.session().engine() {
            map_render::paint_layers(&painter, rect, center, zoom, engine);
        }
        self.paint_draw_overlay(&painter, rect, response.hover_pos());

        self.controller.ui.map.hovered = response
            .hover_pos()
            .and_then(|pointer| self.marker_near(pointer, rect));
        if let Some(id) = self.controller.ui.map.hovered
            && let Some(feature) = self.controller.cache().get(id)
        {
            let text = format!(
                "{}\n{}",
                feature.address,
                if feature.served { "Served" } else { "Unserved" }
            );
            response.clone().on_hover_text(text);
        }
        self.paint_map_footer(&painter, rect);
    }

    fn handle_map_zoom(&mut self, ui: &egui::Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta == 0.0 {
            return;
        }
        let map = &mut self.controller.ui.map;
        let new_zoom = (map.zoom + f64::from(scroll_delta) * MAP_ZOOM_SPEED)
            .clamp(map_math::MIN_ZOOM, map_math::MAX_ZOOM);
        let pointer = response.hover_pos().unwrap_or(rect.center());
        map.center = map_math::zoom_about(pointer, rect, map.center, map.zoom, new_zoom);
        map.zoom = new_zoom;
        map.mark_viewport_changed();
    }

    fn handle_map_drag(&mut self, response: &egui::Response) {
        let map = &mut self.controller.ui.map;
        if response.dragged_by(egui::PointerButton::Primary)
            && let Some(pos) = response.interact_pointer_pos()
        {
            let last = map.last_drag_pos.unwrap_or(pos);
            map.center = map_math::pan(map.center, pos - last, map.zoom);
            map.last_drag_pos = Some(pos);
            if pos != last {
                map.mark_viewport_changed();
            }
        } else {
            map.last_drag_pos = None;
        }
    }

    fn handle_map_clicks(&mut self, ui: &egui::Ui, rect: Rect, response: &egui::Response) {
        let center = self.controller.ui.map.center;
        let zoom = self.controller.ui.map.zoom;
        if self.controller.ui.map.draw.active {
            let (enter, escape) =
                ui.input(|i| (i.key_pressed(egui::Key::Enter), i.key_pressed(egui::Key::Escape)));
            if escape {
                self.controller.cancel_drawing();
            } else if enter || response.double_clicked() {
                // The first click of the double-click already placed the last vertex.
                self.controller.finish_drawing();
            } else if response.clicked()
                && let Some(pos) = response.interact_pointer_pos()
            {
                self.controller
                    .add_draw_vertex(map_math::to_lnglat(pos, rect, center, zoom));
            }
            return;
        }
        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            let tolerance = map_math::degrees_per_pixel(zoom) * f64::from(HIT_RADIUS_PX);
            self.controller
                .map_clicked(map_math::to_lnglat(pos, rect, center, zoom), tolerance);
        }
    }

    fn marker_near(&self, pointer: Pos2, rect: Rect) -> Option<FeatureId> {
        let center = self.controller.ui.map.center;
        let zoom = self.controller.ui.map.zoom;
        let mut best: Option<(FeatureId, f32)> = None;
        for feature in self.controller.cache().features() {
            let pos = map_math::to_screen(
                LngLat::new(feature.longitude(), feature.latitude()),
                rect,
                center,
                zoom,
            );
            let dist_sq = pos.distance_sq(pointer);
            if dist_sq > HIT_RADIUS_PX * HIT_RADIUS_PX {
                continue;
            }
            if best.is_none_or(|(_, current)| dist_sq < current) {
                best = Some((feature.id, dist_sq));
            }
        }
        best.map(|(id, _)| id)
    }

    fn paint_draw_overlay(&self, painter: &egui::Painter, rect: Rect, pointer: Option<Pos2>) {
        let draw = &self.controller.ui.map.draw;
        if !draw.active {
            return;
        }
        let palette = style::palette();
        let center = self.controller.ui.map.center;
        let zoom = self.controller.ui.map.zoom;
        let mut points: Vec<Pos2> = draw
            .vertices
            .iter()
            .map(|(lon, lat)| map_math::to_screen(LngLat::new(*lon, *lat), rect, center, zoom))
            .collect();
        for point in &points {
            painter.circle_filled(*point, 3.0, palette.accent_mint);
        }
        if let Some(pointer) = pointer {
            points.push(pointer);
        }
        let stroke = Stroke::new(1.5, palette.accent_mint);
        painter.add(egui::Shape::line(points.clone(), stroke));
        if draw.can_finish()
            && let (Some(first), Some(last)) = (points.first(), points.last())
        {
            painter.add(egui::Shape::dashed_line(&[*last, *first], stroke, 4.0, 4.0));
        }
    }

    fn paint_map_footer(&self, painter: &egui::Painter, rect: Rect) {
        let palette = style::palette();
        let map = &self.controller.ui.map;
        let mut text = format!(
            "{:.4}, {:.4}  z{:.1}",
            map.center.lat, map.center.lon, map.zoom
        );
        if map.draw.active {
            text.push_str(&format!(
                "  |  {} points, click to add, double-click or Enter to finish, Esc to cancel",
                map.draw.vertices.len()
            ));
        }
        painter.text(
            rect.left_bottom() + egui::vec2(8.0, -6.0),
            egui::Align2::LEFT_BOTTOM,
            text,
            egui::FontId::monospace(11.0),
            palette.text_muted,
        );
    }
}
