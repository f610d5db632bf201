use eframe::egui::{self, pos2, vec2, Align2, Color32, FontId, Rect, Sense, Stroke, Ui};

use crate::map::tiles::TILE_SIZE;
use crate::state::MapState;

// ---------------------------------------------------------------------------
// Map canvas (central panel)
// ---------------------------------------------------------------------------

/// Paint the tiles under the view; dragging pans.
pub fn map_canvas(ui: &mut Ui, map: &mut MapState) {
    map.poll_tiles();

    let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::drag());
    if response.dragged() {
        let delta = response.drag_delta();
        map.view.pan_pixels(-delta.x as f64, -delta.y as f64);
    }

    let rect = response.rect;
    painter.rect_filled(rect, 0.0, Color32::from_gray(24));

    let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
    let tile_size = egui::Vec2::splat(TILE_SIZE as f32);
    for tile in map.view.visible_tiles(rect.width() as f64, rect.height() as f64) {
        let min = rect.min + vec2(tile.offset.0 as f32, tile.offset.1 as f32);
        match map.texture(tile.coord) {
            Some(texture) => {
                painter.image(texture, Rect::from_min_size(min, tile_size), uv, Color32::WHITE);
            }
            None => map.request(tile.coord),
        }
    }

    // Crosshair on the centre coordinate.
    let center = rect.center();
    let stroke = Stroke::new(1.5, Color32::RED);
    painter.line_segment([center - vec2(8.0, 0.0), center + vec2(8.0, 0.0)], stroke);
    painter.line_segment([center - vec2(0.0, 8.0), center + vec2(0.0, 8.0)], stroke);

    let attribution = map.view.basemap.attribution().replace("&copy;", "©");
    if !attribution.is_empty() {
        painter.text(
            rect.right_bottom() - vec2(4.0, 4.0),
            Align2::RIGHT_BOTTOM,
            attribution,
            FontId::proportional(11.0),
            Color32::WHITE,
        );
    }
}
