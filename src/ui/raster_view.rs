use eframe::egui::{self, Ui};

use crate::state::ImageState;

/// Show the RGB conversion scaled to fit the panel, keeping its aspect ratio.
pub fn image_view(ui: &mut Ui, image: &mut ImageState) {
    let ctx = ui.ctx().clone();
    let (id, size) = {
        let texture = image.texture(&ctx);
        (texture.id(), texture.size_vec2())
    };
    let available = ui.available_size();
    let scale = (available.x / size.x).min(available.y / size.y);
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.add(egui::Image::new((id, size * scale)));
    });
}
