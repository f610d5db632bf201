use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::map::export::write_leaflet_html;
use crate::map::Basemap;
use crate::state::{ActiveView, AppState, DatasetState, ImageState, MapState};

// ---------------------------------------------------------------------------
// Left side panel – per-view controls
// ---------------------------------------------------------------------------

/// Render the left panel for whatever is open.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    let result = match &mut state.view {
        None => {
            ui.label("Nothing opened.");
            Ok(())
        }
        Some(ActiveView::Map(map)) => map_panel(ui, map),
        Some(ActiveView::Image(image)) => image_panel(ui, image),
        Some(ActiveView::Dataset(ds)) => dataset_panel(ui, ds),
    };
    if let Err(e) = result {
        state.report(e);
    }
}

fn map_panel(ui: &mut Ui, map: &mut MapState) -> anyhow::Result<()> {
    ui.heading("Map");
    ui.separator();

    egui::Grid::new("map_info").num_columns(2).show(ui, |ui: &mut Ui| {
        ui.label("Centre");
        ui.label(map.view.center.to_string());
        ui.end_row();
        ui.label("Zoom");
        ui.label(map.view.zoom.to_string());
        ui.end_row();
        ui.label("Tiles");
        ui.label(format!("{} loaded, {} failed", map.loaded(), map.failed));
        ui.end_row();
    });

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("−").clicked() {
            map.zoom_out();
        }
        if ui.button("+").clicked() {
            map.zoom_in();
        }
    });
    ui.separator();

    ui.strong("Basemap");
    let mut chosen = None;
    egui::ComboBox::from_id_salt("basemap")
        .selected_text(map.view.basemap.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for basemap in Basemap::STANDARD {
                let selected = map.view.basemap == basemap;
                if ui.selectable_label(selected, basemap.to_string()).clicked() {
                    chosen = Some(basemap);
                }
            }
        });
    if let Some(basemap) = chosen {
        map.set_basemap(basemap)?;
    }
    ui.separator();

    if ui.button("Save HTML…").clicked() {
        let file = rfd::FileDialog::new()
            .set_title("Save map page")
            .set_file_name("my_map.html")
            .add_filter("HTML", &["html"])
            .save_file();
        if let Some(path) = file {
            write_leaflet_html(&map.view, &path)?;
        }
    }
    Ok(())
}

fn image_panel(ui: &mut Ui, image: &mut ImageState) -> anyhow::Result<()> {
    ui.heading("Image");
    ui.label(crate::raster::describe(&image.inspection.rgb));
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, true])
        .max_height(ui.available_height() - 80.0)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("raster_summary")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui: &mut Ui| {
                    for (key, value) in image.inspection.raster.summary() {
                        ui.label(key);
                        ui.label(value);
                        ui.end_row();
                    }
                });
        });
    ui.separator();

    ui.add(egui::Slider::new(&mut image.jpeg_quality, 1..=100).text("JPEG quality"));
    if ui.button("Save JPEG…").clicked() {
        let file = rfd::FileDialog::new()
            .set_title("Save RGB image")
            .set_file_name("satellite.jpg")
            .add_filter("JPEG", &["jpg", "jpeg"])
            .save_file();
        if let Some(path) = file {
            image.save_jpeg(&path)?;
        }
    }
    Ok(())
}

fn dataset_panel(ui: &mut Ui, ds: &mut DatasetState) -> anyhow::Result<()> {
    let inspection = &ds.inspection;
    ui.heading(&inspection.name);
    ui.label(format!(
        "split {}, bands {}, {} classes",
        inspection.options.split, inspection.options.bands, inspection.options.class_set
    ));
    ui.label(format!("{} samples", inspection.len));
    ui.label(format!(
        "{} batches of {}",
        inspection.num_batches, inspection.batch_size
    ));
    if let Some(batch) = &inspection.first_batch {
        ui.label(format!(
            "first batch: image {:?}, label {:?}",
            batch.image_shape, batch.label_shape
        ));
    }
    ui.separator();

    let current = inspection.index;
    let last = inspection.len.saturating_sub(1);
    let mut target = current;
    ui.horizontal(|ui: &mut Ui| {
        if ui.add_enabled(current > 0, egui::Button::new("◀")).clicked() {
            target = current - 1;
        }
        ui.add(egui::DragValue::new(&mut target).range(0..=last));
        if ui.add_enabled(current < last, egui::Button::new("▶")).clicked() {
            target = current + 1;
        }
    });

    let inspection = &ds.inspection;
    ui.strong(&inspection.sample.patch);
    ui.label(format!(
        "image {:?}, label {:?}",
        inspection.sample.image.shape(),
        inspection.sample.label.shape()
    ));
    ui.separator();

    ui.strong("Labels");
    let class_set = inspection.options.class_set;
    for name in &inspection.label_names {
        let color = class_set
            .names()
            .iter()
            .position(|n| n == name)
            .map_or(Color32::GRAY, |i| ds.colors.color_for(i));
        ui.label(RichText::new(*name).color(color));
    }

    if target != current {
        ds.go_to(target)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open image…").clicked() {
                open_image_dialog(state);
                ui.close_menu();
            }
            if ui.button("Open dataset…").clicked() {
                open_dataset_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        match &state.view {
            Some(ActiveView::Map(map)) => {
                ui.label(format!("{} @ zoom {}", map.view.center, map.view.zoom));
            }
            Some(ActiveView::Image(image)) => {
                ui.label(image.inspection.raster.path.display().to_string());
            }
            Some(ActiveView::Dataset(ds)) => {
                ui.label(format!(
                    "sample {} / {}",
                    ds.inspection.index + 1,
                    ds.inspection.len
                ));
            }
            None => {}
        }

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_image_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open raster")
        .add_filter("GeoTIFF", &["tif", "tiff"])
        .pick_file();

    if let Some(path) = file {
        state.open_image(&path);
    }
}

pub fn open_dataset_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open BigEarthNet root")
        .pick_folder();

    if let Some(root) = folder {
        state.open_dataset(&root);
    }
}
