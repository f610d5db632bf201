use eframe::egui::{self, Ui};

use crate::state::{ActiveView, AppState};
use crate::ui::{map, panels, plot, raster_view};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyEarthApp {
    pub state: AppState,
}

impl RustyEarthApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for RustyEarthApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: view controls ----
        egui::SidePanel::left("control_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: map, image or sample plot ----
        egui::CentralPanel::default().show(ctx, |ui| match &mut self.state.view {
            Some(ActiveView::Map(state)) => map::map_canvas(ui, state),
            Some(ActiveView::Image(state)) => raster_view::image_view(ui, state),
            Some(ActiveView::Dataset(state)) => plot::sample_plot(ui, state),
            None => {
                ui.centered_and_justified(|ui: &mut Ui| {
                    ui.heading("Open an image or a dataset  (File → Open…)");
                });
            }
        });
    }
}
