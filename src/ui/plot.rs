use std::ops::RangeInclusive;

use eframe::egui::{self, Color32, Ui};
use egui_plot::{Bar, BarChart, GridMark, Legend, Line, Plot, PlotPoints, Points};

use crate::state::DatasetState;

// ---------------------------------------------------------------------------
// Sample plot (central panel)
// ---------------------------------------------------------------------------

/// RGB preview, per-band means and label presence of the current sample.
pub fn sample_plot(ui: &mut Ui, ds: &mut DatasetState) {
    let ctx = ui.ctx().clone();
    let texture = ds.texture(&ctx).id();
    let half_height = (ui.available_height() / 2.0).max(160.0);

    ui.horizontal(|ui: &mut Ui| {
        let side = half_height.min(ui.available_width() / 3.0);
        ui.add(egui::Image::new((texture, egui::vec2(side, side))));
        band_means_plot(ui, ds, half_height);
    });
    ui.separator();
    label_bars(ui, ds);
}

fn band_means_plot(ui: &mut Ui, ds: &DatasetState, height: f32) {
    let sample = &ds.inspection.sample;
    let names = sample.bands.clone();
    let means: Vec<[f64; 2]> = sample
        .band_means()
        .into_iter()
        .enumerate()
        .map(|(i, mean)| [i as f64, mean])
        .collect();

    Plot::new("band_means")
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Band")
        .y_axis_label("Mean")
        .x_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
            band_tick(&names, mark.value)
        })
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from(means.clone()))
                    .name(&sample.patch)
                    .color(Color32::LIGHT_BLUE)
                    .width(1.5),
            );
            plot_ui.points(
                Points::new(PlotPoints::from(means))
                    .radius(3.0)
                    .color(Color32::LIGHT_BLUE),
            );
        });
}

fn label_bars(ui: &mut Ui, ds: &DatasetState) {
    let class_set = ds.inspection.options.class_set;
    let bars: Vec<Bar> = ds
        .inspection
        .sample
        .label
        .iter()
        .enumerate()
        .map(|(i, &present)| {
            Bar::new(i as f64, present as f64)
                .name(class_set.name(i).unwrap_or_default())
                .fill(ds.colors.color_for(i))
                .width(0.8)
        })
        .collect();

    Plot::new("labels")
        .legend(Legend::default())
        .x_axis_label("Class")
        .y_axis_label("Present")
        .include_y(1.0)
        .allow_scroll(false)
        .allow_drag(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name(format!("{class_set} classes")));
        });
}

/// Band name for integer ticks, nothing in between.
fn band_tick(names: &[&str], value: f64) -> String {
    let index = value.round();
    if (value - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    names
        .get(index as usize)
        .map(|name| name.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, "B01")]
    #[case(2.0, "B03")]
    #[case(0.5, "")]
    #[case(-1.0, "")]
    #[case(3.0, "")]
    fn ticks_name_bands(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(band_tick(&["B01", "B02", "B03"], value), expected);
    }
}
