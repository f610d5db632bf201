use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::ClassSet;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Class colours: land-cover class index → Color32
// ---------------------------------------------------------------------------

/// One distinct colour per class of a [`ClassSet`].
#[derive(Debug, Clone)]
pub struct ClassColors {
    colors: Vec<Color32>,
    default_color: Color32,
}

impl ClassColors {
    pub fn new(class_set: ClassSet) -> Self {
        Self {
            colors: generate_palette(class_set.num_classes()),
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, class: usize) -> Color32 {
        self.colors.get(class).copied().unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let palette = generate_palette(19);
        assert_eq!(palette.len(), 19);
        for (i, a) in palette.iter().enumerate() {
            for b in &palette[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn unknown_class_falls_back_to_grey() {
        let colors = ClassColors::new(ClassSet::Nineteen);
        assert_eq!(colors.color_for(19), Color32::GRAY);
        assert_ne!(colors.color_for(0), Color32::GRAY);
    }
}
