use eframe::egui::Color32;
use ndarray::Array2;

const RAMP: [(f32, [u8; 3]); 5] = [
    (0.0, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.5, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.0, [253, 231, 37]),
];

/// Perceptually ordered ramp over `[0, 1]`; inputs are clamped.
pub fn ramp_color(value: f64) -> Color32 {
    let value = if value.is_finite() {
        value.clamp(0.0, 1.0) as f32
    } else {
        0.0
    };

    for window in RAMP.windows(2) {
        let (start, low) = window[0];
        let (end, high) = window[1];
        if value <= end {
            let t = (value - start) / (end - start);
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            return Color32::from_rgb(
                mix(low[0], high[0]),
                mix(low[1], high[1]),
                mix(low[2], high[2]),
            );
        }
    }
    let [r, g, b] = RAMP[RAMP.len() - 1].1;
    Color32::from_rgb(r, g, b)
}

/// Row-major pixels of a derived matrix view, one pixel per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixRaster {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Color32>,
    /// View revision this raster was rendered from.
    pub revision: u64,
}

impl MatrixRaster {
    pub fn render(view: &Array2<f64>, diagonal: Color32, revision: u64) -> Self {
        let pixels = view
            .iter()
            .map(|&value| {
                if value < 0.0 {
                    diagonal
                } else {
                    ramp_color(value)
                }
            })
            .collect();
        Self {
            width: view.ncols(),
            height: view.nrows(),
            pixels,
            revision,
        }
    }

    /// Flattened unmultiplied RGBA bytes for texture upload.
    pub fn rgba(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| [pixel.r(), pixel.g(), pixel.b(), 255])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn ramp_hits_stops_and_clamps() {
        assert_eq!(ramp_color(0.0), Color32::from_rgb(68, 1, 84));
        assert_eq!(ramp_color(1.0), Color32::from_rgb(253, 231, 37));
        assert_eq!(ramp_color(-3.0), ramp_color(0.0));
        assert_eq!(ramp_color(7.0), ramp_color(1.0));
        assert_eq!(ramp_color(f64::NAN), ramp_color(0.0));
    }

    #[test]
    fn sentinel_cells_use_the_diagonal_color() {
        let grey = Color32::from_rgb(128, 128, 128);
        let raster = MatrixRaster::render(&array![[-1.0, 0.5], [1.0, -1.0]], grey, 3);

        assert_eq!((raster.width, raster.height), (2, 2));
        assert_eq!(raster.pixels[0], grey);
        assert_eq!(raster.pixels[3], grey);
        assert_eq!(raster.pixels[2], ramp_color(1.0));
        assert_eq!(raster.rgba().len(), 16);
    }
}
