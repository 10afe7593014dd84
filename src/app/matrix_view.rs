use agvis::matrix::{FilterAxis, MatrixMode, SortMode};
use eframe::egui::{
    self, Color32, ColorImage, Context, Pos2, Rect, Sense, Stroke, StrokeKind, TextureOptions, Ui,
    vec2,
};

use super::Session;

/// Cell under `pointer` for a view of `rows` by `cols` drawn into `rect`.
fn cell_at(rect: Rect, rows: usize, cols: usize, pointer: Pos2) -> Option<(usize, usize)> {
    if rows == 0 || cols == 0 {
        return None;
    }
    let relative = (pointer - rect.min) / rect.size();
    let row = (relative.y.clamp(0.0, 0.999_9) * rows as f32) as usize;
    let col = (relative.x.clamp(0.0, 0.999_9) * cols as f32) as usize;
    Some((row, col))
}

fn cell_rect(rect: Rect, rows: usize, cols: usize, from: (usize, usize), to: (usize, usize)) -> Rect {
    let cell = vec2(rect.width() / cols as f32, rect.height() / rows as f32);
    let (row_low, row_high) = (from.0.min(to.0), from.0.max(to.0));
    let (col_low, col_high) = (from.1.min(to.1), from.1.max(to.1));
    Rect::from_min_max(
        rect.min + vec2(col_low as f32 * cell.x, row_low as f32 * cell.y),
        rect.min + vec2((col_high + 1) as f32 * cell.x, (row_high + 1) as f32 * cell.y),
    )
}

impl Session {
    pub(in crate::app) fn draw_matrix_window(&mut self, ctx: &Context) {
        let mut open = self.show_matrix;
        egui::Window::new("Source-target matrix")
            .open(&mut open)
            .default_size([520.0, 600.0])
            .resizable(true)
            .show(ctx, |ui| {
                self.draw_matrix_options(ui);
                if let Some(error) = self.overview.matrix_error() {
                    ui.colored_label(Color32::from_rgb(236, 112, 99), error);
                } else if self.overview.matrix_loading() {
                    ui.label("Waiting for both matrices...");
                }
                ui.separator();
                self.draw_matrix(ui);
            });
        self.show_matrix = open;
    }

    fn draw_matrix_options(&mut self, ui: &mut Ui) {
        let mut options = self.overview.matrix_options();
        ui.horizontal_wrapped(|ui| {
            for mode in MatrixMode::ALL {
                ui.selectable_value(&mut options.mode, mode, mode.label());
            }
            ui.checkbox(&mut options.squared, "Squared");
            if let Some(query) = self.overview.matrix_query()
                && ui.button("Refresh").clicked()
            {
                self.overview.request_matrix(query);
            }
        });
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("matrix_filter")
                .selected_text(options.filter.label())
                .show_ui(ui, |ui| {
                    for axis in FilterAxis::ALL {
                        ui.selectable_value(&mut options.filter, axis, axis.label());
                    }
                });
            ui.add_enabled(
                options.filter != FilterAxis::None,
                egui::Slider::new(&mut options.percentile, 0.0..=1.0).text("Percentile"),
            );
        });
        egui::ComboBox::from_id_salt("matrix_sort")
            .selected_text(options.sort.label())
            .show_ui(ui, |ui| {
                for sort in SortMode::ALL {
                    ui.selectable_value(&mut options.sort, sort, sort.label());
                }
            });

        if options != self.overview.matrix_options() {
            self.overview.set_matrix_options(options);
            self.matrix_drag = None;
            self.matrix_summary = None;
        }
    }

    fn draw_matrix(&mut self, ui: &mut Ui) {
        let Some(raster) = self.overview.matrix_raster() else {
            ui.label("Request a matrix from a query to show it here.");
            return;
        };
        let (rows, cols, revision) = (raster.height, raster.width, raster.revision);

        let stale = self
            .matrix_texture
            .as_ref()
            .is_none_or(|(uploaded, _)| *uploaded != revision);
        if stale {
            let image = ColorImage::from_rgba_unmultiplied([cols, rows], &raster.rgba());
            let texture = ui
                .ctx()
                .load_texture("source-target-matrix", image, TextureOptions::NEAREST);
            self.matrix_texture = Some((revision, texture));
        }
        let Some((_, texture)) = self.matrix_texture.as_ref() else {
            return;
        };
        if rows == 0 || cols == 0 {
            ui.label("Every row or column was filtered out.");
            return;
        }

        let side = ui.available_width().min(ui.available_height() - 60.0).max(120.0);
        let (rect, response) = ui.allocate_exact_size(vec2(side, side), Sense::drag());
        ui.painter().image(
            texture.id(),
            rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );

        let pointer = response.interact_pointer_pos();
        if response.drag_started() {
            self.matrix_drag = pointer.and_then(|pointer| cell_at(rect, rows, cols, pointer));
        }
        let current = pointer.and_then(|pointer| cell_at(rect, rows, cols, pointer));
        if let (Some(start), Some(current)) = (self.matrix_drag, current) {
            let spans = ((start.0, current.0), (start.1, current.1));
            if response.drag_stopped() {
                self.matrix_summary = self.overview.select_from_matrix(spans.0, spans.1);
                self.matrix_drag = None;
            } else {
                self.matrix_summary = self.overview.summarize_matrix(spans.0, spans.1);
            }
            ui.painter().rect_stroke(
                cell_rect(rect, rows, cols, start, current),
                0.0,
                Stroke::new(1.5, Color32::WHITE),
                StrokeKind::Outside,
            );
        }

        if let Some(summary) = &self.matrix_summary {
            ui.label(format!(
                "{} sources x {} targets",
                summary.row_count(),
                summary.col_count()
            ));
            ui.label(format!(
                "query paths {:.0} ({:.1}%), baseline paths {:.0} ({:.1}%)",
                summary.query_sum,
                summary.query_fraction * 100.0,
                summary.baseline_sum,
                summary.baseline_fraction * 100.0,
            ));
        }
    }
}
