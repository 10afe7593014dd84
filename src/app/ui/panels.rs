use agvis::backend::PathHistogram;
use agvis::interaction::InteractionMode;
use agvis::model::{Query, QueryId};
use agvis::overlay::BandSource;
use eframe::egui::{self, Align, Color32, Layout, Rect, RichText, Sense, Ui, vec2};

use super::super::Session;

const HISTOGRAM_BINS: usize = 20;

fn draw_path_histogram(ui: &mut Ui, query: QueryId, histogram: &PathHistogram) {
    egui::CollapsingHeader::new(format!(
        "{} histogram (iteration {})",
        histogram.metric, histogram.iteration
    ))
    .id_salt(("path_histogram", query))
    .show(ui, |ui| {
        let Some((low, high)) = histogram.range() else {
            ui.label("No paths match.");
            return;
        };
        let bins = histogram.bins(HISTOGRAM_BINS);
        let tallest = bins.iter().copied().max().unwrap_or(1).max(1) as f32;

        let width = ui.available_width().min(240.0);
        let (rect, _) = ui.allocate_exact_size(vec2(width, 60.0), Sense::hover());
        let painter = ui.painter_at(rect);
        let bar = rect.width() / bins.len() as f32;
        for (index, count) in bins.iter().enumerate() {
            let height = rect.height() * *count as f32 / tallest;
            let left = rect.left() + index as f32 * bar;
            painter.rect_filled(
                Rect::from_min_max(
                    egui::pos2(left + 1.0, rect.bottom() - height),
                    egui::pos2(left + bar - 1.0, rect.bottom()),
                ),
                0.0,
                Color32::from_rgb(103, 196, 255),
            );
        }
        ui.label(format!(
            "{} paths, {low:.3} .. {high:.3}",
            histogram.paths.len()
        ));
    });
}

impl Session {
    pub(in crate::app) fn draw_top_bar(&mut self, ui: &mut Ui, reload_requested: &mut bool) {
        ui.horizontal(|ui| {
            ui.heading("agvis");
            ui.separator();
            ui.label(format!("model: {}", self.model_path.display()));
            let model = self.overview.model();
            ui.label(format!("hosts: {}", model.host_count()));
            ui.label(format!("links: {}", model.links().len()));
            ui.separator();

            for mode in InteractionMode::ALL {
                let selected = self.overview.interaction().mode() == mode;
                if ui.selectable_label(selected, mode.label()).clicked() && !selected {
                    self.overview.set_mode(mode);
                }
            }
            ui.separator();

            if ui.button("Center").clicked() {
                self.needs_centering = true;
            }
            let undo = ui.add_enabled(self.overview.can_undo(), egui::Button::new("Undo move"));
            if undo.on_hover_text("Ctrl+Z").clicked() {
                self.overview.undo_movement();
            }
            ui.toggle_value(&mut self.show_matrix, "Matrix");
            if ui.button("Reload model").clicked() {
                *reload_requested = true;
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                match &self.connection {
                    Some(connection) if connection.is_connected() => {
                        let mut paused = self.overview.is_paused();
                        if ui.checkbox(&mut paused, "Paused").changed() {
                            self.overview.set_generation_paused(paused);
                        }
                        ui.label(format!("backend: {}", connection.address()));
                    }
                    Some(connection) => {
                        ui.colored_label(
                            Color32::from_rgb(236, 112, 99),
                            format!("backend {} disconnected", connection.address()),
                        );
                    }
                    None => {
                        ui.label("offline");
                    }
                }
            });
        });
    }

    pub(in crate::app) fn draw_queries(&mut self, ui: &mut Ui) {
        ui.heading("Queries");
        ui.separator();

        self.draw_visibility_row(ui, "Baseline", BandSource::Baseline);
        ui.add_space(4.0);

        let queries: Vec<Query> = self.overview.queries().to_vec();
        if queries.is_empty() {
            ui.label("No queries running.");
        }

        egui::ScrollArea::vertical()
            .id_salt("query_list")
            .max_height(ui.available_height() * 0.6)
            .show(ui, |ui| {
                for query in &queries {
                    ui.push_id(query.id, |ui| self.draw_query(ui, query));
                    ui.separator();
                }
            });

        ui.add_space(6.0);
        ui.label(RichText::new("New query").strong());
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.new_query_name);
            ui.checkbox(&mut self.new_query_steering, "Steering");
        });
        let ready = !self.new_query_name.trim().is_empty();
        let start = ui
            .add_enabled(ready, egui::Button::new("Start"))
            .on_hover_text("Uses the path filter and the selected sources and targets.");
        if start.clicked() {
            let filter = self.filter_with_selection();
            self.overview
                .start_query(self.new_query_name.trim(), &filter, self.new_query_steering);
            self.new_query_name.clear();
        }
    }

    fn draw_query(&mut self, ui: &mut Ui, query: &Query) {
        ui.horizontal(|ui| {
            let mut color = query.color;
            if ui.color_edit_button_srgb(&mut color).changed() {
                self.overview.recolor_query(query.id, color);
            }

            let name = self
                .renames
                .entry(query.id)
                .or_insert_with(|| query.name.clone());
            let response = ui.text_edit_singleline(name);
            if response.lost_focus() && name.trim() != query.name {
                let name = name.trim().to_owned();
                self.overview.rename_query(query.id, &name);
            }
            if !response.has_focus() && !response.lost_focus() && *name != query.name {
                *name = query.name.clone();
            }
        });

        ui.horizontal(|ui| {
            let mut paused = query.paused;
            if ui.checkbox(&mut paused, "Paused").changed() {
                self.overview.set_query_paused(query.id, paused);
            }
            if !query.active {
                ui.label(RichText::new("inactive").weak());
            }
            if ui.button("Stop").clicked() {
                self.overview.stop_query(query.id);
            }
        });

        if query.active {
            self.draw_visibility_row(ui, "Show", BandSource::Query(query.id));
            self.draw_query_actions(ui, query.id);
        }

        if let Some(statistics) = self.overview.generation_statistics(query.id) {
            let show = |value: Option<f64>| value.map_or_else(|| "-".to_owned(), |v| format!("{v:.3}"));
            ui.label(format!(
                "precision {}  stability {} ({} .. {})",
                show(statistics.precision),
                show(statistics.stability),
                show(statistics.min_stability),
                show(statistics.max_stability),
            ));
        }

        if let Some(histogram) = self.overview.path_histogram(query.id) {
            draw_path_histogram(ui, query.id, histogram);
        }

        if let Some(top) = self.overview.top_vulnerabilities(query.id) {
            egui::CollapsingHeader::new(format!("Top vulnerabilities (iteration {})", top.iteration))
                .id_salt(("top_vulnerabilities", query.id))
                .show(ui, |ui| {
                    for (cve, count) in top.cves.iter().take(10) {
                        ui.label(format!("{cve}  {count}"));
                    }
                });
        }
    }

    fn draw_query_actions(&mut self, ui: &mut Ui, query: QueryId) {
        ui.horizontal_wrapped(|ui| {
            if ui
                .button(format!("Select top {}", self.top_n))
                .on_hover_text("Replace the selection with the most traversed hosts.")
                .clicked()
            {
                self.overview.select_top_hosts(query, self.top_n);
            }
            if ui.button("Matrix").clicked() {
                self.overview.request_matrix(query);
                self.show_matrix = true;
            }
            if ui.button("Vulnerabilities").clicked() {
                self.overview.request_top_vulnerabilities(query);
            }
            if ui
                .button(format!("{} histogram", self.path_sort.label()))
                .on_hover_text("Distribution of the path sort metric over the filtered paths.")
                .clicked()
            {
                let filter = self.filter_with_selection();
                self.overview
                    .request_attack_path_histogram(query, &filter, self.path_sort);
            }
            let paths = self.overview.attack_paths(query).len();
            if paths > 0 {
                ui.label(format!("{paths} paths"));
            }
        });
    }

    fn draw_visibility_row(&mut self, ui: &mut Ui, label: &str, source: BandSource) {
        let Some(mut visibility) = self.overview.overlay().visibility(source) else {
            return;
        };
        ui.horizontal(|ui| {
            ui.label(label);
            let hosts = ui.checkbox(&mut visibility.hosts, "hosts").changed();
            let links = ui.checkbox(&mut visibility.links, "links").changed();
            if hosts || links {
                self.overview.set_query_visibility(source, visibility);
            }
        });
    }
}
