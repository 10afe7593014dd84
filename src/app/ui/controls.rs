use agvis::model::{PathMetric, QueryFilter};
use agvis::overlay::LinkRatioPolicy;
use eframe::egui::{self, DragValue, RichText, Ui};

use super::super::Session;

impl Session {
    /// The path filter restricted to the selected sources and targets.
    pub(in crate::app) fn filter_with_selection(&self) -> QueryFilter {
        let selection = self.overview.selection();
        let non_empty = |hosts: Vec<_>| (!hosts.is_empty()).then_some(hosts);
        QueryFilter {
            sources: non_empty(selection.sources()),
            targets: non_empty(selection.targets()),
            ..self.path_filter.clone()
        }
    }

    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search (hostname or address)")
            .on_hover_text("Fuzzy-highlight matching hosts.");
        ui.text_edit_singleline(&mut self.search);
        let matches = self.search_matches();
        ui.horizontal(|ui| {
            ui.label(format!("{} matches", matches.len()));
            if ui
                .add_enabled(!matches.is_empty(), egui::Button::new("Select matches"))
                .clicked()
            {
                self.overview.replace_selection(matches);
            }
        });

        ui.separator();
        ui.label(RichText::new("Links").strong());
        let mut policy = self.overview.overlay().policy();
        egui::ComboBox::from_id_salt("link_policy")
            .selected_text(policy.label())
            .show_ui(ui, |ui| {
                for option in LinkRatioPolicy::ALL {
                    ui.selectable_value(&mut policy, option, option.label());
                }
            });
        if policy != self.overview.overlay().policy() {
            self.overview.set_link_policy(policy);
        }

        let mut threshold = self.overview.overlay().cluster_threshold();
        let slider = ui
            .add(egui::Slider::new(&mut threshold, 10.0..=600.0).text("Cluster distance"))
            .on_hover_text("Over-represented hosts closer than this share a hull.");
        if slider.changed() {
            self.overview.set_cluster_threshold(threshold);
        }
        ui.add(egui::Slider::new(&mut self.top_n, 1..=50).text("Top hosts"));

        ui.separator();
        self.draw_selection(ui);

        ui.separator();
        self.draw_path_filter(ui);
    }

    fn draw_selection(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("Selection ({})", self.selected_labels.len())).strong());
            if ui.small_button("Clear").clicked() {
                self.overview.clear_selection();
            }
        });

        let selection = self.overview.selection();
        ui.label(format!(
            "{} sources, {} targets",
            selection.sources().len(),
            selection.targets().len()
        ));
        egui::ScrollArea::vertical()
            .id_salt("selection_list")
            .max_height(140.0)
            .show(ui, |ui| {
                for label in &self.selected_labels {
                    ui.label(label);
                }
            });
    }

    fn draw_path_filter(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Path filter").strong());
        for metric in PathMetric::ALL {
            let current = self.path_filter.range(metric);
            let mut enabled = current.is_some();
            let (mut min, mut max) = current.unwrap_or(match metric {
                PathMetric::Length => (1.0, 10.0),
                _ => (0.0, 1.0),
            });
            ui.horizontal(|ui| {
                ui.checkbox(&mut enabled, metric.label());
                ui.add_enabled(enabled, DragValue::new(&mut min).speed(0.01));
                ui.add_enabled(enabled, DragValue::new(&mut max).speed(0.01));
            });
            let next = enabled.then_some((min.min(max), max.max(min)));
            if next != current {
                self.path_filter.set_range(metric, next);
            }
        }

        if ui
            .button("Joint histograms")
            .on_hover_text("Distribution of each metric over the filtered paths.")
            .clicked()
        {
            let filter = self.filter_with_selection();
            self.overview.request_joint_histograms(&filter);
        }
        if let Some(histograms) = self.overview.histograms() {
            for (metric, bins) in histograms {
                let total: u64 = bins.iter().sum();
                ui.label(format!("{metric}: {} bins, {total} paths", bins.len()));
            }
        }

        ui.add_space(6.0);
        ui.label(RichText::new("Attack paths").strong());
        let queries: Vec<_> = self
            .overview
            .queries()
            .iter()
            .filter(|query| query.active)
            .map(|query| (query.id, query.name.clone()))
            .collect();
        if self
            .path_query
            .is_some_and(|id| !queries.iter().any(|(query, _)| *query == id))
        {
            self.path_query = None;
        }
        let selected_name = self
            .path_query
            .and_then(|id| queries.iter().find(|(query, _)| *query == id))
            .map_or("choose a query", |(_, name)| name.as_str());
        egui::ComboBox::from_id_salt("path_query")
            .selected_text(selected_name)
            .show_ui(ui, |ui| {
                for (id, name) in &queries {
                    ui.selectable_value(&mut self.path_query, Some(*id), name);
                }
            });
        egui::ComboBox::from_id_salt("path_sort")
            .selected_text(format!("sort by {}", self.path_sort.label()))
            .show_ui(ui, |ui| {
                for metric in PathMetric::ALL {
                    ui.selectable_value(&mut self.path_sort, metric, metric.label());
                }
            });
        ui.add(egui::Slider::new(&mut self.path_limit, 1..=500).text("Limit"));

        ui.horizontal(|ui| {
            if let Some(query) = self.path_query
                && ui.button("Highlight paths").clicked()
            {
                let filter = self.filter_with_selection();
                self.overview
                    .request_attack_paths(query, &filter, self.path_sort, self.path_limit);
            }
            if ui.button("Clear highlights").clicked() {
                self.overview.clear_highlights();
            }
        });
    }
}
