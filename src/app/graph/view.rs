use std::collections::BTreeSet;

use agvis::model::HostId;
use agvis::selection::SelectionRole;
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Shape, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::super::Session;
use super::super::render_utils::{
    blend_color, circle_visible, draw_background, label_offset, polygon_visible, screen_radius,
    segment_visible, to_canvas, to_screen, with_alpha,
};

const LINK_COLOR: Color32 = Color32::from_rgb(72, 72, 72);
const SEARCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
const LASSO_COLOR: Color32 = Color32::from_rgb(245, 206, 93);

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

fn role_color(role: Option<SelectionRole>) -> Color32 {
    match role {
        Some(SelectionRole::Source) => Color32::from_rgb(88, 214, 141),
        Some(SelectionRole::Target) => Color32::from_rgb(236, 112, 99),
        Some(SelectionRole::SourceAndTarget) => Color32::from_rgb(187, 143, 206),
        None => LASSO_COLOR,
    }
}

impl Session {
    /// Hosts whose name or address fuzzily matches the search field.
    pub(in crate::app) fn search_matches(&self) -> BTreeSet<HostId> {
        let query = self.search.trim();
        if query.is_empty() {
            return BTreeSet::new();
        }

        let matcher = SkimMatcherV2::default();
        self.overview
            .model()
            .hosts()
            .iter()
            .filter(|host| {
                fuzzy_match_score(&matcher, &host.hostname, query).is_some()
                    || fuzzy_match_score(&matcher, &host.ipv4, query).is_some()
            })
            .map(|host| host.id)
            .collect()
    }

    pub(in crate::app) fn draw_canvas(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        if self.needs_centering && self.overview.center_camera(rect.size()) {
            self.needs_centering = false;
        }

        self.handle_canvas_zoom(ui, rect, &response);
        self.handle_canvas_pointer(ui, rect, &response);
        self.handle_canvas_keys(ui);

        let painter = ui.painter_at(rect);
        let camera = *self.overview.camera();
        draw_background(&painter, rect, &camera);

        let overview = &self.overview;
        let overlay = overview.overlay();
        let model = overview.model();
        let screen = |world: Pos2| to_screen(rect, &camera, world);

        for layer in overlay.layers().filter(|layer| layer.visibility.hosts) {
            for hull in layer.hulls() {
                let points: Vec<Pos2> = hull.polygon.iter().map(|point| screen(*point)).collect();
                if !polygon_visible(rect, &points) {
                    continue;
                }
                painter.add(Shape::convex_polygon(
                    points,
                    with_alpha(layer.color, 0.12),
                    Stroke::new(1.5, with_alpha(layer.color, 0.7)),
                ));
            }
        }

        for (_, geometry) in overlay.link_geometries() {
            let (start, end) = (screen(geometry.start), screen(geometry.end));
            if segment_visible(rect, start, end, 2.0) {
                painter.line_segment([start, end], Stroke::new(1.0, LINK_COLOR));
            }
        }

        for (quad, color) in overlay.band_quads() {
            let points: Vec<Pos2> = quad.iter().map(|point| screen(*point)).collect();
            if polygon_visible(rect, &points) {
                painter.add(Shape::convex_polygon(points, color, Stroke::NONE));
            }
        }

        let scale_sqrt = camera.scale.sqrt();
        for layer in overlay.layers() {
            let Some(highlight) = layer.highlight() else {
                continue;
            };
            for link in &highlight.links {
                if let Some(geometry) = overlay.link_geometry(*link) {
                    painter.line_segment(
                        [screen(geometry.start), screen(geometry.end)],
                        Stroke::new((3.3 * scale_sqrt).clamp(1.7, 5.8), layer.color),
                    );
                }
            }
        }

        let halo_radius = screen_radius(overlay.config().halo_radius, &camera);
        for layer in overlay.layers().filter(|layer| layer.visibility.hosts) {
            for halo in layer.halos() {
                let Some(position) = model.position(halo.host) else {
                    continue;
                };
                let position = screen(position);
                if circle_visible(rect, position, halo_radius) {
                    painter.circle_filled(position, halo_radius, with_alpha(layer.color, halo.opacity));
                }
            }
        }

        let hovered = response
            .hover_pos()
            .and_then(|pointer| overview.host_at_screen(to_canvas(rect, pointer)));
        let matches = self.search_matches();
        let radius = screen_radius(overlay.config().host_radius, &camera);
        let highlighted: BTreeSet<HostId> = overlay
            .layers()
            .filter_map(|layer| layer.highlight())
            .flat_map(|highlight| highlight.hosts.iter().copied())
            .collect();

        for host in model.hosts() {
            let position = screen(host.position);
            if !circle_visible(rect, position, radius) {
                continue;
            }

            let style = overlay.host_style(host.id);
            let mut fill = style.map_or(Color32::GRAY, |style| style.fill);
            if matches.contains(&host.id) {
                fill = blend_color(fill, SEARCH_COLOR, 0.68);
            }
            painter.circle_filled(position, radius, fill);

            let selected = overview.selection().contains(host.id);
            let stroke = if selected {
                Stroke::new(2.6, role_color(overview.selection().role(host.id)))
            } else if highlighted.contains(&host.id) {
                Stroke::new(1.8, Color32::from_rgb(247, 194, 111))
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };
            painter.circle_stroke(position, radius, stroke);

            let show_label = selected
                || hovered == Some(host.id)
                || matches.contains(&host.id)
                || camera.scale > 1.35;
            if show_label {
                painter.text(
                    position + label_offset(radius),
                    Align2::LEFT_CENTER,
                    host.label(),
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
            if radius > 9.0 {
                painter.text(
                    position,
                    Align2::CENTER_CENTER,
                    host.id.to_string(),
                    FontId::proportional(10.0),
                    style.map_or(Color32::BLACK, |style| style.text),
                );
            }
        }

        if let Some(lasso) = overview.interaction().lasso() {
            let points: Vec<Pos2> = lasso.iter().map(|point| screen(*point)).collect();
            painter.add(Shape::closed_line(points, Stroke::new(1.2, LASSO_COLOR)));
        }

        if let Some(host) = hovered.and_then(|id| model.host(id)) {
            let baseline = overlay.snapshot().baseline.host_count(host.id);
            let mut panel_text = format!("{}  |  {}  |  paths {baseline}", host.label(), host.ipv4);
            for layer in overlay.layers() {
                if let Some(ratio) = layer.ratio(host.id) {
                    panel_text.push_str(&format!("  |  {} x{ratio:.2}", layer.name));
                }
            }
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                panel_text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        if response.dragged() || overview.interaction().lasso().is_some() {
            ui.ctx().request_repaint();
        }
    }
}
