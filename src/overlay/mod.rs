//! Maps streaming statistics onto host colors, link bands, halos and hulls.

mod links;
mod ratio;

use std::collections::BTreeMap;

use eframe::egui::{Color32, Pos2};
use tracing::{debug, info};

use crate::config::{HullConfig, OverlayConfig};
use crate::hull::{HullCluster, cluster_hulls};
use crate::model::{
    HostId, LinkId, ModelStore, PathFootprint, Query, QueryId, StatisticsRecord, StatisticsSnapshot,
};

pub use links::{LinkGeometry, LinkGeometryCache};
pub use ratio::{
    BandInputs, BandSource, LinkBand, LinkLayout, LinkRatioPolicy, SourceCounts, halo_opacity,
    host_ratio, layout_links,
};

pub fn lerp_color(low: Color32, high: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color32::from_rgb(mix(low.r(), high.r()), mix(low.g(), high.g()), mix(low.b(), high.b()))
}

pub fn rgb([r, g, b]: [u8; 3]) -> Color32 {
    Color32::from_rgb(r, g, b)
}

/// Host fill while the baseline host overlay is hidden.
pub const NEUTRAL_HOST: HostStyle = HostStyle {
    fill: Color32::from_rgb(150, 150, 150),
    text: Color32::BLACK,
    t: 0.0,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostStyle {
    pub fill: Color32,
    pub text: Color32,
    /// Baseline count over the largest baseline count.
    pub t: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Visibility {
    pub hosts: bool,
    pub links: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            hosts: true,
            links: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Halo {
    pub host: HostId,
    pub ratio: f32,
    pub opacity: f32,
}

/// Everything drawn on behalf of one active query.
#[derive(Clone, Debug)]
pub struct QueryLayer {
    pub id: QueryId,
    pub name: String,
    pub color: Color32,
    pub visibility: Visibility,
    ratios: BTreeMap<HostId, f32>,
    halos: Vec<Halo>,
    hulls: Vec<HullCluster>,
    highlight: Option<PathFootprint>,
}

impl QueryLayer {
    fn new(query: &Query) -> Self {
        Self {
            id: query.id,
            name: query.name.clone(),
            color: query.color32(),
            visibility: Visibility::default(),
            ratios: BTreeMap::new(),
            halos: Vec::new(),
            hulls: Vec::new(),
            highlight: None,
        }
    }

    /// `None` when the host has no usable ratio in this query.
    pub fn ratio(&self, host: HostId) -> Option<f32> {
        self.ratios.get(&host).copied()
    }

    pub fn halos(&self) -> &[Halo] {
        &self.halos
    }

    pub fn hulls(&self) -> &[HullCluster] {
        &self.hulls
    }

    pub fn highlight(&self) -> Option<&PathFootprint> {
        self.highlight.as_ref()
    }

    fn recompute_ratios(&mut self, record: Option<&StatisticsRecord>, config: &OverlayConfig) {
        self.ratios.clear();
        self.halos.clear();
        let Some(record) = record else {
            debug!(query = self.id, "no statistics for query yet");
            return;
        };

        let max = record.max_host_count();
        for (&host, &count) in &record.hosts {
            let ratio = host_ratio(count, max);
            if ratio.is_nan() {
                continue;
            }
            self.ratios.insert(host, ratio);
            if ratio > 0.0 {
                self.halos.push(Halo {
                    host,
                    ratio,
                    opacity: halo_opacity(ratio, config.halo_damping, config.halo_floor),
                });
            }
        }
    }

    fn recompute_hulls(&mut self, model: &ModelStore, config: &OverlayConfig, hull: &HullConfig) {
        let over_represented = self
            .ratios
            .iter()
            .filter(|(_, ratio)| **ratio > 1.0)
            .map(|(&host, _)| host);
        let points = model.positions_of(over_represented);
        self.hulls = cluster_hulls(&points, config.host_radius, hull);
    }
}

pub struct StatisticsOverlay {
    config: OverlayConfig,
    hull_config: HullConfig,
    policy: LinkRatioPolicy,
    baseline_visibility: Visibility,
    snapshot: StatisticsSnapshot,
    last_iterations: Option<(u64, BTreeMap<QueryId, u64>)>,
    host_styles: BTreeMap<HostId, HostStyle>,
    layers: BTreeMap<QueryId, QueryLayer>,
    geometry: LinkGeometryCache,
    layouts: BTreeMap<LinkId, LinkLayout>,
}

impl StatisticsOverlay {
    pub fn new(model: &ModelStore, config: OverlayConfig, hull_config: HullConfig) -> Self {
        let mut overlay = Self {
            config,
            hull_config,
            policy: LinkRatioPolicy::default(),
            baseline_visibility: Visibility::default(),
            snapshot: StatisticsSnapshot::default(),
            last_iterations: None,
            host_styles: BTreeMap::new(),
            layers: BTreeMap::new(),
            geometry: LinkGeometryCache::build(model),
            layouts: BTreeMap::new(),
        };
        overlay.recolor_hosts(model.host_ids().collect());
        overlay
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn policy(&self) -> LinkRatioPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> &StatisticsSnapshot {
        &self.snapshot
    }

    pub fn host_style(&self, host: HostId) -> Option<HostStyle> {
        self.host_styles.get(&host).copied()
    }

    pub fn link_geometry(&self, link: LinkId) -> Option<&LinkGeometry> {
        self.geometry.get(link)
    }

    pub fn link_geometries(&self) -> impl Iterator<Item = (&LinkId, &LinkGeometry)> {
        self.geometry.iter()
    }

    pub fn link_layout(&self, link: LinkId) -> Option<&LinkLayout> {
        self.layouts.get(&link)
    }

    pub fn layers(&self) -> impl Iterator<Item = &QueryLayer> {
        self.layers.values()
    }

    pub fn layer(&self, id: QueryId) -> Option<&QueryLayer> {
        self.layers.get(&id)
    }

    pub fn band_color(&self, source: BandSource) -> Option<Color32> {
        match source {
            BandSource::Baseline => Some(rgb(self.config.baseline_band_color)),
            BandSource::Query(id) => self.layers.get(&id).map(|layer| layer.color),
        }
    }

    pub fn visibility(&self, source: BandSource) -> Option<Visibility> {
        match source {
            BandSource::Baseline => Some(self.baseline_visibility),
            BandSource::Query(id) => self.layers.get(&id).map(|layer| layer.visibility),
        }
    }

    /// Applies a snapshot unless every iteration number matches the last
    /// applied one.
    pub fn apply_snapshot(&mut self, snapshot: StatisticsSnapshot, model: &ModelStore) -> bool {
        let iterations = snapshot.iterations();
        if self.last_iterations.as_ref() == Some(&iterations) {
            debug!(iteration = iterations.0, "statistics unchanged, skipping");
            return false;
        }
        self.last_iterations = Some(iterations);
        self.snapshot = snapshot;

        self.recolor_hosts(model.host_ids().collect());
        self.recompute_layers(model);
        self.relayout_links();
        true
    }

    /// Reconciles layers with the backend's query list. Active queries get a
    /// layer; inactive or vanished ones release theirs.
    pub fn sync_queries(&mut self, queries: &[Query], model: &ModelStore) {
        let active: BTreeMap<QueryId, &Query> = queries
            .iter()
            .filter(|query| query.active)
            .map(|query| (query.id, query))
            .collect();

        self.layers.retain(|id, _| {
            let keep = active.contains_key(id);
            if !keep {
                info!(query = id, "releasing query layer");
            }
            keep
        });

        for (&id, query) in &active {
            let layer = self.layers.entry(id).or_insert_with(|| {
                info!(query = id, name = %query.name, "creating query layer");
                QueryLayer::new(query)
            });
            layer.name.clone_from(&query.name);
            layer.color = query.color32();
        }

        self.recompute_layers(model);
        self.relayout_links();
    }

    pub fn set_policy(&mut self, policy: LinkRatioPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.relayout_links();
        }
    }

    pub fn set_visibility(&mut self, source: BandSource, visibility: Visibility) -> bool {
        let slot = match source {
            BandSource::Baseline => &mut self.baseline_visibility,
            BandSource::Query(id) => match self.layers.get_mut(&id) {
                Some(layer) => &mut layer.visibility,
                None => return false,
            },
        };
        if *slot == visibility {
            return false;
        }
        let hosts_toggled = slot.hosts != visibility.hosts;
        *slot = visibility;
        if source == BandSource::Baseline && hosts_toggled {
            let hosts = self.host_styles.keys().copied().collect();
            self.recolor_hosts(hosts);
        }
        self.relayout_links();
        true
    }

    pub fn cluster_threshold(&self) -> f32 {
        self.hull_config.cluster_threshold
    }

    pub fn set_cluster_threshold(&mut self, threshold: f32, model: &ModelStore) {
        if self.hull_config.cluster_threshold != threshold {
            self.hull_config.cluster_threshold = threshold;
            self.recompute_hulls(model);
        }
    }

    /// Refreshes geometry of links touching `moved` and re-wraps hulls.
    pub fn hosts_moved(&mut self, model: &ModelStore, moved: &[HostId]) {
        if moved.is_empty() {
            return;
        }
        self.geometry.refresh_touching(model, moved);
        self.recompute_hulls(model);
    }

    /// Rebuilds every cached link geometry after a bulk position reset.
    pub fn positions_reset(&mut self, model: &ModelStore) {
        self.geometry = LinkGeometryCache::build(model);
        self.recompute_hulls(model);
    }

    /// Hosts with the highest counts in `query`, descending, ties by id.
    /// Hosts without paths are never returned.
    pub fn top_hosts(&self, query: QueryId, n: usize) -> Vec<HostId> {
        let Some(record) = self.snapshot.queries.get(&query) else {
            return Vec::new();
        };
        let mut hosts: Vec<(HostId, u64)> = record
            .hosts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(&host, &count)| (host, count))
            .collect();
        hosts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hosts.into_iter().take(n).map(|(host, _)| host).collect()
    }

    pub fn highlight_paths(&mut self, query: QueryId, footprint: PathFootprint) -> bool {
        match self.layers.get_mut(&query) {
            Some(layer) => {
                layer.highlight = (!footprint.hosts.is_empty()).then_some(footprint);
                true
            }
            None => false,
        }
    }

    pub fn clear_highlights(&mut self) {
        for layer in self.layers.values_mut() {
            layer.highlight = None;
        }
    }

    fn recolor_hosts(&mut self, hosts: Vec<HostId>) {
        if !self.baseline_visibility.hosts {
            self.host_styles = hosts.into_iter().map(|host| (host, NEUTRAL_HOST)).collect();
            return;
        }
        let baseline = &self.snapshot.baseline;
        let max = baseline.max_host_count();
        let low = rgb(self.config.low_color);
        let high = rgb(self.config.high_color);

        self.host_styles = hosts
            .into_iter()
            .map(|host| {
                let t = if max == 0 {
                    0.0
                } else {
                    baseline.host_count(host) as f32 / max as f32
                };
                let text = if t >= 0.5 {
                    Color32::WHITE
                } else {
                    Color32::BLACK
                };
                let style = HostStyle {
                    fill: lerp_color(low, high, t),
                    text,
                    t,
                };
                (host, style)
            })
            .collect();
    }

    fn recompute_layers(&mut self, model: &ModelStore) {
        for layer in self.layers.values_mut() {
            layer.recompute_ratios(self.snapshot.queries.get(&layer.id), &self.config);
            layer.recompute_hulls(model, &self.config, &self.hull_config);
        }
    }

    fn recompute_hulls(&mut self, model: &ModelStore) {
        for layer in self.layers.values_mut() {
            layer.recompute_hulls(model, &self.config, &self.hull_config);
        }
    }

    fn relayout_links(&mut self) {
        let baseline = SourceCounts::from_record(&self.snapshot.baseline);
        let queries: Vec<(QueryId, SourceCounts)> = self
            .layers
            .values()
            .filter(|layer| layer.visibility.links)
            .filter_map(|layer| {
                self.snapshot
                    .queries
                    .get(&layer.id)
                    .map(|record| (layer.id, SourceCounts::from_record(record)))
            })
            .collect();

        let inputs = BandInputs {
            baseline: &baseline,
            show_baseline: self.baseline_visibility.links,
            queries: queries.iter().map(|(id, counts)| (*id, counts)).collect(),
            policy: self.policy,
            max_thickness: self.config.max_link_thickness,
        };
        let links: Vec<LinkId> = self.geometry.iter().map(|(link, _)| *link).collect();
        self.layouts = layout_links(&links, &inputs);
    }

    /// World-space quad of every visible band, paired with its color.
    pub fn band_quads(&self) -> Vec<([Pos2; 4], Color32)> {
        let mut quads = Vec::new();
        for (link, layout) in &self.layouts {
            let Some(geometry) = self.geometry.get(*link) else {
                continue;
            };
            for band in &layout.bands {
                if let Some(color) = self.band_color(band.source) {
                    quads.push((geometry.band_quad(band), color));
                }
            }
        }
        quads
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;
    use crate::model::{QueryFilter, triangle};

    fn query(id: QueryId, active: bool) -> Query {
        Query {
            id,
            name: format!("Query {id}"),
            color: [200, 30, 30],
            paused: false,
            active,
            steering: true,
            filter: QueryFilter::default(),
        }
    }

    fn snapshot(iteration: u64) -> StatisticsSnapshot {
        let mut snapshot = StatisticsSnapshot::default();
        snapshot.baseline.iteration = iteration;
        snapshot.baseline.hosts = BTreeMap::from([(0, 10), (1, 5), (2, 5)]);
        snapshot.baseline.edges = BTreeMap::from([(0, BTreeMap::from([(1, 4)]))]);

        let mut record = StatisticsRecord {
            iteration,
            ..StatisticsRecord::default()
        };
        record.hosts = BTreeMap::from([(0, 2), (1, 8), (2, 0)]);
        record.edges = BTreeMap::from([(1, BTreeMap::from([(2, 6)]))]);
        snapshot.queries.insert(1, record);
        snapshot
    }

    fn overlay_with_query() -> (ModelStore, StatisticsOverlay) {
        let model = triangle();
        let mut overlay =
            StatisticsOverlay::new(&model, OverlayConfig::default(), HullConfig::default());
        overlay.sync_queries(&[query(1, true)], &model);
        overlay.apply_snapshot(snapshot(1), &model);
        (model, overlay)
    }

    #[test]
    fn baseline_colors_follow_count_share() {
        let (_, overlay) = overlay_with_query();
        let busiest = overlay.host_style(0).unwrap();
        let quiet = overlay.host_style(1).unwrap();

        assert_eq!(busiest.t, 1.0);
        assert_eq!(busiest.fill, rgb(OverlayConfig::default().high_color));
        assert_eq!(busiest.text, Color32::WHITE);
        assert_eq!(quiet.t, 0.5);
        assert_eq!(quiet.text, Color32::WHITE);
    }

    #[test]
    fn most_represented_host_gets_strongest_halo_and_a_hull() {
        let (_, overlay) = overlay_with_query();
        let layer = overlay.layer(1).unwrap();

        assert_eq!(layer.ratio(1), Some(2.0));
        assert_eq!(layer.ratio(0), Some(0.5));
        let strongest = layer
            .halos()
            .iter()
            .max_by(|a, b| a.opacity.total_cmp(&b.opacity))
            .unwrap();
        assert_eq!(strongest.host, 1);
        assert_eq!(layer.hulls().len(), 1);
        assert_eq!(layer.hulls()[0].members, vec![1]);
    }

    #[test]
    fn unchanged_iterations_are_skipped() {
        let (model, mut overlay) = overlay_with_query();
        assert!(!overlay.apply_snapshot(snapshot(1), &model));
        assert!(overlay.apply_snapshot(snapshot(2), &model));
    }

    #[test]
    fn inactive_query_releases_its_layer() {
        let (model, mut overlay) = overlay_with_query();
        overlay.sync_queries(&[query(1, false)], &model);
        assert!(overlay.layer(1).is_none());

        let link = LinkId::new(1, 2).unwrap();
        assert!(overlay.link_layout(link).unwrap().bands.is_empty());
    }

    #[test]
    fn hiding_query_links_drops_its_bands() {
        let (_, mut overlay) = overlay_with_query();
        let link = LinkId::new(1, 2).unwrap();
        assert_eq!(overlay.link_layout(link).unwrap().bands.len(), 1);

        let hidden = Visibility {
            hosts: true,
            links: false,
        };
        assert!(overlay.set_visibility(BandSource::Query(1), hidden));
        assert!(overlay.link_layout(link).unwrap().bands.is_empty());
    }

    #[test]
    fn hiding_baseline_hosts_paints_them_neutral() {
        let (_, mut overlay) = overlay_with_query();
        let shown = overlay.host_style(0).unwrap();

        let hidden = Visibility {
            hosts: false,
            links: true,
        };
        assert!(overlay.set_visibility(BandSource::Baseline, hidden));
        assert_eq!(overlay.host_style(0), Some(NEUTRAL_HOST));
        assert_eq!(overlay.host_style(2), Some(NEUTRAL_HOST));

        assert!(overlay.set_visibility(BandSource::Baseline, Visibility::default()));
        assert_eq!(overlay.host_style(0), Some(shown));
    }

    #[test]
    fn hidden_baseline_hosts_stay_neutral_across_snapshots() {
        let (model, mut overlay) = overlay_with_query();
        let hidden = Visibility {
            hosts: false,
            links: true,
        };
        overlay.set_visibility(BandSource::Baseline, hidden);
        assert!(overlay.apply_snapshot(snapshot(2), &model));
        assert_eq!(overlay.host_style(0), Some(NEUTRAL_HOST));
    }

    #[test]
    fn top_hosts_skips_zero_counts() {
        let (_, overlay) = overlay_with_query();
        assert_eq!(overlay.top_hosts(1, 1), vec![1]);
        assert_eq!(overlay.top_hosts(1, 5), vec![1, 0]);
        assert!(overlay.top_hosts(42, 3).is_empty());
    }

    #[test]
    fn moving_a_host_updates_touching_links() {
        let (mut model, mut overlay) = overlay_with_query();
        model.set_position(0, pos2(5.0, 5.0));
        overlay.hosts_moved(&model, &[0]);

        let geometry = overlay.link_geometry(LinkId::new(0, 1).unwrap()).unwrap();
        assert_eq!(geometry.start, pos2(5.0, 5.0));
    }

    #[test]
    fn highlight_targets_existing_layers_only() {
        let (_, mut overlay) = overlay_with_query();
        let mut footprint = PathFootprint::default();
        footprint.hosts.insert(2);
        assert!(overlay.highlight_paths(1, footprint.clone()));
        assert!(!overlay.highlight_paths(7, footprint));
        assert!(overlay.layer(1).unwrap().highlight().is_some());

        overlay.clear_highlights();
        assert!(overlay.layer(1).unwrap().highlight().is_none());
    }
}
