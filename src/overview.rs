//! One live visualization instance over a loaded model.
//!
//! The overview owns every core component, consumes backend events from its
//! hub subscription and queues outbound commands for the transport. Dropping
//! it unsubscribes from the hub immediately.

use std::collections::BTreeMap;

use eframe::egui::{PointerButton, Pos2, Vec2, pos2};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::backend::{
    AnalysisKind, Briefing, ClientCommand, GenerationStatistics, JointHistograms, MatrixReply,
    PathHistogram, PendingRequests, Purpose, Reply, Resolution, ServerEvent, TopVulnerabilities,
    WirePosition, decode_reply,
};
use crate::camera::Camera;
use crate::config::VisConfig;
use crate::error::ReplyError;
use crate::interaction::{
    Canvas, InteractionMachine, InteractionMode, InteractionOutcome, PointerEvent,
};
use crate::matrix::{
    MatrixOptions, MatrixRaster, PrincipalComponentOrder, SelectionSummary, SourceTargetMatrix,
};
use crate::model::{
    AttackPath, HostId, ModelStore, PathFootprint, PathMetric, Query, QueryFilter, QueryId,
    model_from_value, parse_positions,
};
use crate::observe::{Hub, Store, Subscription};
use crate::overlay::{BandSource, LinkRatioPolicy, StatisticsOverlay, Visibility, rgb};
use crate::selection::{SelectionManager, SelectionSnapshot};

/// Both halves of the latest matrix request. The rendered matrix changes
/// only once both have arrived.
#[derive(Debug)]
struct MatrixFetch {
    query: QueryId,
    baseline: Option<MatrixReply>,
    counts: Option<MatrixReply>,
}

pub struct Overview {
    config: VisConfig,
    model: ModelStore,
    camera: Camera,
    selection: SelectionManager,
    interaction: InteractionMachine,
    overlay: StatisticsOverlay,
    matrix: Option<SourceTargetMatrix>,
    matrix_query: Option<QueryId>,
    matrix_options: MatrixOptions,
    matrix_fetch: Option<MatrixFetch>,
    matrix_error: Option<String>,
    pending: PendingRequests,
    queries: Store<Vec<Query>>,
    generation: BTreeMap<QueryId, GenerationStatistics>,
    paused: bool,
    other_models: Vec<String>,
    histograms: Option<JointHistograms>,
    attack_paths: BTreeMap<QueryId, Vec<AttackPath>>,
    top_vulnerabilities: BTreeMap<QueryId, TopVulnerabilities>,
    path_histograms: BTreeMap<QueryId, PathHistogram>,
    commands: Vec<ClientCommand>,
    events: Option<Subscription<ServerEvent>>,
}

impl Overview {
    pub fn new(model: ModelStore, events: &Hub<ServerEvent>, config: VisConfig) -> Self {
        let overlay = StatisticsOverlay::new(&model, config.overlay.clone(), config.hull.clone());
        info!(
            hosts = model.host_count(),
            links = model.links().len(),
            "overview created"
        );
        Self {
            camera: Camera::new(config.camera.min_scale),
            interaction: InteractionMachine::new(config.interaction.clone()),
            selection: SelectionManager::new(),
            overlay,
            model,
            matrix: None,
            matrix_query: None,
            matrix_options: MatrixOptions::default(),
            matrix_fetch: None,
            matrix_error: None,
            pending: PendingRequests::new(),
            queries: Store::new(Vec::new()),
            generation: BTreeMap::new(),
            paused: false,
            other_models: Vec::new(),
            histograms: None,
            attack_paths: BTreeMap::new(),
            top_vulnerabilities: BTreeMap::new(),
            path_histograms: BTreeMap::new(),
            commands: Vec::new(),
            events: Some(events.subscribe()),
            config,
        }
    }

    pub fn model(&self) -> &ModelStore {
        &self.model
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn subscribe_selection(&self) -> Subscription<SelectionSnapshot> {
        self.selection.subscribe()
    }

    pub fn overlay(&self) -> &StatisticsOverlay {
        &self.overlay
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    pub fn queries(&self) -> &[Query] {
        self.queries.get()
    }

    /// Notified with the full list whenever the backend's query list changes.
    pub fn subscribe_queries(&self) -> Subscription<Vec<Query>> {
        self.queries.subscribe()
    }

    pub fn generation_statistics(&self, query: QueryId) -> Option<&GenerationStatistics> {
        self.generation.get(&query)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn other_models(&self) -> &[String] {
        &self.other_models
    }

    pub fn histograms(&self) -> Option<&JointHistograms> {
        self.histograms.as_ref()
    }

    pub fn attack_paths(&self, query: QueryId) -> &[AttackPath] {
        self.attack_paths.get(&query).map_or(&[], Vec::as_slice)
    }

    pub fn top_vulnerabilities(&self, query: QueryId) -> Option<&TopVulnerabilities> {
        self.top_vulnerabilities.get(&query)
    }

    pub fn path_histogram(&self, query: QueryId) -> Option<&PathHistogram> {
        self.path_histograms.get(&query)
    }

    pub fn is_disposed(&self) -> bool {
        self.events.is_none()
    }

    // ---- backend events ----

    /// Applies every event delivered since the last call, in order.
    pub fn pump(&mut self) -> usize {
        let events = match &self.events {
            Some(subscription) => subscription.drain(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        debug!(kind = event.kind(), "server event");
        match event {
            ServerEvent::Briefing(briefing) => self.apply_briefing(briefing),
            ServerEvent::BundledStats(snapshot) => {
                self.overlay.apply_snapshot(snapshot, &self.model);
            }
            ServerEvent::AllQueries(queries) => {
                self.overlay.sync_queries(&queries, &self.model);
                self.queries.set(queries);
            }
            ServerEvent::QueryGenerationStatistics(statistics) => {
                self.generation.insert(statistics.id, statistics);
            }
            ServerEvent::Reply(reply) => self.apply_reply(reply),
        }
    }

    fn apply_briefing(&mut self, briefing: Briefing) {
        self.paused = briefing.paused;
        self.other_models = briefing.others;
        if briefing.model.is_null() {
            return;
        }
        match model_from_value(briefing.model) {
            Ok(server_model) => {
                let applied = self.model.reset_positions(server_model.all_positions());
                info!(applied, "applied host positions from briefing");
                self.overlay.positions_reset(&self.model);
            }
            Err(err) => warn!(error = %err, "ignoring malformed model in briefing"),
        }
    }

    fn apply_reply(&mut self, reply: Reply) {
        let purpose = match self.pending.resolve(&reply.token) {
            Resolution::Current(purpose) => purpose,
            Resolution::Stale => {
                debug!(token = %reply.token, "dropping stale reply");
                return;
            }
        };

        if let Err(err) = self.apply_payload(purpose, reply.payload) {
            warn!(purpose = err.purpose, error = %err.source, "ignoring malformed reply");
        }
    }

    fn apply_payload(&mut self, purpose: Purpose, payload: Value) -> Result<(), ReplyError> {
        let label = purpose.label();
        match purpose {
            Purpose::QueryMatrix | Purpose::BaselineMatrix => {
                let reply: MatrixReply = match decode_reply(label, payload) {
                    Ok(reply) => reply,
                    Err(err) => {
                        self.abandon_matrix_fetch(format!("{err}: {}", err.source));
                        return Ok(());
                    }
                };
                if let Some(fetch) = self.matrix_fetch.as_mut() {
                    if purpose == Purpose::QueryMatrix {
                        fetch.counts = Some(reply);
                    } else {
                        fetch.baseline = Some(reply);
                    }
                }
                self.try_build_matrix();
            }
            Purpose::HostPositions => {
                let positions = parse_positions(payload).map_err(|source| ReplyError {
                    purpose: label,
                    source,
                })?;
                let applied = self
                    .model
                    .reset_positions(positions.into_iter().map(|(id, (x, y))| (id, pos2(x, y))));
                info!(applied, "applied host positions from backend");
                self.overlay.positions_reset(&self.model);
            }
            Purpose::JointHistograms => {
                self.histograms = Some(decode_reply(label, payload)?);
            }
            Purpose::AttackPaths(query) => {
                let paths: Vec<AttackPath> = decode_reply(label, payload)?;
                info!(query, paths = paths.len(), "received attack paths");
                self.highlight_attack_paths(query, &paths);
                self.attack_paths.insert(query, paths);
            }
            Purpose::TopVulnerabilities(query) => {
                self.top_vulnerabilities
                    .insert(query, decode_reply(label, payload)?);
            }
            Purpose::PathHistogram(query) => {
                let histogram: PathHistogram = decode_reply(label, payload)?;
                info!(
                    query,
                    metric = %histogram.metric,
                    paths = histogram.paths.len(),
                    "received attack path histogram"
                );
                self.path_histograms.insert(query, histogram);
            }
        }
        Ok(())
    }

    fn try_build_matrix(&mut self) {
        let Some(fetch) = self.matrix_fetch.as_ref() else {
            return;
        };
        let (Some(baseline), Some(counts)) = (&fetch.baseline, &fetch.counts) else {
            return;
        };

        let mut host_ids: Vec<HostId> = self.model.host_ids().collect();
        host_ids.sort_unstable();

        match SourceTargetMatrix::from_counts(&baseline.counts, &counts.counts, host_ids) {
            Ok(matrix) => {
                let mut matrix = matrix
                    .with_reorderer(Box::new(PrincipalComponentOrder {
                        iterations: self.config.matrix.power_iterations,
                    }))
                    .with_diagonal_color(rgb(self.config.matrix.diagonal_color));
                matrix.set_options(self.matrix_options);
                info!(
                    query = fetch.query,
                    size = matrix.size(),
                    iteration = counts.iteration,
                    "source-target matrix updated"
                );
                self.matrix_query = Some(fetch.query);
                self.matrix = Some(matrix);
                self.matrix_fetch = None;
                self.matrix_error = None;
            }
            Err(err) => self.abandon_matrix_fetch(err.to_string()),
        }
    }

    /// Drops the pair in flight. The rendered matrix stays as it was.
    fn abandon_matrix_fetch(&mut self, reason: String) {
        error!(error = %reason, "abandoning source-target matrix request");
        self.matrix_fetch = None;
        self.matrix_error = Some(reason);
    }

    // ---- pointer input ----

    fn canvas(&mut self) -> (&mut InteractionMachine, Canvas<'_>) {
        (
            &mut self.interaction,
            Canvas {
                camera: &mut self.camera,
                selection: &mut self.selection,
                model: &mut self.model,
            },
        )
    }

    /// Host under a canvas-relative screen position.
    pub fn host_at_screen(&self, screen: Pos2) -> Option<HostId> {
        let world = self.camera.screen_to_world(screen);
        self.model.host_at(world, self.config.overlay.host_radius)
    }

    fn pointer_event(&self, screen: Pos2, button: PointerButton, shift: bool) -> PointerEvent {
        PointerEvent::new(screen, button)
            .with_shift(shift)
            .on_host(self.host_at_screen(screen))
    }

    pub fn pointer_down(
        &mut self,
        screen: Pos2,
        button: PointerButton,
        shift: bool,
    ) -> InteractionOutcome {
        let event = self.pointer_event(screen, button, shift);
        let (machine, canvas) = self.canvas();
        let outcome = machine.pointer_down(event, canvas);
        self.after_interaction(&outcome);
        outcome
    }

    pub fn pointer_move(&mut self, screen: Pos2) -> InteractionOutcome {
        let (machine, canvas) = self.canvas();
        let outcome = machine.pointer_move(screen, canvas);
        self.after_interaction(&outcome);
        outcome
    }

    pub fn pointer_up(
        &mut self,
        screen: Pos2,
        button: PointerButton,
        shift: bool,
    ) -> InteractionOutcome {
        let event = self.pointer_event(screen, button, shift);
        let (machine, canvas) = self.canvas();
        let outcome = machine.pointer_up(event, canvas);
        self.after_interaction(&outcome);
        outcome
    }

    pub fn wheel(&mut self, scroll: f32, pivot: Pos2) -> InteractionOutcome {
        self.interaction.wheel(scroll, pivot, &mut self.camera)
    }

    fn after_interaction(&mut self, outcome: &InteractionOutcome) {
        if outcome.moved_hosts.is_empty() {
            return;
        }
        self.overlay.hosts_moved(&self.model, &outcome.moved_hosts);
        if outcome.drag_finished {
            self.queue_position_update(&outcome.moved_hosts);
        }
    }

    fn queue_position_update(&mut self, hosts: &[HostId]) {
        let positions: BTreeMap<HostId, WirePosition> = self
            .model
            .positions_of(hosts.iter().copied())
            .into_iter()
            .map(|(id, position)| {
                (
                    id,
                    WirePosition {
                        x: position.x,
                        y: position.y,
                    },
                )
            })
            .collect();
        if !positions.is_empty() {
            self.commands.push(ClientCommand::UpdateHostsPositions(positions));
        }
    }

    // ---- shell actions ----

    /// Fits every host into a viewport of the given size.
    pub fn center_camera(&mut self, viewport: Vec2) -> bool {
        let Some(bounds) = self.model.bounds() else {
            return false;
        };
        self.camera
            .center_on(bounds, viewport, self.config.camera.padding);
        true
    }

    /// Reverts the most recent host drag.
    pub fn undo_movement(&mut self) -> bool {
        let Some(restored) = self.interaction.undo(&mut self.model) else {
            return false;
        };
        self.overlay.hosts_moved(&self.model, &restored);
        self.queue_position_update(&restored);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.interaction.can_undo()
    }

    pub fn select_hosts(&mut self, sources: &[HostId], targets: &[HostId]) -> bool {
        self.selection.select_with_roles(sources, targets)
    }

    pub fn select_top_hosts(&mut self, query: QueryId, n: usize) -> Vec<HostId> {
        let top = self.overlay.top_hosts(query, n);
        self.selection.replace(top.iter().copied());
        top
    }

    /// Replaces the selection with untagged hosts.
    pub fn replace_selection(&mut self, ids: impl IntoIterator<Item = HostId>) -> bool {
        self.selection.replace(ids)
    }

    pub fn clear_selection(&mut self) -> bool {
        self.selection.clear()
    }

    /// Highlights the hosts and links traversed by `paths` in the query's
    /// color. Malformed traces are skipped.
    pub fn highlight_attack_paths(&mut self, query: QueryId, paths: &[AttackPath]) -> bool {
        let mut footprint = PathFootprint::default();
        for path in paths {
            match path.steps() {
                Ok(steps) => footprint.extend(&steps),
                Err(err) => warn!(error = %err, trace = %path.trace, "skipping malformed trace"),
            }
        }
        self.overlay.highlight_paths(query, footprint)
    }

    pub fn clear_highlights(&mut self) {
        self.overlay.clear_highlights();
    }

    pub fn set_query_visibility(&mut self, source: BandSource, visibility: Visibility) -> bool {
        self.overlay.set_visibility(source, visibility)
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.interaction.set_mode(mode);
    }

    pub fn set_link_policy(&mut self, policy: LinkRatioPolicy) {
        self.overlay.set_policy(policy);
    }

    pub fn set_cluster_threshold(&mut self, threshold: f32) {
        self.overlay.set_cluster_threshold(threshold, &self.model);
    }

    // ---- source-target matrix ----

    pub fn matrix(&self) -> Option<&SourceTargetMatrix> {
        self.matrix.as_ref()
    }

    pub fn matrix_query(&self) -> Option<QueryId> {
        self.matrix_query
    }

    /// Why the latest matrix request failed, until the next one succeeds.
    pub fn matrix_error(&self) -> Option<&str> {
        self.matrix_error.as_deref()
    }

    /// Whether a matrix pair is still outstanding.
    pub fn matrix_loading(&self) -> bool {
        self.matrix_fetch.is_some()
    }

    pub fn matrix_options(&self) -> MatrixOptions {
        self.matrix_options
    }

    pub fn set_matrix_options(&mut self, options: MatrixOptions) {
        self.matrix_options = options;
        if let Some(matrix) = self.matrix.as_mut() {
            matrix.set_options(options);
        }
    }

    pub fn matrix_raster(&mut self) -> Option<&MatrixRaster> {
        self.matrix.as_mut().map(|matrix| matrix.raster())
    }

    pub fn summarize_matrix(
        &self,
        rows: (usize, usize),
        cols: (usize, usize),
    ) -> Option<SelectionSummary> {
        self.matrix.as_ref()?.summarize(rows, cols)
    }

    /// Selects the row hosts as sources and column hosts as targets of a
    /// rectangular matrix selection.
    pub fn select_from_matrix(
        &mut self,
        rows: (usize, usize),
        cols: (usize, usize),
    ) -> Option<SelectionSummary> {
        let summary = self.summarize_matrix(rows, cols)?;
        self.selection
            .select_with_roles(&summary.sources, &summary.targets);
        Some(summary)
    }

    // ---- requests ----

    /// Requests the query and baseline matrices as one pair, superseding any
    /// pair still in flight.
    pub fn request_matrix(&mut self, query: QueryId) {
        let query_token = self.pending.issue(Purpose::QueryMatrix);
        let baseline_token = self.pending.issue(Purpose::BaselineMatrix);
        self.matrix_error = None;
        self.matrix_fetch = Some(MatrixFetch {
            query,
            baseline: None,
            counts: None,
        });
        self.commands.push(ClientCommand::RequestAnalysis {
            token: query_token,
            id: query,
            kind: AnalysisKind::AttackSourceTargetMatrix,
            args: None,
        });
        self.commands.push(ClientCommand::RequestBaselineMatrix {
            token: baseline_token,
        });
    }

    pub fn request_host_positions(&mut self) {
        let token = self.pending.issue(Purpose::HostPositions);
        self.commands.push(ClientCommand::RequestHostsPositions { token });
    }

    pub fn request_joint_histograms(&mut self, filter: &QueryFilter) {
        let token = self.pending.issue(Purpose::JointHistograms);
        self.commands.push(ClientCommand::ComputeJointHistograms {
            token,
            metrics: filter.conditions(),
            sources: filter.sources.clone(),
            targets: filter.targets.clone(),
        });
    }

    /// Requests up to `limit` paths of `query` matching `filter`, sorted
    /// descending by `sort`.
    pub fn request_attack_paths(
        &mut self,
        query: QueryId,
        filter: &QueryFilter,
        sort: PathMetric,
        limit: usize,
    ) {
        let token = self.pending.issue(Purpose::AttackPaths(query));
        self.commands.push(ClientCommand::RequestAnalysis {
            token,
            id: query,
            kind: AnalysisKind::SelectAttackPaths,
            args: Some(json!({
                "query": filter.conditions(),
                "sources": filter.sources,
                "targets": filter.targets,
                "sort": sort,
                "limit": limit,
            })),
        });
    }

    pub fn request_top_vulnerabilities(&mut self, query: QueryId) {
        let token = self.pending.issue(Purpose::TopVulnerabilities(query));
        self.commands.push(ClientCommand::RequestAnalysis {
            token,
            id: query,
            kind: AnalysisKind::TopVulnerabilities,
            args: None,
        });
    }

    /// Requests a sample of `query`'s paths matching `filter`, ranked by
    /// `metric`.
    pub fn request_attack_path_histogram(
        &mut self,
        query: QueryId,
        filter: &QueryFilter,
        metric: PathMetric,
    ) {
        let token = self.pending.issue(Purpose::PathHistogram(query));
        self.commands.push(ClientCommand::RequestAnalysis {
            token,
            id: query,
            kind: AnalysisKind::AttackPathHistogram,
            args: Some(json!({
                "query": filter.conditions(),
                "sort": metric,
            })),
        });
    }

    pub fn start_query(&mut self, name: &str, filter: &QueryFilter, enable_steering: bool) {
        self.commands.push(ClientCommand::StartNewQuery {
            name: name.to_owned(),
            query: filter.conditions(),
            sources: filter.sources.clone(),
            targets: filter.targets.clone(),
            enable_steering,
        });
    }

    pub fn stop_query(&mut self, query: QueryId) {
        self.commands.push(ClientCommand::StopQuery(query));
    }

    pub fn rename_query(&mut self, query: QueryId, name: &str) {
        self.commands.push(ClientCommand::RenameQuery {
            id: query,
            name: name.to_owned(),
        });
    }

    pub fn recolor_query(&mut self, query: QueryId, color: [u8; 3]) {
        self.commands.push(ClientCommand::RecolorQuery { id: query, color });
    }

    pub fn set_query_paused(&mut self, query: QueryId, paused: bool) {
        self.commands.push(ClientCommand::SetQueryPaused { id: query, paused });
    }

    pub fn set_generation_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.commands.push(ClientCommand::SetPaused(paused));
    }

    /// Hands every queued command to the caller.
    pub fn take_commands(&mut self) -> Vec<ClientCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Unsubscribes from backend events, abandons any gesture and forgets
    /// pending requests. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.events.take().is_some() {
            info!("overview disposed");
        }
        self.interaction.cancel();
        self.pending.clear();
        self.matrix_fetch = None;
    }
}

impl Drop for Overview {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::triangle;

    fn overview() -> (Hub<ServerEvent>, Overview) {
        let hub = Hub::new();
        let overview = Overview::new(triangle(), &hub, VisConfig::default());
        (hub, overview)
    }

    fn token_of(command: &ClientCommand) -> String {
        match command {
            ClientCommand::RequestAnalysis { token, .. }
            | ClientCommand::RequestBaselineMatrix { token }
            | ClientCommand::RequestHostsPositions { token } => token.clone(),
            other => panic!("no token in {other:?}"),
        }
    }

    #[test]
    fn pump_applies_events_in_order() {
        let (hub, mut overview) = overview();
        hub.publish(ServerEvent::QueryGenerationStatistics(GenerationStatistics {
            id: 3,
            precision: Some(0.5),
            min_stability: None,
            max_stability: None,
            stability: None,
        }));
        assert_eq!(overview.pump(), 1);
        assert_eq!(overview.generation_statistics(3).unwrap().precision, Some(0.5));
    }

    #[test]
    fn position_reply_moves_hosts_and_links() {
        let (_hub, mut overview) = overview();
        overview.request_host_positions();
        let token = token_of(&overview.take_commands()[0]);

        overview.handle_event(ServerEvent::Reply(Reply {
            token,
            payload: json!({"0": [7.0, 9.0]}),
        }));
        assert_eq!(overview.model().position(0), Some(pos2(7.0, 9.0)));
        let link = crate::model::LinkId::new(0, 2).unwrap();
        assert_eq!(
            overview.overlay().link_geometry(link).unwrap().start,
            pos2(7.0, 9.0)
        );
    }

    #[test]
    fn malformed_reply_is_ignored() {
        let (_hub, mut overview) = overview();
        overview.request_host_positions();
        let token = token_of(&overview.take_commands()[0]);
        overview.handle_event(ServerEvent::Reply(Reply {
            token,
            payload: json!("garbage"),
        }));
        assert_eq!(overview.model().position(0), Some(pos2(0.0, 0.0)));
    }

    #[test]
    fn mismatched_matrix_keeps_previous_state() {
        let (_hub, mut overview) = overview();
        overview.request_matrix(1);
        let commands = overview.take_commands();
        for command in &commands {
            overview.handle_event(ServerEvent::Reply(Reply {
                token: token_of(command),
                payload: json!({"iteration": 1, "counts": [[0, 1], [1, 0]]}),
            }));
        }
        assert!(overview.matrix().is_none());
    }

    #[test]
    fn malformed_matrix_half_abandons_the_pair() {
        let (_hub, mut overview) = overview();
        overview.request_matrix(1);
        let commands = overview.take_commands();
        assert!(overview.matrix_loading());

        overview.handle_event(ServerEvent::Reply(Reply {
            token: token_of(&commands[0]),
            payload: json!({"counts": "not a grid"}),
        }));
        assert!(!overview.matrix_loading());
        assert!(overview.matrix_error().is_some());

        let grid = json!({"counts": [[0, 1, 0], [1, 0, 0], [0, 0, 0]]});
        overview.handle_event(ServerEvent::Reply(Reply {
            token: token_of(&commands[1]),
            payload: grid.clone(),
        }));
        assert!(overview.matrix().is_none());

        overview.request_matrix(1);
        assert!(overview.matrix_error().is_none());
        for command in overview.take_commands() {
            overview.handle_event(ServerEvent::Reply(Reply {
                token: token_of(&command),
                payload: grid.clone(),
            }));
        }
        assert_eq!(overview.matrix().unwrap().size(), 3);
        assert!(!overview.matrix_loading());
    }

    #[test]
    fn path_histogram_reply_is_stored_per_query() {
        let (_hub, mut overview) = overview();
        overview.request_attack_path_histogram(2, &QueryFilter::default(), PathMetric::Risk);
        let commands = overview.take_commands();
        let ClientCommand::RequestAnalysis { kind, args, .. } = &commands[0] else {
            panic!("expected an analysis request");
        };
        assert_eq!(*kind, AnalysisKind::AttackPathHistogram);
        assert_eq!(args.as_ref().unwrap()["sort"], "risk");

        overview.handle_event(ServerEvent::Reply(Reply {
            token: token_of(&commands[0]),
            payload: json!({"iteration": 9, "metric": "risk", "paths": [["t", 0.5]]}),
        }));
        let histogram = overview.path_histogram(2).unwrap();
        assert_eq!(histogram.iteration, 9);
        assert_eq!(histogram.paths.len(), 1);
        assert!(overview.path_histogram(1).is_none());
    }

    #[test]
    fn finished_drag_queues_position_update() {
        let (_hub, mut overview) = overview();
        overview.set_mode(InteractionMode::SelectionAndEditing);
        overview.select_hosts(&[2], &[]);

        overview.pointer_down(pos2(0.0, 0.0), PointerButton::Middle, false);
        overview.pointer_move(pos2(4.0, 0.0));
        overview.pointer_up(pos2(4.0, 0.0), PointerButton::Middle, false);

        let commands = overview.take_commands();
        assert_eq!(commands.len(), 1);
        let ClientCommand::UpdateHostsPositions(positions) = &commands[0] else {
            panic!("expected a position update");
        };
        assert_eq!(positions[&2], WirePosition { x: 54.0, y: 80.0 });
    }

    #[test]
    fn repeated_query_list_notifies_once() {
        let (hub, mut overview) = overview();
        let changes = overview.subscribe_queries();
        let queries: Vec<Query> = serde_json::from_value(json!([
            {"id": 2, "name": "dmz", "color": [0, 128, 255], "active": true}
        ]))
        .unwrap();

        hub.publish(ServerEvent::AllQueries(queries.clone()));
        hub.publish(ServerEvent::AllQueries(queries));
        overview.pump();

        assert_eq!(changes.drain().len(), 1);
        assert_eq!(overview.queries()[0].name, "dmz");
        assert!(overview.overlay().layer(2).is_some());
    }

    #[test]
    fn dispose_unsubscribes_and_clears_pending() {
        let (hub, mut overview) = overview();
        assert_eq!(hub.subscriber_count(), 1);
        overview.request_host_positions();
        overview.dispose();

        assert!(overview.is_disposed());
        assert_eq!(hub.subscriber_count(), 0);
        hub.publish(ServerEvent::AllQueries(Vec::new()));
        assert_eq!(overview.pump(), 0);
    }
}
