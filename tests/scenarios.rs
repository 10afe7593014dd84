use agvis::Overview;
use agvis::backend::{ClientCommand, ServerEvent};
use agvis::config::VisConfig;
use agvis::interaction::InteractionMode;
use agvis::matrix::{MatrixMode, MatrixOptions};
use agvis::model::{LinkId, parse_model};
use agvis::observe::Hub;
use eframe::egui::{PointerButton, pos2};
use serde_json::{Value, json};

const TRIANGLE: &str = r#"{
    "hosts": [
        {"id": 0, "hostname": "web", "x": 0.0, "y": 0.0},
        {"id": 1, "hostname": "db", "x": 100.0, "y": 0.0},
        {"id": 2, "hostname": "mail", "x": 50.0, "y": 80.0}
    ],
    "edges": [[0, 1], [1, 2], [2, 0]]
}"#;

fn overview() -> (Hub<ServerEvent>, Overview) {
    let hub = Hub::new();
    let model = parse_model(TRIANGLE).unwrap();
    let overview = Overview::new(model, &hub, VisConfig::default());
    (hub, overview)
}

fn publish(hub: &Hub<ServerEvent>, event: Value) {
    hub.publish(serde_json::from_value(event).unwrap());
}

fn token(command: &ClientCommand) -> String {
    match command {
        ClientCommand::RequestAnalysis { token, .. }
        | ClientCommand::RequestBaselineMatrix { token } => token.clone(),
        other => panic!("unexpected command {other:?}"),
    }
}

fn reply(hub: &Hub<ServerEvent>, token: String, payload: Value) {
    publish(hub, json!({"event": "reply", "data": {"token": token, "payload": payload}}));
}

fn stream_query_statistics(hub: &Hub<ServerEvent>) {
    publish(
        hub,
        json!({"event": "all_steerags", "data": [
            {"id": 1, "name": "Domain admin", "color": [200, 30, 30], "active": true}
        ]}),
    );
    publish(
        hub,
        json!({"event": "bundled_stats", "data": {
            "stat": {"iteration": 4, "hosts": {"0": 10, "1": 5, "2": 5},
                     "edges": {"0": {"1": 4}}},
            "steer": {"1": {"iteration": 4, "hosts": {"0": 2, "1": 8, "2": 0},
                            "edges": {"1": {"2": 6}}}}
        }}),
    );
}

#[test]
fn over_represented_host_drives_halo_matrix_and_selection() {
    let (hub, mut overview) = overview();
    stream_query_statistics(&hub);
    assert_eq!(overview.pump(), 2);

    let layer = overview.overlay().layer(1).unwrap();
    assert_eq!(layer.ratio(1), Some(2.0));
    assert_eq!(layer.hulls()[0].members, vec![1]);

    overview.request_matrix(1);
    let commands = overview.take_commands();
    assert_eq!(commands.len(), 2);
    reply(
        &hub,
        token(&commands[0]),
        json!({"iteration": 4, "counts": [[0, 1, 0], [2, 0, 8], [0, 1, 0]]}),
    );
    reply(
        &hub,
        token(&commands[1]),
        json!({"iteration": 4, "counts": [[0, 4, 2], [4, 0, 1], [2, 1, 0]]}),
    );
    overview.pump();

    let matrix = overview.matrix().unwrap();
    assert_eq!(matrix.options().mode, MatrixMode::Absolute);
    assert_eq!(matrix.view()[(1, 2)], 1.0);
    assert_eq!(overview.matrix_query(), Some(1));

    let selected = overview.select_top_hosts(1, 1);
    assert_eq!(selected, vec![1]);
    assert_eq!(overview.selection().ids(), vec![1]);
}

#[test]
fn stale_matrix_reply_does_not_replace_the_newer_pair() {
    let (hub, mut overview) = overview();
    overview.request_matrix(1);
    let first = overview.take_commands();
    overview.request_matrix(1);
    let second = overview.take_commands();

    let grid = json!({"iteration": 1, "counts": [[0, 1, 0], [1, 0, 0], [0, 0, 0]]});
    for command in &first {
        reply(&hub, token(command), grid.clone());
    }
    overview.pump();
    assert!(overview.matrix().is_none());

    reply(&hub, token(&second[0]), grid.clone());
    overview.pump();
    assert!(overview.matrix().is_none());

    reply(&hub, token(&second[1]), grid);
    overview.pump();
    assert_eq!(overview.matrix().unwrap().size(), 3);
}

#[test]
fn late_reply_never_replaces_the_rendered_matrix() {
    let (hub, mut overview) = overview();
    let answer = |hub: &Hub<ServerEvent>, commands: &[ClientCommand], grid: &Value| {
        for command in commands {
            reply(hub, token(command), grid.clone());
        }
    };

    overview.request_matrix(1);
    let rendered = json!({"iteration": 1, "counts": [[0, 4, 0], [0, 0, 2], [1, 0, 0]]});
    answer(&hub, &overview.take_commands(), &rendered);
    overview.pump();
    let shown_view = overview.matrix().unwrap().view().clone();
    let shown_revision = overview.matrix_raster().unwrap().revision;

    overview.request_matrix(1);
    let late = overview.take_commands();
    overview.request_matrix(1);
    let latest = overview.take_commands();

    answer(&hub, &late, &json!({"iteration": 2, "counts": [[0, 0, 9], [9, 0, 0], [0, 9, 0]]}));
    overview.pump();
    assert_eq!(overview.matrix().unwrap().view(), &shown_view);
    assert_eq!(overview.matrix_raster().unwrap().revision, shown_revision);
    assert!(overview.matrix_loading());

    answer(&hub, &latest, &json!({"iteration": 3, "counts": [[0, 0, 0], [5, 0, 0], [0, 0, 0]]}));
    overview.pump();
    assert!(!overview.matrix_loading());
    let view = overview.matrix().unwrap().view();
    assert_ne!(view, &shown_view);
    assert_eq!(view[(1, 0)], 1.0);
    assert_ne!(overview.matrix_raster().unwrap().revision, shown_revision);
}

#[test]
fn matrix_options_survive_a_refresh() {
    let (hub, mut overview) = overview();
    let relative = MatrixOptions {
        mode: MatrixMode::Relative,
        ..MatrixOptions::default()
    };
    overview.set_matrix_options(relative);

    overview.request_matrix(1);
    let grid = json!({"counts": [[0, 3, 1], [0, 0, 0], [1, 0, 0]]});
    for command in overview.take_commands() {
        reply(&hub, token(&command), grid.clone());
    }
    overview.pump();
    assert_eq!(overview.matrix().unwrap().options(), relative);
}

#[test]
fn zoomed_drag_moves_hosts_by_world_delta_and_undoes() {
    let (_hub, mut overview) = overview();
    overview.set_mode(InteractionMode::SelectionAndEditing);
    overview.select_hosts(&[0], &[]);
    overview.wheel(1000.0, pos2(0.0, 0.0));
    let scale = overview.camera().scale;
    assert!(scale > 1.0);

    overview.pointer_down(pos2(300.0, 300.0), PointerButton::Middle, false);
    overview.pointer_move(pos2(300.0 + 10.0 * scale, 300.0 + 10.0 * scale));
    overview.pointer_up(
        pos2(300.0 + 10.0 * scale, 300.0 + 10.0 * scale),
        PointerButton::Middle,
        false,
    );

    let moved = overview.model().position(0).unwrap();
    assert!((moved.x - 10.0).abs() < 1e-3);
    assert!((moved.y - 10.0).abs() < 1e-3);
    let link = LinkId::new(0, 1).unwrap();
    assert_eq!(overview.overlay().link_geometry(link).unwrap().start, moved);

    assert!(overview.undo_movement());
    assert_eq!(overview.model().position(0), Some(pos2(0.0, 0.0)));
    assert_eq!(
        overview.overlay().link_geometry(link).unwrap().start,
        pos2(0.0, 0.0)
    );
    assert!(!overview.can_undo());
}

#[test]
fn attack_path_reply_highlights_traversed_links() {
    let (hub, mut overview) = overview();
    stream_query_statistics(&hub);
    overview.pump();

    overview.request_attack_paths(1, &Default::default(), agvis::model::PathMetric::Likelihood, 10);
    let command = overview.take_commands().remove(0);
    reply(
        &hub,
        token(&command),
        json!([{"trace": "none@0#CVE-2024-1#user@1##user@1#CVE-2024-2#root@2", "likelihood": 0.3}]),
    );
    overview.pump();

    assert_eq!(overview.attack_paths(1).len(), 1);
    let highlight = overview.overlay().layer(1).unwrap().highlight().unwrap();
    assert!(highlight.links.contains(&LinkId::new(1, 2).unwrap()));
    assert_eq!(highlight.hosts.len(), 3);
}

#[test]
fn dropping_the_overview_releases_its_subscription() {
    let hub = Hub::new();
    let overview = Overview::new(parse_model(TRIANGLE).unwrap(), &hub, VisConfig::default());
    assert_eq!(hub.subscriber_count(), 1);
    drop(overview);
    assert_eq!(hub.subscriber_count(), 0);
}
