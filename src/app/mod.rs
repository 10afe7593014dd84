use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use agvis::Overview;
use agvis::backend::ServerEvent;
use agvis::config::VisConfig;
use agvis::matrix::SelectionSummary;
use agvis::model::{ModelStore, PathMetric, Query, QueryFilter, QueryId, load_model};
use agvis::observe::{Hub, Subscription};
use agvis::selection::SelectionSnapshot;
use anyhow::{Context as _, Result};
use eframe::egui::{self, Context, TextureHandle};
use tracing::{debug, error, info};

use self::connection::Connection;

mod connection;
mod graph;
mod matrix_view;
mod render_utils;
mod ui;

/// Everything the command line decided.
#[derive(Clone, Debug)]
pub struct Launch {
    pub model_path: PathBuf,
    pub backend: Option<String>,
    pub config_path: Option<PathBuf>,
}

pub struct AgvisApp {
    launch: Launch,
    state: AppState,
}

enum AppState {
    Loading { rx: Receiver<Result<Loaded, String>> },
    Ready(Box<Session>),
    Error(String),
}

struct Loaded {
    model: ModelStore,
    config: VisConfig,
    connection: Option<Connection>,
}

/// One open model and its live overview.
struct Session {
    hub: Hub<ServerEvent>,
    overview: Overview,
    connection: Option<Connection>,
    model_path: PathBuf,
    selection_events: Subscription<SelectionSnapshot>,
    query_events: Subscription<Vec<Query>>,
    selected_labels: Vec<String>,
    search: String,
    top_n: usize,
    path_query: Option<QueryId>,
    path_filter: QueryFilter,
    path_sort: PathMetric,
    path_limit: usize,
    new_query_name: String,
    new_query_steering: bool,
    renames: BTreeMap<QueryId, String>,
    needs_centering: bool,
    show_matrix: bool,
    matrix_texture: Option<(u64, TextureHandle)>,
    matrix_drag: Option<(usize, usize)>,
    matrix_summary: Option<SelectionSummary>,
}

fn load(launch: &Launch, ctx: Context) -> Result<Loaded> {
    let config = match &launch.config_path {
        Some(path) => VisConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VisConfig::default(),
    };
    let model = load_model(&launch.model_path)
        .with_context(|| format!("failed to load model {}", launch.model_path.display()))?;
    let connection = launch
        .backend
        .as_deref()
        .map(|address| Connection::open(address, ctx))
        .transpose()?;

    info!(
        hosts = model.host_count(),
        links = model.links().len(),
        backend = connection.is_some(),
        "model loaded"
    );
    Ok(Loaded {
        model,
        config,
        connection,
    })
}

impl AgvisApp {
    pub fn new(cc: &eframe::CreationContext<'_>, launch: Launch) -> Self {
        let state = Self::start_load(&launch, cc.egui_ctx.clone());
        Self { launch, state }
    }

    fn start_load(launch: &Launch, ctx: Context) -> AppState {
        let (tx, rx) = mpsc::channel();
        let launch = launch.clone();

        thread::spawn(move || {
            let repaint = ctx.clone();
            let result = load(&launch, ctx).map_err(|err| format!("{err:#}"));
            if let Err(message) = &result {
                error!(error = %message, "load failed");
            }
            let _ = tx.send(result);
            repaint.request_repaint();
        });

        AppState::Loading { rx }
    }
}

impl eframe::App for AgvisApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(loaded) => {
                            AppState::Ready(Box::new(Session::new(loaded, &self.launch)))
                        }
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading model...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to open the model");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.launch, ctx.clone()));
                    }
                });
            }
            AppState::Ready(session) => {
                let mut reload_requested = false;
                session.show(ctx, &mut reload_requested);
                if reload_requested {
                    transition = Some(Self::start_load(&self.launch, ctx.clone()));
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

impl Session {
    fn new(loaded: Loaded, launch: &Launch) -> Self {
        let hub = Hub::new();
        let mut overview = Overview::new(loaded.model, &hub, loaded.config);
        let selection_events = overview.subscribe_selection();
        let query_events = overview.subscribe_queries();
        if loaded.connection.is_some() {
            overview.request_host_positions();
        }

        Self {
            hub,
            overview,
            connection: loaded.connection,
            model_path: launch.model_path.clone(),
            selection_events,
            query_events,
            selected_labels: Vec::new(),
            search: String::new(),
            top_n: 5,
            path_query: None,
            path_filter: QueryFilter::default(),
            path_sort: PathMetric::Likelihood,
            path_limit: 50,
            new_query_name: String::new(),
            new_query_steering: true,
            renames: BTreeMap::new(),
            needs_centering: true,
            show_matrix: false,
            matrix_texture: None,
            matrix_drag: None,
            matrix_summary: None,
        }
    }

    /// Moves backend events into the overview and queued commands out.
    fn exchange(&mut self) {
        if let Some(connection) = self.connection.as_mut() {
            for event in connection.drain() {
                self.hub.publish(event);
            }
        }
        self.overview.pump();

        if let Some(snapshot) = self.selection_events.drain().pop() {
            let model = self.overview.model();
            self.selected_labels = snapshot
                .keys()
                .filter_map(|&id| model.host(id).map(|host| format!("{id}  {}", host.label())))
                .collect();
        }

        if let Some(queries) = self.query_events.drain().pop() {
            self.renames
                .retain(|id, _| queries.iter().any(|query| query.id == *id));
        }

        let commands = self.overview.take_commands();
        match self.connection.as_mut() {
            Some(connection) => {
                for command in commands {
                    connection.send(command);
                }
            }
            None if !commands.is_empty() => {
                debug!(count = commands.len(), "no backend; dropping commands");
            }
            None => {}
        }
    }

    fn show(&mut self, ctx: &Context, reload_requested: &mut bool) {
        self.exchange();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui, reload_requested));

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("queries")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| self.draw_queries(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_canvas(ui));

        if self.show_matrix {
            self.draw_matrix_window(ctx);
        }

        // Commands queued by this frame's input go out immediately.
        self.exchange();
    }
}
