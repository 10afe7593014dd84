mod app;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Model JSON with hosts, positions and edges.
    #[arg(long)]
    model: PathBuf,
    /// Path-generation backend, as `host:port`.
    #[arg(long)]
    backend: Option<String>,
    /// Optional JSON file overriding visualization constants.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agvis=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    let launch = app::Launch {
        model_path: args.model,
        backend: args.backend,
        config_path: args.config,
    };
    eframe::run_native(
        "agvis",
        options,
        Box::new(move |cc| Ok(Box::new(app::AgvisApp::new(cc, launch)))),
    )
}
