#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;

use std::path::PathBuf;

use clap::Parser;
use icicle::{ChartSettings, Error};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Browse disk usage as an icicle chart.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Folder to scan on start-up.
    path: Option<PathBuf>,

    /// Chart settings (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// More logging; repeat for more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> icicle::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => ChartSettings::load(path)?,
        None => ChartSettings::default(),
    };

    let vp = eframe::egui::ViewportBuilder::default()
        .with_title("Icicle")
        .with_inner_size([1024.0, 700.0])
        .with_min_inner_size([400.0, 300.0]);

    let options = eframe::NativeOptions {
        viewport: vp,
        ..Default::default()
    };

    eframe::run_native(
        "Icicle",
        options,
        Box::new(move |cc| Ok(Box::new(app::IcicleApp::new(cc, &settings, cli.path)))),
    )
    .map_err(|e| Error::Ui(e.to_string()))
}
