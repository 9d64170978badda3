mod api;
mod app;
mod config;
mod error;
mod intake;
mod retry;
mod session;
mod upload;

use api::HttpApi;
use app::IntakeApp;
use clap::Parser;
use config::IntakeConfig;
use intake::IntakeController;
use session::JsonFileStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Desktop client that collects files and folders and uploads them to the intake server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "INTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL, overriding the configuration file
    #[arg(short, long, env = "INTAKE_SERVER")]
    server: Option<String>,

    /// Where the session is kept between restarts
    #[arg(long)]
    session_file: Option<PathBuf>,
}

fn load_config(args: &Args) -> error::Result<IntakeConfig> {
    let mut config = match &args.config {
        Some(path) => IntakeConfig::from_file(path)?,
        None => IntakeConfig::default(),
    };
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    if let Some(session_file) = &args.session_file {
        config.session_file = session_file.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let store = JsonFileStore::open(&config.session_file)?;
    let api = Arc::new(HttpApi::new(&config)?);
    info!(
        server = %config.server_url,
        session = %store.path().display(),
        "configuration loaded"
    );

    let controller =
        IntakeController::new(config, api, Box::new(store), runtime.handle().clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([640.0, 760.0])
            .with_min_inner_size([420.0, 520.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Document Intake",
        options,
        Box::new(move |cc| Box::new(IntakeApp::new(cc, controller, runtime))),
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,doc_intake=info")),
        )
        .init();

    if let Err(e) = run(Args::parse()) {
        error!(error = %e, "intake client failed");
        std::process::exit(1);
    }
}
