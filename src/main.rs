//! uma-monitor binary entrypoint.
//! Loads sites/outputs config, runs every search once and exits.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use uma_monitor::config::{load_document, OutputsConfig, SitesConfig};
use uma_monitor::notify::NotifierMux;
use uma_monitor::runner::{run, RunOptions};
use uma_monitor::source::SourceRegistry;
use uma_monitor::state::StateStore;

#[derive(Parser, Debug)]
#[command(name = "uma-monitor")]
#[command(about = "Post new or changed trainer profiles from configured searches")]
struct Cli {
    /// Sites/searches config (TOML or JSON)
    #[arg(long)]
    sites: PathBuf,
    /// Outputs config (TOML or JSON)
    #[arg(long)]
    outputs: PathBuf,
    /// Log posts instead of delivering them
    #[arg(long)]
    dry_run: bool,
    /// Save state even in dry-run mode
    #[arg(long)]
    persist_dry_run: bool,
    /// Override the state directory (default: $UMA_STATE_DIR/<repo>/<env>/state)
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

/// RUST_LOG picks the filter; LOG_FORMAT=json switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("uma_monitor=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn real_main(cli: Cli) -> Result<ExitCode> {
    let sites: SitesConfig = load_document(&cli.sites).context("sites config")?;
    let outputs: OutputsConfig = load_document(&cli.outputs).context("outputs config")?;
    let mux = NotifierMux::from_config(&outputs, cli.dry_run).context("outputs")?;
    if mux.is_empty() {
        tracing::warn!("no outputs configured; changes will be recorded but not posted");
    }

    let store = match cli.state_dir {
        Some(dir) => StateStore::new(dir),
        None => StateStore::from_env(),
    };
    tracing::info!(state_dir = %store.dir().display(), dry_run = cli.dry_run, "starting run");

    let opts = RunOptions {
        dry_run: cli.dry_run,
        persist_in_dry_run: cli.persist_dry_run,
        ..RunOptions::default()
    };
    let summary = run(&sites, &store, &SourceRegistry::with_builtins(), &mux, &opts).await;

    Ok(if summary.all_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match real_main(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run aborted");
            ExitCode::from(2)
        }
    }
}
