use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

mod config;
mod navigator;
mod origin;
mod output;
mod telemetry;

mod backfill;
mod ingest;
mod label;
mod navigate;
mod show;
mod stats;

use config::LabelerConfig;
use navigator::events::{AppSignal, EventBus};
use origin::{OriginApi, OriginClient};

#[derive(Parser)]
#[command(name = "labeler", about = "Feed labeling navigator CLI")]
struct Cli {
    /// Origin API base URL (overrides LABELER_BASE_URL)
    #[arg(global = true, long)]
    base_url: Option<String>,
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Stats(stats::StatsCmd),
    Show(show::ShowCmd),
    Ingest(ingest::IngestCmd),
    Sync(ingest::SyncCmd),
    Backfill(backfill::BackfillCmd),
    Label(label::LabelCmd),
    Navigate(navigate::NavigateCmd),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and LABELER_LOG_FORMAT
    telemetry::config::init_tracing();

    let cfg = LabelerConfig::from_env().with_base_url(cli.base_url);
    let client = OriginClient::new(cfg.origin()?).context("Failed to build origin HTTP client")?;
    let origin: Arc<dyn OriginApi> = Arc::new(client);
    // published by an embedding console; the CLI alone never locks a vault
    let signals: EventBus<AppSignal> = EventBus::default();

    match cli.command {
        Commands::Stats(args) => stats::run(origin, args).await?,
        Commands::Show(args) => show::run(origin, args).await?,
        Commands::Ingest(args) => ingest::run(origin, &cfg, args).await?,
        Commands::Sync(args) => ingest::run_sync(origin, &cfg, args).await?,
        Commands::Backfill(args) => backfill::run(origin, args).await?,
        Commands::Label(args) => label::run(origin, args).await?,
        Commands::Navigate(args) => navigate::run(origin, &cfg, &signals, args).await?,
    }

    Ok(())
}
