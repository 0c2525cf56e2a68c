//! vinaflow: dock every ligand-receptor pair in a CSV with AutoDock Vina.
//! Entry point for the binary.

mod config;
mod prompts;
mod report;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vinaflow_common::{SandboxClient, VinaflowError};
use vinaflow_molecules::convert::ExternalConverter;
use vinaflow_molecules::preflight::{ToolCommand, Toolchain};
use vinaflow_molecules::sources::{AlphaFoldClient, PubChemClient};
use vinaflow_molecules::store::StructureStore;
use vinaflow_molecules::{DockingPipeline, PairTable, VinaRunner, WorkspaceLayout};

#[derive(Debug, Parser)]
#[command(name = "vinaflow", version, about = "Batch ligand-receptor docking with AutoDock Vina")]
struct Cli {
    /// Path to vinaflow.toml (overrides VINAFLOW_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV with `receptor` and `ligand` columns
    #[arg(long)]
    pairs: Option<PathBuf>,

    /// Accept configured values without prompting
    #[arg(long, short = 'y')]
    yes: bool,
}

/// Exit status when the run could not even start (missing tool, bad config).
const EXIT_ENVIRONMENT: i32 = 2;
/// Exit status for any other abort.
const EXIT_FAILURE: i32 = 1;

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<VinaflowError>() {
        Some(e) if e.is_fatal() => EXIT_ENVIRONMENT,
        _ => EXIT_FAILURE,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vinaflow=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("vinaflow {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        let code = exit_code(&e);
        if code == EXIT_ENVIRONMENT {
            error!("Aborted before docking any pair: {:#}", e);
        } else {
            error!("Run failed: {:#}", e);
        }
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config {
        Some(ref path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    let inputs = if cli.yes {
        prompts::from_config(&config, cli.pairs)?
    } else {
        prompts::interactive(&config, cli.pairs)?
    };
    inputs.params.validate()?;

    // ── Bootstrap: every tool must resolve before any pair is touched ──────
    let toolchain = Toolchain {
        vina: ToolCommand::parse(&inputs.vina)?,
        obabel: ToolCommand::parse(&config.tools.obabel)?,
        prepare_receptor: ToolCommand::parse(&config.tools.prepare_receptor)?,
    }
    .verify()?;

    let table = PairTable::from_path(&inputs.pairs_csv)?;
    if table.is_empty() {
        warn!("No valid pairs in {}", inputs.pairs_csv.display());
    }

    let client = SandboxClient::with_timeout(Duration::from_secs(config.network.timeout_secs))?;
    let layout = WorkspaceLayout::new(&inputs.output_dir);
    let store = StructureStore::new(
        layout.clone(),
        Arc::new(PubChemClient::new(client.clone())),
        Arc::new(AlphaFoldClient::new(client).with_model_version(config.network.alphafold_version)),
        Arc::new(ExternalConverter::new(
            toolchain.obabel.clone(),
            toolchain.prepare_receptor.clone(),
        )),
    );
    let engine = Arc::new(VinaRunner::new(toolchain.vina.clone()));

    let (tx, rx) = broadcast::channel(256);
    let pipeline = DockingPipeline::new(layout, Arc::new(store), engine, inputs.params, inputs.workers)
        .with_progress(tx);
    let progress = report::spawn_progress(rx, table.pairs.len());

    let outcome = pipeline.run(&table).await;
    // dropping the pipeline closes the progress channel
    drop(pipeline);
    report::finish_progress(progress).await;

    let report = outcome?;
    report::print_summary(&report);
    Ok(())
}
