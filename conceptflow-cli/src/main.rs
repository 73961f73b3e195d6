//! Operator CLI for inspecting conceptflow processes and artifacts.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use conceptflow::config::OrchestratorConfig;
use conceptflow::core::PipelineStage;
use conceptflow::registry::ProcessRegistry;
use conceptflow::store::{ArtifactStore, FsArtifactStore};
use conceptflow::utils::validate_process_name;

#[derive(Parser)]
#[command(name = "conceptflow", version, about = "Inspect conceptflow processes and artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Orchestrator config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Artifact storage root, overrides the config file
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List processes found in the artifact store
    Processes,

    /// Show the stage status of one process, or of all of them
    Status {
        /// Process name
        #[arg(short, long)]
        process: Option<String>,
    },

    /// Print a stored artifact
    Show {
        /// Process name
        #[arg(short, long)]
        process: String,

        /// Stage name (data, embedding, clustering, graph)
        #[arg(long)]
        stage: PipelineStage,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => OrchestratorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };
    if let Some(storage) = cli.storage {
        config = config.with_storage_root(storage);
    }
    let store = FsArtifactStore::new(config.storage_root.clone());

    match cli.command {
        Commands::Processes => cmd_processes(&store).await?,
        Commands::Status { process } => cmd_status(&store, process.as_deref()).await?,
        Commands::Show { process, stage } => cmd_show(&store, &process, stage).await?,
    }

    Ok(())
}

async fn cmd_processes(store: &FsArtifactStore) -> anyhow::Result<()> {
    let mut listing = Vec::new();
    for name in store.list_processes().await? {
        let stages = store.stored_stages(&name).await?;
        listing.push(serde_json::json!({ "name": name, "stages": stages }));
    }
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

async fn cmd_status(store: &FsArtifactStore, process: Option<&str>) -> anyhow::Result<()> {
    let registry = ProcessRegistry::new();
    registry.rehydrate(store).await?;

    let output = match process {
        Some(name) => {
            let view = registry
                .snapshot(name)
                .with_context(|| format!("no stored artifacts for process '{name}'"))?;
            serde_json::to_string_pretty(&view)?
        }
        None => serde_json::to_string_pretty(&registry.list_all())?,
    };
    println!("{output}");
    Ok(())
}

async fn cmd_show(store: &FsArtifactStore, process: &str, stage: PipelineStage) -> anyhow::Result<()> {
    validate_process_name(process)?;
    let artifact = store
        .load(process, stage)
        .await
        .with_context(|| format!("loading '{stage}' artifact of '{process}'"))?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}
