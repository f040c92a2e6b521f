use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prdca::annotator::dbcan::DbcanTool;
use prdca::config::ServiceConfig;
use prdca::workspace::ProvenanceAction;
use prdca::workspace::client::WorkspaceClient;
use prdca::{CallContext, DbcanParams, DbcanService};

const TOKEN_ENV: &str = "KB_AUTH_TOKEN";

#[derive(Parser)]
#[command(
    name = "prdca",
    version,
    about = "Annotate CAZymes in a KBase genome with dbCAN."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Deployment config (TOML). Defaults to $KB_DEPLOYMENT_CONFIG.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run dbCAN on a genome and save a report to its workspace
    Run(RunArgs),
    /// Print service status
    Status,
}

#[derive(Args)]
struct RunArgs {
    /// Workspace holding the genome; the report is saved here too
    #[arg(short, long)]
    workspace: Option<String>,

    /// Genome object name or id
    #[arg(short, long)]
    genome_id: Option<String>,

    /// JSON file with {"workspace", "genome_id"}; flags override its values
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// JSON file with the provenance actions to extend
    #[arg(long)]
    provenance: Option<PathBuf>,

    /// Workspace auth token. Defaults to $KB_AUTH_TOKEN.
    #[arg(short, long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(
        ServiceConfig::load(cli.config.as_deref()).context("failed to load configuration")?,
    );

    match cli.command {
        Command::Status => {
            let service = build_service(config, None);
            println!("{}", serde_json::to_string_pretty(&service.status())?);
        }
        Command::Run(args) => {
            let params = run_params(&args)?;
            let ctx = CallContext {
                provenance: match &args.provenance {
                    Some(path) => read_json::<Vec<ProvenanceAction>>(path)?,
                    None => Vec::new(),
                },
            };
            let token = args
                .token
                .clone()
                .or_else(|| std::env::var(TOKEN_ENV).ok());
            let service = build_service(config, token);
            // The message already embeds its causes; avoid anyhow repeating them.
            let results = service
                .run_dbcan(&ctx, &params)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}

fn build_service(config: Arc<ServiceConfig>, token: Option<String>) -> DbcanService {
    let store = Arc::new(WorkspaceClient::new(config.workspace_url.clone(), token));
    let annotator = Arc::new(DbcanTool::new(config.dbcan()));
    DbcanService::new(config, store, annotator)
}

fn run_params(args: &RunArgs) -> anyhow::Result<DbcanParams> {
    let mut params = match &args.params {
        Some(path) => read_json::<DbcanParams>(path)?,
        None => DbcanParams::default(),
    };
    if args.workspace.is_some() {
        params.workspace = args.workspace.clone();
    }
    if args.genome_id.is_some() {
        params.genome_id = args.genome_id.clone();
    }
    Ok(params)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
