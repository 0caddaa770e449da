//! `smartdak`: stage, validate and commit DAK edits against a local checkout
//! or a GitHub repository.

mod commands;
mod display;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use smartdak_core::{ComponentKind, DEFAULT_BRANCH, RepoContext};
use smartdak_store::{FileStorage, StorageBackend};
use smartdak_sync::{GitHubClient, LocalRepository, RepositoryApi, ResolverConfig};
use smartdak_workbench::DakFactory;

#[derive(Parser)]
#[command(name = "smartdak", version)]
#[command(about = "Author SMART Guidelines DAKs: stage edits, validate, commit")]
struct Cli {
    /// Repository checkout
    #[arg(short, long, env = "SMARTDAK_DIR", default_value = ".")]
    dir: PathBuf,

    /// Branch the staging area belongs to
    #[arg(short, long, env = "SMARTDAK_BRANCH", default_value = DEFAULT_BRANCH)]
    branch: String,

    /// Where staged edits are kept (default: <dir>/.smartdak)
    #[arg(long, env = "SMARTDAK_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Work against a GitHub repository (`owner/repo`) instead of the checkout
    #[arg(long, value_name = "OWNER/REPO")]
    github: Option<String>,

    /// GitHub token for `--github`
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate committed plus staged files
    Validate {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what is staged
    Status,
    /// Stage a file from disk
    Stage {
        /// Repository path to stage, e.g. input/process/anc.bpmn
        path: String,
        /// Read content from this file instead of <dir>/<path>
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Drop one staged file
    Unstage { path: String },
    /// Drop every staged file
    Discard,
    /// Validate and push staged files
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Resolve the components of one kind listed in dak.json
    Resolve {
        /// Manifest key, e.g. businessProcesses
        #[arg(value_parser = parse_kind)]
        kind: ComponentKind,
        #[arg(long)]
        id: Option<String>,
    },
    /// List validation rules
    Rules,
}

fn parse_kind(value: &str) -> Result<ComponentKind, String> {
    ComponentKind::from_manifest_key(value).ok_or_else(|| {
        let keys: Vec<_> = ComponentKind::ALL.iter().map(|k| k.manifest_key()).collect();
        format!("unknown component kind `{value}` (expected one of {})", keys.join(", "))
    })
}

/// Repository, storage and branch for one invocation.
pub(crate) struct Session {
    pub factory: DakFactory,
    pub ctx: RepoContext,
    pub dir: PathBuf,
}

impl Session {
    async fn open(cli: &Cli) -> anyhow::Result<Self> {
        let (repository, ctx): (Arc<dyn RepositoryApi>, RepoContext) = match &cli.github {
            Some(slug) => {
                let Some((owner, repo)) = slug.split_once('/') else {
                    bail!("--github expects owner/repo, got `{slug}`");
                };
                let client = GitHubClient::new(cli.token.clone());
                (Arc::new(client), RepoContext::new(owner, repo, &cli.branch))
            }
            None => {
                let name = cli
                    .dir
                    .canonicalize()
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                    .unwrap_or_else(|| "checkout".into());
                (
                    Arc::new(LocalRepository::new(&cli.dir)),
                    RepoContext::new("local", name, &cli.branch),
                )
            }
        };

        let state_dir = cli
            .state_dir
            .clone()
            .unwrap_or_else(|| cli.dir.join(".smartdak"));
        let storage: Arc<dyn StorageBackend> = Arc::new(
            FileStorage::open(&state_dir)
                .await
                .with_context(|| format!("opening state directory {}", state_dir.display()))?,
        );

        let factory = DakFactory::with_config(repository, storage, ResolverConfig::from_env());
        Ok(Self {
            factory,
            ctx,
            dir: cli.dir.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("smartdak v{}", env!("CARGO_PKG_VERSION"));

    if let Command::Rules = cli.command {
        commands::rules();
        return Ok(ExitCode::SUCCESS);
    }

    let session = Session::open(&cli).await?;
    match cli.command {
        Command::Validate { json } => commands::validate(&session, json).await,
        Command::Status => commands::status(&session).await,
        Command::Stage { path, from } => commands::stage(&session, &path, from).await,
        Command::Unstage { path } => commands::unstage(&session, &path).await,
        Command::Discard => commands::discard(&session).await,
        Command::Commit { message } => commands::commit(&session, &message).await,
        Command::Resolve { kind, id } => commands::resolve(&session, kind, id.as_deref()).await,
        Command::Rules => Ok(ExitCode::SUCCESS),
    }
}
