//! # Semantic Harvester CLI (`harvester`)
//!
//! The `harvester` binary drives harvests of semantic asset repositories
//! into the local SQLite-backed catalog stores and manages their
//! blue/green publication.
//!
//! ## Usage
//!
//! ```bash
//! harvester --config ./config/harvester.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvester init` | Create the SQLite database and schema |
//! | `harvester repos` | List configured repositories and their published instance |
//! | `harvester harvest <repo>` | Harvest one repository and print the finalized run |
//! | `harvester status <run-id>` | Print a recorded run |
//! | `harvester history <repo>` | List recent runs of a repository |
//! | `harvester locate <path>` | Print the file groups found under a local tree |
//! | `harvester validate <path>` | Report validation problems of a local tree |
//! | `harvester instance <action> <repo>` | Show, switch, or roll back the published instance |
//!
//! Logging is controlled by `RUST_LOG` (default `info`) and written to
//! stderr; stdout carries only command output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use semantic_harvester::commands::{self, InstanceAction};
use semantic_harvester::config;
use semantic_harvester::events::EventMode;
use semantic_harvester::migrate;
use semantic_harvester::models::{AssetKind, HarvestRequest};

/// Semantic Harvester CLI: harvests ontologies, controlled vocabularies,
/// and schemas from repositories into blue/green catalog stores.
#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Harvest semantic assets from repositories into blue/green catalog stores",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvester.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// List configured repositories with their published instance.
    Repos,

    /// Harvest one repository.
    ///
    /// Fetches the repository, writes every asset into the non-published
    /// instance, and publishes it when the run succeeds.
    Harvest {
        /// Repository id as configured under `[repositories.<id>]`.
        repo: String,

        /// Revision to harvest. Defaults to the branch head.
        #[arg(long)]
        revision: Option<String>,

        /// Harvest even if this revision was already harvested.
        #[arg(long)]
        force: bool,

        /// Who triggered the harvest, recorded on the run.
        #[arg(long)]
        actor: Option<String>,

        /// Correlation id of the triggering request, echoed on events.
        #[arg(long)]
        correlation_id: Option<Uuid>,

        /// Lifecycle event output: `off`, `log`, or `json`.
        /// Defaults to `log` on a TTY, `json` otherwise.
        #[arg(long)]
        events: Option<EventMode>,
    },

    /// Print a recorded harvest run as JSON.
    Status {
        /// Run UUID.
        id: String,
    },

    /// List recent harvest runs of a repository.
    History {
        repo: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the asset file groups found under a local directory.
    Locate {
        path: PathBuf,

        /// Restrict to one kind: `ontology`, `vocabulary`, or `schema`.
        #[arg(long)]
        kind: Option<AssetKind>,

        /// Keep obsolete version directories.
        #[arg(long)]
        all_versions: bool,
    },

    /// Extract every asset under a local directory and report problems.
    ///
    /// Runs in accumulate mode so every field issue is listed. Exits
    /// non-zero when any asset fails.
    Validate {
        path: PathBuf,

        #[arg(long)]
        kind: Option<AssetKind>,

        /// Repository URL recorded in the extracted metadata.
        #[arg(long)]
        repo_url: Option<String>,
    },

    /// Manage the published instance of a repository.
    Instance {
        #[command(subcommand)]
        action: InstanceCommand,
    },
}

#[derive(Subcommand)]
enum InstanceCommand {
    /// Print the published instance.
    Current { repo: String },
    /// Publish the other instance.
    Switch { repo: String },
    /// Re-publish the instance that was current before the last switch.
    Rollback { repo: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that fall back to defaults when no config file exists
    match &cli.command {
        Commands::Locate {
            path,
            kind,
            all_versions,
        } => {
            let cfg = config::load_optional_config(&cli.config)?;
            return commands::run_locate(cfg.as_ref(), path, *kind, *all_versions);
        }
        Commands::Validate {
            path,
            kind,
            repo_url,
        } => {
            let cfg = config::load_optional_config(&cli.config)?;
            return commands::run_validate(cfg.as_ref(), path, *kind, repo_url.as_deref());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Repos => {
            commands::list_repositories(&cfg).await?;
        }
        Commands::Harvest {
            repo,
            revision,
            force,
            actor,
            correlation_id,
            events,
        } => {
            let mut request = HarvestRequest::new(repo).force(force);
            request.revision = revision;
            request.actor = actor;
            request.correlation_id = correlation_id;
            let events = events.unwrap_or_else(EventMode::default_for_tty);
            commands::run_harvest(&cfg, request, events).await?;
        }
        Commands::Status { id } => {
            commands::run_status(&cfg, &id).await?;
        }
        Commands::History { repo, limit } => {
            commands::run_history(&cfg, &repo, limit).await?;
        }
        Commands::Instance { action } => {
            let (repo, action) = match action {
                InstanceCommand::Current { repo } => (repo, InstanceAction::Current),
                InstanceCommand::Switch { repo } => (repo, InstanceAction::Switch),
                InstanceCommand::Rollback { repo } => (repo, InstanceAction::Rollback),
            };
            commands::run_instance(&cfg, &repo, action).await?;
        }
        Commands::Locate { .. } | Commands::Validate { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
