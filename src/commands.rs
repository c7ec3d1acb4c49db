//! CLI entry points for the `harvester` binary.
//!
//! Each `run_*` function backs one subcommand, opens the SQLite stores it
//! needs, and prints its result to stdout. Logs and events go to stderr.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::events::{EventMode, LifecyclePublisher};
use crate::extract::AssetLoader;
use crate::guard::InFlightRegistry;
use crate::harvest::{validate_tree, HarvestOrchestrator, HarvestStores};
use crate::instance::PublishedInstanceManager;
use crate::locator::AssetLocator;
use crate::migrate;
use crate::models::{AssetKind, HarvestRequest, HarvestStatus};
use crate::snapshot::AutoSnapshotter;
use crate::store::sqlite::{
    SqliteGraphStore, SqliteRepositoryConfig, SqliteRunStore, SqliteSearchIndex, SqliteVocabularyDataIndex,
};
use crate::store::HarvestRunStore;

/// Open the SQLite-backed stores, creating the schema if needed.
pub async fn open_stores(config: &Config) -> Result<(SqlitePool, HarvestStores)> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let stores = HarvestStores::new(
        Arc::new(SqliteGraphStore::new(pool.clone())),
        Arc::new(SqliteSearchIndex::new(pool.clone())),
        Arc::new(SqliteVocabularyDataIndex::new(pool.clone())),
        Arc::new(SqliteRepositoryConfig::new(pool.clone())),
        Arc::new(SqliteRunStore::new(pool.clone())),
    );
    Ok((pool, stores))
}

fn repository_url<'a>(config: &'a Config, repo_id: &str) -> Result<&'a str> {
    match config.repository(repo_id) {
        Some(repo) => Ok(&repo.url),
        None => bail!("unknown repository '{}'", repo_id),
    }
}

pub async fn run_harvest(
    config: &Config,
    request: HarvestRequest,
    events: EventMode,
) -> Result<()> {
    let (pool, stores) = open_stores(config).await?;
    let publisher: Arc<dyn LifecyclePublisher> = Arc::from(events.publisher());
    let orchestrator = HarvestOrchestrator::new(
        config.harvest.clone(),
        config.repositories.clone(),
        Arc::new(AutoSnapshotter::new(&config.harvest.workdir)),
        stores,
        publisher,
        InFlightRegistry::new(),
    )?;

    let run = orchestrator.harvest(request).await?;
    pool.close().await;

    println!("{}", serde_json::to_string_pretty(&run)?);
    if run.status == HarvestStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn run_status(config: &Config, id: &str) -> Result<()> {
    let id = Uuid::parse_str(id).with_context(|| format!("invalid run id: {}", id))?;
    let (pool, stores) = open_stores(config).await?;
    let run = stores.runs.get(id).await?;
    pool.close().await;

    match run {
        Some(run) => {
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
        None => {
            eprintln!("Error: run not found: {}", id);
            std::process::exit(1);
        }
    }
}

/// Print the harvest history of one repository, newest first.
pub async fn run_history(config: &Config, repo_id: &str, limit: usize) -> Result<()> {
    repository_url(config, repo_id)?;
    let (pool, stores) = open_stores(config).await?;
    let runs = stores.runs.list(repo_id, limit).await?;
    pool.close().await;

    println!("{:<38} {:<16} {:<26} REVISION", "RUN", "STATUS", "STARTED");
    for run in runs {
        println!(
            "{:<38} {:<16} {:<26} {}",
            run.id,
            run.status.as_str(),
            run.started_at.format("%Y-%m-%dT%H:%M:%SZ"),
            run.revision.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn kinds(kind: Option<AssetKind>) -> Vec<AssetKind> {
    match kind {
        Some(kind) => vec![kind],
        None => AssetKind::ALL.to_vec(),
    }
}

pub fn run_locate(config: Option<&Config>, root: &Path, kind: Option<AssetKind>, all_versions: bool) -> Result<()> {
    let skip = config
        .map(|c| c.harvest.skip_names.clone())
        .unwrap_or_else(crate::locator::default_skip_names);
    let locator = AssetLocator::new(!all_versions, &skip)?;

    for kind in kinds(kind) {
        for group in locator.locate(root, kind)? {
            let primary = group.primary.strip_prefix(root).unwrap_or(&group.primary);
            match &group.companion {
                Some(companion) => println!(
                    "{}\t{}\t{}",
                    kind,
                    primary.display(),
                    companion.strip_prefix(root).unwrap_or(companion).display()
                ),
                None => println!("{}\t{}", kind, primary.display()),
            }
        }
    }
    Ok(())
}

pub fn run_validate(
    config: Option<&Config>,
    root: &Path,
    kind: Option<AssetKind>,
    repo_url: Option<&str>,
) -> Result<()> {
    let (skip, obsolete, base_url) = match config {
        Some(c) => (
            c.harvest.skip_names.clone(),
            c.harvest.ignore_obsolete_versions,
            c.harvest.base_url.clone(),
        ),
        None => (
            crate::locator::default_skip_names(),
            true,
            "http://localhost".to_string(),
        ),
    };
    let locator = AssetLocator::new(obsolete, &skip)?;
    let repo_url = repo_url
        .map(str::to_string)
        .unwrap_or_else(|| format!("file://{}", root.display()));
    let loader = AssetLoader::new(root, &repo_url, &base_url);

    let report = validate_tree(&locator, &loader, root, &kinds(kind))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

/// Instance management actions.
#[derive(Debug, Clone, Copy)]
pub enum InstanceAction {
    Current,
    Switch,
    Rollback,
}

pub async fn run_instance(config: &Config, repo_id: &str, action: InstanceAction) -> Result<()> {
    let repo_url = repository_url(config, repo_id)?;
    let (pool, stores) = open_stores(config).await?;
    let instances: PublishedInstanceManager = stores.instance_manager();

    match action {
        InstanceAction::Current => {
            let current = instances.current(repo_id).await?;
            println!("{}", current);
        }
        InstanceAction::Switch => {
            let t = instances.switch(repo_id, repo_url).await?;
            println!("{} -> {}", t.old, t.new);
            if !t.selectors_synced {
                eprintln!("warning: store selectors not updated; they follow on the next harvest");
            }
        }
        InstanceAction::Rollback => {
            let t = instances.rollback(repo_id, repo_url).await?;
            println!("{} -> {}", t.old, t.new);
        }
    }

    pool.close().await;
    Ok(())
}

/// List configured repositories with their published instance.
pub async fn list_repositories(config: &Config) -> Result<()> {
    let (pool, stores) = open_stores(config).await?;
    let instances = stores.instance_manager();

    println!("{:<20} {:<10} {:<11} URL", "REPOSITORY", "INSTANCE", "BLUE/GREEN");
    for (id, repo) in &config.repositories {
        let blue_green = instances.blue_green_enabled(id, repo.blue_green).await?;
        let published = if blue_green {
            instances.current(id).await?.to_string()
        } else {
            "-".to_string()
        };
        println!("{:<20} {:<10} {:<11} {}", id, published, blue_green, repo.url);
    }

    pool.close().await;
    Ok(())
}
