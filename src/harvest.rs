//! Harvest orchestration.
//!
//! [`HarvestOrchestrator`] drives one repository through the pipeline:
//!
//! ```text
//! guard(in-flight) → idempotency → fetch → for kind in ontologies,
//!   controlled-vocabularies, schemas: clear → locate → load → extract →
//!   enrich → persist → switch → remove snapshot
//! ```
//!
//! Writes always target the non-published instance. Asset-level problems
//! are recorded in the run report and never stop the batch; fetch, locate,
//! and store failures end the run as `FAILED` without switching, leaving
//! the published instance untouched.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{HarvestSettings, RepositoryDef};
use crate::error::{ExtractError, HarvestError, LocateError, StoreError};
use crate::events::{LifecycleEvent, LifecyclePublisher};
use crate::extract::validation::{ValidationContext, ValidationMode, ValidationRecord};
use crate::extract::AssetLoader;
use crate::guard::InFlightRegistry;
use crate::instance::PublishedInstanceManager;
use crate::locator::AssetLocator;
use crate::models::{
    AssetFailure, AssetKind, AssetPathGroup, AssetValidation, HarvestReport, HarvestRequest, HarvestRun,
    HarvestStatus, Instance, SemanticAssetMetadata,
};
use crate::rdf::Graph;
use crate::snapshot::{RepositorySnapshotter, Snapshot};
use crate::store::{
    metadata_index, GraphKey, GraphStore, HarvestRunStore, InstanceSelector, RepositoryConfigStore,
    SearchDocument, SearchIndex, VocabularyDataIndex,
};
use crate::vocab_data::{read_records, vocabulary_index_name, VocabularyRecord};

/// The external stores a harvest reads and writes.
#[derive(Clone)]
pub struct HarvestStores {
    pub graph: Arc<dyn GraphStore>,
    pub search: Arc<dyn SearchIndex>,
    pub vocabularies: Arc<dyn VocabularyDataIndex>,
    pub config: Arc<dyn RepositoryConfigStore>,
    pub runs: Arc<dyn HarvestRunStore>,
    selectors: Vec<Arc<dyn InstanceSelector>>,
}

impl HarvestStores {
    pub fn new<G, S>(
        graph: Arc<G>,
        search: Arc<S>,
        vocabularies: Arc<dyn VocabularyDataIndex>,
        config: Arc<dyn RepositoryConfigStore>,
        runs: Arc<dyn HarvestRunStore>,
    ) -> Self
    where
        G: GraphStore + 'static,
        S: SearchIndex + 'static,
    {
        let selectors: Vec<Arc<dyn InstanceSelector>> = vec![
            graph.clone() as Arc<dyn InstanceSelector>,
            search.clone() as Arc<dyn InstanceSelector>,
        ];
        Self {
            graph,
            search,
            vocabularies,
            config,
            runs,
            selectors,
        }
    }

    /// Blue/green manager over these stores.
    pub fn instance_manager(&self) -> PublishedInstanceManager {
        PublishedInstanceManager::new(self.config.clone(), self.selectors.clone())
    }
}

/// An asset ready to persist.
struct PreparedAsset {
    metadata: SemanticAssetMetadata,
    graph: Graph,
    companion: Vec<VocabularyRecord>,
}

/// Outcome of the CPU-bound part of one asset.
struct Extraction {
    iri: Option<String>,
    record: ValidationRecord,
    prepared: Result<PreparedAsset, ExtractError>,
}

/// Load, extract, and enrich one group.
///
/// In accumulate mode an asset whose record holds errors is not prepared
/// for persistence; its record is still returned.
fn extract_asset(loader: &AssetLoader, group: &AssetPathGroup, mode: ValidationMode) -> Extraction {
    let mut ctx = ValidationContext::new(mode);
    let mut iri = None;

    let prepared = (|| -> Result<PreparedAsset, ExtractError> {
        let mut model = loader.load(group)?;
        iri = model.main_resource()?.lexical().map(str::to_string);
        let metadata = model.extract_metadata(&mut ctx)?;
        if let Some(first) = ctx.record().errors.first() {
            return Err(ExtractError::FieldValidation {
                field: first.field.clone(),
                message: format!(
                    "{} ({} validation error(s) in total)",
                    first.message,
                    ctx.record().errors.len()
                ),
            });
        }

        model.enrich()?;
        let companion = match (&group.companion, group.kind) {
            (Some(path), AssetKind::ControlledVocabulary) => read_records(path)?,
            _ => Vec::new(),
        };
        Ok(PreparedAsset {
            metadata,
            graph: model.into_graph(),
            companion,
        })
    })();

    Extraction {
        iri,
        record: ctx.into_record(),
        prepared,
    }
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Validate every asset of a local tree without touching any store.
pub fn validate_tree(
    locator: &AssetLocator,
    loader: &AssetLoader,
    root: &Path,
    kinds: &[AssetKind],
) -> Result<HarvestReport, LocateError> {
    let mut report = HarvestReport::default();
    for &kind in kinds {
        for group in locator.locate(root, kind)? {
            let path = display_path(root, &group.primary);
            let extraction = extract_asset(loader, &group, ValidationMode::Accumulate);
            if !extraction.record.is_empty() {
                report.validations.push(AssetValidation {
                    path: path.clone(),
                    iri: extraction.iri.clone(),
                    record: extraction.record,
                });
            }
            match extraction.prepared {
                Ok(_) => report.assets_harvested += 1,
                Err(e) => report.failures.push(AssetFailure {
                    path,
                    reason: e.to_string(),
                }),
            }
        }
    }
    Ok(report)
}

/// Store errors tolerated while clearing stale items.
fn tolerate_stale(target: &str, result: Result<(), StoreError>) -> Result<(), HarvestError> {
    match result {
        Ok(()) => Ok(()),
        Err(source) if source.is_unavailable() => Err(HarvestError::StoreClear {
            target: target.to_string(),
            source,
        }),
        Err(e) => {
            warn!(item = target, error = %e, "ignoring stale item clear failure");
            Ok(())
        }
    }
}

fn write_error(target: impl Into<String>) -> impl FnOnce(StoreError) -> HarvestError {
    let target = target.into();
    move |source| HarvestError::StoreWrite { target, source }
}

pub struct HarvestOrchestrator {
    settings: HarvestSettings,
    repositories: BTreeMap<String, RepositoryDef>,
    locator: AssetLocator,
    snapshotter: Arc<dyn RepositorySnapshotter>,
    stores: HarvestStores,
    instances: PublishedInstanceManager,
    events: Arc<dyn LifecyclePublisher>,
    in_flight: InFlightRegistry,
    workers: Arc<Semaphore>,
}

impl HarvestOrchestrator {
    pub fn new(
        settings: HarvestSettings,
        repositories: BTreeMap<String, RepositoryDef>,
        snapshotter: Arc<dyn RepositorySnapshotter>,
        stores: HarvestStores,
        events: Arc<dyn LifecyclePublisher>,
        in_flight: InFlightRegistry,
    ) -> Result<Self> {
        if settings.workers == 0 {
            anyhow::bail!("harvest.workers must be > 0");
        }
        let locator = AssetLocator::new(settings.ignore_obsolete_versions, &settings.skip_names)?;
        let instances = stores.instance_manager();
        let workers = Arc::new(Semaphore::new(settings.workers));
        Ok(Self {
            settings,
            repositories,
            locator,
            snapshotter,
            stores,
            instances,
            events,
            in_flight,
            workers,
        })
    }

    pub fn instances(&self) -> &PublishedInstanceManager {
        &self.instances
    }

    pub fn repository(&self, repo_id: &str) -> Result<&RepositoryDef, HarvestError> {
        self.repositories
            .get(repo_id)
            .ok_or_else(|| HarvestError::UnknownRepository(repo_id.to_string()))
    }

    /// Run a harvest to completion and return the finalized run.
    ///
    /// Only an unknown repository or an unreachable run history is
    /// returned as an error; every other outcome is a finalized run.
    #[instrument(skip(self, request), fields(repo = %request.repo_id, revision = ?request.revision))]
    pub async fn harvest(&self, request: HarvestRequest) -> Result<HarvestRun, HarvestError> {
        let repo = self.repository(&request.repo_id)?.clone();
        let run = HarvestRun::start(&request);
        self.stores.runs.insert(&run).await.map_err(HarvestError::RunStore)?;
        Ok(self.execute(run, repo, request.force).await)
    }

    /// Start a harvest in the background. Returns the run id immediately.
    pub async fn submit(self: &Arc<Self>, request: HarvestRequest) -> Result<Uuid, HarvestError> {
        let repo = self.repository(&request.repo_id)?.clone();
        let run = HarvestRun::start(&request);
        self.stores.runs.insert(&run).await.map_err(HarvestError::RunStore)?;

        let id = run.id;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.execute(run, repo, request.force).await;
        });
        debug!(run_id = %id, "harvest submitted");
        Ok(id)
    }

    pub async fn run_status(&self, run_id: Uuid) -> Result<Option<HarvestRun>, StoreError> {
        self.stores.runs.get(run_id).await
    }

    /// Re-apply the published instance to the store selectors.
    pub async fn reconcile(&self, repo_id: &str) -> Result<Instance, HarvestError> {
        let repo = self.repository(repo_id)?;
        self.instances
            .reconcile(repo_id, &repo.url)
            .await
            .map_err(HarvestError::Config)
    }

    #[instrument(skip_all, fields(run_id = %run.id, repo = %run.repo_id))]
    async fn execute(&self, run: HarvestRun, repo: RepositoryDef, force: bool) -> HarvestRun {
        let Some(_guard) = self.in_flight.try_acquire(&run.repo_id) else {
            let reason = format!("a harvest of {} is already running", run.repo_id);
            return self.finalize(run, HarvestStatus::AlreadyRunning, Some(reason)).await;
        };

        let _permit = match self.workers.acquire().await {
            Ok(permit) => permit,
            Err(e) => return self.finalize(run, HarvestStatus::Failed, Some(e.to_string())).await,
        };

        if !force {
            if let Some(revision) = run.revision.clone() {
                match self.previous_success(&run.repo_id, &revision).await {
                    Ok(Some(reason)) => return self.finalize(run, HarvestStatus::Unchanged, Some(reason)).await,
                    Ok(None) => {}
                    Err(e) => return self.finalize(run, HarvestStatus::Failed, Some(e.to_string())).await,
                }
            }
        }

        self.events.publish(&LifecycleEvent::started(&run));
        info!("harvest started");

        let mut run = run;
        let requested = run.revision.clone();
        let snapshot = match self.snapshotter.fetch(&repo, requested.as_deref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let e = HarvestError::from(e);
                return self.finalize(run, HarvestStatus::Failed, Some(e.to_string())).await;
            }
        };
        run.revision = Some(snapshot.revision.clone());
        debug!(revision = %snapshot.revision, path = %snapshot.path.display(), "snapshot ready");

        // A requested revision may be an alias of the resolved commit.
        let unchanged = if force || requested.as_deref() == Some(snapshot.revision.as_str()) {
            Ok(None)
        } else {
            self.previous_success(&run.repo_id, &snapshot.revision).await
        };

        let outcome = match unchanged {
            Ok(Some(reason)) => Ok(Some(reason)),
            Ok(None) => self.write_phase(&mut run, &repo, &snapshot).await.map(|_| None),
            Err(e) => Err(e),
        };

        if let Err(e) = self.snapshotter.remove(&snapshot).await {
            warn!(path = %snapshot.path.display(), error = %e, "failed to remove snapshot");
        }

        match outcome {
            Ok(Some(reason)) => self.finalize(run, HarvestStatus::Unchanged, Some(reason)).await,
            Ok(None) => {
                let reason = match run.report.asset_failures() {
                    0 => None,
                    n => Some(format!("{} asset(s) failed", n)),
                };
                self.finalize(run, HarvestStatus::Success, reason).await
            }
            Err(e) => {
                error!(error = %e, "harvest failed");
                self.finalize(run, HarvestStatus::Failed, Some(e.to_string())).await
            }
        }
    }

    async fn previous_success(&self, repo_id: &str, revision: &str) -> Result<Option<String>, HarvestError> {
        let previous = self
            .stores
            .runs
            .last_success(repo_id, revision)
            .await
            .map_err(HarvestError::RunStore)?;
        Ok(previous.map(|prev| format!("revision {} already harvested by run {}", revision, prev.id)))
    }

    async fn write_phase(
        &self,
        run: &mut HarvestRun,
        repo: &RepositoryDef,
        snapshot: &Snapshot,
    ) -> Result<(), HarvestError> {
        let blue_green = self
            .instances
            .blue_green_enabled(&run.repo_id, repo.blue_green)
            .await
            .map_err(HarvestError::Config)?;

        let target = if blue_green {
            if let Err(e) = self.instances.reconcile(&run.repo_id, &repo.url).await {
                warn!(error = %e, "selector reconcile failed");
            }
            Some(self.instances.write_target(&run.repo_id).await.map_err(HarvestError::Config)?)
        } else {
            None
        };
        run.report.write_target = target;
        info!(write_target = ?target, blue_green, "writing harvest");

        let mode = repo.validation.unwrap_or(self.settings.validation);
        let loader = AssetLoader::new(&snapshot.path, &repo.url, &self.settings.base_url);

        for kind in AssetKind::ALL {
            self.clear_destination(&repo.url, kind, target).await?;

            let groups = self.locator.locate(&snapshot.path, kind)?;
            info!(%kind, groups = groups.len(), "assets located");

            for group in groups {
                match self
                    .harvest_asset(&loader, &snapshot.path, group, mode, target, &mut run.report)
                    .await
                {
                    Ok(()) => run.report.assets_harvested += 1,
                    Err(e) if e.is_run_fatal() => return Err(e),
                    Err(_) => {}
                }
            }
        }

        if blue_green {
            let transition = self
                .instances
                .switch(&run.repo_id, &repo.url)
                .await
                .map_err(HarvestError::Switch)?;
            info!(old = %transition.old, new = %transition.new, "published instance switched");
        } else {
            self.instances
                .release(&repo.url)
                .await
                .map_err(HarvestError::Switch)?;
        }
        Ok(())
    }

    /// Remove the previous content of one kind from the write target.
    async fn clear_destination(
        &self,
        repo_url: &str,
        kind: AssetKind,
        target: Option<Instance>,
    ) -> Result<(), HarvestError> {
        let key = GraphKey::new(repo_url, kind, target);
        tolerate_stale(&key.to_string(), self.stores.graph.clear_named_graph(&key).await)?;

        let index = metadata_index(&self.settings.search_index_prefix, kind, target);
        if kind == AssetKind::ControlledVocabulary {
            let previous = match self.stores.search.find_by_repo_url(repo_url, &index).await {
                Ok(docs) => docs,
                Err(e) => {
                    tolerate_stale(&index, Err(e))?;
                    Vec::new()
                }
            };
            for doc in previous {
                if let Some(details) = doc.metadata.vocabulary() {
                    let data_index = vocabulary_index_name(details, target);
                    tolerate_stale(&data_index, self.stores.vocabularies.delete(&data_index).await)?;
                }
            }
        }

        let removed = match self.stores.search.delete_by_repo_url(repo_url, &index).await {
            Ok(n) => n,
            Err(e) => {
                tolerate_stale(&index, Err(e))?;
                0
            }
        };
        debug!(%kind, graph = %key, index = %index, removed, "destination cleared");
        Ok(())
    }

    async fn harvest_asset(
        &self,
        loader: &AssetLoader,
        root: &Path,
        group: AssetPathGroup,
        mode: ValidationMode,
        target: Option<Instance>,
        report: &mut HarvestReport,
    ) -> Result<(), HarvestError> {
        let path = display_path(root, &group.primary);
        let job_loader = loader.clone();
        let extraction = match tokio::task::spawn_blocking(move || extract_asset(&job_loader, &group, mode)).await {
            Ok(extraction) => extraction,
            Err(e) => Extraction {
                iri: None,
                record: ValidationRecord::default(),
                prepared: Err(ExtractError::Load {
                    path: path.clone(),
                    reason: format!("extraction task failed: {}", e),
                }),
            },
        };

        if !extraction.record.is_empty() {
            report.validations.push(AssetValidation {
                path: path.clone(),
                iri: extraction.iri.clone(),
                record: extraction.record,
            });
        }

        let prepared = match extraction.prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(path = %path, error = %e, "asset skipped");
                report.failures.push(AssetFailure {
                    path,
                    reason: e.to_string(),
                });
                return Err(HarvestError::Asset(e));
            }
        };

        self.persist(prepared, target).await?;
        debug!(path = %path, "asset stored");
        Ok(())
    }

    async fn persist(&self, asset: PreparedAsset, target: Option<Instance>) -> Result<(), HarvestError> {
        let kind = asset.metadata.kind();
        let key = GraphKey::new(&asset.metadata.repo_url, kind, target);
        self.stores
            .graph
            .save(&key, &asset.graph)
            .await
            .map_err(write_error(key.to_string()))?;

        let index = metadata_index(&self.settings.search_index_prefix, kind, target);
        self.stores
            .search
            .bulk_index(&[SearchDocument::from_metadata(&asset.metadata)], &index)
            .await
            .map_err(write_error(index.as_str()))?;

        if let Some(details) = asset.metadata.vocabulary() {
            if !asset.companion.is_empty() {
                let data_index = vocabulary_index_name(details, target);
                self.stores
                    .vocabularies
                    .bulk_index(&asset.companion, &data_index)
                    .await
                    .map_err(write_error(data_index.as_str()))?;
            }
        }
        Ok(())
    }

    async fn finalize(&self, run: HarvestRun, status: HarvestStatus, reason: Option<String>) -> HarvestRun {
        let run = run.finish(status, reason);
        if let Err(e) = self.stores.runs.update(&run).await {
            error!(error = %e, "failed to record harvest run");
        }
        self.events.publish(&LifecycleEvent::finished(&run));
        info!(
            status = run.status.as_str(),
            assets = run.report.assets_harvested,
            failures = run.report.asset_failures(),
            reason = ?run.reason,
            "harvest finished"
        );
        run
    }
}
