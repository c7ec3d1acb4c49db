//! In-memory store implementations for tests and embedding.
//!
//! Everything lives in `HashMap`s behind `std::sync::RwLock`. Each store
//! can be switched to an unavailable state to simulate an outage; while
//! unavailable every operation fails with [`StoreError::Unavailable`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{HarvestRun, HarvestStatus, Instance};
use crate::rdf::{Graph, Triple, TriplePattern};
use crate::vocab_data::VocabularyRecord;

use super::{
    GraphKey, GraphStore, HarvestRunStore, InstanceSelector, RepositoryConfigStore, SearchDocument,
    SearchIndex, VocabularyDataIndex,
};

/// Outage switch shared by the in-memory stores.
#[derive(Debug)]
struct Availability(AtomicBool);

impl Default for Availability {
    fn default() -> Self {
        Self(AtomicBool::new(true))
    }
}

impl Availability {
    fn check(&self, store: &str) -> Result<(), StoreError> {
        if self.0.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("{} is offline", store)))
        }
    }

    fn set(&self, available: bool) {
        self.0.store(available, Ordering::SeqCst);
    }
}

/// In-memory named-graph store.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graphs: RwLock<HashMap<String, Graph>>,
    selectors: RwLock<HashMap<String, Instance>>,
    availability: Availability,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.availability.set(available);
    }

    /// Copy of a named graph, empty when absent.
    pub fn graph(&self, key: &GraphKey) -> Graph {
        self.graphs
            .read()
            .unwrap()
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl InstanceSelector for MemoryGraphStore {
    async fn point_to(&self, repo_url: &str, instance: Instance) -> Result<(), StoreError> {
        self.availability.check("graph store")?;
        self.selectors
            .write()
            .unwrap()
            .insert(repo_url.to_string(), instance);
        Ok(())
    }

    async fn selected(&self, repo_url: &str) -> Result<Option<Instance>, StoreError> {
        self.availability.check("graph store")?;
        Ok(self.selectors.read().unwrap().get(repo_url).copied())
    }

    async fn release(&self, repo_url: &str) -> Result<(), StoreError> {
        self.availability.check("graph store")?;
        self.selectors.write().unwrap().remove(repo_url);
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn save(&self, key: &GraphKey, graph: &Graph) -> Result<(), StoreError> {
        self.availability.check("graph store")?;
        let mut graphs = self.graphs.write().unwrap();
        graphs
            .entry(key.to_string())
            .or_default()
            .extend(graph.clone());
        Ok(())
    }

    async fn clear_named_graph(&self, key: &GraphKey) -> Result<(), StoreError> {
        self.availability.check("graph store")?;
        self.graphs.write().unwrap().remove(&key.to_string());
        Ok(())
    }

    async fn select(&self, key: &GraphKey, pattern: &TriplePattern) -> Result<Vec<Triple>, StoreError> {
        self.availability.check("graph store")?;
        let graphs = self.graphs.read().unwrap();
        Ok(graphs
            .get(&key.to_string())
            .map(|g| g.iter().filter(|t| t.matches(pattern)).cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory search index.
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    indices: RwLock<HashMap<String, BTreeMap<String, SearchDocument>>>,
    selectors: RwLock<HashMap<String, Instance>>,
    availability: Availability,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.availability.set(available);
    }
}

#[async_trait]
impl InstanceSelector for MemorySearchIndex {
    async fn point_to(&self, repo_url: &str, instance: Instance) -> Result<(), StoreError> {
        self.availability.check("search index")?;
        self.selectors
            .write()
            .unwrap()
            .insert(repo_url.to_string(), instance);
        Ok(())
    }

    async fn selected(&self, repo_url: &str) -> Result<Option<Instance>, StoreError> {
        self.availability.check("search index")?;
        Ok(self.selectors.read().unwrap().get(repo_url).copied())
    }

    async fn release(&self, repo_url: &str) -> Result<(), StoreError> {
        self.availability.check("search index")?;
        self.selectors.write().unwrap().remove(repo_url);
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn bulk_index(&self, items: &[SearchDocument], index: &str) -> Result<(), StoreError> {
        self.availability.check("search index")?;
        let mut indices = self.indices.write().unwrap();
        let docs = indices.entry(index.to_string()).or_default();
        for item in items {
            docs.insert(item.id.clone(), item.clone());
        }
        Ok(())
    }

    async fn delete_by_repo_url(&self, repo_url: &str, index: &str) -> Result<u64, StoreError> {
        self.availability.check("search index")?;
        let mut indices = self.indices.write().unwrap();
        let Some(docs) = indices.get_mut(index) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, d| d.repo_url != repo_url);
        Ok((before - docs.len()) as u64)
    }

    async fn find_by_repo_url(&self, repo_url: &str, index: &str) -> Result<Vec<SearchDocument>, StoreError> {
        self.availability.check("search index")?;
        let indices = self.indices.read().unwrap();
        Ok(indices
            .get(index)
            .map(|docs| {
                docs.values()
                    .filter(|d| d.repo_url == repo_url)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, id: &str, index: &str) -> Result<Option<SearchDocument>, StoreError> {
        self.availability.check("search index")?;
        let indices = self.indices.read().unwrap();
        Ok(indices.get(index).and_then(|docs| docs.get(id)).cloned())
    }

    async fn exists(&self, index: &str) -> Result<bool, StoreError> {
        self.availability.check("search index")?;
        Ok(self.indices.read().unwrap().contains_key(index))
    }

    async fn create(&self, index: &str) -> Result<(), StoreError> {
        self.availability.check("search index")?;
        self.indices
            .write()
            .unwrap()
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<(), StoreError> {
        self.availability.check("search index")?;
        match self.indices.write().unwrap().remove(index) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("index {}", index))),
        }
    }
}

/// In-memory vocabulary-data index.
#[derive(Debug, Default)]
pub struct MemoryVocabularyDataIndex {
    indices: RwLock<HashMap<String, Vec<VocabularyRecord>>>,
    availability: Availability,
}

impl MemoryVocabularyDataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.availability.set(available);
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl VocabularyDataIndex for MemoryVocabularyDataIndex {
    async fn bulk_index(&self, records: &[VocabularyRecord], index: &str) -> Result<(), StoreError> {
        self.availability.check("vocabulary index")?;
        self.indices
            .write()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .extend(records.iter().cloned());
        Ok(())
    }

    async fn records(&self, index: &str) -> Result<Vec<VocabularyRecord>, StoreError> {
        self.availability.check("vocabulary index")?;
        Ok(self
            .indices
            .read()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default())
    }

    async fn exists(&self, index: &str) -> Result<bool, StoreError> {
        self.availability.check("vocabulary index")?;
        Ok(self.indices.read().unwrap().contains_key(index))
    }

    async fn create(&self, index: &str) -> Result<(), StoreError> {
        self.availability.check("vocabulary index")?;
        self.indices
            .write()
            .unwrap()
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn delete(&self, index: &str) -> Result<(), StoreError> {
        self.availability.check("vocabulary index")?;
        match self.indices.write().unwrap().remove(index) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("index {}", index))),
        }
    }
}

/// In-memory repository key/value config.
#[derive(Debug, Default)]
pub struct MemoryRepositoryConfig {
    values: RwLock<HashMap<(String, String), String>>,
}

impl MemoryRepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryConfigStore for MemoryRepositoryConfig {
    async fn get(&self, repo_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .values
            .read()
            .unwrap()
            .get(&(repo_id.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, repo_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .unwrap()
            .insert((repo_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn compare_and_set(
        &self,
        repo_id: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError> {
        let mut values = self.values.write().unwrap();
        let slot = (repo_id.to_string(), key.to_string());
        if values.get(&slot).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(slot, value.to_string());
        Ok(true)
    }
}

/// In-memory run history.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: RwLock<Vec<HarvestRun>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HarvestRunStore for MemoryRunStore {
    async fn insert(&self, run: &HarvestRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().unwrap();
        if runs.iter().any(|r| r.id == run.id) {
            return Err(StoreError::Conflict(format!("run {} already recorded", run.id)));
        }
        runs.push(run.clone());
        Ok(())
    }

    async fn update(&self, run: &HarvestRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().unwrap();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(slot) => {
                *slot = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("run {}", run.id))),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<HarvestRun>, StoreError> {
        Ok(self.runs.read().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn last_success(&self, repo_id: &str, revision: &str) -> Result<Option<HarvestRun>, StoreError> {
        Ok(self
            .runs
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|r| {
                r.repo_id == repo_id
                    && r.status == HarvestStatus::Success
                    && r.revision.as_deref() == Some(revision)
            })
            .cloned())
    }

    async fn list(&self, repo_id: &str, limit: usize) -> Result<Vec<HarvestRun>, StoreError> {
        Ok(self
            .runs
            .read()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.repo_id == repo_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetKind, HarvestRequest};
    use crate::rdf::Term;

    #[tokio::test]
    async fn graph_store_reads_follow_selector() {
        let store = MemoryGraphStore::new();
        let repo = "https://example.org/repo";
        let mut g = Graph::new();
        g.insert(Triple::new(Term::iri("http://x/s"), "http://x/p", Term::string("blue")));
        store
            .save(&GraphKey::new(repo, AssetKind::Ontology, Some(Instance::Secondary)), &g)
            .await
            .unwrap();

        let all = TriplePattern::default();
        store.point_to(repo, Instance::Primary).await.unwrap();
        assert!(store.select_published(repo, AssetKind::Ontology, &all).await.unwrap().is_empty());
        store.point_to(repo, Instance::Secondary).await.unwrap();
        assert_eq!(store.select_published(repo, AssetKind::Ontology, &all).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryGraphStore::new();
        store.set_available(false);
        let key = GraphKey::new("r", AssetKind::Schema, None);
        let err = store.clear_named_graph(&key).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn compare_and_set_respects_expected_value() {
        let config = MemoryRepositoryConfig::new();
        assert!(config.compare_and_set("r", "k", None, "a").await.unwrap());
        assert!(!config.compare_and_set("r", "k", None, "b").await.unwrap());
        assert!(config.compare_and_set("r", "k", Some("a"), "b").await.unwrap());
        assert_eq!(config.get("r", "k").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn last_success_matches_revision() {
        let runs = MemoryRunStore::new();
        let request = HarvestRequest::new("repo").revision("abc");
        let ok = HarvestRun::start(&request).finish(HarvestStatus::Success, None);
        let failed = HarvestRun::start(&request.clone().revision("def")).finish(HarvestStatus::Failed, None);
        runs.insert(&ok).await.unwrap();
        runs.insert(&failed).await.unwrap();

        assert_eq!(runs.last_success("repo", "abc").await.unwrap().map(|r| r.id), Some(ok.id));
        assert!(runs.last_success("repo", "def").await.unwrap().is_none());
        assert_eq!(runs.list("repo", 10).await.unwrap().len(), 2);
    }
}
