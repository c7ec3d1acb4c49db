//! Storage abstractions for the harvest pipeline.
//!
//! The graph store, search index, and vocabulary-data index are external
//! collaborators of the harvester; this module defines the operations the
//! pipeline needs from them, plus the repository config surface and the
//! run history.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`InstanceSelector`] | Store-level pointer to a repository's published instance |
//! | [`GraphStore`] | Named graphs of asset triples |
//! | [`SearchIndex`] | Asset metadata documents |
//! | [`VocabularyDataIndex`] | Companion rows of controlled vocabularies |
//! | [`RepositoryConfigStore`] | Per-repository key/value configuration |
//! | [`HarvestRunStore`] | Harvest run history |
//!
//! Two backends exist: [`memory`] for tests and embedding, [`sqlite`] for
//! the CLI. Implementations must be `Send + Sync`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AssetKind, HarvestRun, Instance, SemanticAssetMetadata};
use crate::rdf::{Graph, Triple, TriplePattern};
use crate::vocab_data::VocabularyRecord;

/// Address of one named graph.
///
/// With blue/green publication active the key names an instance;
/// repositories without instance support use unqualified keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphKey {
    pub repo_url: String,
    pub kind: AssetKind,
    pub instance: Option<Instance>,
}

impl GraphKey {
    pub fn new(repo_url: &str, kind: AssetKind, instance: Option<Instance>) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            kind,
            instance,
        }
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Some(instance) => write!(f, "{}/{}/{}", self.repo_url, instance, self.kind),
            None => write!(f, "{}/{}", self.repo_url, self.kind),
        }
    }
}

/// Name of the metadata index for one kind, qualified by instance.
pub fn metadata_index(prefix: &str, kind: AssetKind, instance: Option<Instance>) -> String {
    match instance {
        Some(instance) => format!("{}-{}-{}", prefix, kind, instance),
        None => format!("{}-{}", prefix, kind),
    }
}

/// One asset metadata document in the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    /// Asset IRI.
    pub id: String,
    pub repo_url: String,
    pub kind: AssetKind,
    pub metadata: SemanticAssetMetadata,
}

impl SearchDocument {
    pub fn from_metadata(metadata: &SemanticAssetMetadata) -> Self {
        Self {
            id: metadata.iri.clone(),
            repo_url: metadata.repo_url.clone(),
            kind: metadata.kind(),
            metadata: metadata.clone(),
        }
    }
}

/// Store-level selector the read path follows to a repository's
/// published instance (a graph alias or an index alias).
#[async_trait]
pub trait InstanceSelector: Send + Sync {
    /// Point the read path of `repo_url` at `instance`. Idempotent.
    async fn point_to(&self, repo_url: &str, instance: Instance) -> Result<(), StoreError>;

    /// Instance the read path currently follows, if any was set.
    async fn selected(&self, repo_url: &str) -> Result<Option<Instance>, StoreError>;

    /// Drop the selection so the read path of `repo_url` follows the
    /// unqualified destinations again. Idempotent.
    async fn release(&self, repo_url: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GraphStore: InstanceSelector {
    /// Add the triples of `graph` to the named graph `key`.
    async fn save(&self, key: &GraphKey, graph: &Graph) -> Result<(), StoreError>;

    /// Remove every triple of the named graph `key`.
    async fn clear_named_graph(&self, key: &GraphKey) -> Result<(), StoreError>;

    /// Match a triple pattern against one named graph.
    async fn select(&self, key: &GraphKey, pattern: &TriplePattern) -> Result<Vec<Triple>, StoreError>;

    /// Match a pattern against whatever the read path currently publishes.
    async fn select_published(
        &self,
        repo_url: &str,
        kind: AssetKind,
        pattern: &TriplePattern,
    ) -> Result<Vec<Triple>, StoreError> {
        let instance = self.selected(repo_url).await?;
        self.select(&GraphKey::new(repo_url, kind, instance), pattern).await
    }
}

#[async_trait]
pub trait SearchIndex: InstanceSelector {
    /// Index documents, creating the index when needed.
    async fn bulk_index(&self, items: &[SearchDocument], index: &str) -> Result<(), StoreError>;

    /// Delete every document of a repository. Returns the number removed.
    async fn delete_by_repo_url(&self, repo_url: &str, index: &str) -> Result<u64, StoreError>;

    /// Documents of a repository, ordered by id.
    async fn find_by_repo_url(&self, repo_url: &str, index: &str) -> Result<Vec<SearchDocument>, StoreError>;

    async fn get(&self, id: &str, index: &str) -> Result<Option<SearchDocument>, StoreError>;

    async fn exists(&self, index: &str) -> Result<bool, StoreError>;

    async fn create(&self, index: &str) -> Result<(), StoreError>;

    async fn delete(&self, index: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait VocabularyDataIndex: Send + Sync {
    /// Append records, creating the index when needed.
    async fn bulk_index(&self, records: &[VocabularyRecord], index: &str) -> Result<(), StoreError>;

    /// All records of an index in insertion order.
    async fn records(&self, index: &str) -> Result<Vec<VocabularyRecord>, StoreError>;

    async fn exists(&self, index: &str) -> Result<bool, StoreError>;

    async fn create(&self, index: &str) -> Result<(), StoreError>;

    /// Drop an index. Missing indices are reported as [`StoreError::NotFound`].
    async fn delete(&self, index: &str) -> Result<(), StoreError>;
}

/// Per-repository key/value configuration.
#[async_trait]
pub trait RepositoryConfigStore: Send + Sync {
    async fn get(&self, repo_id: &str, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, repo_id: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write `value` only when the current value equals `expected`
    /// (`None` meaning unset). Returns whether the write happened.
    async fn compare_and_set(
        &self,
        repo_id: &str,
        key: &str,
        expected: Option<&str>,
        value: &str,
    ) -> Result<bool, StoreError>;
}

/// Harvest run history.
#[async_trait]
pub trait HarvestRunStore: Send + Sync {
    async fn insert(&self, run: &HarvestRun) -> Result<(), StoreError>;

    /// Replace a run by id.
    async fn update(&self, run: &HarvestRun) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<HarvestRun>, StoreError>;

    /// Most recent successful run of `repo_id` at `revision`.
    async fn last_success(&self, repo_id: &str, revision: &str) -> Result<Option<HarvestRun>, StoreError>;

    /// Most recent runs of a repository, newest first.
    async fn list(&self, repo_id: &str, limit: usize) -> Result<Vec<HarvestRun>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_keys_are_instance_qualified() {
        let key = GraphKey::new("https://github.com/org/repo", AssetKind::Ontology, Some(Instance::Secondary));
        assert_eq!(key.to_string(), "https://github.com/org/repo/secondary/ontologies");
        let plain = GraphKey::new("https://github.com/org/repo", AssetKind::Schema, None);
        assert_eq!(plain.to_string(), "https://github.com/org/repo/schemas");
    }

    #[test]
    fn metadata_index_names() {
        assert_eq!(
            metadata_index("semantic-assets", AssetKind::ControlledVocabulary, Some(Instance::Primary)),
            "semantic-assets-controlled-vocabularies-primary"
        );
        assert_eq!(metadata_index("semantic-assets", AssetKind::Schema, None), "semantic-assets-schemas");
    }
}
