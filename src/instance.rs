//! Blue/green publication state per repository.
//!
//! The published [`Instance`] of a repository is persisted in the
//! [`RepositoryConfigStore`] and defaults to [`Instance::Primary`] when
//! unset. A transition first writes the config with a compare-and-set,
//! then points every store-level [`InstanceSelector`] at the new
//! instance. The config is authoritative: when the selector flip fails
//! after the config write, [`PublishedInstanceManager::reconcile`] brings
//! the selectors back in line.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::Instance;
use crate::store::{InstanceSelector, RepositoryConfigStore};

pub const PUBLISHED_KEY: &str = "published_instance";
pub const PREVIOUS_KEY: &str = "previous_instance";
pub const BLUE_GREEN_KEY: &str = "blue_green";

/// Result of one publication transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceTransition {
    pub old: Instance,
    pub new: Instance,
    /// Whether every store-level selector now follows `new`.
    pub selectors_synced: bool,
}

pub struct PublishedInstanceManager {
    config: Arc<dyn RepositoryConfigStore>,
    selectors: Vec<Arc<dyn InstanceSelector>>,
}

impl PublishedInstanceManager {
    pub fn new(config: Arc<dyn RepositoryConfigStore>, selectors: Vec<Arc<dyn InstanceSelector>>) -> Self {
        Self { config, selectors }
    }

    async fn stored(&self, repo_id: &str, key: &str) -> Result<(Option<String>, Option<Instance>), StoreError> {
        let raw = self.config.get(repo_id, key).await?;
        let parsed = raw
            .as_deref()
            .map(|v| {
                v.parse::<Instance>()
                    .map_err(|e| StoreError::Unavailable(format!("{} of {}: {}", key, repo_id, e)))
            })
            .transpose()?;
        Ok((raw, parsed))
    }

    /// The published instance.
    pub async fn current(&self, repo_id: &str) -> Result<Instance, StoreError> {
        Ok(self.stored(repo_id, PUBLISHED_KEY).await?.1.unwrap_or_default())
    }

    /// The instance a harvest writes to: never the published one.
    pub async fn write_target(&self, repo_id: &str) -> Result<Instance, StoreError> {
        Ok(self.current(repo_id).await?.opposite())
    }

    /// Whether blue/green publication applies, honoring a runtime toggle
    /// stored under [`BLUE_GREEN_KEY`].
    pub async fn blue_green_enabled(&self, repo_id: &str, configured: bool) -> Result<bool, StoreError> {
        Ok(match self.config.get(repo_id, BLUE_GREEN_KEY).await?.as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => configured,
        })
    }

    /// Publish the write target.
    pub async fn switch(&self, repo_id: &str, repo_url: &str) -> Result<InstanceTransition, StoreError> {
        let (raw, current) = self.stored(repo_id, PUBLISHED_KEY).await?;
        let old = current.unwrap_or_default();
        self.transition(repo_id, repo_url, raw, old, old.opposite()).await
    }

    /// Re-publish the instance that was current before the last transition.
    pub async fn rollback(&self, repo_id: &str, repo_url: &str) -> Result<InstanceTransition, StoreError> {
        let (_, previous) = self.stored(repo_id, PREVIOUS_KEY).await?;
        let previous = previous
            .ok_or_else(|| StoreError::NotFound(format!("no previous instance recorded for {}", repo_id)))?;
        let (raw, current) = self.stored(repo_id, PUBLISHED_KEY).await?;
        self.transition(repo_id, repo_url, raw, current.unwrap_or_default(), previous)
            .await
    }

    async fn transition(
        &self,
        repo_id: &str,
        repo_url: &str,
        expected: Option<String>,
        old: Instance,
        new: Instance,
    ) -> Result<InstanceTransition, StoreError> {
        let swapped = self
            .config
            .compare_and_set(repo_id, PUBLISHED_KEY, expected.as_deref(), new.as_str())
            .await?;
        if !swapped {
            return Err(StoreError::Conflict(format!(
                "published instance of {} changed concurrently",
                repo_id
            )));
        }
        self.config.set(repo_id, PREVIOUS_KEY, old.as_str()).await?;

        let selectors_synced = self.point_selectors(repo_url, new).await;
        info!(repo = repo_id, %old, %new, selectors_synced, "published instance switched");
        Ok(InstanceTransition {
            old,
            new,
            selectors_synced,
        })
    }

    async fn point_selectors(&self, repo_url: &str, instance: Instance) -> bool {
        let mut synced = true;
        for selector in &self.selectors {
            if let Err(e) = selector.point_to(repo_url, instance).await {
                warn!(repo_url, %instance, error = %e, "selector flip failed, reconcile will retry");
                synced = false;
            }
        }
        synced
    }

    /// Detach every selector from the instances of `repo_url`, for
    /// repositories harvested in place.
    pub async fn release(&self, repo_url: &str) -> Result<(), StoreError> {
        for selector in &self.selectors {
            if selector.selected(repo_url).await?.is_some() {
                info!(repo_url, "releasing store selector");
                selector.release(repo_url).await?;
            }
        }
        Ok(())
    }

    /// Point any selector that disagrees with the config back at the
    /// published instance. Returns that instance.
    pub async fn reconcile(&self, repo_id: &str, repo_url: &str) -> Result<Instance, StoreError> {
        let current = self.current(repo_id).await?;
        for selector in &self.selectors {
            if selector.selected(repo_url).await? != Some(current) {
                info!(repo = repo_id, instance = %current, "re-pointing store selector");
                selector.point_to(repo_url, current).await?;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryGraphStore, MemoryRepositoryConfig, MemorySearchIndex};
    use async_trait::async_trait;

    const REPO: &str = "onto";
    const URL: &str = "https://github.com/org/onto";

    fn manager() -> (PublishedInstanceManager, Arc<MemoryGraphStore>, Arc<MemorySearchIndex>) {
        let graph = Arc::new(MemoryGraphStore::new());
        let search = Arc::new(MemorySearchIndex::new());
        let manager = PublishedInstanceManager::new(
            Arc::new(MemoryRepositoryConfig::new()),
            vec![graph.clone() as Arc<dyn InstanceSelector>, search.clone()],
        );
        (manager, graph, search)
    }

    #[tokio::test]
    async fn defaults_to_primary() {
        let (manager, _, _) = manager();
        assert_eq!(manager.current(REPO).await.unwrap(), Instance::Primary);
        assert_eq!(manager.write_target(REPO).await.unwrap(), Instance::Secondary);
    }

    #[tokio::test]
    async fn switch_returns_old_and_new() {
        let (manager, graph, search) = manager();
        let t = manager.switch(REPO, URL).await.unwrap();
        assert_eq!((t.old, t.new), (Instance::Primary, Instance::Secondary));
        assert!(t.selectors_synced);
        assert_eq!(manager.current(REPO).await.unwrap(), Instance::Secondary);
        assert_eq!(graph.selected(URL).await.unwrap(), Some(Instance::Secondary));
        assert_eq!(search.selected(URL).await.unwrap(), Some(Instance::Secondary));

        let t = manager.switch(REPO, URL).await.unwrap();
        assert_eq!((t.old, t.new), (Instance::Secondary, Instance::Primary));
    }

    #[tokio::test]
    async fn rollback_restores_previous() {
        let (manager, graph, _) = manager();
        assert!(matches!(
            manager.rollback(REPO, URL).await,
            Err(StoreError::NotFound(_))
        ));

        manager.switch(REPO, URL).await.unwrap();
        let t = manager.rollback(REPO, URL).await.unwrap();
        assert_eq!((t.old, t.new), (Instance::Secondary, Instance::Primary));
        assert_eq!(manager.current(REPO).await.unwrap(), Instance::Primary);
        assert_eq!(graph.selected(URL).await.unwrap(), Some(Instance::Primary));
    }

    #[tokio::test]
    async fn failed_flip_keeps_config_and_reconcile_repairs() {
        let (manager, graph, _) = manager();
        graph.set_available(false);
        let t = manager.switch(REPO, URL).await.unwrap();
        assert!(!t.selectors_synced);
        assert_eq!(manager.current(REPO).await.unwrap(), Instance::Secondary);

        graph.set_available(true);
        assert_eq!(graph.selected(URL).await.unwrap(), None);
        assert_eq!(manager.reconcile(REPO, URL).await.unwrap(), Instance::Secondary);
        assert_eq!(graph.selected(URL).await.unwrap(), Some(Instance::Secondary));
    }

    #[tokio::test]
    async fn release_detaches_selectors_but_keeps_config() {
        let (manager, graph, search) = manager();
        manager.switch(REPO, URL).await.unwrap();

        manager.release(URL).await.unwrap();
        assert_eq!(graph.selected(URL).await.unwrap(), None);
        assert_eq!(search.selected(URL).await.unwrap(), None);
        assert_eq!(manager.current(REPO).await.unwrap(), Instance::Secondary);

        manager.release(URL).await.unwrap();
        assert_eq!(manager.reconcile(REPO, URL).await.unwrap(), Instance::Secondary);
        assert_eq!(graph.selected(URL).await.unwrap(), Some(Instance::Secondary));
    }

    #[tokio::test]
    async fn runtime_toggle_overrides_configured_value() {
        let config = Arc::new(MemoryRepositoryConfig::new());
        let manager = PublishedInstanceManager::new(config.clone(), vec![]);
        assert!(manager.blue_green_enabled(REPO, true).await.unwrap());
        config.set(REPO, BLUE_GREEN_KEY, "false").await.unwrap();
        assert!(!manager.blue_green_enabled(REPO, true).await.unwrap());
    }

    /// Config store where another writer publishes between read and write.
    struct RacingConfig {
        inner: MemoryRepositoryConfig,
    }

    #[async_trait]
    impl RepositoryConfigStore for RacingConfig {
        async fn get(&self, repo_id: &str, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(repo_id, key).await
        }

        async fn set(&self, repo_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(repo_id, key, value).await
        }

        async fn compare_and_set(
            &self,
            repo_id: &str,
            key: &str,
            expected: Option<&str>,
            value: &str,
        ) -> Result<bool, StoreError> {
            self.inner.set(repo_id, key, "secondary").await?;
            self.inner.compare_and_set(repo_id, key, expected, value).await
        }
    }

    #[tokio::test]
    async fn concurrent_writer_is_a_conflict() {
        let manager = PublishedInstanceManager::new(
            Arc::new(RacingConfig {
                inner: MemoryRepositoryConfig::new(),
            }),
            vec![],
        );
        assert!(matches!(
            manager.switch(REPO, URL).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
