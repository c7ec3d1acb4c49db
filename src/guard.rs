//! Per-repository mutual exclusion for harvest runs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of repositories with a harvest in flight.
///
/// The registry is shared (via `Arc`) by every orchestrator that may run
/// against the same stores. Membership is released when the returned
/// [`InFlightGuard`] drops, on every exit path.
#[derive(Debug, Default, Clone)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `repo_id`, or `None` if a run already holds it.
    pub fn try_acquire(&self, repo_id: &str) -> Option<InFlightGuard> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(repo_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            repo_id: repo_id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, repo_id: &str) -> bool {
        self.active.lock().unwrap().contains(repo_id)
    }

    /// Repositories currently being harvested, sorted.
    pub fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.lock().unwrap().iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Proof of exclusive access to one repository.
#[derive(Debug)]
pub struct InFlightGuard {
    repo_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // Must not panic while unwinding
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.repo_id);
        }
    }
}
