//! Error taxonomy for the harvest pipeline.
//!
//! Each error type belongs to exactly one scope: it either isolates a
//! single asset (or leaf directory) or escalates to the whole run. The
//! orchestrator routes on [`HarvestError::is_run_fatal`].

use std::path::PathBuf;
use thiserror::Error;

/// The repository snapshot could not be fetched. Always fatal for the run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} failed: {stderr}")]
    Command { command: String, stderr: String },
    #[error("repository source not found: {0}")]
    NotFound(String),
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A leaf directory violates the structural rules of its asset kind.
///
/// Non-fatal: the leaf contributes zero groups and scanning continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid asset folder {}: {reason}", path.display())]
pub struct InvalidAssetFolder {
    pub path: PathBuf,
    pub reason: String,
}

/// Scanning could not list a directory. Aborts the locate call.
#[derive(Error, Debug)]
#[error("cannot scan {}: {source}", path.display())]
pub struct LocateError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors raised while loading an asset graph or extracting its metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The primary graph file could not be read or parsed.
    #[error("cannot load {path}: {reason}")]
    Load { path: String, reason: String },
    /// Main-resource cardinality or a malformed distribution. Fatal per
    /// asset in every validation mode.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
    /// A single field is missing or malformed (raised only in fatal mode).
    #[error("invalid field '{field}': {message}")]
    FieldValidation { field: String, message: String },
    /// The companion tabular file could not be parsed.
    #[error("invalid companion data {path}: {reason}")]
    CompanionData { path: String, reason: String },
}

/// Errors reported by the external stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached or refused the operation as a whole.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// An individual item did not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A compare-and-set precondition did not hold.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("serialization: {}", err))
    }
}

/// Errors surfaced by a harvest run.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("unknown repository '{0}'")]
    UnknownRepository(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error("failed to clear {target}: {source}")]
    StoreClear {
        target: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to write {target}: {source}")]
    StoreWrite {
        target: String,
        #[source]
        source: StoreError,
    },
    #[error("repository config unavailable: {0}")]
    Config(#[source] StoreError),
    #[error("instance switch failed: {0}")]
    Switch(#[source] StoreError),
    #[error("run history unavailable: {0}")]
    RunStore(#[source] StoreError),
    #[error(transparent)]
    Asset(#[from] ExtractError),
}

impl HarvestError {
    /// Whether this error terminates the whole run rather than one asset.
    pub fn is_run_fatal(&self) -> bool {
        !matches!(self, HarvestError::Asset(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_errors_are_isolated() {
        let err = HarvestError::Asset(ExtractError::InvalidStructure("two main resources".into()));
        assert!(!err.is_run_fatal());
    }

    #[test]
    fn store_errors_escalate() {
        let err = HarvestError::StoreClear {
            target: "graph".into(),
            source: StoreError::Unavailable("connection refused".into()),
        };
        assert!(err.is_run_fatal());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(!err.is_unavailable());
    }
}
