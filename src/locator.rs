//! Asset directory scanning and version resolution.
//!
//! Walks a repository snapshot from the asset root of one [`AssetKind`]
//! and resolves the set of file groups that currently represent live
//! assets:
//!
//! ```text
//! assets/ontologies/ACCO/v1/a.ttl   ← dropped (obsolete version)
//! assets/ontologies/ACCO/v2/a.ttl   ← kept
//! assets/ontologies/ACCO/latest/…   ← kept (not version-named)
//! ```
//!
//! A directory without subdirectories is a leaf and yields at most one
//! [`AssetPathGroup`]. Leaves that break the per-kind rules are logged and
//! skipped; a directory that cannot be listed aborts the whole call.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{InvalidAssetFolder, LocateError};
use crate::models::{AssetKind, AssetPathGroup};
use crate::version::parse_dir_version;

/// Directory names never descended into unless configured otherwise.
pub fn default_skip_names() -> Vec<String> {
    vec![
        ".git".to_string(),
        ".github".to_string(),
        "scripts".to_string(),
        "examples".to_string(),
    ]
}

/// Asset root relative to the snapshot, plus its legacy alias.
fn asset_roots(kind: AssetKind) -> (PathBuf, &'static str) {
    match kind {
        AssetKind::Ontology => (Path::new("assets").join("ontologies"), "Ontologie"),
        AssetKind::ControlledVocabulary => (
            Path::new("assets").join("controlled-vocabularies"),
            "VocabolariControllati",
        ),
        AssetKind::Schema => (Path::new("assets").join("schemas"), "Schema"),
    }
}

/// Resolve the directory scanning starts from, if the snapshot has one.
pub fn asset_root(snapshot: &Path, kind: AssetKind) -> Option<PathBuf> {
    let (primary, legacy) = asset_roots(kind);
    [snapshot.join(primary), snapshot.join(legacy)]
        .into_iter()
        .find(|p| p.is_dir())
}

/// Scanner for the asset directories of a snapshot.
pub struct AssetLocator {
    ignore_obsolete_versions: bool,
    skip: GlobSet,
}

impl AssetLocator {
    /// Build a locator. `skip_names` are glob patterns matched against
    /// single directory names (a plain name matches itself).
    pub fn new(ignore_obsolete_versions: bool, skip_names: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in skip_names {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            ignore_obsolete_versions,
            skip: builder.build()?,
        })
    }

    /// Enumerate the live asset groups of `kind` under `snapshot`.
    ///
    /// Returns an empty list when neither the asset root nor its legacy
    /// alias exists.
    pub fn locate(&self, snapshot: &Path, kind: AssetKind) -> Result<Vec<AssetPathGroup>, LocateError> {
        let Some(root) = asset_root(snapshot, kind) else {
            debug!(kind = %kind, snapshot = %snapshot.display(), "no asset root");
            return Ok(Vec::new());
        };

        let mut groups = Vec::new();
        self.scan_dir(&root, kind, &mut groups)?;
        groups.sort();
        Ok(groups)
    }

    fn scan_dir(&self, dir: &Path, kind: AssetKind, out: &mut Vec<AssetPathGroup>) -> Result<(), LocateError> {
        let (subdirs, files) = list_children(dir)?;

        if subdirs.is_empty() {
            match scan_leaf(kind, dir, &files) {
                Ok(group) => out.push(group),
                Err(e) => warn!(kind = %kind, "skipping leaf: {}", e),
            }
            return Ok(());
        }

        for child in self.select_children(subdirs) {
            self.scan_dir(&child, kind, out)?;
        }
        Ok(())
    }

    /// Apply skip names and, if enabled, obsolete-version filtering to the
    /// subdirectories of one branch.
    fn select_children(&self, subdirs: Vec<PathBuf>) -> Vec<PathBuf> {
        let children: Vec<PathBuf> = subdirs
            .into_iter()
            .filter(|p| !self.skip.is_match(file_name(p)))
            .collect();

        if !self.ignore_obsolete_versions {
            return children;
        }

        let latest = children
            .iter()
            .filter_map(|p| parse_dir_version(file_name(p)).map(|v| (v, p)))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, p)| p.clone());

        children
            .into_iter()
            .filter(|p| {
                parse_dir_version(file_name(p)).is_none() || Some(p) == latest.as_ref()
            })
            .collect()
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// Split a directory's entries into visible subdirectories and files,
/// both sorted by name.
fn list_children(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), LocateError> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| LocateError {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type().is_dir() {
            subdirs.push(entry.into_path());
        } else if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok((subdirs, files))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

const SCHEMA_INDEX: &str = "index.ttl";

/// Enforce the per-kind leaf rules and build the file group.
pub fn scan_leaf(kind: AssetKind, dir: &Path, files: &[PathBuf]) -> Result<AssetPathGroup, InvalidAssetFolder> {
    let invalid = |reason: String| InvalidAssetFolder {
        path: dir.to_path_buf(),
        reason,
    };

    if kind == AssetKind::Schema {
        let index = files.iter().find(|f| {
            f.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(SCHEMA_INDEX))
        });
        return match index {
            Some(primary) => Ok(AssetPathGroup {
                kind,
                primary: primary.clone(),
                companion: None,
            }),
            None => Err(invalid(format!("no {} file found", SCHEMA_INDEX))),
        };
    }

    let graphs: Vec<&PathBuf> = files
        .iter()
        .filter(|f| has_extension(f, "ttl"))
        .filter(|f| {
            kind != AssetKind::Ontology
                || !f
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.ends_with("-aligns"))
        })
        .collect();

    let primary = match graphs.as_slice() {
        [single] => (*single).clone(),
        [] => return Err(invalid("no .ttl file found".to_string())),
        many => {
            return Err(invalid(format!(
                "expected exactly one .ttl file, found {}",
                many.len()
            )))
        }
    };

    let companion = match kind {
        AssetKind::ControlledVocabulary => {
            let tables: Vec<&PathBuf> = files.iter().filter(|f| has_extension(f, "csv")).collect();
            match tables.as_slice() {
                [] => None,
                [single] => Some((*single).clone()),
                many => {
                    return Err(invalid(format!(
                        "expected at most one .csv file, found {}",
                        many.len()
                    )))
                }
            }
        }
        AssetKind::Ontology | AssetKind::Schema => None,
    };

    Ok(AssetPathGroup {
        kind,
        primary,
        companion,
    })
}
