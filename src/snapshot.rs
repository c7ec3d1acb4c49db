//! Repository snapshots.
//!
//! A [`RepositorySnapshotter`] materializes one revision of a repository
//! as a directory tree on local disk and reports the resolved revision.
//! Every fetch lands in a fresh directory under the configured workdir,
//! so concurrent runs of different repositories never share a tree.
//!
//! - [`GitSnapshotter`] shells out to `git`.
//! - [`LocalSnapshotter`] copies a local directory and fingerprints its
//!   content with SHA-256, standing in for a commit id.
//! - [`AutoSnapshotter`] picks one of the two by URL.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::RepositoryDef;
use crate::error::FetchError;

/// A checked-out repository tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: PathBuf,
    /// Resolved revision identifier.
    pub revision: String,
}

#[async_trait]
pub trait RepositorySnapshotter: Send + Sync {
    /// Fetch `revision` (or the branch head when `None`) of `repo`.
    async fn fetch(&self, repo: &RepositoryDef, revision: Option<&str>) -> Result<Snapshot, FetchError>;

    /// Delete a snapshot tree. Missing trees are not an error.
    async fn remove(&self, snapshot: &Snapshot) -> Result<(), FetchError>;
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

fn fresh_dir(workdir: &Path, prefix: &str, url: &str) -> PathBuf {
    workdir.join(format!("{}-{}-{}", prefix, short_hash(url), Uuid::new_v4().simple()))
}

async fn remove_tree(path: &Path) -> Result<(), FetchError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "snapshot removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FetchError::Io(e)),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Io(std::io::Error::other(e.to_string())))?
}

/// Snapshots via the `git` command line.
#[derive(Debug, Clone)]
pub struct GitSnapshotter {
    workdir: PathBuf,
}

impl GitSnapshotter {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<String, FetchError> {
    let command = format!("git {}", args.first().copied().unwrap_or_default());
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    let output = cmd.output().map_err(|source| FetchError::Spawn {
        command: command.clone(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::Command {
            command,
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn git_snapshot(
    url: String,
    branch: Option<String>,
    revision: Option<String>,
    dest: PathBuf,
) -> Result<Snapshot, FetchError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dest_str = dest.to_string_lossy().to_string();

    let mut args: Vec<&str> = vec!["clone", "--quiet"];
    if let Some(branch) = branch.as_deref() {
        args.extend(["--branch", branch]);
    }
    // A pinned revision may be anywhere in history
    if revision.is_none() {
        args.extend(["--depth", "1", "--single-branch"]);
    }
    args.push(url.as_str());
    args.push(dest_str.as_str());

    let fetched = run_git(&args, None).and_then(|_| {
        if let Some(rev) = revision.as_deref() {
            run_git(&["checkout", "--quiet", "--detach", rev], Some(&dest))?;
        }
        run_git(&["rev-parse", "HEAD"], Some(&dest))
    });

    match fetched {
        Ok(revision) => Ok(Snapshot { path: dest, revision }),
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dest);
            Err(e)
        }
    }
}

#[async_trait]
impl RepositorySnapshotter for GitSnapshotter {
    async fn fetch(&self, repo: &RepositoryDef, revision: Option<&str>) -> Result<Snapshot, FetchError> {
        let dest = fresh_dir(&self.workdir, "git", &repo.url);
        info!(url = %repo.url, revision = ?revision, dest = %dest.display(), "cloning repository");
        let (url, branch, revision) = (repo.url.clone(), repo.branch.clone(), revision.map(str::to_string));
        blocking(move || git_snapshot(url, branch, revision, dest)).await
    }

    async fn remove(&self, snapshot: &Snapshot) -> Result<(), FetchError> {
        remove_tree(&snapshot.path).await
    }
}

/// Snapshots of local directories (`file://` URLs or plain paths).
#[derive(Debug, Clone)]
pub struct LocalSnapshotter {
    workdir: PathBuf,
}

impl LocalSnapshotter {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Local directory a URL refers to, if it is a local URL at all.
    pub fn local_path(url: &str) -> Option<PathBuf> {
        if let Some(rest) = url.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if url.contains("://") || url.starts_with("git@") {
            return None;
        }
        Some(PathBuf::from(url))
    }
}

/// Copy `source` into `dest` and fingerprint the copied content.
///
/// `.git` directories are neither copied nor fingerprinted.
fn copy_and_fingerprint(source: &Path, dest: &Path) -> Result<String, FetchError> {
    std::fs::create_dir_all(dest)?;
    let mut hasher = Sha256::new();

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|e| FetchError::Io(std::io::Error::other(e.to_string())))?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            let bytes = std::fs::read(entry.path())?;
            hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
            hasher.update([0u8]);
            std::fs::write(&target, &bytes)?;
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[async_trait]
impl RepositorySnapshotter for LocalSnapshotter {
    async fn fetch(&self, repo: &RepositoryDef, revision: Option<&str>) -> Result<Snapshot, FetchError> {
        let source = Self::local_path(&repo.url)
            .ok_or_else(|| FetchError::NotFound(format!("not a local repository: {}", repo.url)))?;
        if !source.is_dir() {
            return Err(FetchError::NotFound(source.display().to_string()));
        }

        let dest = fresh_dir(&self.workdir, "local", &repo.url);
        debug!(source = %source.display(), dest = %dest.display(), "copying local repository");
        let copy_dest = dest.clone();
        let fingerprint = match blocking(move || copy_and_fingerprint(&source, &copy_dest)).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                remove_tree(&dest).await?;
                return Err(e);
            }
        };

        // A local tree only ever has its current revision
        if let Some(requested) = revision {
            if requested != fingerprint {
                remove_tree(&dest).await?;
                return Err(FetchError::NotFound(format!(
                    "revision {} of {} (current content is {})",
                    requested, repo.url, fingerprint
                )));
            }
        }

        Ok(Snapshot {
            path: dest,
            revision: fingerprint,
        })
    }

    async fn remove(&self, snapshot: &Snapshot) -> Result<(), FetchError> {
        remove_tree(&snapshot.path).await
    }
}

/// Dispatches local URLs to [`LocalSnapshotter`], everything else to git.
#[derive(Debug, Clone)]
pub struct AutoSnapshotter {
    git: GitSnapshotter,
    local: LocalSnapshotter,
}

impl AutoSnapshotter {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            git: GitSnapshotter::new(workdir.clone()),
            local: LocalSnapshotter::new(workdir),
        }
    }

    fn is_local(url: &str) -> bool {
        url.starts_with("file://")
            || LocalSnapshotter::local_path(url).is_some_and(|p| p.is_dir())
    }
}

#[async_trait]
impl RepositorySnapshotter for AutoSnapshotter {
    async fn fetch(&self, repo: &RepositoryDef, revision: Option<&str>) -> Result<Snapshot, FetchError> {
        if Self::is_local(&repo.url) {
            self.local.fetch(repo, revision).await
        } else {
            self.git.fetch(repo, revision).await
        }
    }

    async fn remove(&self, snapshot: &Snapshot) -> Result<(), FetchError> {
        remove_tree(&snapshot.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn local_path_detection() {
        assert_eq!(
            LocalSnapshotter::local_path("file:///srv/repo"),
            Some(PathBuf::from("/srv/repo"))
        );
        assert_eq!(LocalSnapshotter::local_path("https://github.com/org/repo"), None);
        assert_eq!(LocalSnapshotter::local_path("git@github.com:org/repo.git"), None);
        assert_eq!(LocalSnapshotter::local_path("./repo"), Some(PathBuf::from("./repo")));
    }

    #[tokio::test]
    async fn local_fetch_copies_and_fingerprints() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write(source.path(), "assets/ontologies/a/v1/a.ttl", "# a");
        write(source.path(), ".git/HEAD", "ref: refs/heads/main");

        let snapshotter = LocalSnapshotter::new(work.path());
        let repo = RepositoryDef::new(format!("file://{}", source.path().display()));

        let first = snapshotter.fetch(&repo, None).await.unwrap();
        assert!(first.path.join("assets/ontologies/a/v1/a.ttl").is_file());
        assert!(!first.path.join(".git").exists());

        let second = snapshotter.fetch(&repo, None).await.unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(first.revision, second.revision);

        write(source.path(), "assets/ontologies/a/v1/a.ttl", "# changed");
        let third = snapshotter.fetch(&repo, None).await.unwrap();
        assert_ne!(first.revision, third.revision);

        for snap in [&first, &second, &third] {
            snapshotter.remove(snap).await.unwrap();
            assert!(!snap.path.exists());
        }
        // Removing twice is fine
        snapshotter.remove(&first).await.unwrap();
    }

    #[tokio::test]
    async fn local_fetch_rejects_unknown_revision() {
        let source = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        write(source.path(), "README.md", "hello");

        let snapshotter = LocalSnapshotter::new(work.path());
        let repo = RepositoryDef::new(source.path().display().to_string());
        let err = snapshotter.fetch(&repo, Some("deadbeef")).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_local_source_is_not_found() {
        let work = tempfile::tempdir().unwrap();
        let snapshotter = AutoSnapshotter::new(work.path());
        let repo = RepositoryDef::new("file:///definitely/not/here");
        assert!(matches!(
            snapshotter.fetch(&repo, None).await,
            Err(FetchError::NotFound(_))
        ));
    }
}
