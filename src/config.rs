use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::extract::validation::ValidationMode;
use crate::locator::default_skip_names;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub harvest: HarvestSettings,
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryDef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestSettings {
    /// Public base URL of the catalog; vocabulary endpoints hang off it.
    pub base_url: String,
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    #[serde(default = "default_true")]
    pub ignore_obsolete_versions: bool,
    #[serde(default = "default_skip_names")]
    pub skip_names: Vec<String>,
    #[serde(default)]
    pub validation: ValidationMode,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_search_index_prefix")]
    pub search_index_prefix: String,
}

impl HarvestSettings {
    /// Settings with every optional field at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            workdir: default_workdir(),
            ignore_obsolete_versions: true,
            skip_names: default_skip_names(),
            validation: ValidationMode::default(),
            workers: default_workers(),
            search_index_prefix: default_search_index_prefix(),
        }
    }
}

fn default_workdir() -> PathBuf {
    std::env::temp_dir().join("semantic-harvester")
}
fn default_true() -> bool {
    true
}
fn default_workers() -> usize {
    4
}
fn default_search_index_prefix() -> String {
    "semantic-assets".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryDef {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_true")]
    pub blue_green: bool,
    /// Overrides `harvest.validation` for this repository.
    #[serde(default)]
    pub validation: Option<ValidationMode>,
}

impl RepositoryDef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: None,
            blue_green: true,
            validation: None,
        }
    }
}

impl Config {
    pub fn repository(&self, id: &str) -> Option<&RepositoryDef> {
        self.repositories.get(id)
    }
}

fn is_slug(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('-')
        && !id.ends_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Accept `file://` URLs, plain paths, scp-style `git@host:path` remotes
/// and URLs with a scheme git can clone from.
fn check_repository_url(id: &str, raw: &str) -> Result<()> {
    if raw.starts_with("git@") || !raw.contains("://") {
        return Ok(());
    }
    let parsed = url::Url::parse(raw)
        .with_context(|| format!("repositories.{}.url is not a valid URL: '{}'", id, raw))?;
    match parsed.scheme() {
        "file" | "http" | "https" | "ssh" | "git" => Ok(()),
        other => anyhow::bail!(
            "repositories.{}.url must be a file://, http(s), ssh or git URL, got scheme '{}'",
            id,
            other
        ),
    }
}

pub fn validate_config(config: &Config) -> Result<()> {
    // Validate harvest settings
    if config.harvest.workers == 0 {
        anyhow::bail!("harvest.workers must be > 0");
    }

    let base = url::Url::parse(&config.harvest.base_url)
        .with_context(|| format!("harvest.base_url is not a valid URL: '{}'", config.harvest.base_url))?;
    match base.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!(
            "harvest.base_url must use http or https, got '{}'",
            other
        ),
    }

    if config.harvest.search_index_prefix.trim().is_empty() {
        anyhow::bail!("harvest.search_index_prefix must not be empty");
    }

    // Validate repositories
    for (id, repo) in &config.repositories {
        if !is_slug(id) {
            anyhow::bail!(
                "repository id '{}' must be lowercase letters, digits, '-' or '_'",
                id
            );
        }
        if repo.url.trim().is_empty() {
            anyhow::bail!("repositories.{}.url must not be empty", id);
        }
        check_repository_url(id, &repo.url)?;
    }

    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;

    Ok(config)
}

/// Load the config when the file exists. Commands that can run on
/// defaults use this; a file that exists but does not parse is an error.
pub fn load_optional_config(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }
    load_config(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn defaults_apply() {
        let config = parse(
            r#"
            [db]
            path = "./data/harvester.sqlite"

            [harvest]
            base_url = "https://schema.example.org"

            [repositories.onto]
            url = "https://github.com/org/onto"
            "#,
        )
        .unwrap();

        assert!(config.harvest.ignore_obsolete_versions);
        assert_eq!(config.harvest.workers, 4);
        assert_eq!(config.harvest.validation, ValidationMode::Fatal);
        assert_eq!(config.harvest.search_index_prefix, "semantic-assets");
        assert!(config.harvest.skip_names.contains(&".git".to_string()));
        let repo = config.repository("onto").unwrap();
        assert!(repo.blue_green);
        assert!(repo.validation.is_none());
    }

    #[test]
    fn repository_validation_override() {
        let config = parse(
            r#"
            [db]
            path = "h.sqlite"

            [harvest]
            base_url = "http://localhost:8080"
            validation = "fatal"

            [repositories.vocabs]
            url = "file:///srv/vocabs"
            blue_green = false
            validation = "accumulate"
            "#,
        )
        .unwrap();

        let repo = config.repository("vocabs").unwrap();
        assert!(!repo.blue_green);
        assert_eq!(repo.validation, Some(ValidationMode::Accumulate));
    }

    #[test]
    fn rejects_unclonable_repository_url() {
        let err = parse(
            r#"
            [db]
            path = "h.sqlite"
            [harvest]
            base_url = "https://x.org"
            [repositories.onto]
            url = "ftp://mirror.example.org/onto"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("repositories.onto.url"));

        for ok in ["git@github.com:org/onto.git", "ssh://git@host/onto", "../onto"] {
            let src = format!(
                "[db]\npath = \"h.sqlite\"\n[harvest]\nbase_url = \"https://x.org\"\n[repositories.onto]\nurl = \"{}\"\n",
                ok
            );
            assert!(parse(&src).is_ok(), "{} should be accepted", ok);
        }
    }

    #[test]
    fn optional_config_only_tolerates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_optional_config(&missing).unwrap().is_none());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[db\npath = ").unwrap();
        assert!(load_optional_config(&broken).is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let err = parse(
            r#"
            [db]
            path = "h.sqlite"
            [harvest]
            base_url = "https://x.org"
            workers = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = parse(
            r#"
            [db]
            path = "h.sqlite"
            [harvest]
            base_url = "ftp://x.org"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn rejects_uppercase_repository_id() {
        let err = parse(
            r#"
            [db]
            path = "h.sqlite"
            [harvest]
            base_url = "https://x.org"
            [repositories.Onto]
            url = "https://github.com/org/onto"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Onto"));
    }
}
