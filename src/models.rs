//! Core data models shared across the harvest pipeline.
//!
//! These types represent the resolved file groups, extracted metadata,
//! published instances, and run records that flow from the locator through
//! the extractors into the stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::extract::validation::ValidationRecord;

/// The kinds of semantic asset a repository can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Ontology,
    ControlledVocabulary,
    Schema,
}

impl AssetKind {
    /// Fixed harvest order.
    pub const ALL: [AssetKind; 3] = [
        AssetKind::Ontology,
        AssetKind::ControlledVocabulary,
        AssetKind::Schema,
    ];

    /// Stable identifier used in store keys and index names.
    pub fn slug(&self) -> &'static str {
        match self {
            AssetKind::Ontology => "ontologies",
            AssetKind::ControlledVocabulary => "controlled-vocabularies",
            AssetKind::Schema => "schemas",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AssetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ontology" | "ontologies" => Ok(AssetKind::Ontology),
            "controlled-vocabulary" | "controlled-vocabularies" | "vocabulary" | "vocabularies" => {
                Ok(AssetKind::ControlledVocabulary)
            }
            "schema" | "schemas" => Ok(AssetKind::Schema),
            other => Err(format!(
                "unknown asset kind '{}': expected ontology, vocabulary, or schema",
                other
            )),
        }
    }
}

/// One resolved file group for one asset kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssetPathGroup {
    pub kind: AssetKind,
    /// The primary graph (Turtle) file.
    pub primary: PathBuf,
    /// Optional companion tabular (CSV) file.
    pub companion: Option<PathBuf>,
}

/// Agent reference (rights holder, publisher, creator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub iri: String,
    pub identifier: Option<String>,
    pub name: Option<String>,
}

/// A published distribution of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub iri: String,
    pub format: String,
    pub access_url: String,
    pub download_url: Option<String>,
}

/// A key class declared by an ontology or schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyClass {
    pub iri: String,
    pub label: Option<String>,
}

/// Fields that only controlled vocabularies carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyDetails {
    pub key_concept: String,
    pub agency_id: String,
    pub endpoint_url: String,
}

/// Fields that ontologies and schemas carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDetails {
    pub key_classes: Vec<KeyClass>,
}

/// Kind-specific payload of [`SemanticAssetMetadata`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindDetails {
    Ontology(ClassDetails),
    ControlledVocabulary(VocabularyDetails),
    Schema(ClassDetails),
}

impl KindDetails {
    pub fn kind(&self) -> AssetKind {
        match self {
            KindDetails::Ontology(_) => AssetKind::Ontology,
            KindDetails::ControlledVocabulary(_) => AssetKind::ControlledVocabulary,
            KindDetails::Schema(_) => AssetKind::Schema,
        }
    }
}

/// Metadata extracted from one asset. Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticAssetMetadata {
    pub iri: String,
    pub repo_url: String,
    /// Snapshot-relative path of the primary graph file.
    pub source_path: String,
    pub title: String,
    pub description: String,
    pub rights_holder: AgentRef,
    pub modified_on: Option<NaiveDate>,
    pub issued_on: Option<NaiveDate>,
    pub themes: Vec<String>,
    pub distributions: Vec<Distribution>,
    pub version_info: Option<String>,
    pub keywords: Vec<String>,
    pub languages: Vec<String>,
    pub accrual_periodicity: Option<String>,
    pub conforms_to: Vec<String>,
    pub details: KindDetails,
}

impl SemanticAssetMetadata {
    pub fn kind(&self) -> AssetKind {
        self.details.kind()
    }

    pub fn vocabulary(&self) -> Option<&VocabularyDetails> {
        match &self.details {
            KindDetails::ControlledVocabulary(v) => Some(v),
            _ => None,
        }
    }

    pub fn key_classes(&self) -> &[KeyClass] {
        match &self.details {
            KindDetails::Ontology(c) | KindDetails::Schema(c) => &c.key_classes,
            KindDetails::ControlledVocabulary(_) => &[],
        }
    }
}

/// One of two parallel copies of a repository's published data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Instance {
    #[default]
    Primary,
    Secondary,
}

impl Instance {
    pub fn opposite(self) -> Instance {
        match self {
            Instance::Primary => Instance::Secondary,
            Instance::Secondary => Instance::Primary,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Instance::Primary => "primary",
            Instance::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Instance::Primary),
            "secondary" => Ok(Instance::Secondary),
            other => Err(format!("unknown instance '{}'", other)),
        }
    }
}

/// Status of a [`HarvestRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarvestStatus {
    /// Not yet finalized.
    Running,
    Success,
    Failed,
    Unchanged,
    AlreadyRunning,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStatus::Running => "RUNNING",
            HarvestStatus::Success => "SUCCESS",
            HarvestStatus::Failed => "FAILED",
            HarvestStatus::Unchanged => "UNCHANGED",
            HarvestStatus::AlreadyRunning => "ALREADY_RUNNING",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, HarvestStatus::Running)
    }
}

impl FromStr for HarvestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(HarvestStatus::Running),
            "SUCCESS" => Ok(HarvestStatus::Success),
            "FAILED" => Ok(HarvestStatus::Failed),
            "UNCHANGED" => Ok(HarvestStatus::Unchanged),
            "ALREADY_RUNNING" => Ok(HarvestStatus::AlreadyRunning),
            other => Err(format!("unknown harvest status '{}'", other)),
        }
    }
}

/// An asset that could not be harvested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub path: String,
    pub reason: String,
}

/// Validation problems recorded for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetValidation {
    pub path: String,
    pub iri: Option<String>,
    pub record: ValidationRecord,
}

/// Per-run outcome counters and findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestReport {
    pub assets_harvested: u64,
    pub failures: Vec<AssetFailure>,
    pub validations: Vec<AssetValidation>,
    /// Instance written by this run, when blue/green is active.
    pub write_target: Option<Instance>,
}

impl HarvestReport {
    pub fn asset_failures(&self) -> u64 {
        self.failures.len() as u64
    }
}

/// One pipeline execution for a repository and revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestRun {
    pub id: Uuid,
    pub repo_id: String,
    /// Requested revision, replaced by the resolved one once fetched.
    pub revision: Option<String>,
    pub correlation_id: Uuid,
    pub actor: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: HarvestStatus,
    pub reason: Option<String>,
    pub report: HarvestReport,
}

impl HarvestRun {
    pub fn start(request: &HarvestRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_id: request.repo_id.clone(),
            revision: request.revision.clone(),
            correlation_id: request.correlation_id.unwrap_or_else(Uuid::new_v4),
            actor: request.actor.clone(),
            started_at: Utc::now(),
            ended_at: None,
            status: HarvestStatus::Running,
            reason: None,
            report: HarvestReport::default(),
        }
    }

    /// Consume the running record into its terminal form.
    pub fn finish(mut self, status: HarvestStatus, reason: Option<String>) -> Self {
        self.status = status;
        self.reason = reason;
        self.ended_at = Some(Utc::now());
        self
    }
}

/// Parameters of one harvest invocation.
#[derive(Debug, Clone, Default)]
pub struct HarvestRequest {
    pub repo_id: String,
    pub revision: Option<String>,
    pub force: bool,
    pub actor: Option<String>,
    pub correlation_id: Option<Uuid>,
}

impl HarvestRequest {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            ..Default::default()
        }
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Carry the trigger's correlation id instead of a generated one.
    pub fn correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }
}
