//! Asset model loading and metadata extraction.
//!
//! One [`AssetModel`] variant exists per [`AssetKind`]. Each variant owns
//! the parsed graph of one file group, resolves the single main resource
//! typed with its kind's class, and extracts [`SemanticAssetMetadata`]
//! through a [`ValidationContext`].
//!
//! | Kind | Main-resource class | Variant |
//! |------|---------------------|---------|
//! | Ontology | `owl:Ontology` | [`ontology::OntologyModel`] |
//! | Controlled vocabulary | `skos:ConceptScheme` | [`vocabulary::VocabularyModel`] |
//! | Schema | `dcatapit:Dataset` | [`schema::SchemaModel`] |

pub mod fields;
pub mod ontology;
pub mod schema;
pub mod validation;
pub mod vocabulary;

use std::path::Path;

use chrono::NaiveDate;

use crate::error::ExtractError;
use crate::models::{AgentRef, AssetKind, AssetPathGroup, Distribution, KindDetails, SemanticAssetMetadata};
use crate::rdf::{vocab, Graph, Term};

use validation::ValidationContext;

/// Behavior shared by every asset-kind model.
pub trait AssetModel: Send {
    fn kind(&self) -> AssetKind;

    fn graph(&self) -> &Graph;

    /// The single resource typed with this kind's expected class.
    fn main_resource(&self) -> Result<Term, ExtractError>;

    /// Extract the metadata of this asset.
    ///
    /// Field issues go through `ctx`; structural problems are always
    /// returned as errors.
    fn extract_metadata(&self, ctx: &mut ValidationContext) -> Result<SemanticAssetMetadata, ExtractError>;

    /// Add derived statements to the in-memory graph before it is stored.
    fn enrich(&mut self) -> Result<(), ExtractError> {
        Ok(())
    }

    fn into_graph(self: Box<Self>) -> Graph;
}

/// State common to all variants.
#[derive(Debug, Clone)]
pub struct ModelCore {
    pub graph: Graph,
    pub repo_url: String,
    /// Snapshot-relative path of the primary file.
    pub source_path: String,
}

impl ModelCore {
    /// Resolve the one subject typed with `class`.
    pub fn main_resource(&self, class: &str) -> Result<Term, ExtractError> {
        match self.graph.subjects_of_type(class).as_slice() {
            [Term::Iri(iri)] => Ok(Term::Iri(iri.clone())),
            [other] => Err(ExtractError::InvalidStructure(format!(
                "main resource of type <{}> must be an IRI, found {}",
                class, other
            ))),
            [] => Err(ExtractError::InvalidStructure(format!(
                "no resource of type <{}> found in {}",
                class, self.source_path
            ))),
            many => Err(ExtractError::InvalidStructure(format!(
                "expected exactly one resource of type <{}>, found {}",
                class,
                many.len()
            ))),
        }
    }
}

/// Fields every kind extracts the same way.
pub(crate) struct CommonFields {
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
}

impl CommonFields {
    pub fn extract(
        core: &ModelCore,
        main: &Term,
        ctx: &mut ValidationContext,
        require_holder_identifier: bool,
        formats: &[String],
    ) -> Result<Self, ExtractError> {
        let g = &core.graph;

        let title = ctx.check("title", fields::required_literal(g, main, vocab::DCT_TITLE))?;
        let description = ctx.check(
            "description",
            fields::required_literal(g, main, vocab::DCT_DESCRIPTION),
        )?;
        let rights_holder = ctx.check(
            "rightsHolder",
            fields::rights_holder(g, main, require_holder_identifier),
        )?;
        let modified_on = ctx.check("modified", fields::required_date(g, main, vocab::DCT_MODIFIED))?;
        let issued_on = ctx
            .check("issued", fields::optional_date(g, main, vocab::DCT_ISSUED))?
            .flatten();
        if issued_on.is_none() && fields::optional_literal(g, main, vocab::DCT_ISSUED).is_none() {
            ctx.warn("issued", format!("no <{}> value", vocab::DCT_ISSUED));
        }
        let themes = ctx.check("themes", fields::required_iris(g, main, vocab::DCAT_THEME))?;
        let distributions = fields::distributions(g, main, formats)?;

        Ok(Self {
            title: title.unwrap_or_default(),
            description: description.unwrap_or_default(),
            rights_holder: rights_holder.unwrap_or_default(),
            modified_on,
            issued_on,
            themes: themes.unwrap_or_default(),
            distributions,
            version_info: fields::optional_literal(g, main, vocab::OWL_VERSION_INFO),
            keywords: fields::literals(g, main, vocab::DCAT_KEYWORD),
            languages: fields::iris(g, main, vocab::DCT_LANGUAGE),
            accrual_periodicity: fields::optional_iri(g, main, vocab::DCT_ACCRUAL_PERIODICITY),
            conforms_to: fields::iris(g, main, vocab::DCT_CONFORMS_TO),
        })
    }

    pub fn into_metadata(self, core: &ModelCore, main: &Term, details: KindDetails) -> SemanticAssetMetadata {
        SemanticAssetMetadata {
            iri: main.lexical().unwrap_or_default().to_string(),
            repo_url: core.repo_url.clone(),
            source_path: core.source_path.clone(),
            title: self.title,
            description: self.description,
            rights_holder: self.rights_holder,
            modified_on: self.modified_on,
            issued_on: self.issued_on,
            themes: self.themes,
            distributions: self.distributions,
            version_info: self.version_info,
            keywords: self.keywords,
            languages: self.languages,
            accrual_periodicity: self.accrual_periodicity,
            conforms_to: self.conforms_to,
            details,
        }
    }
}

/// Loads file groups of one snapshot into asset models.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    snapshot_root: std::path::PathBuf,
    repo_url: String,
    base_url: String,
}

impl AssetLoader {
    pub fn new(snapshot_root: &Path, repo_url: &str, base_url: &str) -> Self {
        Self {
            snapshot_root: snapshot_root.to_path_buf(),
            repo_url: repo_url.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Parse the group's primary graph and wrap it in its kind's model.
    pub fn load(&self, group: &AssetPathGroup) -> Result<Box<dyn AssetModel>, ExtractError> {
        let graph = Graph::load_turtle(&group.primary)?;
        let source_path = group
            .primary
            .strip_prefix(&self.snapshot_root)
            .unwrap_or(&group.primary)
            .to_string_lossy()
            .replace('\\', "/");
        let core = ModelCore {
            graph,
            repo_url: self.repo_url.clone(),
            source_path,
        };

        Ok(match group.kind {
            AssetKind::Ontology => Box::new(ontology::OntologyModel::new(core)),
            AssetKind::ControlledVocabulary => {
                Box::new(vocabulary::VocabularyModel::new(core, &self.base_url))
            }
            AssetKind::Schema => Box::new(schema::SchemaModel::new(core)),
        })
    }
}
