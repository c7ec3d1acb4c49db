use regex::Regex;
use std::sync::OnceLock;

use crate::error::ExtractError;
use crate::models::{AssetKind, KindDetails, SemanticAssetMetadata, VocabularyDetails};
use crate::rdf::{vocab, Graph, Term, Triple};

use super::validation::{FieldIssue, ValidationContext, ValidationMode};
use super::{fields, AssetModel, CommonFields, ModelCore};

fn key_concept_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").expect("static pattern"))
}

/// Validate a key-concept token: alphanumerics and inner hyphens only.
pub fn validate_key_concept(value: &str) -> Result<String, FieldIssue> {
    if key_concept_pattern().is_match(value) {
        Ok(value.to_string())
    } else {
        Err(FieldIssue(format!(
            "key concept '{}' must contain only letters, digits and inner hyphens",
            value
        )))
    }
}

/// Data-access endpoint of a vocabulary. Path segments are lowercased
/// like the name of the vocabulary's data index.
pub fn endpoint_url(base_url: &str, agency_id: &str, key_concept: &str) -> String {
    format!(
        "{}/vocabularies/{}/{}",
        base_url.trim_end_matches('/'),
        agency_id.to_ascii_lowercase(),
        key_concept.to_ascii_lowercase()
    )
}

/// A `skos:ConceptScheme` controlled vocabulary.
pub struct VocabularyModel {
    core: ModelCore,
    base_url: String,
}

impl VocabularyModel {
    pub fn new(core: ModelCore, base_url: &str) -> Self {
        Self {
            core,
            base_url: base_url.to_string(),
        }
    }

    fn key_concept(&self, main: &Term) -> Result<String, FieldIssue> {
        let value = fields::required_literal(&self.core.graph, main, vocab::NDC_KEY_CONCEPT)?;
        validate_key_concept(&value)
    }

    fn agency_id(&self, main: &Term) -> Result<String, FieldIssue> {
        fields::rights_holder(&self.core.graph, main, true)
            .map(|holder| holder.identifier.unwrap_or_default())
    }
}

impl AssetModel for VocabularyModel {
    fn kind(&self) -> AssetKind {
        AssetKind::ControlledVocabulary
    }

    fn graph(&self) -> &Graph {
        &self.core.graph
    }

    fn main_resource(&self) -> Result<Term, ExtractError> {
        self.core.main_resource(vocab::SKOS_CONCEPT_SCHEME)
    }

    fn extract_metadata(&self, ctx: &mut ValidationContext) -> Result<SemanticAssetMetadata, ExtractError> {
        let main = self.main_resource()?;
        let common = CommonFields::extract(&self.core, &main, ctx, true, &vocab::graph_formats())?;

        let key_concept = ctx.check("keyConcept", self.key_concept(&main))?.unwrap_or_default();
        let agency_id = common.rights_holder.identifier.clone().unwrap_or_default();
        let endpoint = if key_concept.is_empty() || agency_id.is_empty() {
            String::new()
        } else {
            endpoint_url(&self.base_url, &agency_id, &key_concept)
        };

        Ok(common.into_metadata(
            &self.core,
            &main,
            KindDetails::ControlledVocabulary(VocabularyDetails {
                key_concept,
                agency_id,
                endpoint_url: endpoint,
            }),
        ))
    }

    /// Describe the vocabulary's data service in the graph:
    ///
    /// ```text
    /// <endpoint> a dcat:DataService ;
    ///     dcat:endpointURL <endpoint> ;
    ///     dcat:servesDataset <main> .
    /// <main> ndc:hasDataService <endpoint> .
    /// ```
    fn enrich(&mut self) -> Result<(), ExtractError> {
        let main = self.main_resource()?;
        let mut ctx = ValidationContext::new(ValidationMode::Fatal);
        let key_concept = ctx.check("keyConcept", self.key_concept(&main))?.unwrap_or_default();
        let agency_id = ctx.check("rightsHolder", self.agency_id(&main))?.unwrap_or_default();

        let endpoint = Term::iri(endpoint_url(&self.base_url, &agency_id, &key_concept));
        let graph = &mut self.core.graph;
        graph.insert(Triple::new(
            endpoint.clone(),
            vocab::RDF_TYPE,
            Term::iri(vocab::DCAT_DATA_SERVICE),
        ));
        graph.insert(Triple::new(endpoint.clone(), vocab::DCAT_ENDPOINT_URL, endpoint.clone()));
        graph.insert(Triple::new(endpoint.clone(), vocab::DCAT_SERVES_DATASET, main.clone()));
        graph.insert(Triple::new(main, vocab::NDC_HAS_DATA_SERVICE, endpoint));
        Ok(())
    }

    fn into_graph(self: Box<Self>) -> Graph {
        self.core.graph
    }
}
