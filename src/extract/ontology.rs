use crate::error::ExtractError;
use crate::models::{AssetKind, ClassDetails, KindDetails, SemanticAssetMetadata};
use crate::rdf::{vocab, Graph, Term};

use super::validation::ValidationContext;
use super::{fields, AssetModel, CommonFields, ModelCore};

/// An `owl:Ontology` asset.
pub struct OntologyModel {
    core: ModelCore,
}

impl OntologyModel {
    pub fn new(core: ModelCore) -> Self {
        Self { core }
    }
}

impl AssetModel for OntologyModel {
    fn kind(&self) -> AssetKind {
        AssetKind::Ontology
    }

    fn graph(&self) -> &Graph {
        &self.core.graph
    }

    fn main_resource(&self) -> Result<Term, ExtractError> {
        self.core.main_resource(vocab::OWL_ONTOLOGY)
    }

    fn extract_metadata(&self, ctx: &mut ValidationContext) -> Result<SemanticAssetMetadata, ExtractError> {
        let main = self.main_resource()?;
        let common = CommonFields::extract(&self.core, &main, ctx, false, &vocab::graph_formats())?;

        let key_classes = fields::key_classes(&self.core.graph, &main);
        if key_classes.is_empty() {
            ctx.warn("keyClasses", "ontology declares no key classes");
        }

        Ok(common.into_metadata(
            &self.core,
            &main,
            KindDetails::Ontology(ClassDetails { key_classes }),
        ))
    }

    fn into_graph(self: Box<Self>) -> Graph {
        self.core.graph
    }
}
