use crate::error::ExtractError;
use crate::models::{AssetKind, ClassDetails, KindDetails, SemanticAssetMetadata};
use crate::rdf::{vocab, Graph, Term};

use super::validation::ValidationContext;
use super::{fields, AssetModel, CommonFields, ModelCore};

/// A schema asset, described by a `dcatapit:Dataset` index graph whose
/// distributions point at the schema documents.
pub struct SchemaModel {
    core: ModelCore,
}

impl SchemaModel {
    pub fn new(core: ModelCore) -> Self {
        Self { core }
    }
}

impl AssetModel for SchemaModel {
    fn kind(&self) -> AssetKind {
        AssetKind::Schema
    }

    fn graph(&self) -> &Graph {
        &self.core.graph
    }

    fn main_resource(&self) -> Result<Term, ExtractError> {
        self.core.main_resource(vocab::DCATAPIT_DATASET)
    }

    fn extract_metadata(&self, ctx: &mut ValidationContext) -> Result<SemanticAssetMetadata, ExtractError> {
        let main = self.main_resource()?;
        let common = CommonFields::extract(&self.core, &main, ctx, false, &vocab::schema_formats())?;
        if common.distributions.is_empty() {
            ctx.warn("distributions", "schema publishes no schema-format distribution");
        }

        Ok(common.into_metadata(
            &self.core,
            &main,
            KindDetails::Schema(ClassDetails {
                key_classes: fields::key_classes(&self.core.graph, &main),
            }),
        ))
    }

    fn into_graph(self: Box<Self>) -> Graph {
        self.core.graph
    }
}
