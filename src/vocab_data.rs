//! Companion tabular data of controlled vocabularies.
//!
//! A vocabulary leaf may ship a CSV file alongside its graph. Each row
//! becomes one JSON record keyed by header name; the records are indexed
//! into the vocabulary-data index so the catalog can serve the codes.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ExtractError;
use crate::models::{Instance, VocabularyDetails};

/// One row of vocabulary data.
pub type VocabularyRecord = Map<String, Value>;

/// Index holding the data of one vocabulary, qualified by instance when
/// blue/green publication is active.
pub fn vocabulary_index_name(details: &VocabularyDetails, instance: Option<Instance>) -> String {
    let base = format!("{}.{}", details.agency_id, details.key_concept).to_ascii_lowercase();
    match instance {
        Some(instance) => format!("{}-{}", base, instance),
        None => base,
    }
}

/// Parse a CSV file with a header row into records.
pub fn read_records(path: &Path) -> Result<Vec<VocabularyRecord>, ExtractError> {
    let fail = |reason: String| ExtractError::CompanionData {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| fail(e.to_string()))?;

    let headers = reader.headers().map_err(|e| fail(e.to_string()))?.clone();
    if headers.is_empty() {
        return Err(fail("missing header row".to_string()));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| fail(e.to_string()))?;
        let record: VocabularyRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}
