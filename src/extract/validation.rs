//! Field-level validation context.
//!
//! Every field extractor reports through a [`ValidationContext`]. In
//! [`ValidationMode::Fatal`] the first field issue is returned as an
//! error; in [`ValidationMode::Accumulate`] issues are recorded and the
//! extractor moves on to the next field.

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// How field issues are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    #[default]
    Fatal,
    Accumulate,
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEntry {
    pub field: String,
    pub message: String,
}

/// Errors and warnings for one asset, each list deduplicated by message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub errors: Vec<ValidationEntry>,
    pub warnings: Vec<ValidationEntry>,
}

impl ValidationRecord {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn push(list: &mut Vec<ValidationEntry>, field: &str, message: &str) {
        let message = normalize_message(message);
        if list.iter().any(|e| e.message == message) {
            return;
        }
        list.push(ValidationEntry {
            field: field.to_string(),
            message,
        });
    }
}

/// Collapse whitespace so equivalent messages deduplicate.
fn normalize_message(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A field-level problem produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue(pub String);

impl FieldIssue {
    pub fn missing(predicate: &str) -> Self {
        FieldIssue(format!("missing required value for <{}>", predicate))
    }
}

impl From<String> for FieldIssue {
    fn from(message: String) -> Self {
        FieldIssue(message)
    }
}

impl From<&str> for FieldIssue {
    fn from(message: &str) -> Self {
        FieldIssue(message.to_string())
    }
}

/// Collects field issues according to a [`ValidationMode`].
#[derive(Debug, Default)]
pub struct ValidationContext {
    mode: ValidationMode,
    record: ValidationRecord,
}

impl ValidationContext {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            record: ValidationRecord::default(),
        }
    }

    /// Pass a field result through the context.
    ///
    /// Returns `Ok(Some(value))` on success, `Ok(None)` when the issue was
    /// recorded, and `Err` when the mode is fatal.
    pub fn check<T>(&mut self, field: &str, result: Result<T, FieldIssue>) -> Result<Option<T>, ExtractError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(FieldIssue(message)) => match self.mode {
                ValidationMode::Fatal => Err(ExtractError::FieldValidation {
                    field: field.to_string(),
                    message,
                }),
                ValidationMode::Accumulate => {
                    ValidationRecord::push(&mut self.record.errors, field, &message);
                    Ok(None)
                }
            },
        }
    }

    /// Record a warning. Warnings never abort extraction.
    pub fn warn(&mut self, field: &str, message: impl AsRef<str>) {
        ValidationRecord::push(&mut self.record.warnings, field, message.as_ref());
    }

    pub fn record(&self) -> &ValidationRecord {
        &self.record
    }

    pub fn into_record(self) -> ValidationRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_mode_raises_first_issue() {
        let mut ctx = ValidationContext::new(ValidationMode::Fatal);
        let err = ctx
            .check::<String>("title", Err(FieldIssue::missing("dct:title")))
            .unwrap_err();
        assert!(matches!(err, ExtractError::FieldValidation { ref field, .. } if field == "title"));
        assert!(ctx.record().is_empty());
    }

    #[test]
    fn accumulate_mode_records_and_continues() {
        let mut ctx = ValidationContext::new(ValidationMode::Accumulate);
        assert_eq!(ctx.check::<String>("title", Err("missing  title".into())).unwrap(), None);
        assert_eq!(ctx.check("description", Ok("d".to_string())).unwrap(), Some("d".to_string()));
        assert_eq!(ctx.record().errors.len(), 1);
        assert_eq!(ctx.record().errors[0].message, "missing title");
    }

    #[test]
    fn entries_deduplicate_by_message() {
        let mut ctx = ValidationContext::new(ValidationMode::Accumulate);
        ctx.check::<()>("theme", Err("bad theme".into())).unwrap();
        ctx.check::<()>("themes", Err("bad \n theme".into())).unwrap();
        ctx.warn("issued", "no issue date");
        ctx.warn("issued", "no issue date");
        let record = ctx.into_record();
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.warnings.len(), 1);
        assert!(record.has_errors());
    }
}
