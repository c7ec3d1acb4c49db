//! Predicate readers shared by the asset-kind extractors.
//!
//! Readers return `Result<_, FieldIssue>` so the caller can route them
//! through a [`ValidationContext`](super::validation::ValidationContext).
//! Distribution reading is the exception: a malformed distribution is an
//! [`ExtractError::InvalidStructure`] and bypasses the context.

use chrono::NaiveDate;

use crate::error::ExtractError;
use crate::models::{AgentRef, Distribution, KeyClass};
use crate::rdf::{vocab, Graph, Literal, Term};

use super::validation::FieldIssue;

/// Pick the preferred literal among several language variants: untagged
/// first, then Italian, then English, then whatever comes first.
fn preferred<'a>(literals: &[&'a Literal]) -> Option<&'a Literal> {
    let by_lang = |lang: Option<&str>| {
        literals
            .iter()
            .copied()
            .find(|l| l.language.as_deref() == lang)
    };
    by_lang(None)
        .or_else(|| by_lang(Some("it")))
        .or_else(|| by_lang(Some("en")))
        .or_else(|| literals.first().copied())
}

pub fn optional_literal(graph: &Graph, subject: &Term, predicate: &str) -> Option<String> {
    let literals: Vec<&Literal> = graph
        .objects(subject, predicate)
        .filter_map(Term::as_literal)
        .collect();
    preferred(&literals)
        .map(|l| l.value.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required_literal(graph: &Graph, subject: &Term, predicate: &str) -> Result<String, FieldIssue> {
    optional_literal(graph, subject, predicate).ok_or_else(|| FieldIssue::missing(predicate))
}

/// All literal values, in graph order, without duplicates.
pub fn literals(graph: &Graph, subject: &Term, predicate: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in graph
        .objects(subject, predicate)
        .filter_map(Term::as_literal)
        .map(|l| l.value.trim().to_string())
    {
        if !value.is_empty() && !values.contains(&value) {
            values.push(value);
        }
    }
    values
}

pub fn iris(graph: &Graph, subject: &Term, predicate: &str) -> Vec<String> {
    graph
        .objects(subject, predicate)
        .filter_map(Term::as_iri)
        .map(str::to_string)
        .collect()
}

pub fn optional_iri(graph: &Graph, subject: &Term, predicate: &str) -> Option<String> {
    iris(graph, subject, predicate).into_iter().next()
}

/// At least one IRI object.
pub fn required_iris(graph: &Graph, subject: &Term, predicate: &str) -> Result<Vec<String>, FieldIssue> {
    let values = iris(graph, subject, predicate);
    if values.is_empty() {
        return Err(FieldIssue::missing(predicate));
    }
    Ok(values)
}

/// Parse an `xsd:date` or the date part of an `xsd:dateTime`.
pub fn parse_date(value: &str) -> Result<NaiveDate, FieldIssue> {
    let value = value.trim();
    let date_part = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| FieldIssue(format!("'{}' is not a valid date", value)))
}

pub fn optional_date(graph: &Graph, subject: &Term, predicate: &str) -> Result<Option<NaiveDate>, FieldIssue> {
    optional_literal(graph, subject, predicate)
        .map(|v| parse_date(&v))
        .transpose()
}

pub fn required_date(graph: &Graph, subject: &Term, predicate: &str) -> Result<NaiveDate, FieldIssue> {
    parse_date(&required_literal(graph, subject, predicate)?)
}

/// Read the rights holder agent. The IRI is always required; the
/// identifier only when `require_identifier` is set.
pub fn rights_holder(graph: &Graph, subject: &Term, require_identifier: bool) -> Result<AgentRef, FieldIssue> {
    let holder = graph
        .objects(subject, vocab::DCT_RIGHTS_HOLDER)
        .find(|t| t.as_iri().is_some())
        .ok_or_else(|| FieldIssue::missing(vocab::DCT_RIGHTS_HOLDER))?;

    let identifier = optional_literal(graph, holder, vocab::DCT_IDENTIFIER);
    if require_identifier && identifier.is_none() {
        return Err(FieldIssue(format!(
            "rights holder <{}> has no dct:identifier",
            holder.lexical().unwrap_or_default()
        )));
    }

    Ok(AgentRef {
        iri: holder.lexical().unwrap_or_default().to_string(),
        identifier,
        name: optional_literal(graph, holder, vocab::FOAF_NAME),
    })
}

fn node_id(term: &Term) -> String {
    match term {
        Term::Blank(id) => format!("_:{}", id),
        other => other.lexical().unwrap_or_default().to_string(),
    }
}

/// Distributions whose `dct:format` is one of `accepted`.
///
/// A matching distribution without an access URL is a malformed published
/// artifact and fails the asset.
pub fn distributions(graph: &Graph, subject: &Term, accepted: &[String]) -> Result<Vec<Distribution>, ExtractError> {
    let mut found = Vec::new();
    for dist in graph.objects(subject, vocab::DCAT_DISTRIBUTION) {
        let Some(format) = graph
            .objects(dist, vocab::DCT_FORMAT)
            .filter_map(Term::lexical)
            .find(|f| accepted.iter().any(|a| a == f))
        else {
            continue;
        };

        let access_url = graph
            .objects(dist, vocab::DCAT_ACCESS_URL)
            .filter_map(Term::lexical)
            .next()
            .ok_or_else(|| {
                ExtractError::InvalidStructure(format!(
                    "distribution {} with format <{}> has no dcat:accessURL",
                    node_id(dist),
                    format
                ))
            })?;

        found.push(Distribution {
            iri: node_id(dist),
            format: format.to_string(),
            access_url: access_url.to_string(),
            download_url: graph
                .objects(dist, vocab::DCAT_DOWNLOAD_URL)
                .filter_map(Term::lexical)
                .next()
                .map(str::to_string),
        });
    }
    Ok(found)
}

pub fn key_classes(graph: &Graph, subject: &Term) -> Vec<KeyClass> {
    graph
        .objects(subject, vocab::ADMS_HAS_KEY_CLASS)
        .filter_map(|class| {
            class.as_iri().map(|iri| KeyClass {
                iri: iri.to_string(),
                label: optional_literal(graph, class, vocab::RDFS_LABEL),
            })
        })
        .collect()
}
