//! Owned in-memory graph model for asset files.
//!
//! Turtle input is parsed with `oxttl` and converted into plain, ordered
//! [`Triple`]s so extractors and stores can work with the graph without
//! holding parser types. Serialization is N-Triples, one statement per
//! line, which is also the row format of the SQLite graph store.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use oxttl::TurtleParser;
use uuid::Uuid;

use crate::error::ExtractError;

pub mod vocab {
    //! IRIs of the terms the extractors read and write.

    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const OWL_ONTOLOGY: &str = "http://www.w3.org/2002/07/owl#Ontology";
    pub const OWL_VERSION_INFO: &str = "http://www.w3.org/2002/07/owl#versionInfo";
    pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";
    pub const DCATAPIT_DATASET: &str = "http://dati.gov.it/onto/dcatapit#Dataset";

    pub const DCT_TITLE: &str = "http://purl.org/dc/terms/title";
    pub const DCT_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
    pub const DCT_RIGHTS_HOLDER: &str = "http://purl.org/dc/terms/rightsHolder";
    pub const DCT_IDENTIFIER: &str = "http://purl.org/dc/terms/identifier";
    pub const DCT_MODIFIED: &str = "http://purl.org/dc/terms/modified";
    pub const DCT_ISSUED: &str = "http://purl.org/dc/terms/issued";
    pub const DCT_FORMAT: &str = "http://purl.org/dc/terms/format";
    pub const DCT_LANGUAGE: &str = "http://purl.org/dc/terms/language";
    pub const DCT_ACCRUAL_PERIODICITY: &str = "http://purl.org/dc/terms/accrualPeriodicity";
    pub const DCT_CONFORMS_TO: &str = "http://purl.org/dc/terms/conformsTo";
    pub const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";

    pub const DCAT_THEME: &str = "http://www.w3.org/ns/dcat#theme";
    pub const DCAT_KEYWORD: &str = "http://www.w3.org/ns/dcat#keyword";
    pub const DCAT_DISTRIBUTION: &str = "http://www.w3.org/ns/dcat#distribution";
    pub const DCAT_ACCESS_URL: &str = "http://www.w3.org/ns/dcat#accessURL";
    pub const DCAT_DOWNLOAD_URL: &str = "http://www.w3.org/ns/dcat#downloadURL";
    pub const DCAT_DATA_SERVICE: &str = "http://www.w3.org/ns/dcat#DataService";
    pub const DCAT_ENDPOINT_URL: &str = "http://www.w3.org/ns/dcat#endpointURL";
    pub const DCAT_SERVES_DATASET: &str = "http://www.w3.org/ns/dcat#servesDataset";

    pub const ADMS_HAS_KEY_CLASS: &str = "https://w3id.org/italia/onto/ADMS/hasKeyClass";
    pub const NDC_KEY_CONCEPT: &str = "https://w3id.org/italia/onto/NDC/keyConcept";
    pub const NDC_HAS_DATA_SERVICE: &str = "https://w3id.org/italia/onto/NDC/hasDataService";

    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

    const FILE_TYPE: &str = "http://publications.europa.eu/resource/authority/file-type/";

    /// Formats accepted for ontology and vocabulary distributions.
    pub fn graph_formats() -> Vec<String> {
        ["RDF_TURTLE", "RDF_XML", "JSON_LD", "RDF_N_TRIPLES"]
            .iter()
            .map(|f| format!("{}{}", FILE_TYPE, f))
            .collect()
    }

    /// Formats accepted for schema distributions.
    pub fn schema_formats() -> Vec<String> {
        let mut formats: Vec<String> = ["JSON", "YAML"]
            .iter()
            .map(|f| format!("{}{}", FILE_TYPE, f))
            .collect();
        formats.push("application/vnd.oai.openapi".to_string());
        formats.push("application/vnd.oai.openapi+json".to_string());
        formats
    }
}

/// An RDF literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub value: String,
    pub datatype: String,
    pub language: Option<String>,
}

/// An RDF term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            datatype: vocab::XSD_STRING.to_string(),
            language: None,
        })
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// IRI or literal lexical value. Blank nodes have none.
    pub fn lexical(&self) -> Option<&str> {
        match self {
            Term::Iri(v) => Some(v),
            Term::Literal(l) => Some(&l.value),
            Term::Blank(_) => None,
        }
    }
}

fn escape(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Blank(id) => write!(f, "_:{}", id),
            Term::Literal(lit) => {
                let mut escaped = String::with_capacity(lit.value.len() + 2);
                escape(&lit.value, &mut escaped);
                match &lit.language {
                    Some(lang) => write!(f, "\"{}\"@{}", escaped, lang),
                    None if lit.datatype == vocab::XSD_STRING => write!(f, "\"{}\"", escaped),
                    None => write!(f, "\"{}\"^^<{}>", escaped, lit.datatype),
                }
            }
        }
    }
}

/// One statement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    /// Whether the triple matches a pattern; `None` positions match anything.
    pub fn matches(&self, pattern: &TriplePattern) -> bool {
        pattern.subject.as_ref().map_or(true, |s| s == &self.subject)
            && pattern.predicate.as_ref().map_or(true, |p| p == &self.predicate)
            && pattern.object.as_ref().map_or(true, |o| o == &self.object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// A basic triple pattern for store queries.
#[derive(Debug, Clone, Default)]
pub struct TriplePattern {
    pub subject: Option<Term>,
    pub predicate: Option<String>,
    pub object: Option<Term>,
}

/// A set of triples with deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a Turtle file from disk.
    ///
    /// Blank node labels are local to the file, so every load gets its
    /// own label scope. Graphs of several files can then share a named
    /// graph without their blank nodes merging.
    pub fn load_turtle(path: &Path) -> Result<Self, ExtractError> {
        let load_err = |reason: String| ExtractError::Load {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read(path).map_err(|e| load_err(e.to_string()))?;
        let graph = Self::parse_turtle(&content).map_err(load_err)?;
        Ok(graph.with_blank_scope(&format!("b{}", Uuid::new_v4().simple())))
    }

    /// Prefix every blank node label with `scope`.
    pub fn with_blank_scope(self, scope: &str) -> Self {
        let relabel = |term: Term| match term {
            Term::Blank(label) => Term::Blank(format!("{}_{}", scope, label)),
            other => other,
        };
        self.triples
            .into_iter()
            .map(|t| Triple::new(relabel(t.subject), t.predicate, relabel(t.object)))
            .collect()
    }

    /// Parse Turtle from bytes. Blank node labels are kept as written.
    pub fn parse_turtle(input: &[u8]) -> Result<Self, String> {
        let mut graph = Graph::new();
        for triple in TurtleParser::new().for_reader(input) {
            let triple = triple.map_err(|e| e.to_string())?;
            let subject = match triple.subject {
                oxrdf::Subject::NamedNode(n) => Term::Iri(n.into_string()),
                oxrdf::Subject::BlankNode(b) => Term::Blank(b.into_string()),
                #[allow(unreachable_patterns)]
                _ => continue,
            };
            let object = match triple.object {
                oxrdf::Term::NamedNode(n) => Term::Iri(n.into_string()),
                oxrdf::Term::BlankNode(b) => Term::Blank(b.into_string()),
                oxrdf::Term::Literal(l) => Term::Literal(Literal {
                    value: l.value().to_string(),
                    datatype: l.datatype().as_str().to_string(),
                    language: l.language().map(str::to_string),
                }),
                #[allow(unreachable_patterns)]
                _ => continue,
            };
            graph.insert(Triple::new(subject, triple.predicate.into_string(), object));
        }
        Ok(graph)
    }

    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Distinct subjects typed with `class`.
    pub fn subjects_of_type(&self, class: &str) -> Vec<&Term> {
        let mut subjects: Vec<&Term> = self
            .triples
            .iter()
            .filter(|t| t.predicate == vocab::RDF_TYPE && t.object.as_iri() == Some(class))
            .map(|t| &t.subject)
            .collect();
        subjects.dedup();
        subjects
    }

    /// Objects of `subject predicate ?o`.
    pub fn objects<'a>(&'a self, subject: &'a Term, predicate: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.triples
            .iter()
            .filter(move |t| &t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    pub fn extend(&mut self, other: Graph) {
        self.triples.extend(other.triples);
    }

    /// Serialize as N-Triples.
    pub fn to_ntriples(&self) -> String {
        let mut out = String::new();
        for triple in &self.triples {
            out.push_str(&triple.to_string());
            out.push('\n');
        }
        out
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
@prefix dct: <http://purl.org/dc/terms/> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
<https://w3id.org/italia/onto/ACCO> a owl:Ontology ;
    dct:title "Accommodation"@en, "Strutture \"ricettive\""@it ;
    dct:modified "2023-01-01"^^<http://www.w3.org/2001/XMLSchema#date> .
"#;

    #[test]
    fn loaded_files_keep_blank_nodes_apart() {
        let dir = tempfile::tempdir().unwrap();
        let body = "_:dist <http://www.w3.org/ns/dcat#accessURL> <https://example.org/a.ttl> .\n\
                    <https://example.org/a> <http://www.w3.org/ns/dcat#distribution> _:dist .\n";
        std::fs::write(dir.path().join("a.ttl"), body).unwrap();
        std::fs::write(dir.path().join("b.ttl"), body.replace("a.ttl", "b.ttl")).unwrap();

        let a = Graph::load_turtle(&dir.path().join("a.ttl")).unwrap();
        let b = Graph::load_turtle(&dir.path().join("b.ttl")).unwrap();

        // Within one file the blank node is still a single resource
        let a_subject = &a.iter().find(|t| t.predicate == vocab::DCAT_ACCESS_URL).unwrap().subject;
        let a_iri = Term::iri("https://example.org/a");
        let a_dist: Vec<_> = a
            .objects(&a_iri, vocab::DCAT_DISTRIBUTION)
            .collect();
        assert_eq!(a_dist, vec![a_subject]);

        let mut merged = a.clone();
        merged.extend(b);
        let blanks: BTreeSet<_> = merged
            .iter()
            .filter(|t| t.predicate == vocab::DCAT_ACCESS_URL)
            .map(|t| t.subject.clone())
            .collect();
        assert_eq!(blanks.len(), 2);
    }

    #[test]
    fn parses_turtle_into_owned_terms() {
        let graph = Graph::parse_turtle(SAMPLE.as_bytes()).unwrap();
        assert_eq!(graph.len(), 4);
        let main = graph.subjects_of_type(vocab::OWL_ONTOLOGY);
        assert_eq!(main, vec![&Term::iri("https://w3id.org/italia/onto/ACCO")]);
        let titles: Vec<_> = graph.objects(main[0], vocab::DCT_TITLE).collect();
        assert_eq!(titles.len(), 2);
    }

    #[test]
    fn invalid_turtle_is_an_error() {
        assert!(Graph::parse_turtle(b"<a> <b> .").is_err());
    }

    #[test]
    fn ntriples_escape_literals() {
        let triple = Triple::new(
            Term::iri("http://x/s"),
            "http://x/p",
            Term::string("line \"one\"\nline two"),
        );
        assert_eq!(
            triple.to_string(),
            "<http://x/s> <http://x/p> \"line \\\"one\\\"\\nline two\" ."
        );
    }

    #[test]
    fn serialized_graph_parses_back() {
        let graph = Graph::parse_turtle(SAMPLE.as_bytes()).unwrap();
        let reparsed = Graph::parse_turtle(graph.to_ntriples().as_bytes()).unwrap();
        assert_eq!(graph, reparsed);
    }

    #[test]
    fn pattern_matching() {
        let t = Triple::new(Term::iri("s"), "p", Term::iri("o"));
        assert!(t.matches(&TriplePattern::default()));
        assert!(t.matches(&TriplePattern {
            predicate: Some("p".into()),
            ..Default::default()
        }));
        assert!(!t.matches(&TriplePattern {
            object: Some(Term::iri("other")),
            ..Default::default()
        }));
    }
}
