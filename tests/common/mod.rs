#![allow(dead_code)]

use std::fs;
use std::path::Path;

pub const AGID: &str = "https://w3id.org/italia/data/public-organization/agid";

pub fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

const PREFIXES: &str = r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix dct: <http://purl.org/dc/terms/> .
@prefix dcat: <http://www.w3.org/ns/dcat#> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix dcatapit: <http://dati.gov.it/onto/dcatapit#> .
@prefix admsapit: <https://w3id.org/italia/onto/ADMS/> .
@prefix ndc: <https://w3id.org/italia/onto/NDC/> .
"#;

fn agency() -> String {
    format!("<{}> dct:identifier \"agid\" ; foaf:name \"Agenzia per l'Italia Digitale\" .\n", AGID)
}

/// A complete ontology with one key class and one Turtle distribution.
pub fn ontology_ttl(iri: &str, title: &str) -> String {
    format!(
        r#"{prefixes}
<{iri}> a owl:Ontology ;
    dct:title "{title}"@it ;
    dct:description "Ontologia di esempio"@it ;
    dct:rightsHolder <{agid}> ;
    dct:modified "2023-01-15"^^xsd:date ;
    dct:issued "2020-06-01"^^xsd:date ;
    owl:versionInfo "2.0" ;
    dcat:theme <http://publications.europa.eu/resource/authority/data-theme/GOVE> ;
    admsapit:hasKeyClass <{iri}/Accommodation> ;
    dcat:distribution <{iri}/dist/ttl>, <{iri}/dist/html> .

<{iri}/Accommodation> rdfs:label "Accommodation"@en .

<{iri}/dist/ttl> dct:format <http://publications.europa.eu/resource/authority/file-type/RDF_TURTLE> ;
    dcat:accessURL <{iri}.ttl> .

<{iri}/dist/html> dct:format <http://publications.europa.eu/resource/authority/file-type/HTML> .
{agency}"#,
        prefixes = PREFIXES,
        iri = iri,
        title = title,
        agid = AGID,
        agency = agency()
    )
}

/// An ontology missing its title and description.
pub fn untitled_ontology_ttl(iri: &str) -> String {
    format!(
        r#"{prefixes}
<{iri}> a owl:Ontology ;
    dct:rightsHolder <{agid}> ;
    dct:modified "2023-01-15" ;
    dcat:theme <http://publications.europa.eu/resource/authority/data-theme/GOVE> .
{agency}"#,
        prefixes = PREFIXES,
        iri = iri,
        agid = AGID,
        agency = agency()
    )
}

/// Two resources typed `owl:Ontology` in one file.
pub fn ambiguous_ontology_ttl() -> String {
    format!(
        "{}\n<https://example.org/a> a owl:Ontology .\n<https://example.org/b> a owl:Ontology .\n",
        PREFIXES
    )
}

pub fn vocabulary_ttl(iri: &str, key_concept: &str) -> String {
    format!(
        r#"{prefixes}
<{iri}> a skos:ConceptScheme ;
    dct:title "Licenze"@it ;
    dct:description "Vocabolario delle licenze"@it ;
    dct:rightsHolder <{agid}> ;
    dct:modified "2022-11-03" ;
    dct:issued "2019-01-01" ;
    dcat:theme <http://publications.europa.eu/resource/authority/data-theme/GOVE> ;
    ndc:keyConcept "{key}" ;
    dcat:distribution <{iri}/dist> .

<{iri}/dist> dct:format <http://publications.europa.eu/resource/authority/file-type/RDF_TURTLE> ;
    dcat:accessURL <{iri}.ttl> ;
    dcat:downloadURL <{iri}/download.ttl> .
{agency}"#,
        prefixes = PREFIXES,
        iri = iri,
        key = key_concept,
        agid = AGID,
        agency = agency()
    )
}

pub fn schema_ttl(iri: &str) -> String {
    format!(
        r#"{prefixes}
<{iri}> a dcatapit:Dataset ;
    dct:title "Persona"@it ;
    dct:description "Schema dati della persona"@it ;
    dct:rightsHolder <{agid}> ;
    dct:modified "2023-03-01T09:30:00Z"^^xsd:dateTime ;
    dct:issued "2023-01-01" ;
    dcat:theme <http://publications.europa.eu/resource/authority/data-theme/SOCI> ;
    admsapit:hasKeyClass <https://w3id.org/italia/onto/CPV/Person> ;
    dcat:distribution <{iri}/oas> .

<{iri}/oas> dct:format <http://publications.europa.eu/resource/authority/file-type/YAML> ;
    dcat:accessURL <{iri}/person.oas3.yaml> .
{agency}"#,
        prefixes = PREFIXES,
        iri = iri,
        agid = AGID,
        agency = agency()
    )
}

pub const LICENCES_CSV: &str = "code,label\nCC-BY-4.0,Attribution 4.0\nCC0-1.0,Public Domain Dedication\n";

/// A repository with one asset of each kind, plus an obsolete ontology
/// version that must not be harvested.
pub fn sample_repository(root: &Path) {
    write(
        root,
        "assets/ontologies/ACCO/v1/ACCO.ttl",
        &ontology_ttl("https://w3id.org/italia/onto/ACCO", "Strutture ricettive (obsoleta)"),
    );
    write(
        root,
        "assets/ontologies/ACCO/v2/ACCO.ttl",
        &ontology_ttl("https://w3id.org/italia/onto/ACCO", "Strutture ricettive"),
    );
    write(
        root,
        "assets/controlled-vocabularies/licences/licences.ttl",
        &vocabulary_ttl("https://w3id.org/italia/controlled-vocabulary/licences", "licences"),
    );
    write(
        root,
        "assets/controlled-vocabularies/licences/licences.csv",
        LICENCES_CSV,
    );
    write(
        root,
        "assets/schemas/person/index.ttl",
        &schema_ttl("https://w3id.org/italia/schema/person"),
    );
    write(root, "README.md", "# Semantic assets\n");
}
