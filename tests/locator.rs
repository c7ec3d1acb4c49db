//! Version resolution and leaf rules of the asset locator.

mod common;

use std::path::{Path, PathBuf};

use common::{ontology_ttl, write};
use semantic_harvester::locator::{default_skip_names, AssetLocator};
use semantic_harvester::models::AssetKind;
use tempfile::TempDir;

fn locator() -> AssetLocator {
    AssetLocator::new(true, &default_skip_names()).unwrap()
}

fn ttl() -> String {
    ontology_ttl("https://w3id.org/italia/onto/X", "X")
}

fn primaries(root: &Path, kind: AssetKind, locator: &AssetLocator) -> Vec<PathBuf> {
    locator
        .locate(root, kind)
        .unwrap()
        .into_iter()
        .map(|g| g.primary.strip_prefix(root).unwrap().to_path_buf())
        .collect()
}

#[test]
fn keeps_only_the_newest_version() {
    let tmp = TempDir::new().unwrap();
    for v in ["v1", "v2", "v2.1"] {
        write(tmp.path(), &format!("assets/ontologies/CLV/{}/CLV.ttl", v), &ttl());
    }

    assert_eq!(
        primaries(tmp.path(), AssetKind::Ontology, &locator()),
        vec![PathBuf::from("assets/ontologies/CLV/v2.1/CLV.ttl")]
    );
}

#[test]
fn non_version_siblings_survive() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "assets/ontologies/CLV/v1/CLV.ttl", &ttl());
    write(tmp.path(), "assets/ontologies/CLV/extra-notes/notes.ttl", &ttl());

    assert_eq!(
        primaries(tmp.path(), AssetKind::Ontology, &locator()),
        vec![
            PathBuf::from("assets/ontologies/CLV/extra-notes/notes.ttl"),
            PathBuf::from("assets/ontologies/CLV/v1/CLV.ttl"),
        ]
    );
}

#[test]
fn nested_versions_resolve_per_level() {
    let tmp = TempDir::new().unwrap();
    for path in ["v1/1.0", "v1/1.1", "v2/2.0", "v2/2.1"] {
        write(tmp.path(), &format!("assets/ontologies/ACCO/{}/ACCO.ttl", path), &ttl());
    }

    assert_eq!(
        primaries(tmp.path(), AssetKind::Ontology, &locator()),
        vec![PathBuf::from("assets/ontologies/ACCO/v2/2.1/ACCO.ttl")]
    );
}

#[test]
fn obsolete_versions_kept_when_disabled() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "assets/ontologies/ACCO/v1/ACCO.ttl", &ttl());
    write(tmp.path(), "assets/ontologies/ACCO/v2/ACCO.ttl", &ttl());

    let all = AssetLocator::new(false, &default_skip_names()).unwrap();
    assert_eq!(primaries(tmp.path(), AssetKind::Ontology, &all).len(), 2);
}

#[test]
fn missing_asset_root_yields_nothing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "README.md", "nothing here");

    for kind in AssetKind::ALL {
        assert!(locator().locate(tmp.path(), kind).unwrap().is_empty());
    }
}

#[test]
fn invalid_leaf_is_skipped_and_scan_continues() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "assets/ontologies/BAD/one.ttl", &ttl());
    write(tmp.path(), "assets/ontologies/BAD/two.ttl", &ttl());
    write(tmp.path(), "assets/ontologies/EMPTY/readme.md", "no graph");
    write(tmp.path(), "assets/ontologies/GOOD/GOOD.ttl", &ttl());

    assert_eq!(
        primaries(tmp.path(), AssetKind::Ontology, &locator()),
        vec![PathBuf::from("assets/ontologies/GOOD/GOOD.ttl")]
    );
}

#[test]
fn vocabulary_leaf_pairs_graph_with_table() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "assets/controlled-vocabularies/licences/licences.ttl", "");
    write(tmp.path(), "assets/controlled-vocabularies/licences/licences.csv", "code\nA\n");
    write(tmp.path(), "assets/controlled-vocabularies/themes/themes.ttl", "");

    let groups = locator()
        .locate(tmp.path(), AssetKind::ControlledVocabulary)
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(
        groups[0].companion.as_deref(),
        Some(
            tmp.path()
                .join("assets/controlled-vocabularies/licences/licences.csv")
                .as_path()
        )
    );
    assert!(groups[1].companion.is_none());
}

#[test]
fn skip_names_and_hidden_directories_are_not_descended() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "assets/schemas/person/index.ttl", "");
    write(tmp.path(), "assets/schemas/scripts/generate/index.ttl", "");
    write(tmp.path(), "assets/schemas/.cache/index.ttl", "");

    assert_eq!(
        primaries(tmp.path(), AssetKind::Schema, &locator()),
        vec![PathBuf::from("assets/schemas/person/index.ttl")]
    );
}

#[test]
fn legacy_root_is_used_when_primary_root_is_absent() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "VocabolariControllati/licences/licences.ttl", "");

    assert_eq!(
        primaries(tmp.path(), AssetKind::ControlledVocabulary, &locator()),
        vec![PathBuf::from("VocabolariControllati/licences/licences.ttl")]
    );
}

#[test]
fn locate_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    for name in ["CPV", "ACCO", "CLV", "POI"] {
        write(tmp.path(), &format!("assets/ontologies/{0}/{0}.ttl", name), &ttl());
    }

    let first = locator().locate(tmp.path(), AssetKind::Ontology).unwrap();
    let second = locator().locate(tmp.path(), AssetKind::Ontology).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
}
