//! SQLite store backends against a temporary database file.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;

use common::sample_repository;
use semantic_harvester::config::{HarvestSettings, RepositoryDef};
use semantic_harvester::db;
use semantic_harvester::error::StoreError;
use semantic_harvester::events::NoEvents;
use semantic_harvester::guard::InFlightRegistry;
use semantic_harvester::harvest::{HarvestOrchestrator, HarvestStores};
use semantic_harvester::migrate;
use semantic_harvester::models::{
    AgentRef, AssetKind, ClassDetails, HarvestRequest, HarvestRun, HarvestStatus, Instance, KindDetails,
    SemanticAssetMetadata,
};
use semantic_harvester::rdf::{Graph, Literal, Term, Triple, TriplePattern};
use semantic_harvester::snapshot::LocalSnapshotter;
use semantic_harvester::store::sqlite::{
    SqliteGraphStore, SqliteRepositoryConfig, SqliteRunStore, SqliteSearchIndex, SqliteVocabularyDataIndex,
};
use semantic_harvester::store::{
    GraphKey, GraphStore, HarvestRunStore, InstanceSelector, RepositoryConfigStore, SearchDocument, SearchIndex,
    VocabularyDataIndex,
};

const REPO: &str = "https://github.com/italia/dati-semantic-assets";

async fn open(tmp: &TempDir) -> SqlitePool {
    let pool = db::connect_path(&tmp.path().join("data").join("harvester.sqlite"))
        .await
        .unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    pool
}

fn document(iri: &str, repo_url: &str) -> SearchDocument {
    SearchDocument::from_metadata(&SemanticAssetMetadata {
        iri: iri.to_string(),
        repo_url: repo_url.to_string(),
        source_path: "assets/ontologies/X/X.ttl".to_string(),
        title: "X".to_string(),
        description: "An ontology".to_string(),
        rights_holder: AgentRef {
            iri: "https://example.org/agid".to_string(),
            identifier: Some("agid".to_string()),
            name: None,
        },
        modified_on: None,
        issued_on: None,
        themes: vec![],
        distributions: vec![],
        version_info: None,
        keywords: vec!["test".to_string()],
        languages: vec![],
        accrual_periodicity: None,
        conforms_to: vec![],
        details: KindDetails::Ontology(ClassDetails::default()),
    })
}

#[tokio::test]
async fn schema_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let pool = open(&tmp).await;
    migrate::apply_schema(&pool).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
}

#[tokio::test]
async fn graph_store_round_trips_terms() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteGraphStore::new(open(&tmp).await);
    let key = GraphKey::new(REPO, AssetKind::Ontology, Some(Instance::Secondary));

    let mut graph = Graph::new();
    let subject = Term::iri("https://w3id.org/italia/onto/ACCO");
    graph.insert(Triple::new(
        subject.clone(),
        "http://purl.org/dc/terms/title",
        Term::Literal(Literal {
            value: "Strutture \"ricettive\"\nv2".to_string(),
            datatype: "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString".to_string(),
            language: Some("it".to_string()),
        }),
    ));
    graph.insert(Triple::new(
        subject.clone(),
        "http://purl.org/dc/terms/modified",
        Term::Literal(Literal {
            value: "2023-01-15".to_string(),
            datatype: "http://www.w3.org/2001/XMLSchema#date".to_string(),
            language: None,
        }),
    ));
    graph.insert(Triple::new(subject.clone(), "http://www.w3.org/ns/dcat#theme", Term::iri("http://x/GOVE")));
    store.save(&key, &graph).await.unwrap();
    // Saving again does not duplicate statements
    store.save(&key, &graph).await.unwrap();

    let all: Graph = store
        .select(&key, &TriplePattern::default())
        .await
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(all, graph);

    let themes = store
        .select(
            &key,
            &TriplePattern {
                predicate: Some("http://www.w3.org/ns/dcat#theme".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(themes.len(), 1);

    store.clear_named_graph(&key).await.unwrap();
    assert!(store.select(&key, &TriplePattern::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn selectors_are_per_store_and_repository() {
    let tmp = TempDir::new().unwrap();
    let pool = open(&tmp).await;
    let graph = SqliteGraphStore::new(pool.clone());
    let search = SqliteSearchIndex::new(pool);

    assert_eq!(graph.selected(REPO).await.unwrap(), None);
    graph.point_to(REPO, Instance::Secondary).await.unwrap();
    graph.point_to(REPO, Instance::Secondary).await.unwrap();
    assert_eq!(graph.selected(REPO).await.unwrap(), Some(Instance::Secondary));
    assert_eq!(search.selected(REPO).await.unwrap(), None);

    search.point_to(REPO, Instance::Primary).await.unwrap();
    assert_eq!(search.selected(REPO).await.unwrap(), Some(Instance::Primary));
    assert_eq!(graph.selected(REPO).await.unwrap(), Some(Instance::Secondary));

    graph.release(REPO).await.unwrap();
    graph.release(REPO).await.unwrap();
    assert_eq!(graph.selected(REPO).await.unwrap(), None);
    assert_eq!(search.selected(REPO).await.unwrap(), Some(Instance::Primary));
}

#[tokio::test]
async fn search_index_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let index = SqliteSearchIndex::new(open(&tmp).await);
    let name = "semantic-assets-ontologies-primary";

    assert!(!index.exists(name).await.unwrap());
    index
        .bulk_index(
            &[document("https://x/b", REPO), document("https://x/a", REPO), document("https://y/c", "other")],
            name,
        )
        .await
        .unwrap();
    assert!(index.exists(name).await.unwrap());

    let docs = index.find_by_repo_url(REPO, name).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["https://x/a", "https://x/b"]);
    assert_eq!(docs[0].metadata.keywords, vec!["test"]);

    // Re-indexing the same id replaces it
    index.bulk_index(&[document("https://x/a", REPO)], name).await.unwrap();
    assert_eq!(index.find_by_repo_url(REPO, name).await.unwrap().len(), 2);

    assert_eq!(index.delete_by_repo_url(REPO, name).await.unwrap(), 2);
    assert!(index.get("https://x/a", name).await.unwrap().is_none());
    assert!(index.get("https://y/c", name).await.unwrap().is_some());

    index.delete(name).await.unwrap();
    assert!(matches!(index.delete(name).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn vocabulary_records_keep_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let index = SqliteVocabularyDataIndex::new(open(&tmp).await);
    let name = "agid.licences-secondary";

    let row = |code: &str| json!({ "code": code }).as_object().unwrap().clone();
    index.bulk_index(&[row("B"), row("A")], name).await.unwrap();
    index.bulk_index(&[row("C")], name).await.unwrap();

    let codes: Vec<String> = index
        .records(name)
        .await
        .unwrap()
        .iter()
        .map(|r| r["code"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(codes, vec!["B", "A", "C"]);

    index.delete(name).await.unwrap();
    assert!(!index.exists(name).await.unwrap());
    assert!(matches!(index.delete(name).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn compare_and_set_requires_the_expected_value() {
    let tmp = TempDir::new().unwrap();
    let config = SqliteRepositoryConfig::new(open(&tmp).await);

    assert!(config.compare_and_set("onto", "published_instance", None, "secondary").await.unwrap());
    assert!(!config.compare_and_set("onto", "published_instance", None, "primary").await.unwrap());
    assert!(!config
        .compare_and_set("onto", "published_instance", Some("primary"), "secondary")
        .await
        .unwrap());
    assert!(config
        .compare_and_set("onto", "published_instance", Some("secondary"), "primary")
        .await
        .unwrap());
    assert_eq!(
        config.get("onto", "published_instance").await.unwrap().as_deref(),
        Some("primary")
    );

    config.set("onto", "blue_green", "false").await.unwrap();
    config.set("onto", "blue_green", "true").await.unwrap();
    assert_eq!(config.get("onto", "blue_green").await.unwrap().as_deref(), Some("true"));
    assert_eq!(config.get("other", "blue_green").await.unwrap(), None);
}

#[tokio::test]
async fn run_history() {
    let tmp = TempDir::new().unwrap();
    let runs = SqliteRunStore::new(open(&tmp).await);

    let first = HarvestRun::start(&HarvestRequest::new("onto").revision("r1"));
    runs.insert(&first).await.unwrap();
    assert!(matches!(runs.insert(&first).await, Err(StoreError::Conflict(_))));
    assert!(runs.last_success("onto", "r1").await.unwrap().is_none());

    let first = first.finish(HarvestStatus::Success, None);
    runs.update(&first).await.unwrap();
    let stored = runs.get(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, HarvestStatus::Success);
    assert_eq!(stored.revision.as_deref(), Some("r1"));
    assert_eq!(runs.last_success("onto", "r1").await.unwrap().unwrap().id, first.id);
    assert!(runs.last_success("onto", "r2").await.unwrap().is_none());

    let second = HarvestRun::start(&HarvestRequest::new("onto").revision("r2"))
        .finish(HarvestStatus::Failed, Some("boom".to_string()));
    assert!(matches!(runs.update(&second).await, Err(StoreError::NotFound(_))));
    runs.insert(&second).await.unwrap();

    let history = runs.list("onto", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.id);
    assert_eq!(history[0].reason.as_deref(), Some("boom"));
    assert_eq!(runs.list("onto", 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn harvest_through_sqlite_stores() {
    let tmp = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    sample_repository(source.path());
    let url = format!("file://{}", source.path().display());
    let pool = open(&tmp).await;

    let stores = HarvestStores::new(
        Arc::new(SqliteGraphStore::new(pool.clone())),
        Arc::new(SqliteSearchIndex::new(pool.clone())),
        Arc::new(SqliteVocabularyDataIndex::new(pool.clone())),
        Arc::new(SqliteRepositoryConfig::new(pool.clone())),
        Arc::new(SqliteRunStore::new(pool.clone())),
    );
    let mut settings = HarvestSettings::new("http://ndc");
    settings.workdir = tmp.path().join("work");
    let mut repositories = BTreeMap::new();
    repositories.insert("onto".to_string(), RepositoryDef::new(url.clone()));

    let orchestrator = HarvestOrchestrator::new(
        settings,
        repositories,
        Arc::new(LocalSnapshotter::new(tmp.path().join("work"))),
        stores.clone(),
        Arc::new(NoEvents),
        InFlightRegistry::new(),
    )
    .unwrap();

    let run = orchestrator.harvest(HarvestRequest::new("onto")).await.unwrap();
    assert_eq!(run.status, HarvestStatus::Success);
    assert_eq!(run.report.assets_harvested, 3);
    assert_eq!(orchestrator.instances().current("onto").await.unwrap(), Instance::Secondary);

    let published = stores
        .graph
        .select_published(&url, AssetKind::ControlledVocabulary, &TriplePattern::default())
        .await
        .unwrap();
    assert!(!published.is_empty());
    assert_eq!(
        stores.vocabularies.records("agid.licences-secondary").await.unwrap().len(),
        2
    );
    assert_eq!(stores.runs.get(run.id).await.unwrap().unwrap().status, HarvestStatus::Success);

    let again = orchestrator.harvest(HarvestRequest::new("onto")).await.unwrap();
    assert_eq!(again.status, HarvestStatus::Unchanged);
    pool.close().await;
}
