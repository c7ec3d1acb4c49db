//! # Semantic Harvester
//!
//! Harvests semantic assets (ontologies, controlled vocabularies, and
//! schemas) from versioned repositories into a graph store and search
//! indices, publishing each repository through two parallel instances so
//! readers never observe a partial harvest.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │ Snapshotter │──▶│ Locator  │──▶│ Extractors │──▶│ Graph/Search │
//! │  git/local  │   │ versions │   │ + validate │   │  (instance)  │
//! └─────────────┘   └──────────┘   └────────────┘   └──────┬───────┘
//!                                                          │ switch
//!                                                          ▼
//!                                                 ┌────────────────┐
//!                                                 │ Published      │
//!                                                 │ instance (cfg) │
//!                                                 └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvester init                       # create database
//! harvester validate ./my-repo         # check assets locally
//! harvester harvest onto               # harvest a configured repository
//! harvester instance current onto      # which instance is published
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`version`] | Permissive directory version parser |
//! | [`locator`] | Asset directory scanning and version resolution |
//! | [`rdf`] | Turtle loading and the in-memory graph |
//! | [`extract`] | Asset models, metadata extraction, validation |
//! | [`vocab_data`] | Companion CSV records of vocabularies |
//! | [`snapshot`] | Repository snapshots (git, local) |
//! | [`store`] | Store traits with memory and SQLite backends |
//! | [`instance`] | Blue/green published-instance manager |
//! | [`guard`] | Per-repository in-flight registry |
//! | [`events`] | Lifecycle event publishers |
//! | [`harvest`] | Harvest orchestrator |
//! | [`commands`] | CLI command runners |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extract;
pub mod guard;
pub mod harvest;
pub mod instance;
pub mod locator;
pub mod migrate;
pub mod models;
pub mod rdf;
pub mod snapshot;
pub mod store;
pub mod version;
pub mod vocab_data;
