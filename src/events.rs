//! Harvest lifecycle events.
//!
//! Every run emits `started` when it enters the running state and exactly
//! one terminal event (`finished.success` or `finished.failure`). Runs
//! that short-circuit (already running, unchanged) emit only the terminal
//! event. Publishers write to **stderr** so stdout remains parseable.

use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{HarvestRun, HarvestStatus};

/// Bus topic all harvest events are published under.
pub const TOPIC: &str = "harvester";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum EventType {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "finished.success")]
    FinishedSuccess,
    #[serde(rename = "finished.failure")]
    FinishedFailure,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Started => "started",
            EventType::FinishedSuccess => "finished.success",
            EventType::FinishedFailure => "finished.failure",
        }
    }

    /// Terminal event type for a finalized status.
    pub fn for_status(status: HarvestStatus) -> Self {
        match status {
            HarvestStatus::Running => EventType::Started,
            HarvestStatus::Success | HarvestStatus::Unchanged => EventType::FinishedSuccess,
            HarvestStatus::Failed | HarvestStatus::AlreadyRunning => EventType::FinishedFailure,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub topic: &'static str,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub run_id: Uuid,
    pub repo_id: String,
    pub revision: Option<String>,
    pub correlation_id: Uuid,
    pub actor: Option<String>,
    pub status: HarvestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LifecycleEvent {
    pub fn started(run: &HarvestRun) -> Self {
        Self::from_run(EventType::Started, run)
    }

    pub fn finished(run: &HarvestRun) -> Self {
        Self::from_run(EventType::for_status(run.status), run)
    }

    fn from_run(event_type: EventType, run: &HarvestRun) -> Self {
        Self {
            topic: TOPIC,
            event_type,
            run_id: run.id,
            repo_id: run.repo_id.clone(),
            revision: run.revision.clone(),
            correlation_id: run.correlation_id,
            actor: run.actor.clone(),
            status: run.status,
            error: match event_type {
                EventType::FinishedFailure => run.reason.clone(),
                _ => None,
            },
        }
    }
}

/// Publishes lifecycle events. Publishing never fails the run.
pub trait LifecyclePublisher: Send + Sync {
    fn publish(&self, event: &LifecycleEvent);
}

/// Emits events as `tracing` records.
pub struct LogPublisher;

impl LifecyclePublisher for LogPublisher {
    fn publish(&self, event: &LifecycleEvent) {
        match event.event_type {
            EventType::FinishedFailure => warn!(
                topic = event.topic,
                event = event.event_type.as_str(),
                run_id = %event.run_id,
                repo = %event.repo_id,
                status = event.status.as_str(),
                error = ?event.error,
                "harvest event"
            ),
            _ => info!(
                topic = event.topic,
                event = event.event_type.as_str(),
                run_id = %event.run_id,
                repo = %event.repo_id,
                revision = ?event.revision,
                status = event.status.as_str(),
                "harvest event"
            ),
        }
    }
}

/// Machine-readable events: one JSON object per line on stderr.
pub struct JsonLinesPublisher;

impl LifecyclePublisher for JsonLinesPublisher {
    fn publish(&self, event: &LifecycleEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op publisher when events are disabled.
pub struct NoEvents;

impl LifecyclePublisher for NoEvents {
    fn publish(&self, _event: &LifecycleEvent) {}
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one run, in publication order.
    pub fn for_run(&self, run_id: Uuid) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }
}

impl LifecyclePublisher for RecordingPublisher {
    fn publish(&self, event: &LifecycleEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Event mode for the CLI: off, log (tracing), or JSON lines (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventMode {
    Off,
    Log,
    Json,
}

impl std::str::FromStr for EventMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(EventMode::Off),
            "log" => Ok(EventMode::Log),
            "json" => Ok(EventMode::Json),
            other => Err(format!("unknown event mode '{}': expected off, log, or json", other)),
        }
    }
}

impl EventMode {
    /// Default: log events when stderr is a TTY, JSON lines otherwise.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            EventMode::Log
        } else {
            EventMode::Json
        }
    }

    pub fn publisher(&self) -> Box<dyn LifecyclePublisher> {
        match self {
            EventMode::Off => Box::new(NoEvents),
            EventMode::Log => Box::new(LogPublisher),
            EventMode::Json => Box::new(JsonLinesPublisher),
        }
    }
}
