//! Event logger: structured, replayable record of externally visible firings.
//!
//! Internal events (routine wake-ups, untopiced timeout primitives) never
//! produce a record. Records resolve parent/target ids to display labels at
//! append time, so the log is readable without the registry.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::{Priority, SimTime};
use crate::error::SimError;
use crate::event::{Event, NamedRef, Payload, TopicId, STATE_CHANGE};
use crate::registry::ComponentRegistry;

/// One logged firing, in the dump document's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub topic: String,
    pub parent: Option<String>,
    pub target: Option<String>,
    pub sim_time: SimTime,
    pub value: serde_json::Value,
    pub sequence: u64,
    pub priority: u8,
    pub component_state: Option<String>,
}

/// Topic-id → human description catalog embedded in the dump document.
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for TopicCatalog {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            STATE_CHANGE.as_str().to_string(),
            "Component state transition, emitted by every component".to_string(),
        );
        Self { entries }
    }
}

impl TopicCatalog {
    /// Add (or replace) a topic description.
    pub fn describe(mut self, topic: TopicId, description: &str) -> Self {
        self.entries
            .insert(topic.as_str().to_string(), description.to_string());
        self
    }
}

/// The serialized log: descriptions plus records in firing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    pub event_descriptions: BTreeMap<String, String>,
    pub logs: Vec<LogRecord>,
}

impl LogDocument {
    /// Re-read a dumped document for offline inspection or replay.
    pub fn read(path: &Path) -> Result<Self, SimError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Accumulates records during a run. Partial logs survive a fatal abort;
/// whatever was appended before the abort is retained.
#[derive(Debug)]
pub struct EventLog {
    enabled: bool,
    records: Vec<LogRecord>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EventLog {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            records: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Append a record for a firing, if it is externally visible: internal
    /// kinds and events without a topic are never recorded.
    pub(crate) fn record_firing(
        &mut self,
        time: SimTime,
        priority: Priority,
        sequence: u64,
        event: &Event,
        registry: &ComponentRegistry,
    ) {
        if !self.enabled || event.kind().is_internal() {
            return;
        }
        let Some(topic) = event.topic() else {
            return;
        };

        let parent = event.parent().and_then(|named| match named {
            NamedRef::Component(id) => registry.lookup_name(id).map(str::to_string),
            NamedRef::Literal(label) => Some(label.clone()),
        });
        let target = if event.kind().is_single_target() {
            event
                .target()
                .and_then(|id| registry.lookup_name(&id).map(str::to_string))
        } else {
            None
        };

        self.records.push(LogRecord {
            topic: topic.as_str().to_string(),
            parent,
            target,
            sim_time: time,
            value: snapshot_payload(event.value(), registry),
            sequence,
            priority: priority as u8,
            component_state: event.state_tag().map(str::to_string),
        });
    }

    pub fn to_document(&self, catalog: &TopicCatalog) -> LogDocument {
        LogDocument {
            event_descriptions: catalog.entries.clone(),
            logs: self.records.clone(),
        }
    }

    /// Serialize all records plus the topic catalog into one JSON document.
    pub fn dump(&self, path: &Path, catalog: &TopicCatalog) -> Result<(), SimError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.to_document(catalog))?;
        Ok(())
    }
}

/// Snapshot a payload for the log: shared values go through their snapshot
/// capability, component references become display names.
fn snapshot_payload(payload: &Payload, registry: &ComponentRegistry) -> serde_json::Value {
    match payload {
        Payload::None => serde_json::Value::Null,
        Payload::Value(value) => value.clone(),
        Payload::ComponentRef(id) => registry
            .lookup_name(id)
            .map(|name| serde_json::Value::String(name.to_string()))
            .unwrap_or(serde_json::Value::Null),
        Payload::Snapshot(loggable) => loggable.loggable_data(),
        Payload::Interrupted(cause) => serde_json::json!({ "interruption_cause": cause }),
    }
}
