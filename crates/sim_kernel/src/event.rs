//! Event model: the closed set of event variants moved through the queue.
//!
//! Every event is one [EventKind] carrying a topic, an optional parent and
//! target, and a [Payload]. Dispatch classifies kinds along two axes:
//! internal vs externally visible, and broadcast vs single-target.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::clock::SimTime;
use crate::process::ProcessId;

/// Named category of event used for subscription matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicId(&'static str);

impl TopicId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Built-in topic emitted by `update_state` on every component state transition.
pub const STATE_CHANGE: TopicId = TopicId::new("STATE_CHANGE");

/// Handle to a scheduled or pending event; doubles as its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) u64);

impl EventId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning reference to a component (by id) or a literal label.
///
/// Used for event parents and state-change locations; resolved to a display
/// label through the registry only when a log record needs one.
#[derive(Debug, Clone, PartialEq)]
pub enum NamedRef {
    Component(Uuid),
    Literal(String),
}

impl From<Uuid> for NamedRef {
    fn from(id: Uuid) -> Self {
        NamedRef::Component(id)
    }
}

impl From<&str> for NamedRef {
    fn from(label: &str) -> Self {
        NamedRef::Literal(label.to_string())
    }
}

/// Snapshot capability for values carried in event payloads.
///
/// The logger calls [Loggable::loggable_data] instead of recording the raw
/// reference, so shared values stay out of the log.
pub trait Loggable: fmt::Debug + Send + Sync {
    fn loggable_data(&self) -> serde_json::Value;
}

/// Value carried by an event, shaped by what the logger can snapshot.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    None,
    /// A plain JSON value, recorded as-is.
    Value(serde_json::Value),
    /// A component back-reference, resolved to its display name at log time.
    ComponentRef(Uuid),
    /// A shared value exposing the snapshot capability.
    Snapshot(Arc<dyn Loggable>),
    /// Cause of an injected interruption.
    Interrupted(serde_json::Value),
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Value(value)
    }
}

/// Closed variant set; dispatch and logging match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Fires at the current time with no delay; broadcast by topic.
    Immediate,
    /// Fires at now+delay; broadcast by topic.
    Timeout,
    /// Timeout delivered to a single recipient id.
    TargetedTimeout,
    /// Immediate delivered to a single recipient id.
    UuidTargeted,
    /// Internal wake-up for a suspended routine; highest priority class,
    /// never logged, never broadcast.
    ProcessResume,
}

impl EventKind {
    /// Internal events never reach listeners or the log.
    pub fn is_internal(&self) -> bool {
        matches!(self, EventKind::ProcessResume)
    }

    /// Single-target events are delivered to exactly one component by id.
    pub fn is_single_target(&self) -> bool {
        matches!(self, EventKind::TargetedTimeout | EventKind::UuidTargeted)
    }

    /// Broadcast events go to every current subscriber of their topic.
    pub fn is_broadcast(&self) -> bool {
        !self.is_internal() && !self.is_single_target()
    }
}

/// Work attached to an event just before it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Deliver the event to a component's `listen`.
    Notify(Uuid),
    /// Resume a suspended routine.
    Resume(ProcessId),
}

/// One simulation event. Constructed by the kernel; listeners observe it
/// through the read accessors.
///
/// Invariant: callbacks run exactly once. The list is cleared before
/// invocation, so an event cannot re-fire.
#[derive(Debug)]
pub struct Event {
    pub(crate) id: EventId,
    pub(crate) kind: EventKind,
    pub(crate) topic: Option<TopicId>,
    pub(crate) parent: Option<NamedRef>,
    pub(crate) target: Option<Uuid>,
    pub(crate) cause: Option<EventId>,
    pub(crate) value: Payload,
    pub(crate) ok: bool,
    pub(crate) component_state: Option<String>,
    pub(crate) callbacks: Vec<Callback>,
}

impl Event {
    pub(crate) fn new(kind: EventKind, topic: Option<TopicId>) -> Self {
        Self {
            id: EventId(0),
            kind,
            topic,
            parent: None,
            target: None,
            cause: None,
            value: Payload::None,
            ok: true,
            component_state: None,
            callbacks: Vec::new(),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn topic(&self) -> Option<TopicId> {
        self.topic
    }

    pub fn parent(&self) -> Option<&NamedRef> {
        self.parent.as_ref()
    }

    pub fn target(&self) -> Option<Uuid> {
        self.target
    }

    pub fn cause(&self) -> Option<EventId> {
        self.cause
    }

    pub fn value(&self) -> &Payload {
        &self.value
    }

    /// False when the event carries a failure; firing a failed event that no
    /// listener defuses aborts the run.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// State tag stamped by `update_state` when this firing represents a
    /// component state change.
    pub fn state_tag(&self) -> Option<&str> {
        self.component_state.as_deref()
    }
}

/// Parameters for `create_event`; which [EventKind] is produced follows from
/// which of `target`/`delay` are given:
///
/// | target | delay | variant |
/// |---|---|---|
/// | no | no | Immediate |
/// | yes | no | UuidTargeted |
/// | no | yes | Timeout |
/// | yes | yes | TargetedTimeout |
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub topic: TopicId,
    pub target: Option<Uuid>,
    pub cause: Option<EventId>,
    pub value: Payload,
    pub delay: Option<SimTime>,
    pub state_tag: Option<String>,
}

impl EventSpec {
    pub fn new(topic: TopicId) -> Self {
        Self {
            topic,
            target: None,
            cause: None,
            value: Payload::None,
            delay: None,
            state_tag: None,
        }
    }

    pub fn with_target(mut self, target: Uuid) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_cause(mut self, cause: EventId) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_value(mut self, value: impl Into<Payload>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_delay(mut self, delay: SimTime) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_state_tag(mut self, state: impl Into<String>) -> Self {
        self.state_tag = Some(state.into());
        self
    }
}
