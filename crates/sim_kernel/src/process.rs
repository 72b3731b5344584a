//! Process runtime types: cooperative routines as explicit suspend/resume
//! state machines.
//!
//! A routine suspends by returning [RoutineStep::Wait] with the event id it
//! now awaits; the runtime registers itself as a callback of that event and
//! resumes the routine when it fires, handing over the payload (or the
//! failure, for interrupted/failed events). Resumption is synchronous and in
//! scheduler order; there is no preemption.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::environment::SimContext;
use crate::error::SimError;
use crate::event::{EventId, Payload, TopicId};

/// Handle to a live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub(crate) u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error escaping a routine body. If no listener defuses the resulting
/// failed completion event, the run aborts.
#[derive(Debug, Clone)]
pub struct RoutineError {
    message: String,
}

impl RoutineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RoutineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RoutineError {}

impl From<SimError> for RoutineError {
    fn from(err: SimError) -> Self {
        RoutineError::new(err.to_string())
    }
}

/// What a routine is resumed with.
#[derive(Debug, Clone)]
pub enum RoutineInput {
    /// First wake-up after `start_process`.
    Started,
    /// The awaited event fired; carries its payload.
    Fired(Payload),
    /// The awaited event failed, or an interruption was injected. The
    /// routine decides how to react; returning an error propagates the
    /// failure into the completion event.
    Failed(Payload),
}

/// What a routine does next.
#[derive(Debug)]
pub enum RoutineStep {
    /// Suspend until the given pending event fires.
    Wait(EventId),
    /// Complete with a final payload for the completion event.
    Done(Payload),
}

/// A cooperative unit of work. Implementations are explicit state machines;
/// each `resume` call runs until the routine either completes or has a new
/// event to wait on.
pub trait Routine: fmt::Debug {
    fn resume(
        &mut self,
        input: RoutineInput,
        ctx: &mut SimContext,
    ) -> Result<RoutineStep, RoutineError>;
}

/// A suspended routine plus the event it currently awaits.
#[derive(Debug)]
pub(crate) struct Process {
    pub(crate) routine: Box<dyn Routine>,
    pub(crate) parent: Uuid,
    pub(crate) end_topic: TopicId,
    pub(crate) target: Option<Uuid>,
    pub(crate) waiting_on: Option<EventId>,
    pub(crate) started: bool,
}

/// Live processes, keyed by id. Processes are removed on completion or
/// unhandled failure.
#[derive(Debug, Default)]
pub struct ProcessTable {
    next_id: u64,
    entries: HashMap<u64, Process>,
}

impl ProcessTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ProcessId) -> bool {
        self.entries.contains_key(&id.0)
    }

    pub(crate) fn insert(
        &mut self,
        parent: Uuid,
        routine: Box<dyn Routine>,
        end_topic: TopicId,
        target: Option<Uuid>,
    ) -> ProcessId {
        let id = ProcessId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id.0,
            Process {
                routine,
                parent,
                end_topic,
                target,
                waiting_on: None,
                started: false,
            },
        );
        id
    }

    pub(crate) fn take(&mut self, id: ProcessId) -> Option<Process> {
        self.entries.remove(&id.0)
    }

    pub(crate) fn restore(&mut self, id: ProcessId, process: Process) {
        self.entries.insert(id.0, process);
    }

    pub(crate) fn get_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.entries.get_mut(&id.0)
    }
}
