//! Simulation environment: owns the queue, registry, process table and log,
//! and drives the step loop.
//!
//! Each step resolves recipients for the queue head through the registry,
//! pops it (advancing the clock), logs the firing, then runs the callbacks.
//! Scheduling is single-threaded and cooperative: exactly one event fires at
//! a time, and routine resumptions happen synchronously in scheduler order.

use std::path::Path;

use uuid::Uuid;

use crate::clock::{EventQueue, Priority, SimTime};
use crate::component::Component;
use crate::error::SimError;
use crate::event::{Callback, Event, EventId, EventKind, EventSpec, NamedRef, Payload, TopicId};
use crate::event_log::{EventLog, LogRecord, TopicCatalog};
use crate::process::{
    Process, ProcessId, ProcessTable, Routine, RoutineError, RoutineInput, RoutineStep,
};
use crate::registry::ComponentRegistry;

/// Environment construction knobs.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    /// When false, no records are appended (the run itself is unaffected).
    pub event_logging: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            event_logging: true,
        }
    }
}

/// The simulation world: virtual clock, component registry, live processes
/// and the event log.
#[derive(Debug, Default)]
pub struct Environment {
    queue: EventQueue,
    registry: Option<ComponentRegistry>,
    processes: ProcessTable,
    log: EventLog,
}

impl Environment {
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            queue: EventQueue::default(),
            registry: None,
            processes: ProcessTable::default(),
            log: EventLog::new(config.event_logging),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Events currently armed to fire.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Attach (or replace) the full component set. Must happen before the
    /// first `step`/`run`.
    pub fn attach(&mut self, components: Vec<Box<dyn Component>>) {
        self.registry
            .get_or_insert_with(ComponentRegistry::default)
            .attach(components);
    }

    pub fn registry(&self) -> Option<&ComponentRegistry> {
        self.registry.as_ref()
    }

    /// Mutable registry access, e.g. for mid-run subscribe/unsubscribe.
    pub fn registry_mut(&mut self) -> Option<&mut ComponentRegistry> {
        self.registry.as_mut()
    }

    /// Create and schedule an event outside component dispatch (the run
    /// driver's entry point); the variant follows the [EventSpec] decision
    /// table.
    pub fn emit(&mut self, parent: Option<NamedRef>, spec: EventSpec) -> Result<EventId, SimError> {
        emit_event(&mut self.queue, parent, spec)
    }

    /// Start a routine parented to `parent`; see
    /// [Component::start_process](crate::component::Component::start_process).
    pub fn start_process(
        &mut self,
        parent: Uuid,
        routine: Box<dyn Routine>,
        start_topic: TopicId,
        end_topic: TopicId,
        target: Option<Uuid>,
    ) -> ProcessId {
        spawn_process(
            &mut self.queue,
            &mut self.processes,
            parent,
            routine,
            start_topic,
            end_topic,
            target,
        )
    }

    /// Inject a failure into a suspended process, delivered at its next
    /// resume point. Returns false if the process no longer exists.
    pub fn interrupt(&mut self, process: ProcessId, cause: serde_json::Value) -> bool {
        interrupt_process(&mut self.queue, &mut self.processes, process, cause)
    }

    /// Clear a pending event's callbacks, skipping its wake-ups without
    /// removing it from the queue.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.queue.clear_callbacks(event)
    }

    pub fn records(&self) -> &[LogRecord] {
        self.log.records()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Write the accumulated log plus `catalog` as one JSON document.
    pub fn dump(&self, path: &Path, catalog: &TopicCatalog) -> Result<(), SimError> {
        self.log.dump(path, catalog)
    }

    /// Fire the next event. Errors with [SimError::EmptyQueue] when nothing
    /// is scheduled and [SimError::MissingRegistry] when `attach` was never
    /// called; both checks happen before any time advances.
    pub fn step(&mut self) -> Result<(), SimError> {
        let registry = self.registry.as_mut().ok_or(SimError::MissingRegistry)?;
        step_inner(&mut self.queue, registry, &mut self.processes, &mut self.log)
    }

    /// Step until the next event would fire at or past `until`, or the
    /// queue drains (normal termination, not an error).
    pub fn run(&mut self, until: SimTime) -> Result<(), SimError> {
        while self.queue.next_fire_time().is_some_and(|t| t < until) {
            self.step()?;
        }
        Ok(())
    }
}

/// Mutation handle passed to listeners and routines during a firing.
///
/// Carries the queue and process table mutably and the registry read-only;
/// the component being dispatched is temporarily out of the registry, so all
/// world access flows through here.
#[derive(Debug)]
pub struct SimContext<'a> {
    queue: &'a mut EventQueue,
    registry: &'a ComponentRegistry,
    processes: &'a mut ProcessTable,
    defused: &'a mut bool,
}

impl<'a> SimContext<'a> {
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Create and schedule an event; see [EventSpec] for variant selection.
    pub fn emit(&mut self, parent: Option<NamedRef>, spec: EventSpec) -> Result<EventId, SimError> {
        emit_event(self.queue, parent, spec)
    }

    /// Schedule an untopiced timeout primitive: never logged, never
    /// broadcast. Routines yield this to sleep for `delay`.
    pub fn hold(&mut self, delay: SimTime) -> Result<EventId, SimError> {
        let event = Event::new(EventKind::Timeout, None);
        self.queue.schedule(event, Priority::Normal, delay)
    }

    /// Create an internal event that stays dormant until [SimContext::trigger]
    /// arms it. The building block for request/release protocols.
    pub fn pending_event(&mut self) -> EventId {
        let event = Event::new(EventKind::Immediate, None);
        self.queue.create_untriggered(event, Priority::Normal)
    }

    /// Arm a dormant event to fire at the current time.
    pub fn trigger(&mut self, event: EventId) -> bool {
        self.queue.trigger(event)
    }

    /// Clear a pending event's callbacks (defuse a timeout before firing).
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.queue.clear_callbacks(event)
    }

    /// Mark the currently firing event's failure as handled, so it does not
    /// abort the run.
    pub fn defuse(&mut self) {
        *self.defused = true;
    }

    pub fn start_process(
        &mut self,
        parent: Uuid,
        routine: Box<dyn Routine>,
        start_topic: TopicId,
        end_topic: TopicId,
        target: Option<Uuid>,
    ) -> ProcessId {
        spawn_process(
            self.queue,
            self.processes,
            parent,
            routine,
            start_topic,
            end_topic,
            target,
        )
    }

    /// Inject a failure into a suspended process; see
    /// [Environment::interrupt].
    pub fn interrupt(&mut self, process: ProcessId, cause: serde_json::Value) -> bool {
        interrupt_process(self.queue, self.processes, process, cause)
    }

    /// Display label for a component id.
    pub fn lookup_name(&self, id: &Uuid) -> Option<&str> {
        self.registry.lookup_name(id)
    }

    /// Resolve a reference to a display label: literals pass through,
    /// component ids go through the registry.
    pub fn resolve_label(&self, named: &NamedRef) -> Option<String> {
        match named {
            NamedRef::Component(id) => self.lookup_name(id).map(str::to_string),
            NamedRef::Literal(label) => Some(label.clone()),
        }
    }
}

fn step_inner(
    queue: &mut EventQueue,
    registry: &mut ComponentRegistry,
    processes: &mut ProcessTable,
    log: &mut EventLog,
) -> Result<(), SimError> {
    let head = queue.peek_seq().ok_or(SimError::EmptyQueue)?;

    // Resolution happens at fire time: attach the recipients' callbacks to
    // the head before popping it. An unknown target aborts here, before the
    // clock advances.
    let resolved = match queue.event(head) {
        Some(event) => registry.resolve(event)?,
        None => Vec::new(),
    };
    queue.extend_callbacks(head, resolved);

    let Some(firing) = queue.pop_next() else {
        return Err(SimError::EmptyQueue);
    };
    let mut event = firing.event;
    log.record_firing(firing.time, firing.priority, firing.seq, &event, registry);

    // Clear the callback list before invoking: each callback runs exactly
    // once and the event cannot re-fire.
    let callbacks = std::mem::take(&mut event.callbacks);
    let mut defused = false;
    for callback in callbacks {
        match callback {
            Callback::Notify(id) => {
                let Some(mut component) = registry.take(&id) else {
                    continue;
                };
                let outcome = {
                    let mut ctx = SimContext {
                        queue,
                        registry: &*registry,
                        processes,
                        defused: &mut defused,
                    };
                    component.listen(&event, &mut ctx)
                };
                registry.restore(component);
                outcome?;
            }
            Callback::Resume(pid) => {
                resume_process(queue, registry, processes, pid, &event, &mut defused);
            }
        }
    }

    if !event.is_ok() && !defused {
        return Err(SimError::RoutineFailed(failure_message(&event)));
    }
    Ok(())
}

fn resume_process(
    queue: &mut EventQueue,
    registry: &ComponentRegistry,
    processes: &mut ProcessTable,
    pid: ProcessId,
    event: &Event,
    defused: &mut bool,
) {
    let Some(mut process) = processes.take(pid) else {
        return;
    };
    process.waiting_on = None;

    let input = if !process.started {
        process.started = true;
        RoutineInput::Started
    } else if event.is_ok() {
        RoutineInput::Fired(event.value().clone())
    } else {
        // The routine takes responsibility for the failure.
        *defused = true;
        RoutineInput::Failed(event.value().clone())
    };

    let step = {
        let mut ctx = SimContext {
            queue,
            registry,
            processes,
            defused,
        };
        process.routine.resume(input, &mut ctx)
    };

    match step {
        Ok(RoutineStep::Wait(awaited)) => {
            if queue.attach_callback(awaited, Callback::Resume(pid)) {
                process.waiting_on = Some(awaited);
                processes.restore(pid, process);
            } else {
                let err = RoutineError::new(format!("awaited event {awaited} already fired"));
                complete_process(queue, process, Err(err));
            }
        }
        Ok(RoutineStep::Done(value)) => complete_process(queue, process, Ok(value)),
        Err(err) => complete_process(queue, process, Err(err)),
    }
}

/// Fire the completion event: end-topic, parented to the spawning component,
/// targeted if a notification target was declared, failed if the routine
/// errored.
fn complete_process(queue: &mut EventQueue, process: Process, outcome: Result<Payload, RoutineError>) {
    let (ok, value) = match outcome {
        Ok(value) => (true, value),
        Err(err) => (
            false,
            Payload::Value(serde_json::Value::String(err.message().to_string())),
        ),
    };
    let kind = if process.target.is_some() {
        EventKind::UuidTargeted
    } else {
        EventKind::Immediate
    };
    let mut event = Event::new(kind, Some(process.end_topic));
    event.parent = Some(NamedRef::Component(process.parent));
    event.target = process.target;
    event.ok = ok;
    event.value = value;
    queue.schedule_now(event, Priority::Normal);
}

fn spawn_process(
    queue: &mut EventQueue,
    processes: &mut ProcessTable,
    parent: Uuid,
    routine: Box<dyn Routine>,
    start_topic: TopicId,
    end_topic: TopicId,
    target: Option<Uuid>,
) -> ProcessId {
    let pid = processes.insert(parent, routine, end_topic, target);
    let mut event = Event::new(EventKind::ProcessResume, Some(start_topic));
    event.parent = Some(NamedRef::Component(parent));
    event.callbacks.push(Callback::Resume(pid));
    let wake = queue.schedule_now(event, Priority::Urgent);
    if let Some(process) = processes.get_mut(pid) {
        process.waiting_on = Some(wake);
    }
    pid
}

fn interrupt_process(
    queue: &mut EventQueue,
    processes: &mut ProcessTable,
    pid: ProcessId,
    cause: serde_json::Value,
) -> bool {
    let Some(process) = processes.get_mut(pid) else {
        return false;
    };
    // Detach from whatever the process was awaiting so it cannot be woken
    // twice, then deliver the failure at the urgent priority class.
    if let Some(awaited) = process.waiting_on.take() {
        queue.remove_callback(awaited, &Callback::Resume(pid));
    }
    process.started = true;
    let parent = process.parent;
    let mut event = Event::new(EventKind::ProcessResume, None);
    event.parent = Some(NamedRef::Component(parent));
    event.ok = false;
    event.value = Payload::Interrupted(cause);
    event.callbacks.push(Callback::Resume(pid));
    let wake = queue.schedule_now(event, Priority::Urgent);
    if let Some(process) = processes.get_mut(pid) {
        process.waiting_on = Some(wake);
    }
    true
}

fn emit_event(
    queue: &mut EventQueue,
    parent: Option<NamedRef>,
    spec: EventSpec,
) -> Result<EventId, SimError> {
    let kind = match (spec.target.is_some(), spec.delay.is_some()) {
        (false, false) => EventKind::Immediate,
        (true, false) => EventKind::UuidTargeted,
        (false, true) => EventKind::Timeout,
        (true, true) => EventKind::TargetedTimeout,
    };
    let mut event = Event::new(kind, Some(spec.topic));
    event.parent = parent;
    event.target = spec.target;
    event.cause = spec.cause;
    event.value = spec.value;
    event.component_state = spec.state_tag;
    match spec.delay {
        Some(delay) => queue.schedule(event, Priority::Normal, delay),
        None => Ok(queue.schedule_now(event, Priority::Normal)),
    }
}

fn failure_message(event: &Event) -> String {
    let detail = match event.value() {
        Payload::Value(serde_json::Value::String(message)) => message.clone(),
        Payload::Interrupted(cause) => format!("interrupted: {cause}"),
        other => format!("{other:?}"),
    };
    match event.topic() {
        Some(topic) => format!("event {} on topic {topic}: {detail}", event.id()),
        None => format!("event {}: {detail}", event.id()),
    }
}
