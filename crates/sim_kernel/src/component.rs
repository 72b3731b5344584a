//! Component abstraction: the capability set every domain entity implements.
//!
//! Entities embed a [ComponentMeta] and implement [Component::listen]; the
//! provided methods cover state updates, event creation, and process
//! spawning. World mutation during `listen` goes through the
//! [SimContext](crate::environment::SimContext) handle the dispatcher passes
//! in.

use std::collections::HashSet;
use std::fmt;

use uuid::Uuid;

use crate::clock::SimTime;
use crate::environment::SimContext;
use crate::error::SimError;
use crate::event::{Event, EventId, EventSpec, NamedRef, Payload, TopicId, STATE_CHANGE};
use crate::process::{ProcessId, Routine};

/// Identity and bookkeeping shared by all components.
#[derive(Debug, Clone)]
pub struct ComponentMeta {
    pub id: Uuid,
    pub name: String,
    /// Topics this component hears broadcast events for.
    pub subscriptions: HashSet<TopicId>,
    /// Mutable state tag, changed through `update_state`.
    pub state: Option<String>,
    pub last_state_change: SimTime,
}

impl ComponentMeta {
    pub fn new(name: impl Into<String>, subscriptions: impl IntoIterator<Item = TopicId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            subscriptions: subscriptions.into_iter().collect(),
            state: None,
            last_state_change: 0.0,
        }
    }

    /// Override the generated id (useful for reproducible setups).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }
}

/// Base capability set for domain entities.
///
/// `listen` is the dispatch entry point the registry invokes; the default
/// methods are the emit/state/process helpers built on top of it.
pub trait Component: fmt::Debug {
    fn meta(&self) -> &ComponentMeta;

    fn meta_mut(&mut self) -> &mut ComponentMeta;

    /// React to a firing event this component was resolved as a recipient of.
    fn listen(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError>;

    /// Transition the state tag, stamping the change time and broadcasting a
    /// STATE_CHANGE event carrying the resolved location label.
    ///
    /// A repeated identical state is a strict no-op: no event, no timestamp
    /// refresh.
    fn update_state(
        &mut self,
        ctx: &mut SimContext,
        new_state: &str,
        location: Option<NamedRef>,
    ) -> Result<(), SimError> {
        if self.meta().state.as_deref() == Some(new_state) {
            return Ok(());
        }
        let location_label = location.as_ref().and_then(|named| ctx.resolve_label(named));
        let now = ctx.now();
        {
            let meta = self.meta_mut();
            meta.state = Some(new_state.to_string());
            meta.last_state_change = now;
        }
        let value = match location_label {
            Some(label) => Payload::Value(serde_json::Value::String(label)),
            None => Payload::None,
        };
        self.create_event(
            ctx,
            EventSpec::new(STATE_CHANGE)
                .with_value(value)
                .with_state_tag(new_state),
        )?;
        Ok(())
    }

    /// Create and schedule an event parented to this component; the variant
    /// produced follows the [EventSpec] decision table.
    fn create_event(&self, ctx: &mut SimContext, spec: EventSpec) -> Result<EventId, SimError> {
        ctx.emit(Some(NamedRef::Component(self.meta().id)), spec)
    }

    /// Start a cooperative routine parented to this component. Its first
    /// wake-up is scheduled immediately at the urgent priority class; on
    /// completion an `end_topic` event fires, delivered to `target` if one
    /// is given and broadcast otherwise.
    fn start_process(
        &self,
        ctx: &mut SimContext,
        routine: Box<dyn Routine>,
        start_topic: TopicId,
        end_topic: TopicId,
        target: Option<Uuid>,
    ) -> ProcessId {
        ctx.start_process(self.meta().id, routine, start_topic, end_topic, target)
    }
}
