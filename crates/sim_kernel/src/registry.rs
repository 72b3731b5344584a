//! Dispatch registry: owns the components and resolves event recipients.
//!
//! Resolution happens at fire time, not at schedule time, so subscription
//! changes between scheduling and firing affect delivery of not-yet-fired
//! broadcast events (late-binding dispatch).

use std::collections::HashMap;

use uuid::Uuid;

use crate::component::Component;
use crate::error::SimError;
use crate::event::{Callback, Event, EventKind, TopicId};

/// Owns every component for the run's duration. Events reference components
/// only by id; labels for the log come from [ComponentRegistry::lookup_name].
///
/// Invariants: each id maps to at most one live component; per-topic
/// subscriber lists preserve registration order.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<Uuid, Box<dyn Component>>,
    names: HashMap<Uuid, String>,
    order: Vec<Uuid>,
    subscribers: HashMap<TopicId, Vec<Uuid>>,
}

impl ComponentRegistry {
    /// Replace the full component set, rebuilding the id and topic maps from
    /// each component's declared subscriptions, in registration order.
    pub fn attach(&mut self, components: Vec<Box<dyn Component>>) {
        self.components.clear();
        self.names.clear();
        self.order.clear();
        self.subscribers.clear();

        for component in components {
            let meta = component.meta();
            let id = meta.id;
            self.names.insert(id, meta.name.clone());
            self.order.push(id);
            for topic in &meta.subscriptions {
                self.subscribers.entry(*topic).or_default().push(id);
            }
            self.components.insert(id, component);
        }
    }

    /// Callbacks to attach before `event` fires.
    ///
    /// Broadcast events get the full ordered subscriber list for their topic
    /// (possibly empty); single-target events get exactly the one target
    /// listener, and an unknown target id is a fatal lookup failure.
    /// Internal events are never broadcast; whatever was attached at
    /// creation is all they run.
    pub fn resolve(&self, event: &Event) -> Result<Vec<Callback>, SimError> {
        match event.kind() {
            EventKind::ProcessResume => Ok(Vec::new()),
            EventKind::TargetedTimeout | EventKind::UuidTargeted => {
                let Some(target) = event.target() else {
                    return Ok(Vec::new());
                };
                if self.names.contains_key(&target) {
                    Ok(vec![Callback::Notify(target)])
                } else {
                    Err(SimError::UnknownTarget(target))
                }
            }
            EventKind::Immediate | EventKind::Timeout => Ok(event
                .topic()
                .and_then(|topic| self.subscribers.get(&topic))
                .map(|ids| ids.iter().copied().map(Callback::Notify).collect())
                .unwrap_or_default()),
        }
    }

    /// Display label for a component id, used only for log readability.
    pub fn lookup_name(&self, id: &Uuid) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Add a mid-run subscription; the topic's subscriber list keeps its
    /// existing order and appends the new entry.
    pub fn subscribe(&mut self, id: Uuid, topic: TopicId) -> bool {
        let Some(component) = self.components.get_mut(&id) else {
            return false;
        };
        if component.meta_mut().subscriptions.insert(topic) {
            self.subscribers.entry(topic).or_default().push(id);
        }
        true
    }

    /// Drop a mid-run subscription; not-yet-fired broadcast events on the
    /// topic will no longer reach the component.
    pub fn unsubscribe(&mut self, id: Uuid, topic: TopicId) -> bool {
        let Some(component) = self.components.get_mut(&id) else {
            return false;
        };
        component.meta_mut().subscriptions.remove(&topic);
        if let Some(subscribers) = self.subscribers.get_mut(&topic) {
            subscribers.retain(|subscriber| subscriber != &id);
        }
        true
    }

    pub fn get(&self, id: &Uuid) -> Option<&dyn Component> {
        self.components.get(id).map(|component| component.as_ref())
    }

    /// Component ids in registration order.
    pub fn component_ids(&self) -> &[Uuid] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Temporarily remove a component for dispatch; pair with
    /// [ComponentRegistry::restore].
    pub(crate) fn take(&mut self, id: &Uuid) -> Option<Box<dyn Component>> {
        self.components.remove(id)
    }

    pub(crate) fn restore(&mut self, component: Box<dyn Component>) {
        let id = component.meta().id;
        self.components.insert(id, component);
    }
}
