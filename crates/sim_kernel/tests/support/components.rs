#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use uuid::Uuid;

use sim_kernel::component::{Component, ComponentMeta};
use sim_kernel::environment::SimContext;
use sim_kernel::error::SimError;
use sim_kernel::event::{Event, TopicId};

/// One observed delivery, as seen from inside `listen`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub listener: String,
    pub topic: Option<&'static str>,
    pub time: f64,
    pub sequence: u64,
    pub ok: bool,
}

pub type DeliveryLog = Rc<RefCell<Vec<Delivery>>>;

pub fn delivery_log() -> DeliveryLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Probe component: records every delivery it hears into a shared log.
/// Optionally defuses failed events (standing in for a supervising listener).
#[derive(Debug)]
pub struct Probe {
    meta: ComponentMeta,
    heard: DeliveryLog,
    defuse_failures: bool,
}

impl Probe {
    pub fn new(name: &str, topics: &[TopicId], heard: DeliveryLog) -> Self {
        Self {
            meta: ComponentMeta::new(name, topics.iter().copied()),
            heard,
            defuse_failures: false,
        }
    }

    /// Make this probe defuse any failed event it hears.
    pub fn defusing(mut self) -> Self {
        self.defuse_failures = true;
        self
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }
}

impl Component for Probe {
    fn meta(&self) -> &ComponentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ComponentMeta {
        &mut self.meta
    }

    fn listen(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        self.heard.borrow_mut().push(Delivery {
            listener: self.meta.name.clone(),
            topic: event.topic().map(|t| t.as_str()),
            time: ctx.now(),
            sequence: event.id().as_u64(),
            ok: event.is_ok(),
        });
        if self.defuse_failures && !event.is_ok() {
            ctx.defuse();
        }
        Ok(())
    }
}

/// Deliveries heard by a named listener, in order.
pub fn heard_by(log: &DeliveryLog, listener: &str) -> Vec<Delivery> {
    log.borrow()
        .iter()
        .filter(|delivery| delivery.listener == listener)
        .cloned()
        .collect()
}
