//! Patients: walk in with a complaint, wait for reception, get served.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sim_kernel::component::{Component, ComponentMeta};
use sim_kernel::environment::SimContext;
use sim_kernel::error::SimError;
use sim_kernel::event::{Event, NamedRef};

use crate::topics;

/// What brought the patient in; determines how long reception takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complaint {
    ChestPain,
    Fracture,
    Directions,
}

impl Complaint {
    /// Reception service time in simulation seconds.
    pub fn service_secs(&self) -> f64 {
        match self {
            Complaint::ChestPain => 60.0,
            Complaint::Fracture => 300.0,
            Complaint::Directions => 10.0,
        }
    }

    pub fn sample(rng: &mut StdRng) -> Self {
        match rng.gen_range(0..3) {
            0 => Complaint::ChestPain,
            1 => Complaint::Fracture,
            _ => Complaint::Directions,
        }
    }
}

/// A patient. Subscribes to nothing; reception notifies it directly with a
/// targeted PATIENT_SERVED event once its service routine completes.
#[derive(Debug)]
pub struct Patient {
    meta: ComponentMeta,
    complaint: Complaint,
}

impl Patient {
    pub fn new(name: impl Into<String>, complaint: Complaint) -> Self {
        Self {
            meta: ComponentMeta::new(name, []),
            complaint,
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn complaint(&self) -> Complaint {
        self.complaint
    }
}

impl Component for Patient {
    fn meta(&self) -> &ComponentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ComponentMeta {
        &mut self.meta
    }

    fn listen(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        if event.topic() == Some(topics::PATIENT_SERVED) {
            let location = match event.parent() {
                Some(NamedRef::Component(reception)) => Some(NamedRef::Component(*reception)),
                _ => None,
            };
            self.update_state(ctx, "Served", location)?;
        }
        Ok(())
    }
}
