//! Reception desk: a bounded pool of receptionists serving patients FIFO.
//!
//! On every PATIENT_ARRIVED broadcast the desk starts one service routine
//! for the arriving patient. The routine queues for a receptionist slot,
//! serves for a complaint-dependent time, then completes with a service
//! report delivered straight to the patient.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use uuid::Uuid;

use sim_kernel::clock::SimTime;
use sim_kernel::component::{Component, ComponentMeta};
use sim_kernel::environment::SimContext;
use sim_kernel::error::SimError;
use sim_kernel::event::{Event, EventId, EventSpec, Loggable, NamedRef, Payload};
use sim_kernel::process::{Routine, RoutineError, RoutineInput, RoutineStep};
use sim_kernel::resource::SlotPool;

use crate::patient::Complaint;
use crate::topics;

/// The desk component. Owns the receptionist slot pool, shared with the
/// service routines it spawns.
#[derive(Debug)]
pub struct Reception {
    meta: ComponentMeta,
    desk: Rc<RefCell<SlotPool>>,
}

impl Reception {
    pub fn new(receptionists: usize) -> Self {
        Self {
            meta: ComponentMeta::new("Reception", [topics::PATIENT_ARRIVED]),
            desk: Rc::new(RefCell::new(SlotPool::new(receptionists))),
        }
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    /// Patients currently waiting for a receptionist.
    pub fn queue_len(&self) -> usize {
        self.desk.borrow().queue_len()
    }
}

impl Component for Reception {
    fn meta(&self) -> &ComponentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ComponentMeta {
        &mut self.meta
    }

    fn listen(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        if event.topic() != Some(topics::PATIENT_ARRIVED) {
            return Ok(());
        }
        let Some(NamedRef::Component(patient)) = event.parent() else {
            return Ok(());
        };
        let Payload::Value(value) = event.value() else {
            return Ok(());
        };
        let complaint: Complaint = serde_json::from_value(value.clone())?;
        let label = ctx
            .lookup_name(patient)
            .unwrap_or("unknown patient")
            .to_string();

        let routine = ServiceRoutine::new(
            Rc::clone(&self.desk),
            *patient,
            label,
            complaint,
            event.id(),
        );
        self.start_process(
            ctx,
            Box::new(routine),
            topics::PATIENT_AT_DESK,
            topics::PATIENT_SERVED,
            Some(*patient),
        );
        Ok(())
    }
}

/// Snapshot of one completed service, logged as the PATIENT_SERVED payload.
#[derive(Debug)]
pub struct ServiceReport {
    pub patient: String,
    pub complaint: Complaint,
    pub arrived_at: SimTime,
    pub served_at: SimTime,
    pub finished_at: SimTime,
}

impl Loggable for ServiceReport {
    fn loggable_data(&self) -> serde_json::Value {
        serde_json::json!({
            "patient": self.patient,
            "complaint": self.complaint,
            "waited_secs": self.served_at - self.arrived_at,
            "service_secs": self.finished_at - self.served_at,
        })
    }
}

#[derive(Debug)]
enum ServicePhase {
    Arriving,
    QueuedForDesk,
    Serving,
}

/// Per-patient service flow: queue for a slot, serve, release.
#[derive(Debug)]
struct ServiceRoutine {
    desk: Rc<RefCell<SlotPool>>,
    patient: Uuid,
    label: String,
    complaint: Complaint,
    arrival_event: EventId,
    phase: ServicePhase,
    grant: Option<EventId>,
    arrived_at: SimTime,
    served_at: SimTime,
}

impl ServiceRoutine {
    fn new(
        desk: Rc<RefCell<SlotPool>>,
        patient: Uuid,
        label: String,
        complaint: Complaint,
        arrival_event: EventId,
    ) -> Self {
        Self {
            desk,
            patient,
            label,
            complaint,
            arrival_event,
            phase: ServicePhase::Arriving,
            grant: None,
            arrived_at: 0.0,
            served_at: 0.0,
        }
    }
}

impl Routine for ServiceRoutine {
    fn resume(
        &mut self,
        input: RoutineInput,
        ctx: &mut SimContext,
    ) -> Result<RoutineStep, RoutineError> {
        if let RoutineInput::Failed(cause) = input {
            // Hand the slot back (or leave the queue) before surfacing the
            // failure, so other patients are not starved.
            match self.phase {
                ServicePhase::QueuedForDesk => {
                    if let Some(grant) = self.grant.take() {
                        self.desk.borrow_mut().withdraw(grant);
                    }
                }
                ServicePhase::Serving => self.desk.borrow_mut().release(ctx),
                ServicePhase::Arriving => {}
            }
            return Err(RoutineError::new(format!(
                "service for {} interrupted: {cause:?}",
                self.label
            )));
        }

        match self.phase {
            ServicePhase::Arriving => {
                self.arrived_at = ctx.now();
                let grant = self.desk.borrow_mut().request(ctx);
                self.grant = Some(grant);
                self.phase = ServicePhase::QueuedForDesk;
                Ok(RoutineStep::Wait(grant))
            }
            ServicePhase::QueuedForDesk => {
                self.served_at = ctx.now();
                self.phase = ServicePhase::Serving;
                ctx.emit(
                    Some(NamedRef::Component(self.patient)),
                    EventSpec::new(topics::PATIENT_AT_DESK)
                        .with_cause(self.arrival_event)
                        .with_value(Payload::Value(serde_json::Value::String(
                            self.label.clone(),
                        ))),
                )?;
                let done = ctx.hold(self.complaint.service_secs())?;
                Ok(RoutineStep::Wait(done))
            }
            ServicePhase::Serving => {
                self.desk.borrow_mut().release(ctx);
                let report = ServiceReport {
                    patient: self.label.clone(),
                    complaint: self.complaint,
                    arrived_at: self.arrived_at,
                    served_at: self.served_at,
                    finished_at: ctx.now(),
                };
                Ok(RoutineStep::Done(Payload::Snapshot(Arc::new(report))))
            }
        }
    }
}
