#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sim_kernel::environment::SimContext;
use sim_kernel::event::{EventId, Payload};
use sim_kernel::process::{Routine, RoutineError, RoutineInput, RoutineStep};
use sim_kernel::resource::SlotPool;

pub type SharedPool = Rc<RefCell<SlotPool>>;
pub type Trace = Rc<RefCell<Vec<String>>>;

pub fn trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

/// Sleeps for `delay`, then completes with a fixed payload.
#[derive(Debug)]
pub struct HoldThenDone {
    delay: f64,
    holding: bool,
}

impl HoldThenDone {
    pub fn new(delay: f64) -> Self {
        Self {
            delay,
            holding: false,
        }
    }
}

impl Routine for HoldThenDone {
    fn resume(
        &mut self,
        input: RoutineInput,
        ctx: &mut SimContext,
    ) -> Result<RoutineStep, RoutineError> {
        if let RoutineInput::Failed(cause) = input {
            return Err(RoutineError::new(format!("hold interrupted: {cause:?}")));
        }
        if self.holding {
            Ok(RoutineStep::Done(Payload::Value(serde_json::json!("done"))))
        } else {
            self.holding = true;
            let wake = ctx.hold(self.delay)?;
            Ok(RoutineStep::Wait(wake))
        }
    }
}

/// Sleeps for `delay`, then fails with `message`.
#[derive(Debug)]
pub struct FailAfterHold {
    delay: f64,
    message: String,
    holding: bool,
}

impl FailAfterHold {
    pub fn new(delay: f64, message: &str) -> Self {
        Self {
            delay,
            message: message.to_string(),
            holding: false,
        }
    }
}

impl Routine for FailAfterHold {
    fn resume(
        &mut self,
        input: RoutineInput,
        ctx: &mut SimContext,
    ) -> Result<RoutineStep, RoutineError> {
        if let RoutineInput::Failed(cause) = input {
            return Err(RoutineError::new(format!("interrupted: {cause:?}")));
        }
        if self.holding {
            Err(RoutineError::new(self.message.clone()))
        } else {
            self.holding = true;
            let wake = ctx.hold(self.delay)?;
            Ok(RoutineStep::Wait(wake))
        }
    }
}

#[derive(Debug)]
enum WorkerPhase {
    Arriving,
    Queued,
    Working,
}

/// Requests a slot from a shared pool, works for `service` seconds, then
/// releases. Appends "<label>:granted" / "<label>:released" to the trace, so
/// tests can assert FIFO grant order.
#[derive(Debug)]
pub struct PoolWorker {
    pool: SharedPool,
    label: String,
    service: f64,
    trace: Trace,
    phase: WorkerPhase,
    grant: Option<EventId>,
}

impl PoolWorker {
    pub fn new(pool: SharedPool, label: &str, service: f64, trace: Trace) -> Self {
        Self {
            pool,
            label: label.to_string(),
            service,
            trace,
            phase: WorkerPhase::Arriving,
            grant: None,
        }
    }
}

impl Routine for PoolWorker {
    fn resume(
        &mut self,
        input: RoutineInput,
        ctx: &mut SimContext,
    ) -> Result<RoutineStep, RoutineError> {
        if let RoutineInput::Failed(cause) = input {
            match self.phase {
                WorkerPhase::Queued => {
                    if let Some(grant) = self.grant.take() {
                        self.pool.borrow_mut().withdraw(grant);
                    }
                }
                WorkerPhase::Working => self.pool.borrow_mut().release(ctx),
                WorkerPhase::Arriving => {}
            }
            return Err(RoutineError::new(format!(
                "{} interrupted: {cause:?}",
                self.label
            )));
        }
        match self.phase {
            WorkerPhase::Arriving => {
                let grant = self.pool.borrow_mut().request(ctx);
                self.grant = Some(grant);
                self.phase = WorkerPhase::Queued;
                Ok(RoutineStep::Wait(grant))
            }
            WorkerPhase::Queued => {
                self.trace.borrow_mut().push(format!("{}:granted", self.label));
                self.phase = WorkerPhase::Working;
                let wake = ctx.hold(self.service)?;
                Ok(RoutineStep::Wait(wake))
            }
            WorkerPhase::Working => {
                self.pool.borrow_mut().release(ctx);
                self.trace
                    .borrow_mut()
                    .push(format!("{}:released", self.label));
                Ok(RoutineStep::Done(Payload::Value(serde_json::json!(
                    self.label
                ))))
            }
        }
    }
}
