//! Scenario builder: seeded patients, a reception desk, scheduled arrivals.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sim_kernel::clock::SimTime;
use sim_kernel::component::Component;
use sim_kernel::environment::{Environment, SimulationConfig};
use sim_kernel::error::SimError;
use sim_kernel::event::{EventSpec, NamedRef, Payload};

use crate::patient::{Complaint, Patient};
use crate::reception::Reception;
use crate::topics;

/// Knobs for a clinic run. All sampling is seeded for reproducibility.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioParams {
    pub patients: usize,
    pub receptionists: usize,
    /// Mean inter-arrival time between patients (exponential), seconds.
    pub mean_arrival_secs: f64,
    /// Run horizon passed to `Environment::run`, seconds.
    pub horizon_secs: f64,
    pub seed: u64,
    pub event_logging: bool,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            patients: 10,
            receptionists: 2,
            mean_arrival_secs: 180.0,
            horizon_secs: 60.0 * 60.0,
            seed: 42,
            event_logging: true,
        }
    }
}

impl ScenarioParams {
    pub fn with_patients(mut self, patients: usize) -> Self {
        self.patients = patients;
        self
    }

    pub fn with_receptionists(mut self, receptionists: usize) -> Self {
        self.receptionists = receptionists;
        self
    }

    pub fn with_mean_arrival_secs(mut self, mean_arrival_secs: f64) -> Self {
        self.mean_arrival_secs = mean_arrival_secs;
        self
    }

    pub fn with_horizon_secs(mut self, horizon_secs: f64) -> Self {
        self.horizon_secs = horizon_secs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Ids of the built components, for inspection after the run.
#[derive(Debug)]
pub struct ScenarioHandles {
    pub reception: uuid::Uuid,
    pub patients: Vec<uuid::Uuid>,
}

/// Build the environment: reception plus `patients` components attached,
/// one PATIENT_ARRIVED broadcast scheduled per patient.
pub fn build_scenario(params: &ScenarioParams) -> Result<(Environment, ScenarioHandles), SimError> {
    let mut env = Environment::with_config(SimulationConfig {
        event_logging: params.event_logging,
    });
    let mut rng = StdRng::seed_from_u64(params.seed);

    let reception = Reception::new(params.receptionists);
    let handles_reception = reception.id();
    let mut components: Vec<Box<dyn Component>> = vec![Box::new(reception)];

    let mut arrivals = Vec::with_capacity(params.patients);
    let mut patient_ids = Vec::with_capacity(params.patients);
    let mut at = 0.0;
    for i in 0..params.patients {
        let complaint = Complaint::sample(&mut rng);
        let patient = Patient::new(format!("patient-{i}"), complaint);
        at += sample_exponential(&mut rng, params.mean_arrival_secs);
        arrivals.push((patient.id(), complaint, at));
        patient_ids.push(patient.id());
        components.push(Box::new(patient));
    }
    env.attach(components);

    for (patient, complaint, at) in arrivals {
        env.emit(
            Some(NamedRef::Component(patient)),
            EventSpec::new(topics::PATIENT_ARRIVED)
                .with_value(Payload::Value(serde_json::to_value(complaint)?))
                .with_delay(at),
        )?;
    }

    Ok((
        env,
        ScenarioHandles {
            reception: handles_reception,
            patients: patient_ids,
        },
    ))
}

/// Exponential inter-arrival sample: -mean * ln(U), with U clamped away
/// from zero.
fn sample_exponential(rng: &mut StdRng, mean_secs: f64) -> SimTime {
    let u: f64 = rng.gen::<f64>().max(1e-10);
    -u.ln() * mean_secs
}
