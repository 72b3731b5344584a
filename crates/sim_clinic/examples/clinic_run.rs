//! Run a clinic morning and dump the event log.
//!
//! Run with: cargo run -p sim_clinic --example clinic_run

use std::path::Path;

use sim_clinic::scenario::{build_scenario, ScenarioParams};
use sim_clinic::topics::topic_catalog;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let params = ScenarioParams::default()
        .with_patients(12)
        .with_receptionists(2)
        .with_mean_arrival_secs(120.0)
        .with_seed(123);

    let (mut env, handles) = build_scenario(&params)?;
    env.run(params.horizon_secs)?;

    println!(
        "--- Clinic run ({} patients, {} receptionists, seed {}) ---",
        params.patients, params.receptionists, params.seed
    );
    println!("Simulation time: {:.0} s", env.now());
    println!("Log records: {}", env.records().len());

    let served = env
        .records()
        .iter()
        .filter(|record| record.topic == "PATIENT_SERVED")
        .count();
    println!("Patients served: {}/{}", served, handles.patients.len());

    println!("\nFirst records:");
    for record in env.records().iter().take(15) {
        println!(
            "  t={:8.1}  {:<16} parent={:<12} state={}",
            record.sim_time,
            record.topic,
            record.parent.as_deref().unwrap_or("-"),
            record.component_state.as_deref().unwrap_or("-"),
        );
    }

    std::fs::create_dir_all("output")?;
    let path = Path::new("output/clinic_log.json");
    env.dump(path, &topic_catalog())?;
    println!("\nEvent log written to {}", path.display());
    Ok(())
}
