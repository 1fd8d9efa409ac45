/// Batch Orchestration
///
/// Runs many independent trials per parameter set and whole sweeps across
/// bus speeds. Each trial owns its bus, nodes and RNG; nothing mutable is
/// shared between trials.
use crate::config::{SimConfig, ConfigError};
use crate::simulation::{SimError, Simulation, TrialOutcome, TrialRecord};

/// Errors surfacing from a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    Config(ConfigError),
    Sim(SimError),
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SweepError::Config(e) => write!(f, "configuration error: {}", e),
            SweepError::Sim(e) => write!(f, "trial aborted: {}", e),
        }
    }
}

impl std::error::Error for SweepError {}

impl From<ConfigError> for SweepError {
    fn from(e: ConfigError) -> Self {
        SweepError::Config(e)
    }
}

impl From<SimError> for SweepError {
    fn from(e: SimError) -> Self {
        SweepError::Sim(e)
    }
}

/// Run `config.trials` independent trials and collect their summaries.
/// Step recording is disabled regardless of `config.detailed`; aggregate
/// runs only keep the per-trial records.
pub fn run_trials(config: &SimConfig) -> Result<Vec<TrialRecord>, SweepError> {
    let mut aggregate_config = config.clone();
    aggregate_config.detailed = false;

    let mut records = Vec::with_capacity(config.trials as usize);
    for trial in 1..=config.trials {
        let outcome = Simulation::new(&aggregate_config, trial)?.run()?;
        records.push(outcome.record);
    }
    Ok(records)
}

/// Run one full-detail trial (per-step records and bus events)
pub fn run_detailed_trial(config: &SimConfig) -> Result<TrialOutcome, SweepError> {
    let mut detailed_config = config.clone();
    detailed_config.detailed = true;
    let outcome = Simulation::new(&detailed_config, 1)?.run()?;
    Ok(outcome)
}

/// Run one batch of trials at each bus speed, keeping every other setting
/// fixed. Returns the records grouped per speed, in the given order.
pub fn run_speed_sweep(
    config: &SimConfig,
    speeds: &[u32],
) -> Result<Vec<(u32, Vec<TrialRecord>)>, SweepError> {
    let mut results = Vec::with_capacity(speeds.len());
    for &speed in speeds {
        let mut sweep_config = config.clone();
        sweep_config.bus_speed_kbps = speed;
        let records = run_trials(&sweep_config)?;
        results.push((speed, records));
    }
    Ok(results)
}
