/// Bus-Off Attack Simulator
///
/// Discrete-event model of the CAN Bus-Off attack: a malicious node learns
/// a victim's transmit cadence, forces repeated same-identifier collisions,
/// and rides the fault-confinement rules (TEC thresholds 128/256) until the
/// victim is silenced. One tick is one frame slot; everything is
/// single-threaded and deterministic for a given seed.
pub mod attacker;
pub mod can_bus;
pub mod config;
pub mod ecu;
pub mod metrics;
pub mod simulation;
pub mod sweep;
pub mod trace_log;
pub mod types;
pub mod victim;

pub use attacker::AttackController;
pub use can_bus::{CanBus, TickEvent};
pub use config::{ConfigError, SimConfig, VictimMode, SUPPORTED_BUS_SPEEDS_KBPS};
pub use ecu::{Ecu, EcuRole};
pub use metrics::SweepSummary;
pub use simulation::{
    EndReason, SimError, Simulation, StepRecord, TrialOutcome, TrialRecord, ATTACKER_NAME,
    VICTIM_NAME,
};
pub use sweep::{run_detailed_trial, run_speed_sweep, run_trials, SweepError};
pub use trace_log::{write_jsonl, JsonlLogger};
pub use types::{AttackPhase, FaultState, Frame, FramePurpose};
