/// Simulation Driver
///
/// Owns the bus and every node for the lifetime of one trial, advances the
/// clock tick by tick, and records either the trial summary alone or the
/// full per-step timeline. Trials are independent: nothing mutable is
/// shared between two trials.
use crate::attacker::AttackController;
use crate::can_bus::{CanBus, TickEvent};
use crate::config::{SimConfig, ConfigError, VictimMode};
use crate::ecu::Ecu;
use crate::types::{AttackPhase, FaultState, TEC_BUS_OFF_THRESHOLD, TEC_ERROR_PASSIVE_THRESHOLD};
use crate::victim::TxSchedule;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const VICTIM_NAME: &str = "Victim";
pub const ATTACKER_NAME: &str = "Attacker";

/// Per-trial summary, one object per line in the aggregate logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub bus_speed_kbps: u32,
    pub step_ms: f64,
    pub time_to_error_passive_ms: Option<f64>,
    pub time_to_bus_off_ms: Option<f64>,
    pub victim_final_tec: u16,
    pub attacker_final_tec: u16,
    /// 1 iff the victim reached Bus-Off before the trial timeout
    pub victim_bus_off: u8,
    /// 1-indexed trial number
    pub trial: u32,
}

/// Per-step record for the single detailed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub time_ms: f64,
    pub victim_tec: u16,
    pub attacker_tec: u16,
    pub victim_state: FaultState,
    pub attacker_state: FaultState,
    pub phase: AttackPhase,
}

/// Why the trial stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    VictimBusOff,
    Timeout,
    PeriodLockFailed,
}

/// Everything one trial produced
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub record: TrialRecord,
    pub end_reason: EndReason,
    /// Populated only in detailed mode
    pub steps: Vec<StepRecord>,
    /// Bus events matching `steps` one-to-one, detailed mode only
    pub events: Vec<TickEvent>,
}

/// Fatal in-trial failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A protocol invariant no longer holds; the trial is unusable
    InvariantViolation(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SimError::InvariantViolation(detail) => {
                write!(f, "simulation invariant violated: {}", detail)
            }
        }
    }
}

impl std::error::Error for SimError {}

pub struct Simulation {
    config: SimConfig,
    bus: CanBus,
    ecus: Vec<Ecu>,
    rng: StdRng,
    victim_idx: usize,
    attacker_idx: Option<usize>,
    trial: u32,
}

impl Simulation {
    /// Build one trial. `trial` is 1-indexed and also salts the RNG seed so
    /// each trial is independently reproducible.
    pub fn new(config: &SimConfig, trial: u32) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut ecus = Vec::new();

        ecus.push(Ecu::victim(
            VICTIM_NAME,
            config.victim_id,
            config.victim_aux_id,
            TxSchedule::new(
                config.victim_mode,
                config.victim_period_slots,
                config.victim_jitter_slots,
            ),
        ));
        let victim_idx = 0;

        let attacker_idx = if config.attacker_enabled {
            let controller = AttackController::new(
                ATTACKER_NAME,
                config.victim_id,
                config.analysis_min_matches,
                config.analysis_window_slots,
            );
            ecus.push(Ecu::attacker(ATTACKER_NAME, config.attacker_id, controller));
            Some(ecus.len() - 1)
        } else {
            None
        };

        for (i, &id) in config.normal_ids.iter().enumerate() {
            ecus.push(Ecu::normal(
                format!("ECU_{:03X}", id),
                id,
                TxSchedule::with_phase(
                    VictimMode::Periodic,
                    config.victim_period_slots,
                    0,
                    i as u64 + 1,
                ),
            ));
        }

        Ok(Self {
            bus: CanBus::new(
                config.bus_speed_kbps,
                config.frame_bits,
                config.passive_flag_penalty,
            ),
            ecus,
            rng: StdRng::seed_from_u64(config.rng_seed.wrapping_add(trial as u64)),
            victim_idx,
            attacker_idx,
            trial,
            config: config.clone(),
        })
    }

    /// Run the trial to completion.
    pub fn run(&mut self) -> Result<TrialOutcome, SimError> {
        let step_ms = self.bus.step_ms();
        let max_ticks = (self.config.trial_timeout_ms / step_ms).ceil() as u64;

        let mut time_to_error_passive_ms = None;
        let mut time_to_bus_off_ms = None;
        let mut steps = Vec::new();
        let mut events = Vec::new();
        let mut end_reason = EndReason::Timeout;

        for tick in 0..max_ticks {
            let event = self.step(tick);

            let now_ms = self.bus.now_ms();
            let victim = &self.ecus[self.victim_idx];
            if time_to_error_passive_ms.is_none() && victim.tec() >= TEC_ERROR_PASSIVE_THRESHOLD {
                time_to_error_passive_ms = Some(now_ms);
            }
            if time_to_bus_off_ms.is_none() && victim.state() == FaultState::BusOff {
                time_to_bus_off_ms = Some(now_ms);
            }

            if self.config.detailed {
                steps.push(self.step_record(now_ms));
                events.push(event);
            }

            self.check_invariants()?;

            if self.ecus[self.victim_idx].state() == FaultState::BusOff {
                end_reason = EndReason::VictimBusOff;
                break;
            }
            if self
                .attacker_idx
                .map(|idx| self.ecus[idx].lock_failed())
                .unwrap_or(false)
            {
                end_reason = EndReason::PeriodLockFailed;
                break;
            }
        }

        let record = TrialRecord {
            bus_speed_kbps: self.config.bus_speed_kbps,
            step_ms,
            time_to_error_passive_ms,
            time_to_bus_off_ms,
            victim_final_tec: self.ecus[self.victim_idx].tec(),
            attacker_final_tec: self
                .attacker_idx
                .map(|idx| self.ecus[idx].tec())
                .unwrap_or(0),
            victim_bus_off: (end_reason == EndReason::VictimBusOff) as u8,
            trial: self.trial,
        };

        Ok(TrialOutcome {
            record,
            end_reason,
            steps,
            events,
        })
    }

    /// One tick: collect intents, resolve the bus, fan the outcome back out.
    fn step(&mut self, tick: u64) -> TickEvent {
        let rng = &mut self.rng;
        let mut intents = Vec::new();
        for (idx, ecu) in self.ecus.iter_mut().enumerate() {
            if let Some(frame) = ecu.decide_transmission(tick, rng) {
                intents.push((idx, frame));
            }
        }

        let event = self.bus.resolve_tick(tick, intents, &mut self.ecus);
        let victim_state = self.ecus[self.victim_idx].state();
        for ecu in self.ecus.iter_mut() {
            ecu.observe_bus(&event, tick, victim_state);
        }
        event
    }

    fn step_record(&self, time_ms: f64) -> StepRecord {
        let victim = &self.ecus[self.victim_idx];
        let (attacker_tec, attacker_state, phase) = match self.attacker_idx {
            Some(idx) => {
                let attacker = &self.ecus[idx];
                (
                    attacker.tec(),
                    attacker.state(),
                    attacker.attack_phase().unwrap_or(AttackPhase::Analysis),
                )
            }
            None => (0, FaultState::ErrorActive, AttackPhase::Analysis),
        };

        StepRecord {
            time_ms,
            victim_tec: victim.tec(),
            attacker_tec,
            victim_state: victim.state(),
            attacker_state,
            phase,
        }
    }

    /// Protocol invariants that must hold after every tick.
    fn check_invariants(&self) -> Result<(), SimError> {
        for ecu in &self.ecus {
            if ecu.tec() > TEC_BUS_OFF_THRESHOLD {
                return Err(SimError::InvariantViolation(format!(
                    "{}: TEC {} exceeds {}",
                    ecu.name(),
                    ecu.tec(),
                    TEC_BUS_OFF_THRESHOLD
                )));
            }
            let expected = FaultState::from_tec(ecu.tec());
            if ecu.state() != expected {
                return Err(SimError::InvariantViolation(format!(
                    "{}: state {} inconsistent with TEC {} (expected {})",
                    ecu.name(),
                    ecu.state(),
                    ecu.tec(),
                    expected
                )));
            }
        }
        Ok(())
    }
}
