/// Simulation Configuration
///
/// All knobs for one trial (or one batch of trials). Invalid combinations
/// are rejected at construction time, before any trial starts.
use crate::types::{can_ids, DEFAULT_FRAME_BITS};
use serde::{Deserialize, Serialize};

/// Bus speeds the timing model is calibrated for
pub const SUPPORTED_BUS_SPEEDS_KBPS: [u32; 3] = [250, 500, 1000];

/// Victim transmit cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimMode {
    /// A frame every `victim_period_slots` ticks
    Periodic,
    /// Periodic, with a lower-priority auxiliary frame interleaved one slot
    /// before every second periodic emission
    Preceded,
    /// Period jittered by a bounded random offset each cycle
    NonPeriodic,
}

impl VictimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VictimMode::Periodic => "periodic",
            VictimMode::Preceded => "preceded",
            VictimMode::NonPeriodic => "non_periodic",
        }
    }
}

/// Configuration for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Bus speed in kbps; one of {250, 500, 1000}
    pub bus_speed_kbps: u32,

    /// Bits per frame assumed for the slot-duration derivation
    pub frame_bits: u32,

    /// Victim transmit cadence
    pub victim_mode: VictimMode,

    /// Victim period in frame slots
    pub victim_period_slots: u64,

    /// Max jitter (in slots, each direction) for non-periodic mode
    pub victim_jitter_slots: u64,

    /// Identifier of the victim's periodic frame (the attack target)
    pub victim_id: u16,

    /// Identifier of the victim's auxiliary frame in preceded mode
    pub victim_aux_id: u16,

    /// Attacker's own identifier (its injected frames reuse `victim_id`)
    pub attacker_id: u16,

    /// Identifiers of background ECUs transmitting ordinary periodic traffic
    pub normal_ids: Vec<u16>,

    /// False runs the bus without an attacker (baseline)
    pub attacker_enabled: bool,

    /// Consecutive matching inter-arrival intervals needed to lock the period
    pub analysis_min_matches: u32,

    /// Observation window in slots; exceeding it without a lock aborts the trial
    pub analysis_window_slots: u64,

    /// If true, a collision whose losers are all error-passive still destroys
    /// the winning frame (+8) instead of letting it complete
    pub passive_flag_penalty: bool,

    /// Simulated-time budget per trial
    pub trial_timeout_ms: f64,

    /// Emit per-step records instead of only the trial summary
    pub detailed: bool,

    /// Base RNG seed; trial `t` uses `rng_seed + t`
    pub rng_seed: u64,

    /// Trials per parameter set
    pub trials: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bus_speed_kbps: 500,
            frame_bits: DEFAULT_FRAME_BITS,
            victim_mode: VictimMode::Periodic,
            victim_period_slots: 10,
            victim_jitter_slots: 0,
            victim_id: can_ids::VICTIM_PERIODIC,
            victim_aux_id: can_ids::VICTIM_AUXILIARY,
            attacker_id: can_ids::ATTACKER,
            normal_ids: Vec::new(),
            attacker_enabled: true,
            analysis_min_matches: 3,
            analysis_window_slots: 300,
            passive_flag_penalty: false,
            trial_timeout_ms: 500.0,
            detailed: false,
            rng_seed: 42,
            trials: 1000,
        }
    }
}

impl SimConfig {
    /// Frame-slot duration in milliseconds for this bus speed
    pub fn step_ms(&self) -> f64 {
        self.frame_bits as f64 / self.bus_speed_kbps as f64
    }

    /// Reject invalid or conflicting settings before a trial is constructed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_BUS_SPEEDS_KBPS.contains(&self.bus_speed_kbps) {
            return Err(ConfigError::UnsupportedBusSpeed(self.bus_speed_kbps));
        }
        if self.frame_bits == 0 {
            return Err(ConfigError::ZeroFrameBits);
        }
        if self.victim_period_slots == 0 {
            return Err(ConfigError::NonPositivePeriod);
        }
        if self.trial_timeout_ms <= 0.0 {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if self.analysis_min_matches == 0 {
            return Err(ConfigError::ZeroAnalysisMatches);
        }

        for &id in [self.victim_id, self.victim_aux_id, self.attacker_id]
            .iter()
            .chain(self.normal_ids.iter())
        {
            if id >= can_ids::MAX_STANDARD {
                return Err(ConfigError::IdOutOfRange(id));
            }
        }
        if self.victim_id == self.attacker_id {
            return Err(ConfigError::ConflictingRoles(
                "attacker_id equals victim_id".to_string(),
            ));
        }
        if self.victim_id == self.victim_aux_id {
            return Err(ConfigError::ConflictingRoles(
                "victim_aux_id equals victim_id".to_string(),
            ));
        }
        if self.normal_ids.contains(&self.victim_id) {
            return Err(ConfigError::ConflictingRoles(
                "normal_ids contains victim_id".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors, reported before a trial starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnsupportedBusSpeed(u32),
    ZeroFrameBits,
    NonPositivePeriod,
    NonPositiveTimeout,
    ZeroAnalysisMatches,
    IdOutOfRange(u16),
    ConflictingRoles(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::UnsupportedBusSpeed(kbps) => {
                write!(
                    f,
                    "unsupported bus speed {} kbps (expected one of {:?})",
                    kbps, SUPPORTED_BUS_SPEEDS_KBPS
                )
            }
            ConfigError::ZeroFrameBits => write!(f, "frame_bits must be positive"),
            ConfigError::NonPositivePeriod => {
                write!(f, "victim_period_slots must be positive")
            }
            ConfigError::NonPositiveTimeout => {
                write!(f, "trial_timeout_ms must be positive")
            }
            ConfigError::ZeroAnalysisMatches => {
                write!(f, "analysis_min_matches must be positive")
            }
            ConfigError::IdOutOfRange(id) => {
                write!(f, "identifier {:#05x} exceeds the 11-bit range", id)
            }
            ConfigError::ConflictingRoles(detail) => {
                write!(f, "conflicting role assignment: {}", detail)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_step_ms_scales_with_bus_speed() {
        let mut config = SimConfig::default();
        config.bus_speed_kbps = 500;
        let at_500 = config.step_ms();
        config.bus_speed_kbps = 250;
        let at_250 = config.step_ms();
        assert!((at_250 / at_500 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unsupported_bus_speed() {
        let config = SimConfig {
            bus_speed_kbps: 125,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedBusSpeed(125))
        );
    }

    #[test]
    fn test_rejects_zero_period() {
        let config = SimConfig {
            victim_period_slots: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositivePeriod));
    }

    #[test]
    fn test_rejects_shared_victim_and_attacker_id() {
        let config = SimConfig {
            attacker_id: can_ids::VICTIM_PERIODIC,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingRoles(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_id() {
        let config = SimConfig {
            normal_ids: vec![0x120, 0x800],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::IdOutOfRange(0x800)));
    }

    #[test]
    fn test_victim_mode_round_trips_through_json() {
        let json = serde_json::to_string(&VictimMode::NonPeriodic).unwrap();
        assert_eq!(json, "\"non_periodic\"");
        let back: VictimMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VictimMode::NonPeriodic);
    }
}
