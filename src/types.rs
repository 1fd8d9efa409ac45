use serde::{Deserialize, Serialize};
use std::fmt;

/// TEC threshold for the Error-Passive transition (per CAN 2.0 fault confinement)
pub const TEC_ERROR_PASSIVE_THRESHOLD: u16 = 128;
/// TEC threshold for the Bus-Off transition (terminal)
pub const TEC_BUS_OFF_THRESHOLD: u16 = 256;
/// TEC penalty for a detected transmit error
pub const TEC_ERROR_INCREMENT: u16 = 8;

/// Bits per CAN frame assumed when deriving the frame-slot duration.
/// A standard data frame with an 8-byte payload is ~111 bits on the wire;
/// at 500 kbps one slot is therefore ~0.222 ms.
pub const DEFAULT_FRAME_BITS: u32 = 111;

/// Standard 11-bit identifiers used by the default bus population
pub mod can_ids {
    /// Victim's periodic frame
    pub const VICTIM_PERIODIC: u16 = 0x100;
    /// Attacker's own identity (its injected frames reuse the victim's id)
    pub const ATTACKER: u16 = 0x200;
    /// Victim's auxiliary frame in preceded mode
    pub const VICTIM_AUXILIARY: u16 = 0x300;
    /// Upper bound (exclusive) for 11-bit identifiers
    pub const MAX_STANDARD: u16 = 0x800;
}

/// Fault-confinement state of an ECU, gated by TEC thresholds 128 and 256
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultState {
    #[serde(rename = "EA")]
    ErrorActive,
    #[serde(rename = "EP")]
    ErrorPassive,
    #[serde(rename = "BO")]
    BusOff,
}

impl FaultState {
    /// State implied by a TEC value
    pub fn from_tec(tec: u16) -> Self {
        if tec >= TEC_BUS_OFF_THRESHOLD {
            FaultState::BusOff
        } else if tec >= TEC_ERROR_PASSIVE_THRESHOLD {
            FaultState::ErrorPassive
        } else {
            FaultState::ErrorActive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultState::ErrorActive => "EA",
            FaultState::ErrorPassive => "EP",
            FaultState::BusOff => "BO",
        }
    }
}

impl fmt::Display for FaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attack controller phase, reported in detailed step records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPhase {
    #[serde(rename = "analysis")]
    Analysis,
    #[serde(rename = "attack_phase1")]
    Phase1,
    #[serde(rename = "attack_phase2")]
    Phase2,
    #[serde(rename = "terminated")]
    Terminated,
}

impl fmt::Display for AttackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttackPhase::Analysis => "analysis",
            AttackPhase::Phase1 => "attack_phase1",
            AttackPhase::Phase2 => "attack_phase2",
            AttackPhase::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Why a frame was put on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePurpose {
    Normal,
    Analysis,
    AttackPhase1,
    AttackPhase2,
}

/// One CAN frame in the frame-slot model.
///
/// Frames are ephemeral: created when an ECU decides to transmit, consumed
/// by the bus during arbitration, never retained beyond one tick (a pending
/// retransmission keeps a copy on the owning ECU, not on the bus).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 11-bit identifier; lower value wins arbitration
    pub id: u16,
    /// Data length code; the lower DLC holds the dominant bits in a
    /// same-identifier conflict
    pub dlc: u8,
    /// Name of the originating ECU
    pub origin: String,
    /// Logical timestamp in simulated milliseconds, stamped by the bus
    pub timestamp_ms: f64,
    pub purpose: FramePurpose,
}

impl Frame {
    pub fn new(id: u16, dlc: u8, origin: impl Into<String>, purpose: FramePurpose) -> Self {
        Self {
            id,
            dlc,
            origin: origin.into(),
            timestamp_ms: 0.0,
            purpose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_tec_thresholds() {
        assert_eq!(FaultState::from_tec(0), FaultState::ErrorActive);
        assert_eq!(FaultState::from_tec(127), FaultState::ErrorActive);
        assert_eq!(FaultState::from_tec(128), FaultState::ErrorPassive);
        assert_eq!(FaultState::from_tec(255), FaultState::ErrorPassive);
        assert_eq!(FaultState::from_tec(256), FaultState::BusOff);
    }

    #[test]
    fn test_state_serializes_to_short_code() {
        assert_eq!(
            serde_json::to_string(&FaultState::ErrorPassive).unwrap(),
            "\"EP\""
        );
        assert_eq!(serde_json::to_string(&FaultState::BusOff).unwrap(), "\"BO\"");
    }

    #[test]
    fn test_phase_serializes_to_log_tag() {
        assert_eq!(
            serde_json::to_string(&AttackPhase::Phase1).unwrap(),
            "\"attack_phase1\""
        );
        assert_eq!(
            serde_json::to_string(&AttackPhase::Analysis).unwrap(),
            "\"analysis\""
        );
    }

    #[test]
    fn test_frame_slot_duration_constant() {
        // 111 bits at 500 kbps is the reference 0.222 ms slot
        let step_ms = DEFAULT_FRAME_BITS as f64 / 500.0;
        assert!((step_ms - 0.222).abs() < 1e-9);
    }
}
