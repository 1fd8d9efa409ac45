/// Two-Phase Attack Controller
///
/// Implements the Bus-Off attack against a periodic transmitter:
///
/// 1. Analysis: stay silent, learn the target's period from successful
///    transmissions of the target identifier.
/// 2. Phase 1: inject a frame with the target's identifier, timed to the
///    predicted slot; the resulting collision chain drives both TECs up
///    while the target is Error-Active.
/// 3. Phase 2: entered on the tick the target's TEC crosses into
///    Error-Passive. The bus rules are now asymmetric, so the attacker's
///    frames complete and drain its TEC while every target retry costs
///    another +8.
///
/// The 1 -> 2 transition is a tag change only; once contact is made the
/// controller keeps injecting on every slot and the collision rules do the
/// rest.
use crate::can_bus::TickEvent;
use crate::types::{AttackPhase, FaultState, Frame, FramePurpose};

/// DLC of the fabricated attack frame; all-dominant, so it wins the
/// bit-level conflict against the target's frame
const ATTACK_FRAME_DLC: u8 = 0;

#[derive(Debug, Clone)]
pub struct AttackController {
    name: String,
    target_id: u16,
    min_matches: u32,
    window_slots: u64,

    phase: AttackPhase,
    /// Tick of the last observed successful target transmission
    last_seen: Option<u64>,
    /// Interval the current match streak is built on
    candidate: Option<u64>,
    /// Consecutive matching intervals observed so far
    streak: u32,
    /// Locked period, once analysis succeeds
    period: Option<u64>,
    /// Slot of the next planned injection
    predicted: Option<u64>,
    /// True once the first collision with the target has been observed;
    /// from then on the controller injects on every slot
    engaged: bool,
}

impl AttackController {
    pub fn new(name: impl Into<String>, target_id: u16, min_matches: u32, window_slots: u64) -> Self {
        Self {
            name: name.into(),
            target_id,
            min_matches,
            window_slots,
            phase: AttackPhase::Analysis,
            last_seen: None,
            candidate: None,
            streak: 0,
            period: None,
            predicted: None,
            engaged: false,
        }
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// Locked period estimate, if analysis has completed
    pub fn locked_period(&self) -> Option<u64> {
        self.period
    }

    /// Frame to inject this tick, if any. Retransmissions of destroyed
    /// frames are handled by the owning ECU's pending queue, not here.
    pub fn poll(&mut self, tick: u64) -> Option<Frame> {
        match self.phase {
            AttackPhase::Analysis | AttackPhase::Terminated => None,
            AttackPhase::Phase1 => {
                if self.engaged || self.predicted == Some(tick) {
                    Some(self.attack_frame(FramePurpose::AttackPhase1))
                } else {
                    None
                }
            }
            AttackPhase::Phase2 => Some(self.attack_frame(FramePurpose::AttackPhase2)),
        }
    }

    /// Digest the bus outcome of one tick. `target_state` is the target's
    /// fault-confinement state after the tick resolved, read off the wire
    /// from the error-flag format it signals with.
    pub fn observe(&mut self, event: &TickEvent, tick: u64, target_state: FaultState) {
        match event {
            TickEvent::CleanWin { id, origin } if *id == self.target_id => {
                if *origin == self.name {
                    // Our own injection went out unopposed: the prediction
                    // missed. Wait for the next target sighting to re-arm.
                    self.predicted = None;
                } else {
                    self.target_seen(tick);
                }
            }
            TickEvent::Collision { id, .. } if *id == self.target_id => {
                self.engaged = true;
                self.predicted = None;
            }
            _ => {}
        }

        // The phase tag follows the target's state with no lag: the switch
        // lands on the very tick the target's TEC crosses the threshold
        if self.phase == AttackPhase::Phase1
            && matches!(target_state, FaultState::ErrorPassive | FaultState::BusOff)
        {
            self.phase = AttackPhase::Phase2;
        }

        // Bounded observation window for period learning
        if self.phase == AttackPhase::Analysis && tick + 1 >= self.window_slots {
            self.phase = AttackPhase::Terminated;
        }
    }

    /// True when the controller gave up on learning a period
    pub fn lock_failed(&self) -> bool {
        self.phase == AttackPhase::Terminated
    }

    fn target_seen(&mut self, tick: u64) {
        if let Some(last) = self.last_seen {
            let interval = tick - last;
            if self.candidate == Some(interval) {
                self.streak += 1;
            } else {
                self.candidate = Some(interval);
                self.streak = 1;
            }

            if self.phase == AttackPhase::Analysis && self.streak >= self.min_matches {
                self.phase = AttackPhase::Phase1;
                self.period = Some(interval);
            }
        }
        self.last_seen = Some(tick);

        // Every successful target transmission re-aligns the next injection
        if let Some(period) = self.period {
            if self.phase == AttackPhase::Phase1 && !self.engaged {
                self.predicted = Some(tick + period);
            }
        }
    }

    fn attack_frame(&self, purpose: FramePurpose) -> Frame {
        Frame::new(self.target_id, ATTACK_FRAME_DLC, self.name.clone(), purpose)
    }
}
