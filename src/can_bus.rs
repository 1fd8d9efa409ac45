/// CAN Bus Model
///
/// One tick is one frame slot. Each tick the bus collects the frames the
/// nodes want to transmit, arbitrates by identifier, resolves same-id
/// collisions via DLC dominance and the participants' error flags, and
/// applies every TEC mutation itself. The nodes never touch their own
/// counters in response to bus traffic.
use crate::ecu::Ecu;
use crate::types::{FaultState, Frame};

/// What the bus carried during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    /// No node transmitted
    Idle,
    /// Exactly one frame won the slot and completed
    CleanWin { id: u16, origin: String },
    /// Two or more frames shared the winning identifier
    Collision {
        id: u16,
        /// Bit-level winner whose frame completed despite the conflict;
        /// `None` when an active error flag destroyed the slot for everyone
        winner: Option<String>,
        /// Nodes whose frames were destroyed
        destroyed: Vec<String>,
        /// True when every destroyed node signalled with a passive flag
        passive: bool,
    },
}

pub struct CanBus {
    bus_speed_kbps: u32,
    frame_bits: u32,
    step_ms: f64,
    now_ms: f64,
    /// Open-question switch: a passive-flag collision still destroys the
    /// bit-level winner's frame when set
    passive_flag_penalty: bool,
}

impl CanBus {
    pub fn new(bus_speed_kbps: u32, frame_bits: u32, passive_flag_penalty: bool) -> Self {
        Self {
            bus_speed_kbps,
            frame_bits,
            step_ms: frame_bits as f64 / bus_speed_kbps as f64,
            now_ms: 0.0,
            passive_flag_penalty,
        }
    }

    pub fn bus_speed_kbps(&self) -> u32 {
        self.bus_speed_kbps
    }

    pub fn frame_bits(&self) -> u32 {
        self.frame_bits
    }

    /// Duration of one frame slot in milliseconds
    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    /// Simulated time elapsed so far
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Resolve one tick. `intents` pairs each transmitting node's index
    /// with its frame; the bus mutates the involved nodes' TECs and queues
    /// and advances the clock by one slot.
    pub fn resolve_tick(
        &mut self,
        tick: u64,
        mut intents: Vec<(usize, Frame)>,
        ecus: &mut [Ecu],
    ) -> TickEvent {
        for (_, frame) in intents.iter_mut() {
            frame.timestamp_ms = self.now_ms;
        }

        let event = match intents.len() {
            0 => TickEvent::Idle,
            _ => self.arbitrate(tick, intents, ecus),
        };

        self.now_ms += self.step_ms;
        event
    }

    fn arbitrate(&self, tick: u64, intents: Vec<(usize, Frame)>, ecus: &mut [Ecu]) -> TickEvent {
        let winning_id = intents.iter().map(|(_, f)| f.id).min().expect("non-empty");

        let (contenders, outbid): (Vec<_>, Vec<_>) =
            intents.into_iter().partition(|(_, f)| f.id == winning_id);

        // Losing arbitration is not an error; those frames re-queue
        for (idx, frame) in outbid {
            ecus[idx].on_arbitration_loss(frame, tick);
        }

        if contenders.len() == 1 {
            let (idx, frame) = contenders.into_iter().next().expect("one contender");
            let origin = frame.origin.clone();
            ecus[idx].on_tx_success();
            return TickEvent::CleanWin {
                id: winning_id,
                origin,
            };
        }

        self.resolve_collision(tick, winning_id, contenders, ecus)
    }

    /// Same-identifier conflict: the lowest DLC holds the dominant bits and
    /// wins the bit war; everyone else detects a transmit error. An active
    /// error flag from any loser destroys the winning frame as well; passive
    /// flags leave it untouched.
    fn resolve_collision(
        &self,
        tick: u64,
        id: u16,
        contenders: Vec<(usize, Frame)>,
        ecus: &mut [Ecu],
    ) -> TickEvent {
        let dominant_dlc = contenders.iter().map(|(_, f)| f.dlc).min().expect("non-empty");
        let unique_winner = contenders.iter().filter(|(_, f)| f.dlc == dominant_dlc).count() == 1;

        let mut winner: Option<(usize, Frame)> = None;
        let mut losers: Vec<(usize, Frame)> = Vec::new();
        for (idx, frame) in contenders {
            if unique_winner && frame.dlc == dominant_dlc {
                winner = Some((idx, frame));
            } else {
                losers.push((idx, frame));
            }
        }

        // Flag type is fixed by the losers' states at the moment of detection
        let active_flag = losers
            .iter()
            .any(|(idx, _)| ecus[*idx].state() == FaultState::ErrorActive);

        let mut destroyed: Vec<String> = Vec::new();
        for (idx, frame) in losers {
            destroyed.push(frame.origin.clone());
            ecus[idx].on_tx_error(frame, tick);
        }

        let winner_name = match winner {
            Some((idx, frame)) if !active_flag && !self.passive_flag_penalty => {
                let origin = frame.origin.clone();
                ecus[idx].on_tx_success();
                Some(origin)
            }
            Some((idx, frame)) => {
                destroyed.push(frame.origin.clone());
                ecus[idx].on_tx_error(frame, tick);
                None
            }
            None => None,
        };

        TickEvent::Collision {
            id,
            winner: winner_name,
            destroyed,
            passive: !active_flag,
        }
    }
}
