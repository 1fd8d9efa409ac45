/// ECU Base
///
/// One node on the simulated bus: a Transmit Error Counter, the CAN
/// fault-confinement state machine, a one-deep transmit queue for
/// retransmissions, and a role that decides what to put on the bus each
/// tick. The bus is the sole authority on TEC mutation; the hooks below are
/// only ever invoked by it.
use crate::attacker::AttackController;
use crate::can_bus::TickEvent;
use crate::types::{FaultState, Frame, FramePurpose, TEC_BUS_OFF_THRESHOLD, TEC_ERROR_INCREMENT};
use crate::victim::{SlotKind, TxSchedule};
use rand::rngs::StdRng;

/// DLC of ordinary data frames; recessive relative to the fabricated
/// attack frame's all-dominant DLC
const DATA_FRAME_DLC: u8 = 1;

/// Behaviour variant of an ECU
#[derive(Debug, Clone)]
pub enum EcuRole {
    /// Background node with ordinary periodic traffic
    Normal { schedule: TxSchedule },
    /// The targeted periodic transmitter
    Victim { schedule: TxSchedule, aux_id: u16 },
    /// The attacking node
    Attacker { controller: AttackController },
}

/// A frame waiting for retransmission after a lost slot
#[derive(Debug, Clone)]
struct PendingTx {
    frame: Frame,
    /// First tick at which the retry may go out
    not_before: u64,
}

#[derive(Debug, Clone)]
pub struct Ecu {
    name: String,
    /// The node's own arbitration identifier
    node_id: u16,
    role: EcuRole,
    tec: u16,
    state: FaultState,
    pending: Option<PendingTx>,
}

impl Ecu {
    pub fn normal(name: impl Into<String>, node_id: u16, schedule: TxSchedule) -> Self {
        Self::new(name, node_id, EcuRole::Normal { schedule })
    }

    pub fn victim(
        name: impl Into<String>,
        node_id: u16,
        aux_id: u16,
        schedule: TxSchedule,
    ) -> Self {
        Self::new(name, node_id, EcuRole::Victim { schedule, aux_id })
    }

    pub fn attacker(name: impl Into<String>, node_id: u16, controller: AttackController) -> Self {
        Self::new(name, node_id, EcuRole::Attacker { controller })
    }

    fn new(name: impl Into<String>, node_id: u16, role: EcuRole) -> Self {
        Self {
            name: name.into(),
            node_id,
            role,
            tec: 0,
            state: FaultState::ErrorActive,
            pending: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tec(&self) -> u16 {
        self.tec
    }

    pub fn state(&self) -> FaultState {
        self.state
    }

    /// A Bus-Off node is silent for the remainder of the trial
    pub fn can_transmit(&self) -> bool {
        self.state != FaultState::BusOff
    }

    /// Attack phase, for nodes that have one
    pub fn attack_phase(&self) -> Option<crate::types::AttackPhase> {
        match &self.role {
            EcuRole::Attacker { controller } => Some(controller.phase()),
            _ => None,
        }
    }

    /// True if this node is an attacker that failed to learn a period
    pub fn lock_failed(&self) -> bool {
        match &self.role {
            EcuRole::Attacker { controller } => controller.lock_failed(),
            _ => false,
        }
    }

    /// Add `delta` to the TEC and re-evaluate the fault-confinement state.
    /// Frozen once Bus-Off is reached.
    pub fn tec_increment(&mut self, delta: u16) {
        if self.state == FaultState::BusOff {
            return;
        }
        self.tec = (self.tec + delta).min(TEC_BUS_OFF_THRESHOLD);
        self.state = FaultState::from_tec(self.tec);
    }

    /// Success credit after a completed transmission. Floors at zero and
    /// never applies to a node that reached Bus-Off this tick.
    pub fn tec_decrement(&mut self) {
        if self.state == FaultState::BusOff {
            return;
        }
        self.tec = self.tec.saturating_sub(1);
        self.state = FaultState::from_tec(self.tec);
    }

    /// Frame this node wants on the bus for `tick`, if any. A pending
    /// retransmission blocks new frames until it completes.
    pub fn decide_transmission(&mut self, tick: u64, rng: &mut StdRng) -> Option<Frame> {
        if !self.can_transmit() {
            return None;
        }

        if let Some(pending) = &self.pending {
            if tick >= pending.not_before {
                return Some(pending.frame.clone());
            }
            return None;
        }

        match &mut self.role {
            EcuRole::Normal { schedule } => match schedule.poll(tick, rng)? {
                SlotKind::Primary | SlotKind::Auxiliary => Some(Frame::new(
                    self.node_id,
                    DATA_FRAME_DLC,
                    self.name.clone(),
                    FramePurpose::Normal,
                )),
            },
            EcuRole::Victim { schedule, aux_id } => {
                let (id, kind) = match schedule.poll(tick, rng)? {
                    SlotKind::Primary => (self.node_id, FramePurpose::Normal),
                    SlotKind::Auxiliary => (*aux_id, FramePurpose::Normal),
                };
                Some(Frame::new(id, DATA_FRAME_DLC, self.name.clone(), kind))
            }
            EcuRole::Attacker { controller } => controller.poll(tick),
        }
    }

    /// Bus outcome hook: the node's frame completed.
    pub fn on_tx_success(&mut self) {
        self.pending = None;
        self.tec_decrement();
    }

    /// Bus outcome hook: the node's frame was destroyed by an error flag.
    /// An error-passive node backs off one full cadence period before
    /// retrying (the frame-slot rendering of suspend transmission); an
    /// error-active node retries on the next tick.
    pub fn on_tx_error(&mut self, frame: Frame, tick: u64) {
        self.tec_increment(TEC_ERROR_INCREMENT);

        if self.state == FaultState::BusOff {
            self.pending = None;
            return;
        }

        let backoff = if self.state == FaultState::ErrorPassive {
            self.retry_backoff()
        } else {
            1
        };
        self.pending = Some(PendingTx {
            frame,
            not_before: tick + backoff,
        });
    }

    /// Bus outcome hook: lost arbitration to a higher-priority frame.
    /// Not an error; the frame re-queues for the next tick.
    pub fn on_arbitration_loss(&mut self, frame: Frame, tick: u64) {
        self.pending = Some(PendingTx {
            frame,
            not_before: tick + 1,
        });
    }

    /// Bus outcome hook: everything this node observed during the tick.
    /// `victim_state` is the targeted node's fault-confinement state after
    /// the tick resolved, visible on the wire through its error-flag format.
    pub fn observe_bus(&mut self, event: &TickEvent, tick: u64, victim_state: FaultState) {
        if let EcuRole::Attacker { controller } = &mut self.role {
            controller.observe(event, tick, victim_state);
        }
    }

    fn retry_backoff(&self) -> u64 {
        match &self.role {
            EcuRole::Normal { schedule } | EcuRole::Victim { schedule, .. } => schedule.period(),
            EcuRole::Attacker { .. } => 1,
        }
    }
}
