/// Victim Transmit Scheduling
///
/// The victim (and any background ECU) emits frames on a slot-based cadence.
/// Three cadences are supported: strictly periodic, periodic with an
/// interleaved auxiliary frame, and periodic with bounded random jitter.
use crate::config::VictimMode;
use rand::rngs::StdRng;
use rand::Rng;

/// Which frame a schedule slot carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// The periodic frame (the attack target)
    Primary,
    /// The lower-priority auxiliary frame of preceded mode
    Auxiliary,
}

/// Slot-based transmit schedule.
///
/// `poll` is called once per tick while the ECU's transmit queue is empty;
/// a pending retransmission blocks the queue and suppresses new frames.
#[derive(Debug, Clone)]
pub struct TxSchedule {
    mode: VictimMode,
    period: u64,
    jitter: u64,
    /// Tick of the next primary emission
    next_tx: u64,
    /// Primary emissions so far
    cycle: u64,
}

impl TxSchedule {
    pub fn new(mode: VictimMode, period: u64, jitter: u64) -> Self {
        Self::with_phase(mode, period, jitter, 0)
    }

    /// Schedule whose first emission is shifted by `phase` slots, used to
    /// de-synchronise background ECUs sharing a period
    pub fn with_phase(mode: VictimMode, period: u64, jitter: u64, phase: u64) -> Self {
        Self {
            mode,
            period,
            jitter,
            next_tx: period + phase,
            cycle: 0,
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Returns the frame kind to emit this tick, advancing the cadence when
    /// a primary slot fires.
    pub fn poll(&mut self, tick: u64, rng: &mut StdRng) -> Option<SlotKind> {
        if tick >= self.next_tx {
            self.cycle += 1;
            self.next_tx = self.next_after(tick, rng);
            return Some(SlotKind::Primary);
        }

        // Auxiliary frame one slot ahead of every second primary emission
        if self.mode == VictimMode::Preceded && self.cycle % 2 == 0 && tick + 1 == self.next_tx {
            return Some(SlotKind::Auxiliary);
        }

        None
    }

    fn next_after(&self, tick: u64, rng: &mut StdRng) -> u64 {
        match self.mode {
            VictimMode::Periodic | VictimMode::Preceded => tick + self.period,
            VictimMode::NonPeriodic => {
                if self.jitter == 0 {
                    return tick + self.period;
                }
                let offset = rng.gen_range(-(self.jitter as i64)..=self.jitter as i64);
                let next = tick as i64 + self.period as i64 + offset;
                // A cycle never collapses below one slot
                next.max(tick as i64 + 1) as u64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn fire_ticks(schedule: &mut TxSchedule, upto: u64) -> Vec<(u64, SlotKind)> {
        let mut rng = rng();
        let mut fired = Vec::new();
        for tick in 0..upto {
            if let Some(kind) = schedule.poll(tick, &mut rng) {
                fired.push((tick, kind));
            }
        }
        fired
    }

    #[test]
    fn test_periodic_cadence_is_constant() {
        let mut schedule = TxSchedule::new(VictimMode::Periodic, 10, 0);
        let fired = fire_ticks(&mut schedule, 55);
        let ticks: Vec<u64> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![10, 20, 30, 40, 50]);
        assert!(fired.iter().all(|(_, k)| *k == SlotKind::Primary));
    }

    #[test]
    fn test_phase_shifts_first_emission() {
        let mut schedule = TxSchedule::with_phase(VictimMode::Periodic, 10, 0, 3);
        let fired = fire_ticks(&mut schedule, 35);
        let ticks: Vec<u64> = fired.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![13, 23, 33]);
    }

    #[test]
    fn test_preceded_interleaves_auxiliary_every_second_cycle() {
        let mut schedule = TxSchedule::new(VictimMode::Preceded, 10, 0);
        let fired = fire_ticks(&mut schedule, 45);
        assert_eq!(
            fired,
            vec![
                (9, SlotKind::Auxiliary),
                (10, SlotKind::Primary),
                (20, SlotKind::Primary),
                (29, SlotKind::Auxiliary),
                (30, SlotKind::Primary),
                (40, SlotKind::Primary),
            ]
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut schedule = TxSchedule::new(VictimMode::NonPeriodic, 10, 4);
        let fired = fire_ticks(&mut schedule, 500);
        let ticks: Vec<u64> = fired.iter().map(|(t, _)| *t).collect();
        assert!(ticks.len() > 10);
        for pair in ticks.windows(2) {
            let interval = pair[1] - pair[0];
            assert!(
                (6..=14).contains(&interval),
                "interval {} outside jitter bounds",
                interval
            );
        }
    }

    #[test]
    fn test_jittered_schedule_is_reproducible() {
        let mut a = TxSchedule::new(VictimMode::NonPeriodic, 10, 5);
        let mut b = TxSchedule::new(VictimMode::NonPeriodic, 10, 5);
        assert_eq!(fire_ticks(&mut a, 300), fire_ticks(&mut b, 300));
    }
}
