/// Bus-Off Attack Regression Tests
///
/// End-to-end scenarios over the whole simulator: baseline traffic, the
/// two-phase attack timeline, speed sweeps, jittered victims, and a
/// double-entry replay of the TEC bookkeeping from the recorded bus events.
use busoff_sim::{
    run_speed_sweep, AttackPhase, EndReason, FaultState, SimConfig, Simulation, StepRecord,
    SweepSummary, TickEvent, VictimMode, ATTACKER_NAME, VICTIM_NAME,
};
use std::collections::HashMap;

fn attack_config() -> SimConfig {
    SimConfig {
        trial_timeout_ms: 200.0,
        detailed: true,
        ..Default::default()
    }
}

/// Baseline: periodic victim, no attacker, TEC never moves
#[test]
fn test_baseline_no_attack_keeps_victim_clean() {
    let config = SimConfig {
        attacker_enabled: false,
        trial_timeout_ms: 100.0,
        detailed: true,
        ..Default::default()
    };
    let outcome = Simulation::new(&config, 1).unwrap().run().unwrap();

    assert_eq!(outcome.end_reason, EndReason::Timeout);
    assert_eq!(outcome.record.victim_bus_off, 0);
    assert_eq!(outcome.record.victim_final_tec, 0);
    for step in &outcome.steps {
        assert_eq!(step.victim_tec, 0, "victim TEC must stay at zero");
        assert_eq!(step.victim_state, FaultState::ErrorActive);
    }
}

/// Single detailed run: phases progress in order, error-passive lands in
/// the expected window, the victim dies, the attacker stays healthy
#[test]
fn test_detailed_attack_timeline() {
    let outcome = Simulation::new(&attack_config(), 1).unwrap().run().unwrap();

    assert_eq!(outcome.end_reason, EndReason::VictimBusOff);
    assert_eq!(outcome.record.victim_final_tec, 256);
    assert!(outcome.record.attacker_final_tec < 128);

    let ep_ms = outcome.record.time_to_error_passive_ms.unwrap();
    assert!(
        (5.0..=20.0).contains(&ep_ms),
        "error-passive at {} ms, expected 5..20 ms",
        ep_ms
    );

    // analysis -> attack_phase1 -> attack_phase2, no going back
    let phases: Vec<AttackPhase> = outcome.steps.iter().map(|s| s.phase).collect();
    assert_eq!(phases[0], AttackPhase::Analysis);
    assert_eq!(*phases.last().unwrap(), AttackPhase::Phase2);
    let order = |p: AttackPhase| match p {
        AttackPhase::Analysis => 0,
        AttackPhase::Phase1 => 1,
        AttackPhase::Phase2 => 2,
        AttackPhase::Terminated => 3,
    };
    for pair in phases.windows(2) {
        assert!(order(pair[0]) <= order(pair[1]), "phase regressed: {:?}", pair);
    }
    assert!(phases.contains(&AttackPhase::Phase1));

    // The phase tag flips on exactly the tick the victim's TEC crosses 128
    let first_phase2 = outcome
        .steps
        .iter()
        .position(|s| s.phase == AttackPhase::Phase2)
        .expect("phase 2 is reached");
    let first_error_passive = outcome
        .steps
        .iter()
        .position(|s| s.victim_tec >= 128)
        .expect("victim crosses 128");
    assert_eq!(
        first_phase2, first_error_passive,
        "phase 2 tag must land on the tick the victim enters error-passive"
    );
}

/// Fault-confinement invariants hold at every step of a detailed run
#[test]
fn test_step_records_respect_tec_state_invariants() {
    let outcome = Simulation::new(&attack_config(), 1).unwrap().run().unwrap();
    for step in &outcome.steps {
        for (tec, state) in [
            (step.victim_tec, step.victim_state),
            (step.attacker_tec, step.attacker_state),
        ] {
            assert!(tec <= 256);
            assert_eq!(
                state,
                FaultState::from_tec(tec),
                "state {:?} inconsistent with TEC {}",
                state,
                tec
            );
        }
    }
}

/// The first collision of phase 1 costs both participants exactly +8
#[test]
fn test_first_collision_penalizes_both_by_eight() {
    let outcome = Simulation::new(&attack_config(), 1).unwrap().run().unwrap();

    let first_collision = outcome
        .events
        .iter()
        .position(|e| matches!(e, TickEvent::Collision { .. }))
        .expect("attack produces collisions");
    let before = &outcome.steps[first_collision - 1];
    let after = &outcome.steps[first_collision];

    assert_eq!(after.victim_tec, before.victim_tec + 8);
    assert_eq!(after.attacker_tec, before.attacker_tec + 8);
    assert_eq!(after.phase, AttackPhase::Phase1);
}

/// In phase 2 the attacker's TEC never increases: every collision leaves it
/// untouched and every completed retransmission drains it
#[test]
fn test_phase_two_attacker_tec_is_non_increasing() {
    let outcome = Simulation::new(&attack_config(), 1).unwrap().run().unwrap();

    let phase2: Vec<&StepRecord> = outcome
        .steps
        .iter()
        .filter(|s| s.phase == AttackPhase::Phase2)
        .collect();
    assert!(phase2.len() > 20, "phase 2 should span many slots");
    for pair in phase2.windows(2) {
        assert!(
            pair[1].attacker_tec <= pair[0].attacker_tec,
            "attacker TEC rose in phase 2: {} -> {}",
            pair[0].attacker_tec,
            pair[1].attacker_tec
        );
    }

    // Meanwhile the victim only climbs
    for pair in phase2.windows(2) {
        assert!(pair[1].victim_tec >= pair[0].victim_tec);
    }
}

/// Speed sweep: the attack is protocol-guaranteed for a periodic victim and
/// time-to-Bus-Off scales with the slot duration (1 / bus speed)
#[test]
fn test_speed_sweep_success_rate_and_scaling() {
    let config = SimConfig {
        trials: 50,
        trial_timeout_ms: 500.0,
        ..Default::default()
    };
    let results = run_speed_sweep(&config, &[250, 500, 1000]).unwrap();

    let mut mean_by_speed = HashMap::new();
    for (speed, records) in &results {
        let summary = SweepSummary::from_records(records);
        assert!(
            summary.success_rate >= 0.95,
            "success rate {:.2} below 0.95 at {} kbps",
            summary.success_rate,
            speed
        );
        mean_by_speed.insert(*speed, summary.mean_time_to_bus_off_ms.unwrap());
    }

    let t250 = mean_by_speed[&250];
    let t500 = mean_by_speed[&500];
    let t1000 = mean_by_speed[&1000];
    assert!(t250 > t500 && t500 > t1000);
    assert!((t250 / t500 - 2.0).abs() < 0.1, "250/500 ratio {}", t250 / t500);
    assert!(
        (t500 / t1000 - 2.0).abs() < 0.1,
        "500/1000 ratio {}",
        t500 / t1000
    );
}

/// Heavy jitter makes period locks fail far more often than the periodic
/// case, but a successful lock still kills the victim
#[test]
fn test_non_periodic_victim_defeats_period_lock_sometimes() {
    let config = SimConfig {
        victim_mode: VictimMode::NonPeriodic,
        victim_jitter_slots: 5,
        trials: 60,
        ..Default::default()
    };

    let mut lock_failures = 0;
    let mut successes = 0;
    for trial in 1..=config.trials {
        let outcome = Simulation::new(&config, trial).unwrap().run().unwrap();
        match outcome.end_reason {
            EndReason::PeriodLockFailed => lock_failures += 1,
            EndReason::VictimBusOff => {
                successes += 1;
                assert_eq!(outcome.record.victim_final_tec, 256);
            }
            EndReason::Timeout => {}
        }
    }

    // The periodic case never fails to lock; jitter at half the period must
    assert!(
        lock_failures * 5 >= config.trials as i32,
        "only {}/{} lock failures under heavy jitter",
        lock_failures,
        config.trials
    );
    assert!(successes > 0, "some locks should still succeed and convert");
}

/// A successful jittered trial still drives the victim's TEC monotonically
#[test]
fn test_jittered_success_is_monotone() {
    let config = SimConfig {
        victim_mode: VictimMode::NonPeriodic,
        victim_jitter_slots: 3,
        detailed: true,
        ..Default::default()
    };

    for trial in 1..=20 {
        let outcome = Simulation::new(&config, trial).unwrap().run().unwrap();
        if outcome.end_reason != EndReason::VictimBusOff {
            continue;
        }
        for pair in outcome.steps.windows(2) {
            assert!(
                pair[1].victim_tec >= pair[0].victim_tec,
                "victim TEC dipped in trial {}",
                trial
            );
        }
        return;
    }
    panic!("no jittered trial reached Bus-Off");
}

/// Replay the recorded bus events and recompute both TEC trajectories from
/// the collision/success rules alone; they must match the step records
#[test]
fn test_event_replay_reproduces_tec_trajectories() {
    let outcome = Simulation::new(&attack_config(), 1).unwrap().run().unwrap();
    assert_eq!(outcome.steps.len(), outcome.events.len());

    let mut tec: HashMap<String, u16> = HashMap::new();
    for (event, step) in outcome.events.iter().zip(&outcome.steps) {
        match event {
            TickEvent::Idle => {}
            TickEvent::CleanWin { origin, .. } => credit(&mut tec, origin),
            TickEvent::Collision {
                winner, destroyed, ..
            } => {
                for name in destroyed {
                    penalize(&mut tec, name);
                }
                if let Some(name) = winner {
                    credit(&mut tec, name);
                }
            }
        }

        assert_eq!(
            tec.get(VICTIM_NAME).copied().unwrap_or(0),
            step.victim_tec,
            "victim TEC diverged at t={} ms",
            step.time_ms
        );
        assert_eq!(
            tec.get(ATTACKER_NAME).copied().unwrap_or(0),
            step.attacker_tec,
            "attacker TEC diverged at t={} ms",
            step.time_ms
        );
    }
}

fn penalize(tec: &mut HashMap<String, u16>, name: &str) {
    let counter = tec.entry(name.to_string()).or_insert(0);
    if *counter < 256 {
        *counter = (*counter + 8).min(256);
    }
}

fn credit(tec: &mut HashMap<String, u16>, name: &str) {
    let counter = tec.entry(name.to_string()).or_insert(0);
    if *counter < 256 {
        *counter = counter.saturating_sub(1);
    }
}

/// A victim transmitting successfully for a long time at TEC zero never
/// underflows
#[test]
fn test_tec_floor_on_long_success_streak() {
    let config = SimConfig {
        attacker_enabled: false,
        victim_period_slots: 2,
        trial_timeout_ms: 400.0,
        detailed: true,
        ..Default::default()
    };
    let outcome = Simulation::new(&config, 1).unwrap().run().unwrap();

    let wins = outcome
        .events
        .iter()
        .filter(|e| matches!(e, TickEvent::CleanWin { .. }))
        .count();
    assert!(wins > 100, "expected a long success streak, got {}", wins);
    assert!(outcome.steps.iter().all(|s| s.victim_tec == 0));
}

/// Background traffic shares the bus through arbitration without picking up
/// error counts of its own
#[test]
fn test_background_traffic_survives_the_attack() {
    let config = SimConfig {
        normal_ids: vec![0x080, 0x120],
        trial_timeout_ms: 300.0,
        detailed: true,
        ..Default::default()
    };
    let outcome = Simulation::new(&config, 1).unwrap().run().unwrap();

    assert_eq!(outcome.record.victim_bus_off, 1);
    // Only victim and attacker frames ever collide
    for event in &outcome.events {
        if let TickEvent::Collision { destroyed, .. } = event {
            for name in destroyed {
                assert!(
                    name == VICTIM_NAME || name == ATTACKER_NAME,
                    "background node {} caught in a collision",
                    name
                );
            }
        }
    }
}

/// The preceded cadence does not change the attack outcome
#[test]
fn test_preceded_victim_is_still_vulnerable() {
    let config = SimConfig {
        victim_mode: VictimMode::Preceded,
        trial_timeout_ms: 300.0,
        detailed: true,
        ..Default::default()
    };
    let outcome = Simulation::new(&config, 1).unwrap().run().unwrap();
    assert_eq!(outcome.end_reason, EndReason::VictimBusOff);
    assert_eq!(outcome.record.victim_final_tec, 256);
}
