/// Bus-Off Attack Simulator CLI
///
/// Runs the attack simulation as a batch sweep across bus speeds, as a
/// single detailed trial, or as an attacker-free baseline, and writes JSON
/// Lines logs for downstream analysis.
///
/// SECURITY RESEARCH ONLY: this is a simulator; it touches no real bus.
use busoff_sim::{
    run_detailed_trial, run_speed_sweep, run_trials, JsonlLogger, SimConfig, SweepSummary,
    VictimMode, SUPPORTED_BUS_SPEEDS_KBPS,
};
use colored::*;
use std::path::PathBuf;
use std::process;

/// Sweep order matches the reference log layout: fastest bus first
const SWEEP_SPEEDS_KBPS: [u32; 3] = [1000, 500, 250];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    // Bare options imply the default sweep command
    let (command, options) = match args.get(1).map(String::as_str) {
        None => ("sweep", &args[1..]),
        Some(first) if first.starts_with('-') && !matches!(first, "--help" | "-h") => {
            ("sweep", &args[1..])
        }
        Some(first) => (first, &args[2.min(args.len())..]),
    };
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    let (config, out_dir) = parse_options(options);

    match command {
        "sweep" => run_sweep(config, out_dir),
        "single" => run_single(config, out_dir),
        "baseline" => run_baseline(config),
        other => {
            eprintln!("{} Unknown command: {}", "✗".red(), other);
            print_usage();
            process::exit(1);
        }
    }
}

fn run_sweep(config: SimConfig, out_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Bus-Off Attack Simulation");
    println!("{}", "=".repeat(60));
    println!(
        "Seed: {} | Trials per speed: {} | Victim mode: {}",
        config.rng_seed,
        config.trials,
        config.victim_mode.as_str()
    );

    let results = run_speed_sweep(&config, &SWEEP_SPEEDS_KBPS)?;

    for (speed, records) in &results {
        let log_path = out_dir.join(format!("attack_{}kbps.log", speed));
        let mut logger = JsonlLogger::create(&log_path)?;
        for record in records {
            logger.log(record)?;
        }
        logger.flush()?;

        println!(
            "\n{} {} kbps: {} trials -> {}",
            "✓".green(),
            speed,
            records.len(),
            log_path.display()
        );
        println!("{}", SweepSummary::from_records(records).generate_report());
    }

    // One fully-detailed trial at the reference speed for the timeline log
    let mut single_config = config;
    single_config.bus_speed_kbps = 500;
    write_single_run(&single_config, &out_dir)?;

    println!("{} Log files written to {}", "✓".green(), out_dir.display());
    Ok(())
}

fn run_single(config: SimConfig, out_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    write_single_run(&config, &out_dir)?;
    Ok(())
}

fn run_baseline(mut config: SimConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.attacker_enabled = false;
    let records = run_trials(&config)?;
    let survived = records.iter().all(|r| r.victim_bus_off == 0);
    println!(
        "{} Baseline: {} trials without attacker, victim survived all: {}",
        if survived { "✓".green() } else { "✗".red() },
        records.len(),
        survived
    );
    println!("{}", SweepSummary::from_records(&records).generate_report());
    Ok(())
}

fn write_single_run(
    config: &SimConfig,
    out_dir: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "\nRunning single detailed trial at {} kbps...",
        config.bus_speed_kbps
    );
    let outcome = run_detailed_trial(config)?;

    let log_path = out_dir.join("single_run.log");
    let mut logger = JsonlLogger::create(&log_path)?;
    for step in &outcome.steps {
        logger.log(step)?;
    }
    logger.flush()?;

    let record = &outcome.record;
    if record.victim_bus_off == 1 {
        println!(
            "{} Victim reached Bus-Off after {:.2} ms (error-passive at {:.2} ms)",
            "✓".green(),
            record.time_to_bus_off_ms.unwrap_or(f64::NAN),
            record.time_to_error_passive_ms.unwrap_or(f64::NAN),
        );
    } else {
        println!("{} Victim survived the trial", "✗".red());
    }
    println!(
        "  Final TEC: victim={} attacker={} | {} steps -> {}",
        record.victim_final_tec,
        record.attacker_final_tec,
        outcome.steps.len(),
        log_path.display()
    );
    Ok(())
}

fn parse_options(args: &[String]) -> (SimConfig, PathBuf) {
    let mut config = SimConfig::default();
    let mut out_dir = PathBuf::from("attack_logs");

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--trials" | "-t" => config.trials = parse_value(args, &mut i),
            "--speed" | "-s" => {
                config.bus_speed_kbps = parse_value(args, &mut i);
                if !SUPPORTED_BUS_SPEEDS_KBPS.contains(&config.bus_speed_kbps) {
                    eprintln!(
                        "{} Unsupported bus speed {} (expected one of {:?})",
                        "✗".red(),
                        config.bus_speed_kbps,
                        SUPPORTED_BUS_SPEEDS_KBPS
                    );
                    process::exit(1);
                }
            }
            "--seed" => config.rng_seed = parse_value(args, &mut i),
            "--timeout" => config.trial_timeout_ms = parse_value(args, &mut i),
            "--period" | "-p" => config.victim_period_slots = parse_value(args, &mut i),
            "--jitter" | "-j" => config.victim_jitter_slots = parse_value(args, &mut i),
            "--matches" => config.analysis_min_matches = parse_value(args, &mut i),
            "--window" => config.analysis_window_slots = parse_value(args, &mut i),
            "--passive-penalty" => {
                config.passive_flag_penalty = true;
                i += 1;
            }
            "--mode" | "-m" => {
                let value = expect_value(args, &mut i);
                config.victim_mode = match value.as_str() {
                    "periodic" => VictimMode::Periodic,
                    "preceded" => VictimMode::Preceded,
                    "non_periodic" | "non-periodic" => VictimMode::NonPeriodic,
                    other => {
                        eprintln!("{} Unknown victim mode: {}", "✗".red(), other);
                        process::exit(1);
                    }
                };
            }
            "--out" | "-o" => out_dir = PathBuf::from(expect_value(args, &mut i)),
            other => {
                eprintln!("{} Unknown option: {}", "✗".red(), other);
                print_usage();
                process::exit(1);
            }
        }
    }

    (config, out_dir)
}

fn expect_value(args: &[String], i: &mut usize) -> String {
    if *i + 1 >= args.len() {
        eprintln!("{} Missing value for {}", "✗".red(), args[*i]);
        process::exit(1);
    }
    let value = args[*i + 1].clone();
    *i += 2;
    value
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: &mut usize) -> T {
    let option = args[*i].clone();
    let value = expect_value(args, i);
    match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            eprintln!("{} Invalid value '{}' for {}", "✗".red(), value, option);
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Bus-Off Attack Simulator");
    println!();
    println!("USAGE:");
    println!("    busoff_sim [COMMAND] [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    sweep       Run trials at 1000/500/250 kbps plus one detailed run (default)");
    println!("    single      Run one detailed trial and write the step timeline");
    println!("    baseline    Run trials with the attacker disabled");
    println!("    help        Show this message");
    println!();
    println!("OPTIONS:");
    println!("    -t, --trials <N>        Trials per parameter set (default 1000)");
    println!("    -s, --speed <KBPS>      Bus speed for single/baseline: 250|500|1000");
    println!("    -p, --period <SLOTS>    Victim period in frame slots (default 10)");
    println!("    -j, --jitter <SLOTS>    Jitter bound for non_periodic mode");
    println!("    -m, --mode <MODE>       periodic|preceded|non_periodic");
    println!("        --matches <N>       Intervals needed to lock the period (default 3)");
    println!("        --window <SLOTS>    Analysis observation window (default 300)");
    println!("        --timeout <MS>      Simulated-time budget per trial (default 500)");
    println!("        --seed <N>          Base RNG seed (default 42)");
    println!("        --passive-penalty   Destroy the winner on passive-flag collisions too");
    println!("    -o, --out <DIR>         Output directory (default attack_logs)");
}
