/// Sweep Statistics and Reporting
///
/// Aggregates trial records into per-sweep statistics and renders a text
/// report for the CLI.
use crate::simulation::TrialRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate statistics over one sweep (one parameter set, many trials)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Bus speed the sweep ran at
    pub bus_speed_kbps: u32,

    /// Trials in the sweep
    pub trials: usize,

    /// Trials that drove the victim to Bus-Off
    pub bus_off_count: usize,

    /// bus_off_count / trials
    pub success_rate: f64,

    /// Statistics over successful trials' time-to-Bus-Off
    pub mean_time_to_bus_off_ms: Option<f64>,
    pub median_time_to_bus_off_ms: Option<f64>,
    pub min_time_to_bus_off_ms: Option<f64>,
    pub max_time_to_bus_off_ms: Option<f64>,

    /// Mean time to Error-Passive over trials that reached it
    pub mean_time_to_error_passive_ms: Option<f64>,

    /// Mean attacker TEC at trial end
    pub mean_attacker_final_tec: f64,

    /// When the summary was computed
    pub generated_at: DateTime<Utc>,
}

impl SweepSummary {
    /// Compute statistics from a batch of trial records
    pub fn from_records(records: &[TrialRecord]) -> Self {
        let trials = records.len();
        let bus_off_count = records.iter().filter(|r| r.victim_bus_off == 1).count();
        let success_rate = if trials == 0 {
            0.0
        } else {
            bus_off_count as f64 / trials as f64
        };

        let mut bus_off_times: Vec<f64> = records
            .iter()
            .filter_map(|r| r.time_to_bus_off_ms)
            .collect();
        bus_off_times.sort_by(|a, b| a.partial_cmp(b).expect("finite times"));

        let ep_times: Vec<f64> = records
            .iter()
            .filter_map(|r| r.time_to_error_passive_ms)
            .collect();

        let mean_attacker_final_tec = if trials == 0 {
            0.0
        } else {
            records.iter().map(|r| r.attacker_final_tec as f64).sum::<f64>() / trials as f64
        };

        Self {
            bus_speed_kbps: records.first().map(|r| r.bus_speed_kbps).unwrap_or(0),
            trials,
            bus_off_count,
            success_rate,
            mean_time_to_bus_off_ms: mean(&bus_off_times),
            median_time_to_bus_off_ms: median(&bus_off_times),
            min_time_to_bus_off_ms: bus_off_times.first().copied(),
            max_time_to_bus_off_ms: bus_off_times.last().copied(),
            mean_time_to_error_passive_ms: mean(&ep_times),
            mean_attacker_final_tec,
            generated_at: Utc::now(),
        }
    }

    /// Render the sweep statistics as a text report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("\n");
        report.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        report.push_str("║                 BUS-OFF ATTACK SWEEP SUMMARY                 ║\n");
        report.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        report.push_str("\n");

        report.push_str(&format!(
            "Generated:                 {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        report.push_str(&format!("Bus Speed:                 {} kbps\n", self.bus_speed_kbps));
        report.push_str(&format!("Trials:                    {}\n", self.trials));
        report.push_str(&format!(
            "Bus-Off Success:           {}/{} ({:.1}%)\n",
            self.bus_off_count,
            self.trials,
            self.success_rate * 100.0
        ));
        report.push_str("\n");

        if let (Some(mean), Some(median)) =
            (self.mean_time_to_bus_off_ms, self.median_time_to_bus_off_ms)
        {
            report.push_str("TIME TO BUS-OFF\n");
            report.push_str("---------------\n");
            report.push_str(&format!("Mean:                      {:.2} ms\n", mean));
            report.push_str(&format!("Median:                    {:.2} ms\n", median));
            if let (Some(min), Some(max)) =
                (self.min_time_to_bus_off_ms, self.max_time_to_bus_off_ms)
            {
                report.push_str(&format!("Min:                       {:.2} ms\n", min));
                report.push_str(&format!("Max:                       {:.2} ms\n", max));
            }
            report.push_str("\n");
        }

        if let Some(ep) = self.mean_time_to_error_passive_ms {
            report.push_str(&format!("Mean Time to Error-Passive: {:.2} ms\n", ep));
        }
        report.push_str(&format!(
            "Mean Attacker Final TEC:    {:.1}\n",
            self.mean_attacker_final_tec
        ));
        report.push_str("══════════════════════════════════════════════════════════════\n");

        report
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
