//! Progress reporting to the launcher (stderr `key=value` lines) and
//! free-form, log-level-filtered logging to stdout.

use crate::control::Control;
use evo_core::Population;

/// Emits a `Progress=<0..100>` line only when the integer percentage
/// actually changes, matching the fast-periodic-work step of the GA loop.
pub struct ProgressTracker {
    last_percent: Option<u32>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        ProgressTracker { last_percent: None }
    }

    pub fn update(&mut self, return_count: u64, max_reproductions: u64) {
        if max_reproductions == 0 {
            return;
        }
        let percent = ((return_count as f64 / max_reproductions as f64) * 100.0).min(100.0) as u32;
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            eprintln!("Progress={percent}");
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub fn report_return_count(return_count: u64) {
    eprintln!("Return Count={return_count}");
}

pub fn report_best_score(score: f64) {
    eprintln!("Best Score={score}");
}

pub fn report_evolve_identifier(evolve_identifier: u64) {
    eprintln!("Evolve Identifier={evolve_identifier}");
}

/// `logLevel` 0 = errors and headlines, 1 = phase boundaries, 2 =
/// per-message detail. A line is only emitted when the current level
/// admits it, and stdout is used (not stderr, which is reserved for the
/// launcher's key=value progress lines).
pub fn log_line(control: &Control, level: usize, message: &str) {
    if level <= control.log_level() {
        println!("{message}");
    }
}

/// Ten-percentile fitness statistics, formatted for appending to the run
/// log: one value per decile, worst to best.
pub fn format_decile_stats(population: &Population) -> String {
    let deciles = population.decile_stats();
    let rendered: Vec<String> = deciles.iter().map(|v| format!("{v:.6}")).collect();
    format!("deciles: {}", rendered.join(" "))
}
