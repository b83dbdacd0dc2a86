//! Demo statistics and per-step results.

use std::time::Duration;

use contracts::{Diagnostic, Pulled};
use observability::MetricsSummary;
use serde::Serialize;

/// One pulled time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRow {
    pub time: f64,
    /// First element of the answer; `None` when the answer is empty
    pub value: Option<f64>,
    pub coverage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub updates: usize,
}

impl StepRow {
    pub fn from_pulled(time: f64, pulled: &Pulled) -> Self {
        Self {
            time,
            value: pulled.values.scalar(0, 0),
            coverage: pulled.coverage.label(),
            reason: pulled.coverage.reason().map(|r| r.to_string()),
            updates: pulled.updates,
        }
    }
}

/// Statistics from a demo run
#[derive(Debug, Clone, Default)]
pub struct DemoStats {
    /// Answers seen by the trigger consumer
    pub rows: Vec<StepRow>,

    /// Answers seen by the coupled-pair probe
    pub coupled_rows: Vec<StepRow>,

    /// `update()` calls made on the ramp producer
    pub ramp_updates: usize,

    /// Adapters reclaimed when the trigger was detached
    pub reclaimed_adapters: usize,

    /// Diagnostics collected during the run
    pub events: Vec<Diagnostic>,

    /// Diagnostics the event log had to overwrite
    pub dropped_events: u64,

    pub metrics: MetricsSummary,

    pub duration: Duration,
}

#[derive(Serialize)]
struct DemoReport<'a> {
    rows: &'a [StepRow],
    #[serde(skip_serializing_if = "no_rows")]
    coupled_rows: &'a [StepRow],
    ramp_updates: usize,
    reclaimed_adapters: usize,
    events: &'a [Diagnostic],
    dropped_events: u64,
    duration_secs: f64,
}

fn no_rows(rows: &&[StepRow]) -> bool {
    rows.is_empty()
}

impl DemoStats {
    /// Serialize rows and counters as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&DemoReport {
            rows: &self.rows,
            coupled_rows: &self.coupled_rows,
            ramp_updates: self.ramp_updates,
            reclaimed_adapters: self.reclaimed_adapters,
            events: &self.events,
            dropped_events: self.dropped_events,
            duration_secs: self.duration.as_secs_f64(),
        })
    }

    /// Print per-step table and summary
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                     timelink demo run                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📈 Trigger");
        print_rows(&self.rows);

        if !self.coupled_rows.is_empty() {
            println!("\n🔁 Coupled pair");
            print_rows(&self.coupled_rows);
        }

        println!("\n📊 Overview");
        println!("   ├─ Duration: {:.3}s", self.duration.as_secs_f64());
        println!("   ├─ Ramp updates: {}", self.ramp_updates);
        println!("   ├─ Adapters reclaimed: {}", self.reclaimed_adapters);
        println!(
            "   └─ Diagnostics: {} ({} overwritten)",
            self.events.len(),
            self.dropped_events
        );

        if !self.events.is_empty() {
            println!("\n⚠️  Diagnostics");
            for (i, event) in self.events.iter().enumerate() {
                let prefix = if i == self.events.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} [{}] {} ({}): {}",
                    prefix,
                    event.level.as_str(),
                    event.item,
                    event.reason,
                    event.message
                );
            }
        }

        println!("\n{}", self.metrics);
    }
}

fn print_rows(rows: &[StepRow]) {
    println!("   {:>10} {:>14} {:>14} {:>8}", "time", "value", "coverage", "updates");
    for row in rows {
        let value = row
            .value
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let coverage = match &row.reason {
            Some(reason) => reason.as_str(),
            None => row.coverage,
        };
        println!(
            "   {:>10.3} {:>14} {:>14} {:>8}",
            row.time, value, coverage, row.updates
        );
    }
}
