use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Counters tracked by the convergence state machine.
///
/// `recorded_visits` and `checks_without_progress` are scoped to the current
/// annealing iteration; everything else is monotonic over the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Sampling steps executed since the start of the run.
    pub total_steps: u64,
    /// Accepted trial moves since the start of the run.
    pub accepted_moves: u64,
    /// Rejected trial moves since the start of the run.
    pub rejected_moves: u64,
    /// Completed annealing iterations.
    pub iterations: u64,
    /// Flatness checks performed since the start of the run.
    pub flatness_checks: u64,
    /// Consecutive failed flatness checks since the last refresh or anneal.
    pub checks_without_progress: u64,
    /// Histogram refreshes triggered by stagnation.
    pub refreshes: u64,
    /// Unconditional moves consumed by the bootstrap phase.
    pub bootstrap_moves: u64,
    /// Histogram visits recorded in the current annealing iteration.
    pub recorded_visits: u64,
}

impl RunCounters {
    /// Fraction of sampling steps that were accepted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.accepted_moves as f64 / self.total_steps as f64
        }
    }

    /// Resets the per-iteration scopes when an annealing iteration completes.
    pub fn begin_iteration(&mut self) {
        self.recorded_visits = 0;
        self.checks_without_progress = 0;
    }
}

/// Per-check metrics stored for CSV export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckSample {
    /// Total sampling steps when the check ran.
    pub total_steps: u64,
    /// Annealing iteration the check belongs to.
    pub iteration: u64,
    /// `ln f` in effect during the batch.
    pub log_factor: f64,
    /// Whether the histogram passed the flatness test.
    pub flat: bool,
    /// Smallest nonzero visit count at check time (0 when nothing visited).
    pub min_count: u64,
    /// Mean visited-bin count at check time.
    pub mean_count: f64,
    /// Bins with zero visits in the current iteration.
    pub unvisited_bins: usize,
}

/// Collects flatness-check samples for diagnostics and CSV export.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<CheckSample>,
}

impl MetricsRecorder {
    /// Creates a new recorder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a flatness-check sample.
    pub fn push_sample(&mut self, sample: CheckSample) {
        self.samples.push(sample);
    }

    /// Returns an immutable view over the recorded samples.
    pub fn samples(&self) -> &[CheckSample] {
        &self.samples
    }

    /// Writes the recorded samples to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "total_steps,iteration,log_factor,flat,min_count,mean_count,unvisited_bins"
        )?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{:.12e},{},{},{:.6},{}",
                sample.total_steps,
                sample.iteration,
                sample.log_factor,
                sample.flat,
                sample.min_count,
                sample.mean_count,
                sample.unvisited_bins
            )?;
        }
        Ok(())
    }
}
