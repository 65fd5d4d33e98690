use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::WlError;

use crate::config::WindowConfig;

/// Index of an energy bin within the sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnergyBin(usize);

impl EnergyBin {
    /// Returns the zero-based index of the bin.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Per-bin entry of the normalized DOS export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosBinExport {
    /// Zero-based bin index.
    pub bin: usize,
    /// Energy at the bin center.
    pub energy: f64,
    /// Log DOS shifted so the minimum visited value is zero.
    pub log_dos: f64,
    /// Visit count in the current histogram.
    pub count: u64,
    /// Whether the bin was visited at any point of the run.
    pub touched: bool,
}

/// Summary of the visited-bin count distribution used by the flatness test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatnessProfile {
    /// Smallest nonzero visit count.
    pub min_count: u64,
    /// Mean count over visited bins.
    pub mean_count: f64,
    /// Number of bins visited in the current iteration.
    pub visited_bins: usize,
    /// Number of bins with zero visits in the current iteration.
    pub unvisited_bins: usize,
}

/// Serializable snapshot of the store, used by checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistogramState {
    /// Lower window edge (inclusive).
    pub emin: f64,
    /// Upper window edge (exclusive).
    pub emax: f64,
    /// Visit counts per bin.
    pub counts: Vec<u64>,
    /// Log DOS estimate per bin.
    pub log_dos: Vec<f64>,
    /// Bins visited at least once over the whole run.
    pub touched: Vec<bool>,
}

/// Binned visit histogram plus the running log density-of-states estimate.
///
/// The bin domain is fixed at construction and never grows or shrinks. The
/// histogram is reset once per annealing iteration; the DOS carries forward
/// all accumulated knowledge and is only ever adjusted additively. All DOS
/// consumers work with differences, so a global additive offset is
/// immaterial.
#[derive(Debug, Clone)]
pub struct HistogramDos {
    emin: f64,
    emax: f64,
    bin_width: f64,
    counts: Vec<u64>,
    log_dos: Vec<f64>,
    touched: Vec<bool>,
}

impl HistogramDos {
    /// Creates an empty store over the provided window.
    pub fn new(window: &WindowConfig) -> Result<Self, WlError> {
        if !window.emin.is_finite() || !window.emax.is_finite() || window.emax <= window.emin {
            return Err(WlError::Window(
                ErrorInfo::new("window-degenerate", "energy window must satisfy emin < emax")
                    .with_context("emin", window.emin.to_string())
                    .with_context("emax", window.emax.to_string()),
            ));
        }
        if window.bins == 0 {
            return Err(WlError::Window(ErrorInfo::new(
                "window-no-bins",
                "energy window requires at least one bin",
            )));
        }
        Ok(Self {
            emin: window.emin,
            emax: window.emax,
            bin_width: (window.emax - window.emin) / window.bins as f64,
            counts: vec![0; window.bins],
            log_dos: vec![0.0; window.bins],
            touched: vec![false; window.bins],
        })
    }

    /// Number of bins in the window.
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Maps an observable to its bin, or `None` when it falls outside the
    /// window. Out-of-range values are never clamped into the edge bins;
    /// silent clamping would corrupt the DOS estimate.
    pub fn bin(&self, value: f64) -> Option<EnergyBin> {
        if !value.is_finite() || value < self.emin || value >= self.emax {
            return None;
        }
        let index = ((value - self.emin) / self.bin_width) as usize;
        // Floating-point roundoff can push a value just below emax into the
        // one-past-the-end bin.
        Some(EnergyBin(index.min(self.counts.len() - 1)))
    }

    /// Energy at the center of a bin.
    pub fn energy_at(&self, bin: EnergyBin) -> f64 {
        self.emin + (bin.index() as f64 + 0.5) * self.bin_width
    }

    /// Records one visit: increments the histogram count and raises the DOS
    /// estimate by `log_factor` (multiplication by `f` in linear space).
    pub fn record_visit(&mut self, bin: EnergyBin, log_factor: f64) {
        self.counts[bin.index()] += 1;
        self.log_dos[bin.index()] += log_factor;
        self.touched[bin.index()] = true;
    }

    /// Current log DOS estimate at a bin. Meaningful only through differences.
    pub fn log_dos(&self, bin: EnergyBin) -> f64 {
        self.log_dos[bin.index()]
    }

    /// Visit count at a bin in the current iteration.
    pub fn count(&self, bin: EnergyBin) -> u64 {
        self.counts[bin.index()]
    }

    /// Sum of all histogram counts in the current iteration.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Count distribution over visited bins, or `None` when nothing has been
    /// visited since the last reset.
    pub fn flatness_profile(&self) -> Option<FlatnessProfile> {
        let visited: Vec<u64> = self.counts.iter().copied().filter(|&c| c > 0).collect();
        if visited.is_empty() {
            return None;
        }
        let min_count = *visited.iter().min()?;
        let mean_count = visited.iter().sum::<u64>() as f64 / visited.len() as f64;
        Some(FlatnessProfile {
            min_count,
            mean_count,
            visited_bins: visited.len(),
            unvisited_bins: self.counts.len() - visited.len(),
        })
    }

    /// Classic flatness test: every visited bin's count must exceed
    /// `tolerance` times the mean visited-bin count. Bins with zero visits in
    /// the current iteration are excluded; they are reported separately by
    /// [`HistogramDos::unvisited_bins`] as evidence of under-sampling.
    pub fn is_flat(&self, tolerance: f64) -> bool {
        match self.flatness_profile() {
            Some(profile) => profile.min_count as f64 > tolerance * profile.mean_count,
            None => false,
        }
    }

    /// Number of bins with zero visits in the current iteration.
    pub fn unvisited_bins(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }

    /// Number of bins never visited over the whole run.
    pub fn never_visited_bins(&self) -> usize {
        self.touched.iter().filter(|&&t| !t).count()
    }

    /// Stagnation escape hatch: clears the counts of visited bins lagging
    /// below `fraction` of the mean visited-bin count, leaving the DOS
    /// untouched, so the sampler can re-explore stale regions without
    /// discarding accumulated knowledge. Returns the number of bins cleared.
    pub fn refresh(&mut self, fraction: f64) -> usize {
        let Some(profile) = self.flatness_profile() else {
            return 0;
        };
        let threshold = fraction * profile.mean_count;
        let mut cleared = 0;
        for count in self.counts.iter_mut() {
            if *count > 0 && (*count as f64) < threshold {
                *count = 0;
                cleared += 1;
            }
        }
        cleared
    }

    /// Zeroes all histogram counts, preserving the DOS. Called once per
    /// completed annealing iteration.
    pub fn reset_histogram(&mut self) {
        for count in self.counts.iter_mut() {
            *count = 0;
        }
    }

    /// Produces the normalized DOS export without mutating internal state.
    ///
    /// The log DOS is shifted so its minimum over visited bins is zero; the
    /// shift is global and therefore preserves all differences.
    pub fn normalized_dos(&self) -> Vec<DosBinExport> {
        let offset = self
            .log_dos
            .iter()
            .zip(self.touched.iter())
            .filter(|(_, &touched)| touched)
            .map(|(&value, _)| value)
            .fold(f64::INFINITY, f64::min);
        (0..self.counts.len())
            .map(|index| {
                let bin = EnergyBin(index);
                let touched = self.touched[index];
                DosBinExport {
                    bin: index,
                    energy: self.energy_at(bin),
                    log_dos: if touched {
                        self.log_dos[index] - offset
                    } else {
                        0.0
                    },
                    count: self.counts[index],
                    touched,
                }
            })
            .collect()
    }

    /// Captures the serializable state of the store.
    pub fn state(&self) -> HistogramState {
        HistogramState {
            emin: self.emin,
            emax: self.emax,
            counts: self.counts.clone(),
            log_dos: self.log_dos.clone(),
            touched: self.touched.clone(),
        }
    }

    /// Restores a store from a checkpointed state.
    pub fn from_state(state: &HistogramState) -> Result<Self, WlError> {
        let bins = state.counts.len();
        if bins == 0 || state.log_dos.len() != bins || state.touched.len() != bins {
            return Err(WlError::Window(
                ErrorInfo::new("histogram-state", "inconsistent histogram state lengths")
                    .with_context("counts", state.counts.len().to_string())
                    .with_context("log_dos", state.log_dos.len().to_string())
                    .with_context("touched", state.touched.len().to_string()),
            ));
        }
        if !state.emin.is_finite() || !state.emax.is_finite() || state.emax <= state.emin {
            return Err(WlError::Window(
                ErrorInfo::new("histogram-state", "inconsistent window edges")
                    .with_context("emin", state.emin.to_string())
                    .with_context("emax", state.emax.to_string()),
            ));
        }
        Ok(Self {
            emin: state.emin,
            emax: state.emax,
            bin_width: (state.emax - state.emin) / bins as f64,
            counts: state.counts.clone(),
            log_dos: state.log_dos.clone(),
            touched: state.touched.clone(),
        })
    }
}
