use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::{RngHandle, WlError};

use crate::histogram::{EnergyBin, HistogramDos};

/// Classification of an acceptance decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The trial state was accepted.
    Accepted,
    /// The trial state lost the Metropolis draw.
    RejectedByDraw,
    /// The trial observable fell outside the sampled window.
    OutOfRange,
}

/// Outcome of evaluating the acceptance rule for one trial move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceOutcome {
    /// Decision taken for the trial.
    pub verdict: Verdict,
    /// `log g(current) - log g(trial)`; zero for out-of-range trials.
    pub log_ratio: f64,
    /// Acceptance probability actually used for the decision.
    pub acceptance_prob: f64,
    /// Bin of the trial observable when inside the window.
    pub trial_bin: Option<EnergyBin>,
}

impl AcceptanceOutcome {
    /// Whether the trial was accepted.
    pub fn accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

/// Evaluates the Wang-Landau acceptance rule for one trial observable.
///
/// An out-of-range trial is rejected unconditionally; this is a domain
/// validity check, not a DOS comparison. Otherwise the rule accepts with
/// probability `min(1, g(current)/g(trial))`, evaluated in log space. A
/// non-negative log ratio short-circuits to certain acceptance so `exp` is
/// never evaluated on a large positive argument.
///
/// The current observable must lie inside the window; the engine establishes
/// that invariant during bootstrap and it can only be violated by a store
/// whose window disagrees with the walker state.
pub fn evaluate(
    store: &HistogramDos,
    current: f64,
    trial: f64,
    rng: &mut RngHandle,
) -> Result<AcceptanceOutcome, WlError> {
    let Some(trial_bin) = store.bin(trial) else {
        return Ok(AcceptanceOutcome {
            verdict: Verdict::OutOfRange,
            log_ratio: 0.0,
            acceptance_prob: 0.0,
            trial_bin: None,
        });
    };
    let current_bin = store.bin(current).ok_or_else(|| {
        WlError::Window(
            ErrorInfo::new("current-out-of-window", "committed observable left the window")
                .with_context("current", current.to_string()),
        )
    })?;

    let log_ratio = store.log_dos(current_bin) - store.log_dos(trial_bin);
    if log_ratio >= 0.0 {
        return Ok(AcceptanceOutcome {
            verdict: Verdict::Accepted,
            log_ratio,
            acceptance_prob: 1.0,
            trial_bin: Some(trial_bin),
        });
    }

    let acceptance_prob = log_ratio.exp();
    let verdict = if rng.uniform() < acceptance_prob {
        Verdict::Accepted
    } else {
        Verdict::RejectedByDraw
    };
    Ok(AcceptanceOutcome {
        verdict,
        log_ratio,
        acceptance_prob,
        trial_bin: Some(trial_bin),
    })
}
