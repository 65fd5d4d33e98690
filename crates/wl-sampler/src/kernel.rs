use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use wl_core::errors::ErrorInfo;
use wl_core::{PersistMode, PhysicalSystem, RngHandle, WlError};

use crate::acceptance;
use crate::checkpoint::{self, SnapshotPayload};
use crate::config::{config_hash, OutputConfig, RunConfig};
use crate::determinism;
use crate::histogram::{DosBinExport, HistogramDos};
use crate::manifest::RunManifest;
use crate::metrics::{CheckSample, MetricsRecorder, RunCounters};

/// Summary returned to callers after a run converges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Completed annealing iterations.
    pub iterations: u64,
    /// Sampling steps executed over the whole run.
    pub total_steps: u64,
    /// Accepted trial moves.
    pub accepted_moves: u64,
    /// Rejected trial moves.
    pub rejected_moves: u64,
    /// Unconditional moves consumed by the bootstrap phase.
    pub bootstrap_moves: u64,
    /// Histogram refreshes triggered by stagnation.
    pub refreshes: u64,
    /// Fraction of sampling steps accepted.
    pub acceptance_rate: f64,
    /// `ln f` at convergence.
    pub final_log_factor: f64,
    /// Bins never visited over the whole run.
    pub never_visited_bins: usize,
    /// Normalized DOS export at convergence.
    pub dos: Vec<DosBinExport>,
    /// Metrics CSV written during the run.
    pub metrics_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
    /// Normalized DOS export path, if emitted.
    pub dos_path: Option<PathBuf>,
    /// Final histogram export path, if emitted.
    pub histogram_path: Option<PathBuf>,
    /// Checkpoint files produced during the run.
    pub checkpoints: Vec<PathBuf>,
    /// Flatness-check samples collected (useful for tests/diagnostics).
    pub samples: Vec<CheckSample>,
}

/// Mutable state owned by the convergence state machine.
struct EngineState {
    store: HistogramDos,
    counters: RunCounters,
    log_factor: f64,
    current_energy: f64,
}

/// Runs the sampler from scratch with the provided configuration.
pub fn run(config: &RunConfig, system: &mut dyn PhysicalSystem) -> Result<RunSummary, WlError> {
    config.validate()?;
    let seed = config.seed_policy.master_seed;
    let mut state = EngineState {
        store: HistogramDos::new(&config.window)?,
        counters: RunCounters::default(),
        log_factor: config.schedule.log_factor_initial,
        current_energy: 0.0,
    };
    bootstrap(&mut state, seed, system)?;

    // The seeded walker configuration is traced once before regular sampling
    // starts, matching the checkpoint layout of the run directory.
    let layout = resolve_output_paths(config);
    if let (Some(run_dir), Some(trace_file)) =
        (layout.run_directory.as_ref(), layout.trace_file.as_ref())
    {
        std::fs::create_dir_all(run_dir).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("run-dir-create", err.to_string())
                    .with_context("path", run_dir.display().to_string()),
            )
        })?;
        system.persist(PersistMode::Trace, trace_file)?;
    }

    run_with_state(config, seed, &mut state, system)
}

/// Resumes a run from a snapshot file.
///
/// The caller is responsible for reconstructing the physical system from the
/// restart artifact referenced by the snapshot; the engine restores its own
/// state (histogram, DOS, modification factor, counters) and continues
/// sampling without a new bootstrap phase.
pub fn resume(path: &Path, system: &mut dyn PhysicalSystem) -> Result<RunSummary, WlError> {
    let payload = SnapshotPayload::load(path)?;
    payload.config.validate()?;
    if payload.system_label != system.label() {
        return Err(WlError::Config(
            ErrorInfo::new("snapshot-system-mismatch", "snapshot was written by a different system")
                .with_context("snapshot", payload.system_label.clone())
                .with_context("provided", system.label().to_string())
                .with_hint("reconstruct the system from the restart artifact referenced by the snapshot"),
        ));
    }
    let mut state = EngineState {
        store: HistogramDos::from_state(&payload.histogram)?,
        counters: payload.counters.clone(),
        log_factor: payload.log_factor,
        current_energy: payload.current_energy,
    };
    if state.store.bin(state.current_energy).is_none() {
        return Err(WlError::Window(
            ErrorInfo::new("snapshot-walker", "snapshot walker observable lies outside the window")
                .with_context("energy", state.current_energy.to_string()),
        ));
    }
    run_with_state(&payload.config, payload.master_seed, &mut state, system)
}

/// Bootstrap phase: commit moves unconditionally until the observable first
/// lands inside the window, then seed the histogram with a single visit.
/// Committing through invalid intermediate states is intentional; it pushes
/// the walker toward the valid window. No visit is recorded for out-of-range
/// values.
fn bootstrap(
    state: &mut EngineState,
    seed: u64,
    system: &mut dyn PhysicalSystem,
) -> Result<(), WlError> {
    let mut attempt: u64 = 0;
    loop {
        let mut move_rng = RngHandle::from_seed(determinism::bootstrap_seed(seed, attempt));
        system.propose_move(&mut move_rng)?;
        let energy = system.observe()?;
        system.commit()?;
        attempt += 1;
        if let Some(bin) = state.store.bin(energy) {
            state.store.record_visit(bin, state.log_factor);
            state.counters.recorded_visits += 1;
            state.counters.bootstrap_moves = attempt;
            state.current_energy = energy;
            log::info!("bootstrap landed in window after {attempt} moves (energy {energy})");
            return Ok(());
        }
    }
}

fn run_with_state(
    config: &RunConfig,
    seed: u64,
    state: &mut EngineState,
    system: &mut dyn PhysicalSystem,
) -> Result<RunSummary, WlError> {
    let layout = resolve_output_paths(config);
    let mut recorder = MetricsRecorder::new();
    let mut checkpoints: Vec<PathBuf> = Vec::new();
    let mut last_backup = Instant::now();

    while state.log_factor > config.schedule.log_factor_final {
        let mut flat = false;
        while !flat {
            for _ in 0..config.flatness.check_interval {
                sampling_step(state, seed, system)?;
                maybe_backup(config, seed, state, system, &layout, &mut last_backup)?;
            }

            state.counters.flatness_checks += 1;
            flat = state.store.is_flat(config.flatness.tolerance);
            record_check(&mut recorder, state, flat);

            if !flat {
                state.counters.checks_without_progress += 1;
                if state.counters.checks_without_progress >= config.flatness.refresh_after {
                    let cleared = state.store.refresh(config.flatness.refresh_fraction);
                    state.counters.refreshes += 1;
                    state.counters.checks_without_progress = 0;
                    log::warn!(
                        "flatness stagnation at step {}: refreshed {cleared} under-visited bins",
                        state.counters.total_steps
                    );
                }
            }
        }

        // Iteration checkpoint captures the flat histogram before the factor
        // is reduced and the counts are cleared.
        if let Some(checkpoint_dir) = layout.checkpoint_dir.as_ref() {
            let path = checkpoint::iteration_path(checkpoint_dir, state.counters.iterations);
            write_snapshot(config, seed, state, system, &layout, &path)?;
            checkpoints.push(path);
            enforce_checkpoint_retention(&mut checkpoints, config.checkpoint.max_to_keep)?;
        }

        let unvisited = state.store.unvisited_bins();
        if unvisited > 0 {
            log::warn!(
                "annealing with {unvisited} bins unvisited this iteration; the walker has not covered the window"
            );
        }

        state.log_factor /= config.schedule.reducer;
        state.counters.iterations += 1;
        if state.log_factor > config.schedule.log_factor_final {
            // Another iteration follows: clear the counts. On the terminal
            // iteration the flat histogram is kept for the final export.
            state.store.reset_histogram();
            state.counters.begin_iteration();
        }
        log::info!(
            "iteration {} complete at step {}; log factor now {:.3e}",
            state.counters.iterations,
            state.counters.total_steps,
            state.log_factor
        );
    }

    finalize(config, seed, state, system, &layout, recorder, checkpoints)
}

/// One SAMPLING step: propose, observe, accept or reject, and record a visit
/// either way. Recording on rejection re-visits the currently occupied bin,
/// which keeps the histogram a record of occupied time rather than of move
/// attempts.
fn sampling_step(
    state: &mut EngineState,
    seed: u64,
    system: &mut dyn PhysicalSystem,
) -> Result<(), WlError> {
    let step = state.counters.total_steps;
    let iteration = state.counters.iterations;

    let mut move_rng = RngHandle::from_seed(determinism::move_seed(seed, step));
    system
        .propose_move(&mut move_rng)
        .map_err(|err| with_step_context(err, step, iteration))?;
    let trial = system
        .observe()
        .map_err(|err| with_step_context(err, step, iteration))?;

    let mut accept_rng = RngHandle::from_seed(determinism::acceptance_seed(seed, step));
    let outcome = acceptance::evaluate(&state.store, state.current_energy, trial, &mut accept_rng)?;

    if outcome.accepted() {
        let bin = outcome.trial_bin.ok_or_else(|| {
            WlError::Window(ErrorInfo::new(
                "acceptance-bin-missing",
                "accepted trial carried no bin",
            ))
        })?;
        state.store.record_visit(bin, state.log_factor);
        system
            .commit()
            .map_err(|err| with_step_context(err, step, iteration))?;
        state.current_energy = trial;
        state.counters.accepted_moves += 1;
    } else {
        system
            .rollback()
            .map_err(|err| with_step_context(err, step, iteration))?;
        let bin = state.store.bin(state.current_energy).ok_or_else(|| {
            WlError::Window(
                ErrorInfo::new("current-out-of-window", "committed observable left the window")
                    .with_context("current", state.current_energy.to_string()),
            )
        })?;
        state.store.record_visit(bin, state.log_factor);
        state.counters.rejected_moves += 1;
    }

    state.counters.total_steps += 1;
    state.counters.recorded_visits += 1;
    Ok(())
}

fn record_check(recorder: &mut MetricsRecorder, state: &EngineState, flat: bool) {
    let profile = state.store.flatness_profile();
    recorder.push_sample(CheckSample {
        total_steps: state.counters.total_steps,
        iteration: state.counters.iterations,
        log_factor: state.log_factor,
        flat,
        min_count: profile.map(|p| p.min_count).unwrap_or(0),
        mean_count: profile.map(|p| p.mean_count).unwrap_or(0.0),
        unvisited_bins: profile
            .map(|p| p.unvisited_bins)
            .unwrap_or_else(|| state.store.bins()),
    });
}

/// Rolling wall-clock backup so a terminated process loses at most the work
/// since the last write. May fire mid-batch.
fn maybe_backup(
    config: &RunConfig,
    seed: u64,
    state: &EngineState,
    system: &mut dyn PhysicalSystem,
    layout: &ResolvedOutput,
    last_backup: &mut Instant,
) -> Result<(), WlError> {
    if config.checkpoint.backup_interval_secs == 0 {
        return Ok(());
    }
    let Some(checkpoint_dir) = layout.checkpoint_dir.as_ref() else {
        return Ok(());
    };
    if last_backup.elapsed().as_secs() < config.checkpoint.backup_interval_secs {
        return Ok(());
    }
    let path = checkpoint::backup_path(checkpoint_dir);
    write_snapshot(config, seed, state, system, layout, &path)?;
    *last_backup = Instant::now();
    Ok(())
}

/// Persists the system restart artifact and the engine snapshot. Reporter-only
/// by construction: callers hold a `layout` whose paths are `None` for
/// non-reporter walkers.
fn write_snapshot(
    config: &RunConfig,
    seed: u64,
    state: &EngineState,
    system: &mut dyn PhysicalSystem,
    layout: &ResolvedOutput,
    path: &Path,
) -> Result<(), WlError> {
    let system_restart = match layout.restart_file.as_ref() {
        Some(restart_path) => {
            system.persist(PersistMode::Restart, restart_path)?;
            Some(restart_path.clone())
        }
        None => None,
    };
    let payload = SnapshotPayload {
        schema_version: wl_core::SchemaVersion::default(),
        config: config.clone(),
        master_seed: seed,
        log_factor: state.log_factor,
        counters: state.counters.clone(),
        current_energy: state.current_energy,
        histogram: state.store.state(),
        system_label: system.label().to_string(),
        system_restart,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    payload.store(path)
}

fn finalize(
    config: &RunConfig,
    seed: u64,
    state: &mut EngineState,
    system: &mut dyn PhysicalSystem,
    layout: &ResolvedOutput,
    recorder: MetricsRecorder,
    mut checkpoints: Vec<PathBuf>,
) -> Result<RunSummary, WlError> {
    let dos = state.store.normalized_dos();

    let metrics_path = match layout.metrics_file.as_ref() {
        Some(path) => {
            recorder.write_csv(path).map_err(|err| {
                WlError::Serde(
                    ErrorInfo::new("metrics-write", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
            Some(path.clone())
        }
        None => None,
    };

    let dos_path = match layout.dos_file.as_ref() {
        Some(path) => {
            write_dos_csv(&dos, path)?;
            Some(path.clone())
        }
        None => None,
    };

    let histogram_path = match layout.histogram_file.as_ref() {
        Some(path) => {
            write_histogram_csv(&dos, path)?;
            Some(path.clone())
        }
        None => None,
    };

    if let Some(checkpoint_dir) = layout.checkpoint_dir.as_ref() {
        let path = checkpoint::final_path(checkpoint_dir);
        write_snapshot(config, seed, state, system, layout, &path)?;
        checkpoints.push(path);
    }

    let manifest_path = match (layout.run_directory.as_ref(), layout.manifest_file.as_ref()) {
        (Some(run_dir), Some(path)) => {
            let manifest = RunManifest {
                config: config.clone(),
                seed_label: config.seed_policy.label.clone(),
                system_label: system.label().to_string(),
                provenance: wl_core::RunProvenance::stamped(config_hash(config)?, seed),
                iterations: state.counters.iterations,
                total_steps: state.counters.total_steps,
                metrics_file: relative_to(metrics_path.as_deref(), run_dir),
                dos_file: relative_to(dos_path.as_deref(), run_dir),
                histogram_file: relative_to(histogram_path.as_deref(), run_dir),
                checkpoints: checkpoints
                    .iter()
                    .filter_map(|path| {
                        path.strip_prefix(run_dir)
                            .ok()
                            .map(|rel| rel.to_path_buf())
                    })
                    .collect(),
            };
            manifest.write(path)?;
            Some(path.clone())
        }
        _ => None,
    };

    log::info!(
        "converged after {} iterations and {} steps (acceptance rate {:.3})",
        state.counters.iterations,
        state.counters.total_steps,
        state.counters.acceptance_rate()
    );

    Ok(RunSummary {
        iterations: state.counters.iterations,
        total_steps: state.counters.total_steps,
        accepted_moves: state.counters.accepted_moves,
        rejected_moves: state.counters.rejected_moves,
        bootstrap_moves: state.counters.bootstrap_moves,
        refreshes: state.counters.refreshes,
        acceptance_rate: state.counters.acceptance_rate(),
        final_log_factor: state.log_factor,
        never_visited_bins: state.store.never_visited_bins(),
        dos,
        metrics_path,
        manifest_path,
        dos_path,
        histogram_path,
        checkpoints,
        samples: recorder.samples().to_vec(),
    })
}

fn enforce_checkpoint_retention(
    paths: &mut Vec<PathBuf>,
    max_to_keep: usize,
) -> Result<(), WlError> {
    if max_to_keep == 0 || paths.len() <= max_to_keep {
        return Ok(());
    }
    let mut removed = Vec::new();
    while paths.len() > max_to_keep {
        removed.push(paths.remove(0));
    }
    for path in removed {
        std::fs::remove_file(&path).map_err(|err| {
            WlError::Serde(
                ErrorInfo::new("checkpoint-remove", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
    }
    Ok(())
}

fn write_dos_csv(dos: &[DosBinExport], path: &Path) -> Result<(), WlError> {
    use std::io::Write;
    let map_io = |err: std::io::Error| {
        WlError::Serde(
            ErrorInfo::new("dos-write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    };
    let mut file = std::fs::File::create(path).map_err(map_io)?;
    writeln!(file, "bin,energy,log_dos,touched").map_err(map_io)?;
    for entry in dos {
        writeln!(
            file,
            "{},{:.9},{:.9},{}",
            entry.bin, entry.energy, entry.log_dos, entry.touched
        )
        .map_err(map_io)?;
    }
    Ok(())
}

fn write_histogram_csv(dos: &[DosBinExport], path: &Path) -> Result<(), WlError> {
    use std::io::Write;
    let map_io = |err: std::io::Error| {
        WlError::Serde(
            ErrorInfo::new("histogram-write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    };
    let mut file = std::fs::File::create(path).map_err(map_io)?;
    writeln!(file, "bin,energy,count").map_err(map_io)?;
    for entry in dos {
        writeln!(file, "{},{:.9},{}", entry.bin, entry.energy, entry.count).map_err(map_io)?;
    }
    Ok(())
}

#[derive(Default)]
struct ResolvedOutput {
    run_directory: Option<PathBuf>,
    manifest_file: Option<PathBuf>,
    metrics_file: Option<PathBuf>,
    checkpoint_dir: Option<PathBuf>,
    dos_file: Option<PathBuf>,
    histogram_file: Option<PathBuf>,
    restart_file: Option<PathBuf>,
    trace_file: Option<PathBuf>,
}

/// Resolves the side-effect layout. Non-reporter walkers and runs without a
/// run directory resolve to an empty layout, which disables every write.
fn resolve_output_paths(config: &RunConfig) -> ResolvedOutput {
    let output: &OutputConfig = &config.output;
    match (&output.run_directory, config.reporter) {
        (Some(run_dir), true) => ResolvedOutput {
            run_directory: Some(run_dir.clone()),
            manifest_file: Some(run_dir.join(&output.manifest_file)),
            metrics_file: Some(run_dir.join(&output.metrics_file)),
            checkpoint_dir: Some(run_dir.join(&output.checkpoint_dir)),
            dos_file: Some(run_dir.join(&output.dos_file)),
            histogram_file: Some(run_dir.join(&output.histogram_file)),
            restart_file: Some(run_dir.join(&output.restart_file)),
            trace_file: Some(run_dir.join(&output.trace_file)),
        },
        _ => ResolvedOutput::default(),
    }
}

fn with_step_context(err: WlError, step: u64, iteration: u64) -> WlError {
    let attach = |info: ErrorInfo| {
        info.with_context("step", step.to_string())
            .with_context("iteration", iteration.to_string())
    };
    match err {
        WlError::System(info) => WlError::System(attach(info)),
        WlError::Window(info) => WlError::Window(attach(info)),
        WlError::Config(info) => WlError::Config(attach(info)),
        WlError::Rng(info) => WlError::Rng(attach(info)),
        WlError::Serde(info) => WlError::Serde(attach(info)),
    }
}

fn relative_to(path: Option<&Path>, run_dir: &Path) -> Option<PathBuf> {
    path.and_then(|p| p.strip_prefix(run_dir).ok().map(|rel| rel.to_path_buf()))
}
