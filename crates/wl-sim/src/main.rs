use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Deserialize;
use wl_core::{derive_substream_seed, PhysicalSystem, RngHandle};
use wl_sampler::checkpoint::SnapshotPayload;
use wl_sampler::{resume, run, RunConfig};
use wl_systems::{IsingLattice, LevelLadder};

#[derive(Parser, Debug)]
#[command(name = "wl-sim", about = "Density-of-states sampler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a sampling run from a YAML configuration.
    Run(RunArgs),
    /// Resume a sampling run from a snapshot file.
    Resume(ResumeArgs),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// YAML configuration describing the sampler and the physical system.
    #[arg(long)]
    config: PathBuf,
    /// Output directory for run artefacts.
    #[arg(long)]
    out: PathBuf,
    /// Overrides the master seed from the configuration.
    #[arg(long)]
    seed: Option<u64>,
    /// Runs as a non-reporter walker (skips all artefact writes).
    #[arg(long)]
    no_report: bool,
}

#[derive(ClapArgs, Debug)]
struct ResumeArgs {
    /// Snapshot file written by a previous run.
    #[arg(long)]
    checkpoint: PathBuf,
}

/// Top-level YAML document: sampler settings plus the system selection.
#[derive(Debug, Deserialize)]
struct SimConfig {
    sampler: RunConfig,
    system: SystemSpec,
}

/// Physical-system selection, resolved at construction time.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
enum SystemSpec {
    Ising {
        size: usize,
        coupling: f64,
        #[serde(default)]
        randomize: bool,
    },
    OscillatorLadder {
        sites: usize,
        omega: f64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_sampler(args),
        Command::Resume(args) => resume_sampler(args),
    }
}

fn run_sampler(args: RunArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let contents = fs::read_to_string(&args.config)?;
    let mut sim: SimConfig = serde_yaml::from_str(&contents)?;
    sim.sampler.output.run_directory = Some(args.out.clone());
    if let Some(seed) = args.seed {
        sim.sampler.seed_policy.master_seed = seed;
    }
    if args.no_report {
        sim.sampler.reporter = false;
    }
    sim.sampler.validate()?;

    let mut system = build_system(&sim.system, sim.sampler.seed_policy.master_seed)?;
    let summary = run(&sim.sampler, system.as_mut()).map_err(|err| fatal(err))?;

    // Persist the configuration next to the artefacts for reproducibility.
    fs::copy(&args.config, args.out.join("config.yaml")).ok();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn resume_sampler(args: ResumeArgs) -> Result<(), Box<dyn Error>> {
    let payload = SnapshotPayload::load(&args.checkpoint).map_err(|err| fatal(err))?;
    let restart = payload.system_restart.clone().ok_or_else(|| {
        format!(
            "snapshot {} carries no system restart artifact",
            args.checkpoint.display()
        )
    })?;
    let mut system = rebuild_system(&payload.system_label, &restart)?;
    let summary = resume(&args.checkpoint, system.as_mut()).map_err(|err| fatal(err))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn build_system(
    spec: &SystemSpec,
    master_seed: u64,
) -> Result<Box<dyn PhysicalSystem>, Box<dyn Error>> {
    match spec {
        SystemSpec::Ising {
            size,
            coupling,
            randomize,
        } => {
            let mut lattice = IsingLattice::new(*size, *coupling)?;
            if *randomize {
                let mut rng = RngHandle::from_seed(derive_substream_seed(master_seed, u64::MAX));
                lattice.randomize(&mut rng);
            }
            Ok(Box::new(lattice))
        }
        SystemSpec::OscillatorLadder { sites, omega } => {
            Ok(Box::new(LevelLadder::new(*sites, *omega)?))
        }
    }
}

fn rebuild_system(label: &str, restart: &Path) -> Result<Box<dyn PhysicalSystem>, Box<dyn Error>> {
    match label {
        "ising" => Ok(Box::new(IsingLattice::from_restart(restart)?)),
        "oscillator-ladder" => Ok(Box::new(LevelLadder::from_restart(restart)?)),
        other => Err(format!("unknown system label in snapshot: {other}").into()),
    }
}

fn fatal(err: wl_core::WlError) -> Box<dyn Error> {
    let info = err.info();
    let step = info.context.get("step").map(String::as_str).unwrap_or("?");
    let iteration = info
        .context
        .get("iteration")
        .map(String::as_str)
        .unwrap_or("?");
    log::error!("run aborted at iteration {iteration}, step {step}: {err}");
    Box::new(err)
}
