use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion};
use wl_core::{PersistMode, PhysicalSystem, RngHandle, WlError};
use wl_sampler::{run, FlatnessConfig, RunConfig, ScheduleConfig, WindowConfig};

struct RandomWalkSystem {
    committed: f64,
    trial: f64,
}

impl PhysicalSystem for RandomWalkSystem {
    fn propose_move(&mut self, rng: &mut RngHandle) -> Result<(), WlError> {
        self.trial = self.committed + (rng.uniform() * 2.0 - 1.0) * 1.5;
        Ok(())
    }

    fn observe(&self) -> Result<f64, WlError> {
        Ok(self.trial)
    }

    fn commit(&mut self) -> Result<(), WlError> {
        self.committed = self.trial;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), WlError> {
        self.trial = self.committed;
        Ok(())
    }

    fn persist(&self, _mode: PersistMode, _path: &Path) -> Result<(), WlError> {
        Ok(())
    }

    fn label(&self) -> &str {
        "random-walk"
    }
}

fn bench_sampling(c: &mut Criterion) {
    let mut config = RunConfig::default();
    config.window = WindowConfig {
        emin: 0.0,
        emax: 10.0,
        bins: 20,
    };
    config.schedule = ScheduleConfig {
        log_factor_initial: 1.0,
        log_factor_final: 0.4,
        reducer: 2.0,
    };
    config.flatness = FlatnessConfig {
        tolerance: 0.2,
        check_interval: 500,
        refresh_after: 100,
        refresh_fraction: 0.5,
    };
    config.output.run_directory = None;

    c.bench_function("run_random_walk_to_convergence", |b| {
        b.iter(|| {
            let mut system = RandomWalkSystem {
                committed: 5.0,
                trial: 5.0,
            };
            run(&config, &mut system).expect("run converges")
        })
    });
}

criterion_group!(benches, bench_sampling);
criterion_main!(benches);
