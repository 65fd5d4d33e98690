use wl_core::{PersistMode, PhysicalSystem, RngHandle};
use wl_systems::IsingLattice;

#[test]
fn ordered_lattice_energy_matches_bond_count() {
    // All spins up: every one of the 2*L*L bonds contributes -J.
    let lattice = IsingLattice::new(4, 1.0).unwrap();
    assert_eq!(lattice.current_energy(), -32.0);
    assert_eq!(lattice.magnetization(), 16);
}

#[test]
fn incremental_energy_matches_recomputation_under_mixed_outcomes() {
    let mut lattice = IsingLattice::new(6, 1.5).unwrap();
    let mut rng = RngHandle::from_seed(77);
    lattice.randomize(&mut rng);
    assert_eq!(lattice.current_energy(), lattice.recomputed_energy());

    for step in 0..2000u32 {
        lattice.propose_move(&mut rng).unwrap();
        let trial_energy = lattice.observe().unwrap();
        assert!(trial_energy.is_finite());
        if step % 3 == 0 {
            lattice.rollback().unwrap();
        } else {
            lattice.commit().unwrap();
        }
        assert!(
            (lattice.current_energy() - lattice.recomputed_energy()).abs() < 1e-9,
            "bookkeeping diverged at step {step}"
        );
    }
}

#[test]
fn rollback_discards_the_pending_flip() {
    let mut lattice = IsingLattice::new(3, 1.0).unwrap();
    let before = lattice.current_energy();
    let mut rng = RngHandle::from_seed(5);
    lattice.propose_move(&mut rng).unwrap();
    lattice.rollback().unwrap();
    assert_eq!(lattice.current_energy(), before);
    assert_eq!(lattice.observe().unwrap(), before);
}

#[test]
fn restart_artifact_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lattice.json");

    let mut lattice = IsingLattice::new(5, 2.0).unwrap();
    let mut rng = RngHandle::from_seed(9);
    lattice.randomize(&mut rng);
    for _ in 0..50 {
        lattice.propose_move(&mut rng).unwrap();
        lattice.commit().unwrap();
    }
    lattice.persist(PersistMode::Restart, &path).unwrap();

    let restored = IsingLattice::from_restart(&path).unwrap();
    assert_eq!(restored.current_energy(), lattice.current_energy());
    assert_eq!(restored.magnetization(), lattice.magnetization());
}

#[test]
fn trace_mode_appends_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.dat");
    let lattice = IsingLattice::new(3, 1.0).unwrap();
    lattice.persist(PersistMode::Trace, &path).unwrap();
    lattice.persist(PersistMode::Trace, &path).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn degenerate_lattices_are_rejected() {
    assert!(IsingLattice::new(1, 1.0).is_err());
    assert!(IsingLattice::new(4, 0.0).is_err());
    assert!(IsingLattice::new(4, f64::NAN).is_err());
}
