use wl_core::{PersistMode, PhysicalSystem, RngHandle};
use wl_systems::LevelLadder;

#[test]
fn ground_state_carries_the_zero_point_energy() {
    let ladder = LevelLadder::new(4, 1.0).unwrap();
    assert_eq!(ladder.current_energy(), 2.0);
    assert_eq!(ladder.total_quanta(), 0);
}

#[test]
fn ground_state_sites_can_only_be_raised() {
    let mut ladder = LevelLadder::new(3, 1.0).unwrap();
    let mut rng = RngHandle::from_seed(21);
    for _ in 0..100 {
        ladder.propose_move(&mut rng).unwrap();
        let trial = ladder.observe().unwrap();
        // From the ground state every proposal adds one quantum.
        assert!(trial >= ladder.current_energy());
        ladder.rollback().unwrap();
    }
    assert_eq!(ladder.total_quanta(), 0);
}

#[test]
fn incremental_energy_matches_recomputation() {
    let mut ladder = LevelLadder::new(8, 0.5).unwrap();
    let mut rng = RngHandle::from_seed(3);
    for step in 0..2000u32 {
        ladder.propose_move(&mut rng).unwrap();
        if step % 4 == 0 {
            ladder.rollback().unwrap();
        } else {
            ladder.commit().unwrap();
        }
        assert!(
            (ladder.current_energy() - ladder.recomputed_energy()).abs() < 1e-9,
            "bookkeeping diverged at step {step}"
        );
    }
}

#[test]
fn restart_artifact_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ladder.json");

    let mut ladder = LevelLadder::new(6, 1.25).unwrap();
    let mut rng = RngHandle::from_seed(13);
    for _ in 0..200 {
        ladder.propose_move(&mut rng).unwrap();
        ladder.commit().unwrap();
    }
    ladder.persist(PersistMode::Restart, &path).unwrap();

    let restored = LevelLadder::from_restart(&path).unwrap();
    assert_eq!(restored.current_energy(), ladder.current_energy());
    assert_eq!(restored.total_quanta(), ladder.total_quanta());
}

#[test]
fn degenerate_ladders_are_rejected() {
    assert!(LevelLadder::new(0, 1.0).is_err());
    assert!(LevelLadder::new(4, 0.0).is_err());
    assert!(LevelLadder::new(4, -1.0).is_err());
}
