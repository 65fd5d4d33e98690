use rand::RngCore;
use wl_core::rng::{derive_substream_seed, RngHandle};

#[test]
fn rng_emits_reproducible_sequence() {
    let mut rng_a = RngHandle::from_seed(1234);
    let mut rng_b = RngHandle::from_seed(1234);

    let seq_a: Vec<u64> = (0..100).map(|_| rng_a.next_u64()).collect();
    let seq_b: Vec<u64> = (0..100).map(|_| rng_b.next_u64()).collect();

    assert_eq!(seq_a, seq_b);
}

#[test]
fn uniform_draws_stay_in_unit_interval() {
    let mut rng = RngHandle::from_seed(9);
    for _ in 0..10_000 {
        let draw = rng.uniform();
        assert!((0.0..1.0).contains(&draw));
    }
}

#[test]
fn substream_seeds_are_stable_and_distinct() {
    let a = derive_substream_seed(7, 0);
    let b = derive_substream_seed(7, 0);
    let c = derive_substream_seed(7, 1);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
