use wl_core::RngHandle;
use wl_sampler::acceptance::{evaluate, Verdict};
use wl_sampler::config::WindowConfig;
use wl_sampler::histogram::HistogramDos;

fn store_with_dos(values: &[f64]) -> HistogramDos {
    let window = WindowConfig {
        emin: 0.0,
        emax: values.len() as f64,
        bins: values.len(),
    };
    let mut store = HistogramDos::new(&window).unwrap();
    for (index, &value) in values.iter().enumerate() {
        if value != 0.0 {
            let bin = store.bin(index as f64 + 0.5).unwrap();
            store.record_visit(bin, value);
        }
    }
    store
}

#[test]
fn out_of_range_trials_are_rejected_unconditionally() {
    let store = store_with_dos(&[1.0, 2.0]);
    let mut rng = RngHandle::from_seed(1);
    let outcome = evaluate(&store, 0.5, 7.0, &mut rng).unwrap();
    assert_eq!(outcome.verdict, Verdict::OutOfRange);
    assert!(!outcome.accepted());
    assert_eq!(outcome.acceptance_prob, 0.0);
    assert!(outcome.trial_bin.is_none());
}

#[test]
fn downhill_moves_are_certain_without_a_draw() {
    // Trial bin carries a smaller DOS estimate: log ratio is positive.
    let store = store_with_dos(&[5.0, 1.0]);
    for seed in 0..32 {
        let mut rng = RngHandle::from_seed(seed);
        let outcome = evaluate(&store, 0.5, 1.5, &mut rng).unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.acceptance_prob, 1.0);
        assert!(outcome.log_ratio > 0.0);
    }
}

#[test]
fn equal_bins_always_accept() {
    let store = store_with_dos(&[3.0, 3.0]);
    let mut rng = RngHandle::from_seed(11);
    let outcome = evaluate(&store, 0.5, 0.6, &mut rng).unwrap();
    assert_eq!(outcome.verdict, Verdict::Accepted);
    assert_eq!(outcome.log_ratio, 0.0);
}

#[test]
fn steep_uphill_moves_are_rejected_deterministically() {
    // exp of a very negative log ratio underflows to zero acceptance.
    let store = store_with_dos(&[1.0, 2000.0]);
    for seed in 0..32 {
        let mut rng = RngHandle::from_seed(seed);
        let outcome = evaluate(&store, 0.5, 1.5, &mut rng).unwrap();
        assert_eq!(outcome.verdict, Verdict::RejectedByDraw);
        assert!(outcome.acceptance_prob == 0.0);
        assert!(outcome.log_ratio.is_finite());
    }
}

#[test]
fn large_positive_ratios_never_overflow() {
    let store = store_with_dos(&[1e306, 1.0]);
    let mut rng = RngHandle::from_seed(3);
    let outcome = evaluate(&store, 0.5, 1.5, &mut rng).unwrap();
    assert_eq!(outcome.verdict, Verdict::Accepted);
    assert!(outcome.acceptance_prob.is_finite());
    assert_eq!(outcome.acceptance_prob, 1.0);
}

#[test]
fn decisions_are_invariant_under_a_global_dos_shift() {
    let base = [4.0, 9.0, 2.0, 6.0];
    let shifted: Vec<f64> = base.iter().map(|v| v + 123.5).collect();
    let store_a = store_with_dos(&base);
    let store_b = store_with_dos(&shifted);
    for seed in 0..64 {
        for (current, trial) in [(0.5, 1.5), (1.5, 2.5), (2.5, 3.5), (3.5, 0.5)] {
            let mut rng_a = RngHandle::from_seed(seed);
            let mut rng_b = RngHandle::from_seed(seed);
            let a = evaluate(&store_a, current, trial, &mut rng_a).unwrap();
            let b = evaluate(&store_b, current, trial, &mut rng_b).unwrap();
            assert_eq!(a.verdict, b.verdict);
            assert!((a.log_ratio - b.log_ratio).abs() < 1e-9);
        }
    }
}

#[test]
fn current_observable_outside_the_window_is_an_error() {
    let store = store_with_dos(&[1.0, 1.0]);
    let mut rng = RngHandle::from_seed(5);
    let err = evaluate(&store, 9.0, 0.5, &mut rng).unwrap_err();
    assert_eq!(err.info().code, "current-out-of-window");
}
