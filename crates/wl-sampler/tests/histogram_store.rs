use wl_sampler::config::WindowConfig;
use wl_sampler::histogram::HistogramDos;

fn sample_window() -> WindowConfig {
    WindowConfig {
        emin: 0.0,
        emax: 10.0,
        bins: 10,
    }
}

#[test]
fn bin_lookup_covers_the_half_open_window() {
    let store = HistogramDos::new(&sample_window()).unwrap();
    assert_eq!(store.bin(0.0).unwrap().index(), 0);
    assert_eq!(store.bin(5.0).unwrap().index(), 5);
    assert_eq!(store.bin(9.999).unwrap().index(), 9);
    assert!(store.bin(10.0).is_none());
    assert!(store.bin(-0.001).is_none());
    assert!(store.bin(f64::NAN).is_none());
    assert!(store.bin(f64::INFINITY).is_none());
}

#[test]
fn out_of_range_values_are_never_clamped() {
    let store = HistogramDos::new(&sample_window()).unwrap();
    // A clamped lookup would return the edge bins here.
    assert!(store.bin(10.5).is_none());
    assert!(store.bin(-3.0).is_none());
}

#[test]
fn record_visit_updates_count_and_dos_additively() {
    let mut store = HistogramDos::new(&sample_window()).unwrap();
    let bin = store.bin(2.5).unwrap();
    store.record_visit(bin, 1.0);
    store.record_visit(bin, 0.5);
    assert_eq!(store.count(bin), 2);
    assert!((store.log_dos(bin) - 1.5).abs() < 1e-12);
}

#[test]
fn reset_preserves_dos_and_touched_marks() {
    let mut store = HistogramDos::new(&sample_window()).unwrap();
    let bin = store.bin(7.0).unwrap();
    store.record_visit(bin, 1.0);
    store.reset_histogram();
    assert_eq!(store.count(bin), 0);
    assert!((store.log_dos(bin) - 1.0).abs() < 1e-12);
    assert_eq!(store.never_visited_bins(), 9);
    assert_eq!(store.unvisited_bins(), 10);
}

#[test]
fn refresh_clears_only_lagging_bins_and_keeps_dos() {
    let mut store = HistogramDos::new(&sample_window()).unwrap();
    let busy = store.bin(1.5).unwrap();
    let lagging = store.bin(8.5).unwrap();
    for _ in 0..100 {
        store.record_visit(busy, 1.0);
    }
    store.record_visit(lagging, 1.0);
    // mean over visited bins is (100 + 1) / 2; the lagging bin sits far below.
    let cleared = store.refresh(0.5);
    assert_eq!(cleared, 1);
    assert_eq!(store.count(lagging), 0);
    assert_eq!(store.count(busy), 100);
    assert!((store.log_dos(lagging) - 1.0).abs() < 1e-12);
}

#[test]
fn refresh_on_empty_histogram_is_a_no_op() {
    let mut store = HistogramDos::new(&sample_window()).unwrap();
    assert_eq!(store.refresh(0.5), 0);
}

#[test]
fn normalized_export_shifts_minimum_touched_value_to_zero() {
    let mut store = HistogramDos::new(&sample_window()).unwrap();
    let low = store.bin(0.5).unwrap();
    let high = store.bin(9.5).unwrap();
    store.record_visit(low, 2.0);
    for _ in 0..3 {
        store.record_visit(high, 2.0);
    }
    let export = store.normalized_dos();
    assert_eq!(export.len(), 10);
    assert!((export[low.index()].log_dos - 0.0).abs() < 1e-12);
    assert!((export[high.index()].log_dos - 4.0).abs() < 1e-12);
    assert!(export[low.index()].touched);
    assert!(!export[1].touched);
    // Differences are preserved by the shift.
    let delta = export[high.index()].log_dos - export[low.index()].log_dos;
    assert!((delta - (store.log_dos(high) - store.log_dos(low))).abs() < 1e-12);
}

#[test]
fn state_roundtrip_is_exact() {
    let mut store = HistogramDos::new(&sample_window()).unwrap();
    for value in [0.5, 3.2, 3.4, 9.9] {
        let bin = store.bin(value).unwrap();
        store.record_visit(bin, 0.125);
    }
    let state = store.state();
    let restored = HistogramDos::from_state(&state).unwrap();
    assert_eq!(restored.state(), state);
}

#[test]
fn degenerate_windows_are_rejected() {
    let inverted = WindowConfig {
        emin: 5.0,
        emax: 5.0,
        bins: 10,
    };
    assert!(HistogramDos::new(&inverted).is_err());
    let empty = WindowConfig {
        emin: 0.0,
        emax: 1.0,
        bins: 0,
    };
    assert!(HistogramDos::new(&empty).is_err());
}
