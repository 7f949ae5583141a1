//! Common test utilities
#![allow(dead_code)]

use dalcore::table::Table;

/// Install a fmt subscriber once; later calls are no-ops
///
/// Output goes through the test harness writer, so it only shows for
/// failing tests or with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f64 slices are bitwise identical
pub fn assert_bits_eq(a: &[f64], b: &[f64], msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert_eq!(x.to_bits(), y.to_bits(), "{}: element {} differs: {} vs {}", msg, i, x, y);
    }
}

/// 4x4 row-major matrix holding 0..16
pub fn square_4x4() -> Vec<f64> {
    (0..16).map(f64::from).collect()
}

/// Integer-valued `rows x cols` dataset, so sums are exact in any order
pub fn integer_dataset(rows: usize, cols: usize) -> Vec<f64> {
    (0..rows * cols)
        .map(|i| ((i * 7 + 3) % 11) as f64 - 5.0)
        .collect()
}

/// Dense f64 table over [`integer_dataset`]
pub fn integer_table(rows: usize, cols: usize) -> Table {
    Table::from_rows(integer_dataset(rows, cols), rows, cols).unwrap()
}

/// Smoothly varying non-integer dataset, for tolerance comparisons
pub fn real_dataset(rows: usize, cols: usize) -> Vec<f64> {
    (0..rows * cols)
        .map(|i| {
            let x = i as f64;
            (x * 0.37).sin() * 10.0 + (x * 0.11).cos()
        })
        .collect()
}
