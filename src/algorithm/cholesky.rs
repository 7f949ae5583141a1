//! Symmetric positive definite solves for normal equations

use crate::error::{Error, Result};

/// Lower Cholesky factor of a row-major `n x n` matrix
///
/// Cholesky–Banachiewicz, row by row. Fails with a computation error if the
/// matrix is not positive definite.
pub(crate) fn decompose(a: &[f64], n: usize) -> Result<Vec<f64>> {
    debug_assert_eq!(a.len(), n * n);
    let mut l = vec![0.0; n * n];

    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum();
            if i == j {
                let diag = a[i * n + i] - dot;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(Error::computation(format!(
                        "matrix is not positive definite (pivot {i} is {diag})"
                    )));
                }
                l[i * n + i] = diag.sqrt();
            } else {
                l[i * n + j] = (a[i * n + j] - dot) / l[j * n + j];
            }
        }
    }
    Ok(l)
}

/// Solve `L Lᵀ x = b` in place
pub(crate) fn solve_in_place(l: &[f64], n: usize, b: &mut [f64]) {
    debug_assert_eq!(b.len(), n);
    // forward: L y = b
    for i in 0..n {
        let dot: f64 = (0..i).map(|k| l[i * n + k] * b[k]).sum();
        b[i] = (b[i] - dot) / l[i * n + i];
    }
    // backward: Lᵀ x = y
    for i in (0..n).rev() {
        let dot: f64 = (i + 1..n).map(|k| l[k * n + i] * b[k]).sum();
        b[i] = (b[i] - dot) / l[i * n + i];
    }
}
