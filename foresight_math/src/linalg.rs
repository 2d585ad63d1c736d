//! Dense linear algebra for small systems

use crate::{MathError, Result};

const PIVOT_EPSILON: f64 = 1e-12;

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
///
/// `a` is row-major and square. A pivot smaller than `1e-12` (relative to the
/// largest absolute entry) is reported as [`MathError::SingularMatrix`].
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {}x{} system",
            n, n
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    // Augmented matrix
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();

    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        let pivot = m[pivot_row][col];
        if !pivot.is_finite() || pivot.abs() < PIVOT_EPSILON * scale {
            return Err(MathError::SingularMatrix { pivot: col, value: pivot });
        }
        m.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=n {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (m[row][n] - tail) / m[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Solution contains non-finite values".to_string(),
        ));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_two_by_two() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(&a, &[3.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.4, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_system() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let err = solve(&a, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, MathError::SingularMatrix { pivot: 1, .. }));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![vec![1.0, 2.0]];
        assert!(matches!(
            solve(&a, &[1.0]),
            Err(MathError::InvalidInput(_))
        ));
    }
}
