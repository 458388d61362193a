//! Pairwise cosine similarity between customer rows

use ndarray::{Array1, Array2};
use tracing::debug;

/// Norms at or below this are treated as zero vectors
pub const ZERO_NORM_EPSILON: f64 = 1e-12;

/// Symmetric customer x customer cosine similarity matrix with unit diagonal.
///
/// A customer whose centred row is all zeros has similarity 0 to every other
/// customer and 1 to itself.
pub fn similarity_matrix(rows: &Array2<f64>) -> Array2<f64> {
    let n = rows.nrows();
    let norms: Array1<f64> = rows.outer_iter().map(|row| row.dot(&row).sqrt()).collect();

    let degenerate = norms.iter().filter(|&&norm| norm <= ZERO_NORM_EPSILON).count();
    if degenerate > 0 {
        debug!(degenerate, "zero-norm customer rows get similarity 0");
    }

    let mut similarity = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        similarity[[i, i]] = 1.0;
        if norms[i] <= ZERO_NORM_EPSILON {
            continue;
        }
        let row_i = rows.row(i);
        for j in (i + 1)..n {
            if norms[j] <= ZERO_NORM_EPSILON {
                continue;
            }
            let value = (row_i.dot(&rows.row(j)) / (norms[i] * norms[j])).clamp(-1.0, 1.0);
            similarity[[i, j]] = value;
            similarity[[j, i]] = value;
        }
    }
    similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayView1};

    /// Cosine similarity of two vectors, clamped to [-1, 1].
    ///
    /// Returns 0.0 when either vector has zero norm.
    fn cosine_similarity(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        let norm_a = a.dot(a).sqrt();
        let norm_b = b.dot(b).sqrt();
        if norm_a <= ZERO_NORM_EPSILON || norm_b <= ZERO_NORM_EPSILON {
            return 0.0;
        }
        (a.dot(b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }

    #[test]
    fn test_cosine_similarity() {
        let a = array![1.0, 0.0, 1.0];
        let b = array![2.0, 0.0, 2.0];
        let c = array![-1.0, 0.0, -1.0];
        let zero = array![0.0, 0.0, 0.0];

        assert!((cosine_similarity(&a.view(), &b.view()) - 1.0).abs() < 1e-12);
        assert!((cosine_similarity(&a.view(), &c.view()) + 1.0).abs() < 1e-12);
        assert_eq!(cosine_similarity(&a.view(), &zero.view()), 0.0);
    }

    #[test]
    fn test_matrix_is_symmetric_with_unit_diagonal() {
        let rows = array![
            [3.0, -1.0, -2.0],
            [1.0, 1.0, -2.0],
            [-2.0, 4.0, -2.0],
            [0.5, 0.25, -0.75]
        ];
        let sim = similarity_matrix(&rows);

        for i in 0..4 {
            assert_eq!(sim[[i, i]], 1.0);
            for j in 0..4 {
                assert_eq!(sim[[i, j]], sim[[j, i]]);
                assert!(sim[[i, j]] >= -1.0 && sim[[i, j]] <= 1.0);
            }
        }
        let expected = cosine_similarity(&rows.row(0), &rows.row(2));
        assert!((sim[[0, 2]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_norm_row_is_isolated() {
        let rows = array![[0.0, 0.0], [1.0, -1.0], [2.0, -2.0]];
        let sim = similarity_matrix(&rows);

        assert_eq!(sim[[0, 0]], 1.0);
        assert_eq!(sim[[0, 1]], 0.0);
        assert_eq!(sim[[2, 0]], 0.0);
        assert!((sim[[1, 2]] - 1.0).abs() < 1e-12);
        assert!(sim.iter().all(|v| v.is_finite()));
    }
}
