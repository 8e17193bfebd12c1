//! LU decomposition with partial pivoting

/// Pivots below this magnitude are treated as singular.
pub const SINGULAR_PIVOT: f64 = 1e-9;

/// Factor a row-major `n`x`n` matrix in place.
///
/// Returns `false` at the first column whose largest remaining pivot is below
/// [`SINGULAR_PIVOT`] instead of dividing by it.
pub fn lu_decompose(matrix: &mut [f64], n: usize) -> bool {
    debug_assert_eq!(matrix.len(), n * n);

    for i in 0..n {
        let mut max_row = i;
        let mut max_el = matrix[i * n + i].abs();
        for k in (i + 1)..n {
            let candidate = matrix[k * n + i].abs();
            if candidate > max_el {
                max_el = candidate;
                max_row = k;
            }
        }

        if max_row != i {
            for k in i..n {
                matrix.swap(max_row * n + k, i * n + k);
            }
        }

        let diag = matrix[i * n + i];
        if diag.abs() < SINGULAR_PIVOT {
            return false;
        }

        for k in (i + 1)..n {
            let c = -matrix[k * n + i] / diag;
            matrix[k * n + i] = 0.0;
            for j in (i + 1)..n {
                matrix[k * n + j] += c * matrix[i * n + j];
            }
        }
    }

    true
}

/// Build the fixed diagonally-dominant test matrix and factor it.
pub fn lu_kernel(n: usize) -> bool {
    let mut matrix = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut value = ((i * j + j) % 10) as f64;
            if i == j {
                value += n as f64;
            }
            matrix[i * n + j] = value;
        }
    }
    lu_decompose(&mut matrix, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_conditioned_matrix_factors() {
        assert!(lu_kernel(32));
        assert!(lu_kernel(100));
    }

    #[test]
    fn zero_pivot_column_is_singular() {
        // Column 0 is all zeros: no row swap can rescue step 0.
        let mut matrix = vec![
            0.0, 1.0, 2.0, //
            0.0, 3.0, 4.0, //
            0.0, 5.0, 6.0,
        ];
        assert!(!lu_decompose(&mut matrix, 3));
    }

    #[test]
    fn zero_diagonal_is_rescued_by_pivoting() {
        let mut matrix = vec![
            0.0, 1.0, //
            2.0, 3.0,
        ];
        assert!(lu_decompose(&mut matrix, 2));
        // Rows swapped, then eliminated below the pivot.
        assert_eq!(matrix, vec![2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn rank_deficient_matrix_fails_at_later_step() {
        let mut matrix = vec![
            1.0, 2.0, //
            2.0, 4.0,
        ];
        assert!(!lu_decompose(&mut matrix, 2));
    }

    #[test]
    fn empty_matrix_trivially_factors() {
        assert!(lu_decompose(&mut [], 0));
    }
}
