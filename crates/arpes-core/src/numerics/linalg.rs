use faer::Mat;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-300;
const ILL_CONDITIONED_RELATIVE_PIVOT_EPSILON: f64 = 1.0e-14;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LuError {
    #[error("LU factorization requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("LU factorization requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Partial-pivoting LU factors of a small dense real matrix, stored packed
/// (unit lower triangle below the diagonal, upper triangle on and above).
#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition {
    lu: Mat<f64>,
    pivots: Vec<usize>,
}

impl LuDecomposition {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(LuError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = rhs[self.pivots[row]];
            for col in 0..row {
                value -= self.lu[(row, col)] * forward[col];
            }
            forward[row] = value;
        }

        let mut solution = vec![0.0; dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            for col in (row + 1)..dimension {
                value -= self.lu[(row, col)] * solution[col];
            }
            solution[row] = value / self.lu[(row, row)];
        }

        Ok(solution)
    }
}

pub fn lu_factorize(matrix: &Mat<f64>) -> Result<LuDecomposition, LuError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows == 0 || cols == 0 {
        return Err(LuError::EmptyMatrix);
    }
    if rows != cols {
        return Err(LuError::NonSquareMatrix { rows, cols });
    }

    let dimension = rows;
    let scale = (0..dimension)
        .map(|row| (0..dimension).map(|col| matrix[(row, col)].abs()).sum::<f64>())
        .fold(0.0_f64, f64::max);
    let mut lu = matrix.clone();
    let mut pivots: Vec<usize> = (0..dimension).collect();

    for pivot_col in 0..dimension {
        let mut pivot_row = pivot_col;
        for row in (pivot_col + 1)..dimension {
            if lu[(row, pivot_col)].abs() > lu[(pivot_row, pivot_col)].abs() {
                pivot_row = row;
            }
        }

        let pivot_magnitude = lu[(pivot_row, pivot_col)].abs();
        if !pivot_magnitude.is_finite()
            || pivot_magnitude <= SINGULAR_PIVOT_EPSILON
            || pivot_magnitude <= ILL_CONDITIONED_RELATIVE_PIVOT_EPSILON * scale
        {
            return Err(LuError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            for col in 0..dimension {
                let upper = lu[(pivot_col, col)];
                lu[(pivot_col, col)] = lu[(pivot_row, col)];
                lu[(pivot_row, col)] = upper;
            }
            pivots.swap(pivot_col, pivot_row);
        }

        let pivot = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            lu[(row, pivot_col)] /= pivot;
            let multiplier = lu[(row, pivot_col)];
            for col in (pivot_col + 1)..dimension {
                let updated = lu[(row, col)] - multiplier * lu[(pivot_col, col)];
                lu[(row, col)] = updated;
            }
        }
    }

    Ok(LuDecomposition { lu, pivots })
}

pub fn lu_solve(matrix: &Mat<f64>, rhs: &[f64]) -> Result<Vec<f64>, LuError> {
    lu_factorize(matrix)?.solve(rhs)
}

#[cfg(test)]
mod tests {
    use super::{LuError, lu_factorize, lu_solve};
    use faer::Mat;

    #[test]
    fn solves_pivoted_three_by_three_system() {
        let values = [[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [3.0, 0.0, 1.0]];
        let matrix = Mat::from_fn(3, 3, |row, col| values[row][col]);
        let expected = [1.0, -2.0, 0.5];
        let rhs: Vec<f64> = (0..3)
            .map(|row| (0..3).map(|col| values[row][col] * expected[col]).sum())
            .collect();

        let solution = lu_solve(&matrix, &rhs).expect("system should solve");
        for (actual, expected) in solution.iter().zip(expected) {
            assert!((actual - expected).abs() < 1.0e-12, "{actual} vs {expected}");
        }
    }

    #[test]
    fn rejects_singular_and_malformed_inputs() {
        let singular = Mat::from_fn(2, 2, |row, _| if row == 0 { 1.0 } else { 2.0 });
        assert!(matches!(
            lu_factorize(&singular),
            Err(LuError::SingularMatrix { pivot_index: 1 })
        ));

        let rectangular = Mat::<f64>::zeros(2, 3);
        assert_eq!(
            lu_factorize(&rectangular),
            Err(LuError::NonSquareMatrix { rows: 2, cols: 3 })
        );

        let identity = Mat::from_fn(2, 2, |row, col| if row == col { 1.0 } else { 0.0 });
        let lu = lu_factorize(&identity).expect("identity factors");
        assert_eq!(
            lu.solve(&[1.0]),
            Err(LuError::RhsLengthMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}
