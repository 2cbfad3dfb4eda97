use super::{sparse_matrix::SparseMatrix, LinearSolveError, LinearSolver};
use nalgebra::{DMatrix, DVector};

/// Largest system the dense solver will attempt by default
pub const MAX_DENSE_SIZE: usize = 2000;

/// Solve linear systems with Nalgebra's LU decomposition (with partial pivoting)
///
/// The sparse matrix is cast to a dense matrix object, which uses a very large amount of memory when the system is large.
/// This is adequate for the problem sizes of 1D hp-FEM, but an external sparse solver should be used beyond that.
///
/// ```
/// use fem_1d::fem_problem::linalg::{nalgebra_solve::NalgebraLU, sparse_matrix::SparseMatrix, LinearSolver};
///
/// let mut a = SparseMatrix::new(2);
/// a.insert([0, 0], 2.0);
/// a.insert([0, 1], 1.0);
/// a.insert([1, 1], 4.0);
///
/// let x = NalgebraLU::default().solve(&a, &[4.0, 8.0]).unwrap();
/// assert!((x[0] - 1.0).abs() < 1e-14);
/// assert!((x[1] - 2.0).abs() < 1e-14);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct NalgebraLU {
    pub max_dense_size: usize,
}

impl Default for NalgebraLU {
    fn default() -> Self {
        Self {
            max_dense_size: MAX_DENSE_SIZE,
        }
    }
}

impl LinearSolver for NalgebraLU {
    fn solve(&mut self, matrix: &SparseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
        if matrix.dimension > self.max_dense_size {
            return Err(LinearSolveError::ProblemTooLarge(
                matrix.dimension,
                self.max_dense_size,
            ));
        }
        if rhs.len() != matrix.dimension {
            return Err(LinearSolveError::DimensionMismatch(
                rhs.len(),
                matrix.dimension,
            ));
        }

        let lu = DMatrix::from(matrix).lu();
        let b = DVector::from_column_slice(rhs);

        match lu.solve(&b) {
            Some(x) => {
                if x.iter().all(|v| v.is_finite()) {
                    Ok(x.iter().cloned().collect())
                } else {
                    Err(LinearSolveError::NonFiniteSolution)
                }
            }
            None => Err(LinearSolveError::Singular),
        }
    }
}
