/// Dense LU factorization through Nalgebra (small problems only)
pub mod nalgebra_solve;
/// Sparsely Packed Matrix
pub mod sparse_matrix;

use sparse_matrix::SparseMatrix;

use bytes::{BufMut, BytesMut};
use std::fs::File;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// An external service which solves square linear systems `A x = b`
///
/// Implementations may be stateful (e.g. to reuse a factorization or a scratch directory)
pub trait LinearSolver {
    fn solve(&mut self, matrix: &SparseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError>;
}

/// A Jacobian matrix and residual vector produced by one assembly pass
#[derive(Clone, Debug)]
pub struct LinearSystem {
    pub jacobian: SparseMatrix,
    pub residual: Vec<f64>,
}

impl LinearSystem {
    pub fn new(num_dofs: usize) -> Self {
        Self {
            jacobian: SparseMatrix::new(num_dofs),
            residual: vec![0.0; num_dofs],
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.residual.len()
    }

    /// Euclidean norm of the residual vector
    pub fn residual_norm(&self) -> f64 {
        self.residual.iter().map(|r| r.powi(2)).sum::<f64>().sqrt()
    }

    /// Write the Jacobian and residual to `{dir}/{prefix}_jacobian.dat` and `{dir}/{prefix}_residual.dat` in PETSc's binary format
    pub fn print_to_petsc_binary_files(
        &self,
        dir: impl AsRef<str>,
        prefix: impl AsRef<str>,
    ) -> std::io::Result<()> {
        self.jacobian.write_petsc_binary(format!(
            "{}/{}_jacobian.dat",
            dir.as_ref(),
            prefix.as_ref()
        ))?;
        write_petsc_vec_binary(
            &self.residual,
            format!("{}/{}_residual.dat", dir.as_ref(), prefix.as_ref()),
        )
    }
}

/// PETSc's class id for binary vector files
const PETSC_VEC_FILE_CLASSID: u32 = 1211214;

fn write_petsc_vec_binary(values: &[f64], path: impl AsRef<str>) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(8 + values.len() * 8);
    buf.put_u32(PETSC_VEC_FILE_CLASSID);
    buf.put_u32(values.len() as u32);
    for &v in values {
        buf.put_f64(v);
    }

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(buf.as_ref())?;
    writer.flush()
}

/// Error type for [LinearSolver]s
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinearSolveError {
    #[error("Matrix is singular; cannot solve linear system!")]
    Singular,
    #[error("System of size {0} exceeds the maximum size ({1}) of this solver!")]
    ProblemTooLarge(usize, usize),
    #[error("Right-hand-side has length {0}, but the matrix has dimension {1}!")]
    DimensionMismatch(usize, usize),
    #[error("Solution contains non-finite values!")]
    NonFiniteSolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn petsc_system_export() {
        let mut system = LinearSystem::new(3);
        system.jacobian.insert([0, 0], 2.0);
        system.jacobian.insert([1, 2], -1.0);
        system.residual = vec![3.0, 4.0, 0.0];
        assert_eq!(system.num_dofs(), 3);
        assert!((system.residual_norm() - 5.0).abs() < 1e-15);

        let dir = std::env::temp_dir();
        let dir = dir.to_string_lossy();
        system
            .print_to_petsc_binary_files(&dir, "fem_1d_linalg_test")
            .unwrap();

        let residual = std::fs::read(format!("{}/fem_1d_linalg_test_residual.dat", dir)).unwrap();
        assert_eq!(residual.len(), 8 + 3 * 8);
        assert_eq!(&residual[0..4], &PETSC_VEC_FILE_CLASSID.to_be_bytes());
        assert_eq!(&residual[8..16], &3.0_f64.to_be_bytes());

        let jacobian = std::fs::read(format!("{}/fem_1d_linalg_test_jacobian.dat", dir)).unwrap();
        assert_eq!(jacobian.len(), 16 + 3 * 4 + 2 * 4 + 2 * 8);
    }
}
