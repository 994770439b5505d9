//! Dense LU decomposition with partial pivoting.
//!
//! Systems are assembled as `ndarray` matrices and factorised with
//! `nalgebra`'s LU.

use nalgebra::{DMatrix, DVector, Dyn, linalg::LU};
use ndarray::{Array1, Array2};

/// Errors from factorising or solving a linear system.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("System matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("System matrix has a non-finite entry at ({row}, {col})")]
    NonFinite { row: usize, col: usize },
    #[error("Right hand side has length {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("System matrix is singular (zero pivot in column {column})")]
    Singular { column: usize },
}

impl SolveError {
    /// Singular systems are an expected outcome of evolution (closed cycles)
    /// and are handled by the caller, everything else aborts the run.
    #[inline]
    pub fn is_singular(&self) -> bool {
        matches!(self, Self::Singular { .. })
    }
}

/// `P A = L U` factorisation of a square matrix.
///
/// Factorisation always succeeds on finite input: a zero pivot column is
/// left in place and only reported when solving.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: LU<f64, Dyn, Dyn>,
    dim: usize,
    /// First column of `U` with a zero on the diagonal.
    singular: Option<usize>,
}

impl LuDecomposition {
    pub fn new(a: Array2<f64>) -> Result<Self, SolveError> {
        let (rows, cols) = a.dim();
        if rows != cols {
            return Err(SolveError::NotSquare { rows, cols });
        }
        if let Some(((row, col), _)) = a.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(SolveError::NonFinite { row, col });
        }

        let lu = DMatrix::from_fn(rows, cols, |i, j| a[[i, j]]).lu();
        let singular = lu.u().diagonal().iter().position(|&d| d == 0.0);
        Ok(Self {
            lu,
            dim: rows,
            singular,
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// First column with a zero pivot, if any.
    pub fn singular_column(&self) -> Option<usize> {
        self.singular
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>, SolveError> {
        let n = self.dim();
        if b.len() != n {
            return Err(SolveError::DimensionMismatch {
                expected: n,
                got: b.len(),
            });
        }

        let rhs = DVector::from_iterator(n, b.iter().copied());
        match self.lu.solve(&rhs) {
            Some(x) => Ok(x.iter().copied().collect()),
            None => Err(SolveError::Singular {
                column: self.singular.unwrap_or_default(),
            }),
        }
    }

    /// Solve against the `n`-th standard basis vector.
    pub fn solve_unit(&self, n: usize) -> Result<Array1<f64>, SolveError> {
        let mut e = Array1::zeros(self.dim());
        e[n] = 1.0;
        self.solve(&e)
    }
}
