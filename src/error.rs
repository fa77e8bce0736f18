// src/error.rs

use crate::linalg_backends::ThreadSafeStdError;
use std::error::Error;
use std::fmt;

/// Which input table a validation error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableRole {
    Training,
    Test,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRole::Training => write!(f, "training"),
            TableRole::Test => write!(f, "test"),
        }
    }
}

/// Every way a call to [`crate::reduce`] can fail. Failures are terminal for
/// the call: no reduced table is returned alongside an error.
#[derive(Debug)]
pub enum ReduceError {
    /// The training table has zero rows or zero columns.
    EmptyInput { rows: usize, cols: usize },
    /// Training and test tables disagree on the number of columns.
    ShapeMismatch { training_cols: usize, test_cols: usize },
    /// The requested number of components is zero or exceeds `min(N, D)`.
    InvalidRank { requested: usize, max: usize },
    /// A cell holds NaN or an infinity.
    NonFiniteInput { table: TableRole, row: usize, col: usize },
    /// A retained singular value is too small to whiten by.
    SingularValueUnderflow {
        component: usize,
        singular_value: f64,
        floor: f64,
    },
    /// The SVD backend reported an error.
    Factorization(ThreadSafeStdError),
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceError::EmptyInput { rows, cols } => write!(
                f,
                "Training table must have at least one row and one column, got {}x{}.",
                rows, cols
            ),
            ReduceError::ShapeMismatch { training_cols, test_cols } => write!(
                f,
                "Test table has {} columns but the training table has {}.",
                test_cols, training_cols
            ),
            ReduceError::InvalidRank { requested, max } => write!(
                f,
                "Requested {} components; must be between 1 and min(n_samples, n_features) = {}.",
                requested, max
            ),
            ReduceError::NonFiniteInput { table, row, col } => write!(
                f,
                "The {} table contains a non-finite value at row {}, column {}.",
                table, row, col
            ),
            ReduceError::SingularValueUnderflow { component, singular_value, floor } => write!(
                f,
                "Singular value {:e} of component {} is at or below the floor {:e}; whitening would not be finite.",
                singular_value, component, floor
            ),
            ReduceError::Factorization(e) => write!(f, "SVD of the centered training table failed: {}", e),
        }
    }
}

impl Error for ReduceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReduceError::Factorization(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<ThreadSafeStdError> for ReduceError {
    fn from(e: ThreadSafeStdError) -> Self {
        ReduceError::Factorization(e)
    }
}
