use ndarray::ShapeError;
use ndarray_npy::{ReadNpyError, WriteNpyError};
use thiserror::Error;

/**
 * Every failure mode of the factorization library and the matrix readers/writers.
 *
 * The messages of the validation variants are stable and are matched on by callers and tests.
 */
#[derive(Debug, Error)]
pub enum NmfError {
    #[error("Negative values in data passed to {0}")]
    NegativeValues(String),
    #[error("NaN values in data passed to {0}")]
    NanValues(String),
    #[error("Input contains NaN, infinity or a value too large for dtype('float64').")]
    NonFinite,
    #[error("Array with wrong shape passed to {whom}. Expected {expected:?}, but got {got:?} ")]
    WrongShape {
        whom: String,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Array passed to {0} is full of zeros.")]
    AllZeros(String),
    #[error("No array passed to {0}")]
    MissingArray(String),
    #[error("Invalid {parameter} parameter: got '{got}' instead of one of {allowed}")]
    InvalidParameter {
        parameter: &'static str,
        got: String,
        allowed: String,
    },
    #[error("Invalid {parameter} parameter: '{got}' is not a valid number")]
    InvalidNumber { parameter: &'static str, got: String },
    #[error("Invalid beta_loss parameter: solver '{solver}' does not handle beta_loss = {beta_loss}")]
    UnsupportedBetaLoss { solver: String, beta_loss: String },
    #[error("Number of components must be a positive integer; got (n_components={0})")]
    InvalidComponents(usize),
    #[error("Tolerance for stopping criteria must be positive; got (tol={0})")]
    InvalidTolerance(f64),
    #[error(
        "init = '{0}' can only be used when n_components <= min(n_samples, n_features)"
    )]
    TooManyComponents(String),
    #[error("initializations with NNDSVD are not available with missing values (NaN).")]
    NndsvdWithMissing,
    #[error("NMF solver '{0}' cannot handle missing values (NaN). Use solver 'mu'.")]
    SolverMissingValues(String),
    #[error(
        "When beta_loss <= 0 and X contains zeros, the solver may diverge. \
         Please add small values to X, or use a positive beta_loss."
    )]
    DivergentBetaLoss,
    #[error(
        "This NMF instance is not fitted yet. \
         Call 'fit' with appropriate arguments before using this method."
    )]
    NotFitted,
    #[error("Singular value decomposition did not converge")]
    SvdNoConvergence,
    #[error("Invalid parameters: {0}")]
    Params(String),
    #[error("Unable to parse value '{value}' at row {row}, column {column}")]
    MatrixParse {
        row: usize,
        column: usize,
        value: String,
    },
    #[error("Matrix file {0} contains no values")]
    EmptyMatrix(String),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    ReadNpy(#[from] ReadNpyError),
    #[error(transparent)]
    WriteNpy(#[from] WriteNpyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_shape_message() {
        let err = NmfError::WrongShape {
            whom: "NMF (input H)".to_string(),
            expected: (2, 3),
            got: (3, 2),
        };
        assert_eq!(
            err.to_string(),
            "Array with wrong shape passed to NMF (input H). Expected (2, 3), but got (3, 2) "
        );
    }

    #[test]
    fn test_divergent_message() {
        assert!(NmfError::DivergentBetaLoss
            .to_string()
            .starts_with("When beta_loss <= 0 and X contains zeros, the solver may diverge."));
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = NmfError::InvalidParameter {
            parameter: "solver",
            got: "spam".to_string(),
            allowed: "('cd', 'mu')".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid solver parameter: got 'spam' instead of one of ('cd', 'mu')"
        );
    }
}
