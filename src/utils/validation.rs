use ndarray::{ArrayBase, Data, Ix2};

use crate::utils::errors::NmfError;

/**
 * Check that there is no negative value in an array.
 *
 * @param x input data
 * @param whom who passed x, used in the error message
 * @param accept_nan when true, NaN entries (missing values) are skipped
 */
pub fn check_non_negative<S>(x: &ArrayBase<S, Ix2>, whom: &str, accept_nan: bool) -> Result<(), NmfError>
where
    S: Data<Elem = f64>,
{
    if !accept_nan && x.iter().any(|v| v.is_nan()) {
        return Err(NmfError::NanValues(whom.to_string()));
    }

    if x.iter().any(|&v| v < 0.0) {
        return Err(NmfError::NegativeValues(whom.to_string()));
    }

    Ok(())
}

pub fn check_finite<S>(x: &ArrayBase<S, Ix2>) -> Result<(), NmfError>
where
    S: Data<Elem = f64>,
{
    if x.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(NmfError::NonFinite)
    }
}

/**
 * Validates a user supplied W or H: finite, of the expected shape, non-negative and not all zeros
 */
pub fn check_init<S>(a: &ArrayBase<S, Ix2>, shape: (usize, usize), whom: &str) -> Result<(), NmfError>
where
    S: Data<Elem = f64>,
{
    check_finite(a)?;
    if a.dim() != shape {
        return Err(NmfError::WrongShape {
            whom: whom.to_string(),
            expected: shape,
            got: a.dim(),
        });
    }
    check_non_negative(a, whom, false)?;
    if a.iter().all(|&v| v == 0.0) {
        return Err(NmfError::AllZeros(whom.to_string()));
    }

    Ok(())
}

pub fn check_n_components(n_components: usize) -> Result<usize, NmfError> {
    if n_components == 0 {
        Err(NmfError::InvalidComponents(n_components))
    } else {
        Ok(n_components)
    }
}

pub fn check_tol(tol: f64) -> Result<f64, NmfError> {
    if tol.is_nan() || tol < 0.0 {
        Err(NmfError::InvalidTolerance(tol))
    } else {
        Ok(tol)
    }
}
