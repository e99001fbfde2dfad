use ndarray::{Array2, Axis, Zip};

use crate::factorization::beta_divergence::beta_divergence;
use crate::utils::math_utils::{MathUtils, EPSILON, F64_EPS};

/**
 * X split into its observed values and its observation mask.
 *
 * Missing entries hold 0.0 in `filled` and in `mask`, so they drop out of every
 * product used by the updates. The mask is None when nothing is missing.
 */
struct MaskedData {
    filled: Array2<f64>,
    mask: Option<Array2<f64>>,
}

impl MaskedData {
    fn new(x: &Array2<f64>) -> MaskedData {
        if MathUtils::has_missing(x) {
            MaskedData {
                filled: MathUtils::fill_missing(x, 0.0),
                mask: Some(MathUtils::observed_mask(x)),
            }
        } else {
            MaskedData {
                filled: x.to_owned(),
                mask: None,
            }
        }
    }

    fn apply_mask(&self, mut values: Array2<f64>) -> Array2<f64> {
        if let Some(mask) = &self.mask {
            values *= mask;
        }
        values
    }
}

/**
 * Exponent applied to each multiplicative step, chosen so the objective is
 * non-increasing (Maximization-Minimization, Fevotte & Idier 2011)
 */
fn mm_gamma(beta_loss: f64) -> f64 {
    if beta_loss < 1.0 {
        1.0 / (2.0 - beta_loss)
    } else if beta_loss > 2.0 {
        1.0 / (beta_loss - 1.0)
    } else {
        1.0
    }
}

/**
 * Numerator term shared by the W and H updates for beta != 2:
 * X * WH^(beta - 2), with zeros of WH lifted to EPSILON when beta < 2.
 * Also returns WH^(beta - 1) (zeros lifted when beta < 1), masked, for the denominator.
 */
fn beta_terms(data: &MaskedData, wh: Array2<f64>, beta_loss: f64) -> (Array2<f64>, Array2<f64>) {
    let mut wh_safe_x = wh.clone();
    if beta_loss < 2.0 {
        wh_safe_x.mapv_inplace(|v| if v == 0.0 { EPSILON } else { v });
    }

    Zip::from(&mut wh_safe_x)
        .and(&data.filled)
        .for_each(|wh_val, &x_val| {
            *wh_val = if beta_loss == 1.0 {
                x_val / *wh_val
            } else if beta_loss == 0.0 {
                x_val / (*wh_val * *wh_val)
            } else {
                x_val * wh_val.powf(beta_loss - 2.0)
            };
        });

    let mut wh_beta = wh;
    if beta_loss < 1.0 {
        wh_beta.mapv_inplace(|v| if v == 0.0 { EPSILON } else { v });
    }
    if beta_loss != 1.0 {
        wh_beta.mapv_inplace(|v| v.powf(beta_loss - 1.0));
    }

    (wh_safe_x, data.apply_mask(wh_beta))
}

/// Adds the penalties, lifts zeros of the denominator and returns (numerator / denominator)^gamma
fn finish_delta(
    mut numerator: Array2<f64>,
    mut denominator: Array2<f64>,
    current: &Array2<f64>,
    l1_reg: f64,
    l2_reg: f64,
    gamma: f64,
) -> Array2<f64> {
    if l1_reg > 0.0 {
        denominator.mapv_inplace(|v| v + l1_reg);
    }
    if l2_reg > 0.0 {
        denominator.scaled_add(l2_reg, current);
    }
    denominator.mapv_inplace(|v| if v == 0.0 { EPSILON } else { v });

    numerator /= &denominator;
    if gamma != 1.0 {
        numerator.mapv_inplace(|v| v.powf(gamma));
    }
    numerator
}

/// Multiplicative step for W
fn multiplicative_update_w(
    data: &MaskedData,
    w: &Array2<f64>,
    h: &Array2<f64>,
    beta_loss: f64,
    l1_reg_w: f64,
    l2_reg_w: f64,
    gamma: f64,
) -> Array2<f64> {
    let (numerator, denominator) = if beta_loss == 2.0 {
        let numerator = data.filled.dot(&h.t());
        let denominator = match &data.mask {
            None => w.dot(&h.dot(&h.t())),
            Some(mask) => (w.dot(h) * mask).dot(&h.t()),
        };
        (numerator, denominator)
    } else {
        let (x_over_wh, wh_beta) = beta_terms(data, w.dot(h), beta_loss);
        let numerator = x_over_wh.dot(&h.t());
        let denominator = if beta_loss == 1.0 {
            match &data.mask {
                None => {
                    let h_sum = h.sum_axis(Axis(1));
                    Array2::from_shape_fn(numerator.dim(), |(_, j)| h_sum[j])
                }
                Some(mask) => mask.dot(&h.t()),
            }
        } else {
            wh_beta.dot(&h.t())
        };
        (numerator, denominator)
    };

    finish_delta(numerator, denominator, w, l1_reg_w, l2_reg_w, gamma)
}

/// Multiplicative step for H
fn multiplicative_update_h(
    data: &MaskedData,
    w: &Array2<f64>,
    h: &Array2<f64>,
    beta_loss: f64,
    l1_reg_h: f64,
    l2_reg_h: f64,
    gamma: f64,
) -> Array2<f64> {
    let (numerator, denominator) = if beta_loss == 2.0 {
        let numerator = w.t().dot(&data.filled);
        let denominator = match &data.mask {
            None => w.t().dot(w).dot(h),
            Some(mask) => w.t().dot(&(w.dot(h) * mask)),
        };
        (numerator, denominator)
    } else {
        let (x_over_wh, wh_beta) = beta_terms(data, w.dot(h), beta_loss);
        let numerator = w.t().dot(&x_over_wh);
        let denominator = if beta_loss == 1.0 {
            match &data.mask {
                None => {
                    let mut w_sum = w.sum_axis(Axis(0));
                    w_sum.mapv_inplace(|v| if v == 0.0 { 1.0 } else { v });
                    Array2::from_shape_fn(numerator.dim(), |(i, _)| w_sum[i])
                }
                Some(mask) => w.t().dot(mask),
            }
        } else {
            w.t().dot(&wh_beta)
        };
        (numerator, denominator)
    };

    finish_delta(numerator, denominator, h, l1_reg_h, l2_reg_h, gamma)
}

/**
 * Compute Non-negative Matrix Factorization with Multiplicative Update.
 *
 * The objective function is the beta divergence between X and WH, computed on
 * the observed entries of X, plus the regularization terms. It is minimized
 * with an alternating minimization of W and H, each step multiplying the
 * current factor by a non-negative ratio.
 *
 * Convergence is checked every 10 iterations when tol > 0: the loop stops once
 * the decrease of the error, relative to the error at initialization, is
 * below tol.
 *
 * Returns the factors, the number of iterations performed and whether the
 * tolerance was met.
 *
 * Fevotte, C., & Idier, J. (2011). Algorithms for nonnegative matrix
 * factorization with the beta-divergence. Neural Computation, 23(9).
 */
#[allow(clippy::too_many_arguments)]
pub fn fit_multiplicative_update(
    x: &Array2<f64>,
    mut w: Array2<f64>,
    mut h: Array2<f64>,
    beta_loss: f64,
    max_iter: usize,
    tol: f64,
    l1_reg_w: f64,
    l1_reg_h: f64,
    l2_reg_w: f64,
    l2_reg_h: f64,
    update_h: bool,
) -> (Array2<f64>, Array2<f64>, usize, bool) {
    let data = MaskedData::new(x);
    let gamma = mm_gamma(beta_loss);

    // used for the convergence criterion
    let error_at_init = beta_divergence(x, &w, &h, beta_loss, true);
    let mut previous_error = error_at_init;

    let mut n_iter = 0;
    let mut converged = false;
    for iteration in 1..=max_iter {
        n_iter = iteration;

        let delta_w = multiplicative_update_w(&data, &w, &h, beta_loss, l1_reg_w, l2_reg_w, gamma);
        w *= &delta_w;
        // necessary for stability with beta_loss < 1
        if beta_loss < 1.0 {
            w.mapv_inplace(|v| if v < F64_EPS { 0.0 } else { v });
        }

        if update_h {
            let delta_h = multiplicative_update_h(&data, &w, &h, beta_loss, l1_reg_h, l2_reg_h, gamma);
            h *= &delta_h;
            // necessary for stability with beta_loss <= 1
            if beta_loss <= 1.0 {
                h.mapv_inplace(|v| if v < F64_EPS { 0.0 } else { v });
            }
        }

        if tol > 0.0 && iteration % 10 == 0 {
            let error = beta_divergence(x, &w, &h, beta_loss, true);
            debug!("Epoch {:02} reached error = {}", iteration, error);

            if (previous_error - error) / error_at_init < tol {
                converged = true;
                break;
            }
            previous_error = error;
        }
    }

    (w, h, n_iter, converged)
}
