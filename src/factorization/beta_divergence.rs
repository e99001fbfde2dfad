use ndarray::Array2;

use crate::utils::math_utils::EPSILON;

/**
 * Compute the beta-divergence of X and dot(W, H).
 *
 * Missing entries of X (NaN) are ignored, so a matrix with missing values is
 * compared to its estimate on the observed entries only.
 *
 * @param x data matrix, NaN marks a missing value
 * @param w first factor, n_samples x n_components
 * @param h second factor, n_components x n_features
 * @param beta the beta parameter of the divergence. 2 is half the squared
 *        Frobenius norm, 1 is Kullback-Leibler, 0 is Itakura-Saito
 * @param square_root return sqrt(2 * divergence) instead of the divergence
 */
pub fn beta_divergence(
    x: &Array2<f64>,
    w: &Array2<f64>,
    h: &Array2<f64>,
    beta: f64,
    square_root: bool,
) -> f64 {
    let wh = w.dot(h);
    let observed = x
        .iter()
        .zip(wh.iter())
        .filter(|(x_val, _)| !x_val.is_nan());

    let res = if beta == 2.0 {
        observed
            .map(|(x_val, wh_val)| (x_val - wh_val).powi(2))
            .sum::<f64>()
            / 2.0
    } else {
        // entries of X below EPSILON contribute nothing except through sum(WH)
        let mut n_observed = 0.0;
        let mut sum_wh = 0.0;
        let mut sum_wh_beta = 0.0;
        let mut sum_x = 0.0;
        let mut sum_x_beta = 0.0;
        let mut sum_x_wh = 0.0;
        let mut sum_div = 0.0;
        let mut sum_log_div = 0.0;

        for (&x_val, &wh_val) in observed {
            n_observed += 1.0;
            sum_wh += wh_val;
            if beta != 1.0 && beta != 0.0 {
                sum_wh_beta += wh_val.powf(beta);
            }

            if x_val > EPSILON {
                let wh_safe = if wh_val == 0.0 { EPSILON } else { wh_val };
                let div = x_val / wh_safe;
                sum_x += x_val;
                if beta == 1.0 {
                    sum_x_wh += x_val * div.ln();
                } else if beta == 0.0 {
                    sum_div += div;
                    sum_log_div += div.ln();
                } else {
                    sum_x_beta += x_val.powf(beta);
                    sum_x_wh += x_val * wh_safe.powf(beta - 1.0);
                }
            }
        }

        if beta == 1.0 {
            sum_x_wh + sum_wh - sum_x
        } else if beta == 0.0 {
            sum_div - n_observed - sum_log_div
        } else {
            (sum_x_beta - beta * sum_x_wh + (beta - 1.0) * sum_wh_beta) / (beta * (beta - 1.0))
        }
    };

    if square_root {
        (2.0 * res).max(0.0).sqrt()
    } else {
        res
    }
}
