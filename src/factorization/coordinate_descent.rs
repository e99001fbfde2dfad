use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::utils::math_utils::MathUtils;

/**
 * Compute Non-negative Matrix Factorization with Coordinate Descent.
 *
 * The objective function is minimized with an alternating minimization of W
 * and H. Each minimization is done with a cyclic (up to a permutation of the
 * features) Coordinate Descent. X must not contain missing values.
 *
 * Returns the factors, the number of sweeps performed and whether the
 * tolerance was met.
 *
 * Cichocki, Andrzej, and P. H. A. N. Anh-Huy. "Fast local algorithms for
 * large scale nonnegative matrix and tensor factorizations."
 * IEICE transactions on fundamentals of electronics, communications and
 * computer sciences 92.3: 708-721, 2009.
 */
#[allow(clippy::too_many_arguments)]
pub fn fit_coordinate_descent(
    x: &Array2<f64>,
    mut w: Array2<f64>,
    h: Array2<f64>,
    tol: f64,
    max_iter: usize,
    l1_reg_w: f64,
    l1_reg_h: f64,
    l2_reg_w: f64,
    l2_reg_h: f64,
    update_h: bool,
    shuffle: bool,
    random_state: Option<u64>,
) -> (Array2<f64>, Array2<f64>, usize, bool) {
    // so W and Ht are both in the same layout and updated by the same routine
    let mut ht = h.t().to_owned();
    let xt = x.t();
    let mut rng = MathUtils::random_state(random_state);

    let mut violation_init = 0.0;
    let mut n_iter = 0;
    let mut converged = false;
    for iteration in 0..max_iter {
        n_iter = iteration + 1;

        let mut violation =
            update_coordinate_descent(x.view(), &mut w, &ht, l1_reg_w, l2_reg_w, shuffle, &mut rng);
        if update_h {
            violation +=
                update_coordinate_descent(xt, &mut ht, &w, l1_reg_h, l2_reg_h, shuffle, &mut rng);
        }

        if iteration == 0 {
            violation_init = violation;
        }

        if violation_init == 0.0 {
            converged = true;
            break;
        }

        debug!("violation: {}", violation / violation_init);

        if violation / violation_init <= tol {
            debug!("Converged at iteration {}", n_iter);
            converged = true;
            break;
        }
    }

    (w, ht.t().to_owned(), n_iter, converged)
}

/**
 * Helper function for fit_coordinate_descent. Update W to minimize the
 * objective function, iterating once over all coordinates. By symmetry, to
 * update H, one can call update_coordinate_descent(X.T, Ht, W, ...).
 */
fn update_coordinate_descent(
    x: ArrayView2<f64>,
    w: &mut Array2<f64>,
    ht: &Array2<f64>,
    l1_reg: f64,
    l2_reg: f64,
    shuffle: bool,
    rng: &mut StdRng,
) -> f64 {
    let n_components = ht.ncols();

    let mut hht = ht.t().dot(ht);
    let mut xht = x.dot(ht);

    // L2 regularization corresponds to increase of the diagonal of HHt
    if l2_reg != 0.0 {
        hht.diag_mut().mapv_inplace(|v| v + l2_reg);
    }
    // L1 regularization corresponds to decrease of each element of XHt
    if l1_reg != 0.0 {
        xht.mapv_inplace(|v| v - l1_reg);
    }

    let mut permutation: Vec<usize> = (0..n_components).collect();
    if shuffle {
        permutation.shuffle(rng);
    }

    update_cdnmf(w, &hht, &xht, &permutation)
}

/**
 * One sweep of projected coordinate updates over every entry of W.
 *
 * For a fixed component the update of a row of W only reads that row, so rows
 * are processed in parallel. Returns the summed absolute projected gradient.
 */
fn update_cdnmf(w: &mut Array2<f64>, hht: &Array2<f64>, xht: &Array2<f64>, permutation: &[usize]) -> f64 {
    w.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(xht.axis_iter(Axis(0)).into_par_iter())
        .map(|(mut w_row, xht_row)| {
            let mut violation = 0.0;
            for &t in permutation {
                // gradient = GW[t, i] where G = dot(W, HHt) - XHt
                let grad = w_row
                    .iter()
                    .enumerate()
                    .fold(-xht_row[t], |acc, (r, w_val)| acc + hht[[t, r]] * w_val);

                // projected gradient
                let pg = if w_row[t] == 0.0 { grad.min(0.0) } else { grad };
                violation += pg.abs();

                // Hessian
                let hess = hht[[t, t]];
                if hess != 0.0 {
                    w_row[t] = (w_row[t] - grad / hess).max(0.0);
                }
            }
            violation
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_exact_factor_is_a_fixed_point() {
        let w = array![[1.0, 0.5], [0.0, 2.0], [3.0, 1.0]];
        let h = array![[1.0, 0.0, 2.0], [0.5, 1.0, 0.0]];
        let x = w.dot(&h);

        let (w_fit, h_fit, _, _) =
            fit_coordinate_descent(&x, w.clone(), h.clone(), 1e-4, 50, 0.0, 0.0, 0.0, 0.0, true, false, Some(0));
        assert!((w_fit.dot(&h_fit) - &x).iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_fixed_h_solves_least_squares() {
        // with H = I the optimal non-negative W is X itself
        let x = array![[1.0, 2.0], [3.0, 0.0]];
        let h = array![[1.0, 0.0], [0.0, 1.0]];
        let w = Array2::zeros((2, 2));

        let (w_fit, h_fit, _, _) =
            fit_coordinate_descent(&x, w, h.clone(), 1e-8, 100, 0.0, 0.0, 0.0, 0.0, false, true, Some(3));
        assert_eq!(h_fit, h);
        assert!((w_fit - &x).iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_convergence_on_last_sweep() {
        // an exact factorization has no violation, so the first sweep converges
        let w = array![[1.0, 0.5], [0.0, 2.0]];
        let h = array![[1.0, 0.0], [0.5, 1.0]];
        let x = w.dot(&h);

        let (_, _, n_iter, converged) =
            fit_coordinate_descent(&x, w, h, 1e-4, 1, 0.0, 0.0, 0.0, 0.0, true, false, Some(0));
        assert_eq!(n_iter, 1);
        assert!(converged);
    }

    #[test]
    fn test_not_converged_without_tolerance() {
        let x = array![[1.0, 2.0, 0.5], [3.0, 0.2, 1.0], [0.4, 1.5, 2.0]];
        let w = Array2::from_elem((3, 1), 1.0);
        let h = Array2::from_elem((1, 3), 1.0);

        let (_, _, n_iter, converged) =
            fit_coordinate_descent(&x, w, h, 0.0, 5, 0.0, 0.0, 0.0, 0.0, true, false, Some(0));
        assert_eq!(n_iter, 5);
        assert!(!converged);
    }
}
