use nalgebra::{DMatrix, SVD};
use ndarray::{s, Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::factorization::params::Init;
use crate::utils::errors::NmfError;
use crate::utils::math_utils::MathUtils;
use crate::utils::validation::{check_n_components, check_non_negative};

/// Entries of an NNDSVD seed smaller than this are truncated to zero
pub const DEFAULT_SEED_EPS: f64 = 1e-6;

/**
 * Algorithms for NMF initialization.
 *
 * Computes an initial guess for the non-negative rank k matrix approximation
 * of X: X = WH.
 *
 * @param x the data matrix to be decomposed, NaN marks a missing value
 * @param n_components the number of components desired in the approximation
 * @param init method used to initialize the procedure. When None, NNDSVD is used if
 *        n_components <= min(n_samples, n_features), otherwise random
 * @param eps truncate all values less than this in the NNDSVD output to zero
 * @param random_state seed of the generator used by the random and NNDSVDar methods
 *
 * NNDSVD: C. Boutsidis, E. Gallopoulos: SVD based initialization: A head start
 * for nonnegative matrix factorization - Pattern Recognition, 2008
 */
pub fn initialize_nmf(
    x: &Array2<f64>,
    n_components: usize,
    init: Option<Init>,
    eps: f64,
    random_state: Option<u64>,
) -> Result<(Array2<f64>, Array2<f64>), NmfError> {
    check_non_negative(x, "NMF initialization", true)?;
    check_n_components(n_components)?;
    let (n_samples, n_features) = x.dim();
    let max_rank = n_samples.min(n_features);

    let init = match init {
        Some(init) if init != Init::Random && n_components > max_rank => {
            return Err(NmfError::TooManyComponents(init.to_string()));
        }
        Some(init) => init,
        None if n_components <= max_rank => Init::Nndsvd,
        None => Init::Random,
    };

    if init == Init::Random {
        let mut rng = MathUtils::random_state(random_state);
        let avg = (MathUtils::nan_mean(x) / n_components as f64).sqrt();
        let h = Array2::from_shape_fn((n_components, n_features), |_| {
            (avg * rng.sample::<f64, _>(StandardNormal)).abs()
        });
        let w = Array2::from_shape_fn((n_samples, n_components), |_| {
            (avg * rng.sample::<f64, _>(StandardNormal)).abs()
        });
        debug!("Random initialization with average {}", avg);
        return Ok((w, h));
    }

    if init == Init::Custom {
        return Err(NmfError::InvalidParameter {
            parameter: "init",
            got: init.to_string(),
            allowed: "(None, 'random', 'nndsvd', 'nndsvda', 'nndsvdar')".to_string(),
        });
    }

    if MathUtils::has_missing(x) {
        return Err(NmfError::NndsvdWithMissing);
    }

    let (mut w, mut h) = nndsvd(x, n_components, eps)?;
    match init {
        Init::Nndsvda => {
            let avg = MathUtils::nan_mean(x);
            fill_zeros(&mut w, || avg);
            fill_zeros(&mut h, || avg);
        }
        Init::Nndsvdar => {
            let mut rng = MathUtils::random_state(random_state);
            let avg = MathUtils::nan_mean(x);
            fill_zeros(&mut w, || (avg * rng.sample::<f64, _>(StandardNormal) / 100.0).abs());
            fill_zeros(&mut h, || (avg * rng.sample::<f64, _>(StandardNormal) / 100.0).abs());
        }
        _ => {}
    }

    Ok((w, h))
}

/**
 * Plain NNDSVD seed: both factors built from the positive or negative part of
 * each leading singular vector pair, entries below eps set to zero
 */
fn nndsvd(x: &Array2<f64>, n_components: usize, eps: f64) -> Result<(Array2<f64>, Array2<f64>), NmfError> {
    let (u, s, v) = truncated_svd(x, n_components)?;
    let mut w = Array2::<f64>::zeros(u.dim());
    let mut h = Array2::<f64>::zeros(v.dim());

    // The leading singular triplet is non-negative so it can be used as is
    w.slice_mut(s![.., 0])
        .assign(&(u.slice(s![.., 0]).mapv(f64::abs) * s[0].sqrt()));
    h.slice_mut(s![0, ..])
        .assign(&(v.slice(s![0, ..]).mapv(f64::abs) * s[0].sqrt()));

    for j in 1..n_components {
        let uu = u.slice(s![.., j]);
        let vv = v.slice(s![j, ..]);

        let uup = pos(&uu);
        let uun = neg(&uu);
        let vvp = pos(&vv);
        let vvn = neg(&vv);
        let n_uup = MathUtils::norm(&uup);
        let n_uun = MathUtils::norm(&uun);
        let n_vvp = MathUtils::norm(&vvp);
        let n_vvn = MathUtils::norm(&vvn);
        let termp = n_uup * n_vvp;
        let termn = n_uun * n_vvn;

        let (u_part, v_part, sigma) = if termp > termn {
            (uup / n_uup, vvp / n_vvp, termp)
        } else {
            (uun / n_uun, vvn / n_vvn, termn)
        };
        if sigma == 0.0 {
            // no usable part in this singular pair, leave the component at zero
            continue;
        }

        let lbd = (s[j] * sigma).sqrt();
        w.slice_mut(s![.., j]).assign(&(u_part * lbd));
        h.slice_mut(s![j, ..]).assign(&(v_part * lbd));
    }

    w.mapv_inplace(|val| if val < eps { 0.0 } else { val });
    h.mapv_inplace(|val| if val < eps { 0.0 } else { val });

    Ok((w, h))
}

/**
 * Leading n_components singular triplets of x, sorted by decreasing singular value.
 * Returns (U: n_samples x k, S: k, V^T: k x n_features)
 */
fn truncated_svd(
    x: &Array2<f64>,
    n_components: usize,
) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>), NmfError> {
    let (n_samples, n_features) = x.dim();
    let matrix = DMatrix::from_fn(n_samples, n_features, |i, j| x[[i, j]]);
    let svd = SVD::try_new(matrix, true, true, std::f64::EPSILON, 0)
        .ok_or(NmfError::SvdNoConvergence)?;
    let u = svd.u.ok_or(NmfError::SvdNoConvergence)?;
    let v_t = svd.v_t.ok_or(NmfError::SvdNoConvergence)?;

    let singular_values = &svd.singular_values;
    let mut order: Vec<usize> = (0..singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        singular_values[b]
            .partial_cmp(&singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(n_components);

    let u_k = Array2::from_shape_fn((n_samples, order.len()), |(i, j)| u[(i, order[j])]);
    let s_k = order.iter().map(|&j| singular_values[j]).collect::<Array1<f64>>();
    let v_k = Array2::from_shape_fn((order.len(), n_features), |(i, j)| v_t[(order[i], j)]);

    Ok((u_k, s_k, v_k))
}

fn pos(vector: &ArrayView1<f64>) -> Array1<f64> {
    vector.mapv(|x| if x > 0. { x } else { 0. })
}

fn neg(vector: &ArrayView1<f64>) -> Array1<f64> {
    vector.mapv(|x| if x < 0. { -x } else { 0. })
}

/// Replaces every exact zero of the matrix, in row-major order, with the output of fill
fn fill_zeros<F: FnMut() -> f64>(matrix: &mut Array2<f64>, mut fill: F) {
    matrix.iter_mut().filter(|val| **val == 0.0).for_each(|val| *val = fill());
}
