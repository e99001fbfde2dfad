use ndarray::{Array2, ArrayBase, Data, Dimension, Ix2, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Smallest step used to keep divisions and negative powers away from zero.
/// Single precision machine epsilon, widened to f64.
pub const EPSILON: f64 = f32::EPSILON as f64;

/// Double precision machine epsilon. Factor entries below it are snapped to zero
/// by the multiplicative update solver for small beta.
pub const F64_EPS: f64 = f64::EPSILON;

pub struct MathUtils {}

impl MathUtils {
    /**
     * Sum of squares of every entry of an array
     */
    pub fn squared_norm<S, D>(x: &ArrayBase<S, D>) -> f64
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        x.iter().map(|v| v * v).sum()
    }

    /**
     * Euclidean (Frobenius for matrices) norm of an array
     */
    pub fn norm<S, D>(x: &ArrayBase<S, D>) -> f64
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        Self::squared_norm(x).sqrt()
    }

    /**
     * Mean of the observed (non NaN) entries. NaN when nothing is observed.
     */
    pub fn nan_mean<S, D>(x: &ArrayBase<S, D>) -> f64
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let (sum, count) = x
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count == 0 {
            std::f64::NAN
        } else {
            sum / count as f64
        }
    }

    /**
     * Minimum of the observed entries, None if the array holds no observed value
     */
    pub fn nan_min<S, D>(x: &ArrayBase<S, D>) -> Option<f64>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        x.iter()
            .filter(|v| !v.is_nan())
            .fold(None, |m: Option<f64>, &v| match m {
                Some(current) if current <= v => Some(current),
                _ => Some(v),
            })
    }

    pub fn has_missing<S, D>(x: &ArrayBase<S, D>) -> bool
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        x.iter().any(|v| v.is_nan())
    }

    /**
     * 1.0 where the entry is observed, 0.0 where it is missing
     */
    pub fn observed_mask<S>(x: &ArrayBase<S, Ix2>) -> Array2<f64>
    where
        S: Data<Elem = f64>,
    {
        x.mapv(|v| if v.is_nan() { 0.0 } else { 1.0 })
    }

    /**
     * Copy of x with every missing entry replaced by value
     */
    pub fn fill_missing<S>(x: &ArrayBase<S, Ix2>, value: f64) -> Array2<f64>
    where
        S: Data<Elem = f64>,
    {
        x.mapv(|v| if v.is_nan() { value } else { v })
    }

    /**
     * Computes W.H only where X is observed.
     *
     * Entries that are missing in X stay missing (NaN) in the result, so the
     * result carries the same mask as X.
     */
    pub fn special_dot_x<S>(w: &Array2<f64>, h: &Array2<f64>, x: &ArrayBase<S, Ix2>) -> Array2<f64>
    where
        S: Data<Elem = f64>,
    {
        let mut wh = w.dot(h);
        Zip::from(&mut wh).and(x).for_each(|wh_val, &x_val| {
            if x_val.is_nan() {
                *wh_val = std::f64::NAN;
            }
        });

        wh
    }

    /**
     * Seeded generator when a random state is given, otherwise seeded from entropy
     */
    pub fn random_state(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nan_mean_skips_missing() {
        let x = array![[1.0, std::f64::NAN], [3.0, 5.0]];
        assert!((MathUtils::nan_mean(&x) - 3.0).abs() < 1e-12);

        let empty = array![[std::f64::NAN]];
        assert!(MathUtils::nan_mean(&empty).is_nan());
    }

    #[test]
    fn test_nan_min() {
        let x = array![[2.0, std::f64::NAN], [0.5, 5.0]];
        assert_eq!(MathUtils::nan_min(&x), Some(0.5));
        assert_eq!(MathUtils::nan_min(&array![[std::f64::NAN]]), None);
    }

    #[test]
    fn test_norms() {
        let x = array![[3.0, 4.0]];
        assert_eq!(MathUtils::squared_norm(&x), 25.0);
        assert_eq!(MathUtils::norm(&x), 5.0);
    }

    #[test]
    fn test_mask_and_fill() {
        let x = array![[1.0, std::f64::NAN]];
        assert_eq!(MathUtils::observed_mask(&x), array![[1.0, 0.0]]);
        assert_eq!(MathUtils::fill_missing(&x, 0.0), array![[1.0, 0.0]]);
        assert!(MathUtils::has_missing(&x));
        assert!(!MathUtils::has_missing(&MathUtils::fill_missing(&x, 2.0)));
    }

    #[test]
    fn test_seeded_random_state_is_reproducible() {
        use rand::Rng;
        let a: f64 = MathUtils::random_state(Some(7)).gen();
        let b: f64 = MathUtils::random_state(Some(7)).gen();
        assert_eq!(a, b);
    }
}
