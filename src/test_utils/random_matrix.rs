use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/**
 * Seeded generator of dense test matrices.
 *
 * <p>
 *     The values returned only depend on the seed and on the sequence of calls, so a test
 *     building its data with the same seed always sees the same matrices.
 * </p>
 */
pub struct RandomMatrix {
    random: StdRng,
}

impl RandomMatrix {
    pub fn new(seed: u64) -> Self {
        Self {
            random: StdRng::seed_from_u64(seed),
        }
    }

    /// Standard normal entries
    pub fn normal(&mut self, shape: (usize, usize)) -> Array2<f64> {
        let random = &mut self.random;
        Array2::from_shape_fn(shape, |_| random.sample::<f64, _>(StandardNormal))
    }

    /// Absolute values of standard normal entries, optionally scaled
    pub fn abs_normal(&mut self, shape: (usize, usize), scale: f64) -> Array2<f64> {
        self.normal(shape).mapv(|v| (v * scale).abs())
    }

    /// Uniform entries in [0, 1)
    pub fn uniform(&mut self, shape: (usize, usize)) -> Array2<f64> {
        let random = &mut self.random;
        Array2::from_shape_fn(shape, |_| random.gen::<f64>())
    }

    /**
     * Exact product of two random non-negative factors of the given rank,
     * i.e. a non-negative matrix with an exact rank `rank` factorization.
     */
    pub fn low_rank(&mut self, shape: (usize, usize), rank: usize) -> Array2<f64> {
        let w = self.abs_normal((shape.0, rank), 1.0);
        let h = self.abs_normal((rank, shape.1), 1.0);
        w.dot(&h)
    }

    /**
     * Copy of x where `n_missing` distinct entries, picked at random, are set to NaN.
     *
     * @param x the complete matrix
     * @param n_missing how many entries to hide, capped at the size of x
     */
    pub fn with_missing(&mut self, x: &Array2<f64>, n_missing: usize) -> Array2<f64> {
        let mut masked = x.to_owned();
        let n_columns = x.ncols();
        let n_missing = n_missing.min(x.len());
        for index in sample(&mut self.random, x.len(), n_missing).iter() {
            masked[[index / n_columns, index % n_columns]] = std::f64::NAN;
        }
        masked
    }

    /// Copy of x where each entry is set to zero with probability `fraction`
    pub fn with_zeros(&mut self, x: &Array2<f64>, fraction: f64) -> Array2<f64> {
        let random = &mut self.random;
        x.mapv(|v| if random.gen::<f64>() < fraction { 0.0 } else { v })
    }
}
