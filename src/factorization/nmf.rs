use ndarray::Array2;

use crate::factorization::beta_divergence::beta_divergence;
use crate::factorization::coordinate_descent::fit_coordinate_descent;
use crate::factorization::multiplicative_update::fit_multiplicative_update;
use crate::factorization::params::{Init, NmfParams, Regularization, Solver};
use crate::factorization::seeding::{initialize_nmf, DEFAULT_SEED_EPS};
use crate::utils::errors::NmfError;
use crate::utils::math_utils::MathUtils;
use crate::utils::validation::{check_init, check_n_components, check_non_negative, check_tol};

/// Outcome of a single factorization: X ~= W.H after n_iter iterations
#[derive(Debug, Clone)]
pub struct Factorization {
    pub w: Array2<f64>,
    pub h: Array2<f64>,
    pub n_iter: usize,
}

/**
 * Compute Non-negative Matrix Factorization (NMF).
 *
 * Find two non-negative matrices (W, H) whose product approximates the non-
 * negative matrix X. NaN entries of X are missing values and are ignored by
 * the objective, which requires the 'mu' solver.
 *
 * The objective function is:
 *
 * ```text
 *     beta_div(X, WH)
 *     + alpha_w * l1_ratio * ||vec(W)||_1 + 0.5 * alpha_w * (1 - l1_ratio) * ||W||_Fro^2
 *     + alpha_h * l1_ratio * ||vec(H)||_1 + 0.5 * alpha_h * (1 - l1_ratio) * ||H||_Fro^2
 * ```
 *
 * where alpha_w and alpha_h are alpha or zero depending on params.regularization.
 *
 * @param x data matrix, n_samples x n_features
 * @param w initial guess for W, used when init is Custom
 * @param h initial guess for H, used when init is Custom or when update_h is false
 * @param params solver configuration
 * @param update_h when false, H is kept fixed and only W is estimated
 */
pub fn non_negative_factorization(
    x: &Array2<f64>,
    w: Option<Array2<f64>>,
    h: Option<Array2<f64>>,
    params: &NmfParams,
    update_h: bool,
) -> Result<Factorization, NmfError> {
    check_non_negative(x, "NMF (input X)", true)?;
    let beta_loss = params.check_string_params()?;

    if let Some(x_min) = MathUtils::nan_min(x) {
        if x_min == 0.0 && beta_loss <= 0.0 {
            return Err(NmfError::DivergentBetaLoss);
        }
    }

    if MathUtils::has_missing(x) {
        if params.solver != Solver::MultiplicativeUpdate {
            return Err(NmfError::SolverMissingValues(params.solver.to_string()));
        }
        if update_h && params.init.map_or(false, |init| init.is_nndsvd()) {
            return Err(NmfError::NndsvdWithMissing);
        }
    }

    let (n_samples, n_features) = x.dim();
    let n_components = check_n_components(params.n_components.unwrap_or(n_features))?;
    let tol = check_tol(params.tol)?;

    // check W and H, or initialize them
    let (w, h) = if params.init == Some(Init::Custom) && update_h {
        let h = h.ok_or_else(|| NmfError::MissingArray("NMF (input H)".to_string()))?;
        check_init(&h, (n_components, n_features), "NMF (input H)")?;
        let w = w.ok_or_else(|| NmfError::MissingArray("NMF (input W)".to_string()))?;
        check_init(&w, (n_samples, n_components), "NMF (input W)")?;
        (w, h)
    } else if !update_h {
        let h = h.ok_or_else(|| NmfError::MissingArray("NMF (input H)".to_string()))?;
        check_init(&h, (n_components, n_features), "NMF (input H)")?;
        // 'mu' solver should not be initialized by zeros
        let w = match params.solver {
            Solver::MultiplicativeUpdate => {
                let avg = (MathUtils::nan_mean(x) / n_components as f64).sqrt();
                Array2::from_elem((n_samples, n_components), avg)
            }
            Solver::CoordinateDescent => Array2::zeros((n_samples, n_components)),
        };
        (w, h)
    } else {
        initialize_nmf(
            x,
            n_components,
            params.init,
            DEFAULT_SEED_EPS,
            params.random_state,
        )?
    };

    let (l1_reg_w, l1_reg_h, l2_reg_w, l2_reg_h) = params.regularization_terms();

    if params.verbose {
        info!(
            "Fitting {} x {} matrix with {} components, solver '{}' and beta_loss {}",
            n_samples,
            n_features,
            n_components,
            params.solver,
            params.beta_loss.repr()
        );
    }

    let (w, h, n_iter, converged) = match params.solver {
        Solver::CoordinateDescent => fit_coordinate_descent(
            x,
            w,
            h,
            tol,
            params.max_iter,
            l1_reg_w,
            l1_reg_h,
            l2_reg_w,
            l2_reg_h,
            update_h,
            params.shuffle,
            params.random_state,
        ),
        Solver::MultiplicativeUpdate => fit_multiplicative_update(
            x,
            w,
            h,
            beta_loss,
            params.max_iter,
            tol,
            l1_reg_w,
            l1_reg_h,
            l2_reg_w,
            l2_reg_h,
            update_h,
        ),
    };

    if !converged && tol > 0.0 {
        warn!(
            "Maximum number of iteration {} reached. Increase it to improve convergence.",
            params.max_iter
        );
    }

    Ok(Factorization { w, h, n_iter })
}

/**
 * Fit, apply and invert a factorization model.
 */
pub trait RunFactorization {
    /// Learn a model for the data X and return the transformed data W.
    /// w and h are only read when the init is Custom
    fn fit_transform(
        &mut self,
        x: &Array2<f64>,
        w: Option<Array2<f64>>,
        h: Option<Array2<f64>>,
    ) -> Result<Array2<f64>, NmfError>;

    /// Learn a model for the data X
    fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self, NmfError>;

    /// Transform the data X according to the fitted model
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, NmfError>;

    /// Transform data back to its original space
    fn inverse_transform(&self, w: &Array2<f64>) -> Result<Array2<f64>, NmfError>;
}

/**
 * Non-Negative Matrix Factorization estimator.
 *
 * Find two non-negative matrices (W, H) whose product approximates the non-
 * negative matrix X. This factorization can be used for example for
 * dimensionality reduction, source separation, topic extraction or, thanks
 * to the support of missing values, for imputation.
 *
 * The estimator always regularizes both W and H (alpha and l1_ratio of the
 * params decide the strength).
 */
#[derive(Debug, Clone)]
pub struct Nmf {
    pub params: NmfParams,
    components: Option<Array2<f64>>,
    reconstruction_err: Option<f64>,
    n_iter: Option<usize>,
}

impl Nmf {
    pub fn new(params: NmfParams) -> Nmf {
        Nmf {
            params,
            components: None,
            reconstruction_err: None,
            n_iter: None,
        }
    }

    pub fn with_n_components(n_components: usize) -> Nmf {
        Nmf::new(NmfParams {
            n_components: Some(n_components),
            ..NmfParams::default()
        })
    }

    /// Factorization matrix H, sometimes called 'dictionary'
    pub fn components(&self) -> Option<&Array2<f64>> {
        self.components.as_ref()
    }

    /**
     * Replace the fitted components, e.g. with a dictionary learned elsewhere.
     * The components are validated when the model is used.
     */
    pub fn set_components(&mut self, components: Array2<f64>) {
        self.components = Some(components);
    }

    pub fn n_components(&self) -> Option<usize> {
        self.components.as_ref().map(|h| h.nrows())
    }

    /// Beta divergence between the training data X and the reconstructed data WH from the fitted model
    pub fn reconstruction_err(&self) -> Option<f64> {
        self.reconstruction_err
    }

    /// Actual number of iterations of the last fit
    pub fn n_iter(&self) -> Option<usize> {
        self.n_iter
    }

    fn fitted_components(&self) -> Result<&Array2<f64>, NmfError> {
        self.components.as_ref().ok_or(NmfError::NotFitted)
    }

    fn estimator_params(&self) -> NmfParams {
        NmfParams {
            regularization: Some(Regularization::Both),
            ..self.params.clone()
        }
    }

    /**
     * Fill the missing entries of X with their estimate from the fitted model.
     *
     * X is first transformed with the fitted components, then every NaN entry
     * takes the value of the reconstructed W.H at the same position.
     */
    pub fn impute(&self, x: &Array2<f64>) -> Result<Array2<f64>, NmfError> {
        let w = self.transform(x)?;
        let reconstructed = self.inverse_transform(&w)?;
        let mut imputed = x.to_owned();
        imputed.zip_mut_with(&reconstructed, |x_val, &estimate| {
            if x_val.is_nan() {
                *x_val = estimate;
            }
        });

        Ok(imputed)
    }
}

impl RunFactorization for Nmf {
    fn fit_transform(
        &mut self,
        x: &Array2<f64>,
        w: Option<Array2<f64>>,
        h: Option<Array2<f64>>,
    ) -> Result<Array2<f64>, NmfError> {
        let params = self.estimator_params();
        let Factorization { w, h, n_iter } = non_negative_factorization(x, w, h, &params, true)?;

        let reconstruction_err = beta_divergence(x, &w, &h, params.beta_loss.to_float(), true);
        info!(
            "NMF fit with {} components: reconstruction error {} after {} iterations",
            h.nrows(),
            reconstruction_err,
            n_iter
        );

        self.reconstruction_err = Some(reconstruction_err);
        self.n_iter = Some(n_iter);
        self.components = Some(h);

        Ok(w)
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self, NmfError> {
        self.fit_transform(x, None, None)?;
        Ok(self)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, NmfError> {
        let components = self.fitted_components()?;
        let params = NmfParams {
            n_components: Some(components.nrows()),
            ..self.estimator_params()
        };

        let factorization =
            non_negative_factorization(x, None, Some(components.clone()), &params, false)?;
        Ok(factorization.w)
    }

    fn inverse_transform(&self, w: &Array2<f64>) -> Result<Array2<f64>, NmfError> {
        let components = self.fitted_components()?;
        if w.ncols() != components.nrows() {
            return Err(NmfError::WrongShape {
                whom: "NMF (inverse transform)".to_string(),
                expected: (w.nrows(), components.nrows()),
                got: w.dim(),
            });
        }
        Ok(w.dot(components))
    }
}
