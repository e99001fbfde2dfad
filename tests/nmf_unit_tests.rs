#![allow(non_snake_case)]

extern crate nmf;
extern crate ndarray;

use ndarray::{array, s, Array2};
use nmf::factorization::beta_divergence::beta_divergence;
use nmf::factorization::nmf::{non_negative_factorization, Nmf, RunFactorization};
use nmf::factorization::params::{BetaLoss, Init, NmfParams, NmfParamsBuilder, Regularization, Solver};
use nmf::factorization::seeding::{initialize_nmf, DEFAULT_SEED_EPS};
use nmf::test_utils::random_matrix::RandomMatrix;
use nmf::utils::errors::NmfError;
use nmf::utils::math_utils::MathUtils;

const SOLVERS: [Solver; 2] = [Solver::CoordinateDescent, Solver::MultiplicativeUpdate];

fn relative_error(reference: &Array2<f64>, estimate: &Array2<f64>) -> f64 {
    MathUtils::norm(&(reference - estimate)) / MathUtils::norm(reference)
}

fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).fold(0.0, |acc, (x, y)| acc.max((x - y).abs()))
}

fn model(n_components: usize, solver: Solver, init: Option<Init>) -> NmfParamsBuilder {
    let mut builder = NmfParamsBuilder::default();
    builder.n_components(n_components).solver(solver).random_state(0);
    if let Some(init) = init {
        builder.init(init);
    }
    builder
}

#[test]
fn test_parameter_checking() {
    let A = Array2::<f64>::ones((2, 2));

    let mut cd_kl = Nmf::new(NmfParams {
        solver: Solver::CoordinateDescent,
        beta_loss: BetaLoss::Value(1.0),
        ..NmfParams::default()
    });
    assert_eq!(
        cd_kl.fit(&A).unwrap_err().to_string(),
        "Invalid beta_loss parameter: solver 'cd' does not handle beta_loss = 1.0"
    );

    let msg = "Negative values in data passed to NMF (input X)";
    assert_eq!(Nmf::with_n_components(2).fit(&(-&A)).unwrap_err().to_string(), msg);

    let mut clf = Nmf::new(NmfParams {
        n_components: Some(2),
        tol: 0.1,
        ..NmfParams::default()
    });
    clf.fit(&A).unwrap();
    assert_eq!(clf.transform(&(-&A)).unwrap_err().to_string(), msg);

    for &init in &[Init::Nndsvd, Init::Nndsvda, Init::Nndsvdar] {
        let mut too_many = Nmf::new(model(3, Solver::CoordinateDescent, Some(init)).build().unwrap());
        assert_eq!(
            too_many.fit(&A).unwrap_err().to_string(),
            format!(
                "init = '{}' can only be used when n_components <= min(n_samples, n_features)",
                init
            )
        );
    }

    let negative_tol = NmfParams {
        tol: -1.0,
        ..NmfParams::default()
    };
    assert!(matches!(
        non_negative_factorization(&A, None, None, &negative_tol, true),
        Err(NmfError::InvalidTolerance(_))
    ));
}

#[test]
fn test_nmf_fit_nn_output() {
    // the decomposition does not contain negative values
    let A = Array2::from_shape_fn((5, 2), |(i, j)| {
        let k = (i + 1) as f64;
        if j == 0 {
            5.0 - k
        } else {
            5.0 + k
        }
    });
    let inits = [
        None,
        Some(Init::Nndsvd),
        Some(Init::Nndsvda),
        Some(Init::Nndsvdar),
        Some(Init::Random),
    ];
    for &solver in SOLVERS.iter() {
        for &init in inits.iter() {
            let mut estimator = Nmf::new(model(2, solver, init).build().unwrap());
            let transf = estimator.fit_transform(&A, None, None).unwrap();
            let components = estimator.components().unwrap();
            assert!(transf.iter().all(|&v| v >= 0.0));
            assert!(components.iter().all(|&v| v >= 0.0));
            assert!(transf.iter().all(|v| v.is_finite()));
        }
    }
}

#[test]
fn test_nmf_fit_close() {
    // the fit is not too far away
    let X = RandomMatrix::new(42).abs_normal((6, 5), 1.0);
    for &solver in SOLVERS.iter() {
        let mut builder = model(5, solver, Some(Init::Nndsvdar));
        match solver {
            Solver::CoordinateDescent => builder.max_iter(600),
            Solver::MultiplicativeUpdate => builder.max_iter(3000).tol(0.0),
        };
        let mut pnmf = Nmf::new(builder.build().unwrap());
        pnmf.fit(&X).unwrap();

        let err = pnmf.reconstruction_err().unwrap();
        assert!(err < 0.1, "reconstruction error {} with {}", err, solver);
        assert_eq!(pnmf.n_components(), Some(5));
        assert!(pnmf.n_iter().unwrap() >= 1);
    }
}

#[test]
fn test_nmf_transform() {
    // transform returns values close to fit_transform
    let A = RandomMatrix::new(42).abs_normal((6, 5), 1.0);

    let mut m = Nmf::new(
        model(3, Solver::CoordinateDescent, Some(Init::Random))
            .tol(1e-5)
            .build()
            .unwrap(),
    );
    let ft = m.fit_transform(&A, None, None).unwrap();
    let t = m.transform(&A).unwrap();
    assert!(max_abs_diff(&ft, &t) < 1.5e-2);

    let mut m = Nmf::new(
        model(3, Solver::MultiplicativeUpdate, Some(Init::Random))
            .tol(0.0)
            .max_iter(2000)
            .build()
            .unwrap(),
    );
    let ft = m.fit_transform(&A, None, None).unwrap();
    let t = m.transform(&A).unwrap();
    assert!(relative_error(&ft, &t) < 0.1);
}

#[test]
fn test_nmf_transform_custom_init() {
    // transform works after a fit from a custom initialization
    let mut random = RandomMatrix::new(0);
    let A = random.abs_normal((6, 5), 1.0);
    let n_components = 4;
    let avg = (A.mean().unwrap() / n_components as f64).sqrt();
    let H_init = random.abs_normal((n_components, 5), avg);
    let W_init = random.abs_normal((6, n_components), avg);

    let mut m = Nmf::new(
        model(n_components, Solver::CoordinateDescent, Some(Init::Custom))
            .build()
            .unwrap(),
    );
    m.fit_transform(&A, Some(W_init), Some(H_init)).unwrap();
    let W = m.transform(&A).unwrap();
    assert_eq!(W.dim(), (6, n_components));
}

#[test]
fn test_nmf_inverse_transform() {
    let A = RandomMatrix::new(0).abs_normal((6, 4), 1.0);
    for &solver in SOLVERS.iter() {
        let mut builder = model(4, solver, Some(Init::Random));
        match solver {
            Solver::CoordinateDescent => builder.max_iter(1000).tol(1e-8),
            Solver::MultiplicativeUpdate => builder.max_iter(3000).tol(0.0),
        };
        let mut m = Nmf::new(builder.build().unwrap());
        let ft = m.fit_transform(&A, None, None).unwrap();
        let A_new = m.inverse_transform(&ft).unwrap();

        assert_eq!(A_new, ft.dot(m.components().unwrap()));
        assert!(
            relative_error(&A, &A_new) < 0.1,
            "relative error {} with {}",
            relative_error(&A, &A_new),
            solver
        );
    }

    let m = {
        let mut m = Nmf::with_n_components(2);
        m.fit(&A).unwrap();
        m
    };
    assert!(matches!(
        m.inverse_transform(&Array2::ones((3, 3))),
        Err(NmfError::WrongShape { .. })
    ));
}

#[test]
fn test_n_components_greater_n_features() {
    // more components than features falls back to a random init
    let A = RandomMatrix::new(42).abs_normal((30, 10), 1.0);
    let mut m = Nmf::new(NmfParams {
        n_components: Some(15),
        random_state: Some(0),
        tol: 1e-2,
        ..NmfParams::default()
    });
    m.fit(&A).unwrap();
    assert_eq!(m.components().unwrap().dim(), (15, 10));
}

#[test]
fn test_explicit_zeros_in_input() {
    // explicit zeros are regular observed values
    let mut random = RandomMatrix::new(42);
    let mut A = random.abs_normal((3, 2), 1.0);
    A[[1, 1]] = 0.0;
    let B = random.abs_normal((8, 5), 1.0);
    let B = random.with_zeros(&B, 0.3);
    assert!(B.iter().any(|&v| v == 0.0));

    for X in [&A, &B].iter() {
        for &solver in SOLVERS.iter() {
            let mut estimator = Nmf::new(model(2, solver, None).max_iter(400).build().unwrap());
            let X_fit_tr = estimator.fit_transform(X, None, None).unwrap();
            let X_tr = estimator.transform(X).unwrap();
            assert_eq!(X_tr.dim(), (X.nrows(), 2));
            assert!(X_fit_tr.iter().chain(X_tr.iter()).all(|v| v.is_finite() && *v >= 0.0));
        }
    }
}

#[test]
fn test_non_negative_factorization_consistency() {
    // the free function and the estimator agree
    let mut A = RandomMatrix::new(42).abs_normal((10, 10), 1.0);
    for j in (0..10).step_by(2) {
        A.slice_mut(s![.., j]).fill(0.0);
    }

    for &init in &[Init::Random, Init::Nndsvd] {
        for &solver in SOLVERS.iter() {
            let params = NmfParamsBuilder::default()
                .init(init)
                .solver(solver)
                .random_state(1)
                .tol(1e-2)
                .build()
                .unwrap();

            let fitted = non_negative_factorization(&A, None, None, &params, true).unwrap();
            let fixed_h =
                non_negative_factorization(&A, None, Some(fitted.h.clone()), &params, false).unwrap();

            let mut model_class = Nmf::new(params.clone());
            let W_cls = model_class.fit_transform(&A, None, None).unwrap();
            let W_cls_2 = model_class.transform(&A).unwrap();

            assert!(max_abs_diff(&fitted.w, &W_cls) < 1e-10);
            assert!(max_abs_diff(&fixed_h.w, &W_cls_2) < 1e-10);
            assert_eq!(fixed_h.h, fitted.h);
        }
    }
}

#[test]
fn test_non_negative_factorization_checking() {
    let A = Array2::<f64>::ones((2, 2));
    let custom = |n_components: usize| NmfParams {
        n_components: Some(n_components),
        init: Some(Init::Custom),
        ..NmfParams::default()
    };
    let nnmf = |W: &Array2<f64>, H: &Array2<f64>, params: &NmfParams| {
        non_negative_factorization(&A, Some(W.clone()), Some(H.clone()), params, true)
            .unwrap_err()
            .to_string()
    };

    assert_eq!(
        nnmf(&A, &A, &custom(0)),
        "Number of components must be a positive integer; got (n_components=0)"
    );
    assert_eq!(
        nnmf(&A, &(-&A), &custom(2)),
        "Negative values in data passed to NMF (input H)"
    );
    assert_eq!(
        nnmf(&(-&A), &A, &custom(2)),
        "Negative values in data passed to NMF (input W)"
    );
    assert_eq!(
        nnmf(&A, &(0.0 * &A), &custom(2)),
        "Array passed to NMF (input H) is full of zeros."
    );
    assert_eq!(
        nnmf(&A, &Array2::ones((2, 3)), &custom(2)),
        "Array with wrong shape passed to NMF (input H). Expected (2, 2), but got (2, 3) "
    );

    let err = "spam".parse::<Regularization>().unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Invalid regularization parameter: got 'spam' instead of one of"));

    // fixed H must be given
    let fixed = NmfParams {
        n_components: Some(2),
        ..NmfParams::default()
    };
    assert_eq!(
        non_negative_factorization(&A, None, None, &fixed, false)
            .unwrap_err()
            .to_string(),
        "No array passed to NMF (input H)"
    );
}

#[test]
fn test_nmf_multiplicative_update_continuity() {
    // results are continuous with respect to beta_loss
    let (n_samples, n_features, n_components) = (20, 10, 5);
    let X = RandomMatrix::new(1337).abs_normal((n_samples, n_features), 1.0);
    let (W0, H0) =
        initialize_nmf(&X, n_components, Some(Init::Random), DEFAULT_SEED_EPS, Some(42)).unwrap();

    let fit = |beta: f64| {
        let params = NmfParamsBuilder::default()
            .n_components(n_components)
            .init(Init::Custom)
            .solver(Solver::MultiplicativeUpdate)
            .beta_loss(BetaLoss::Value(beta))
            .max_iter(20)
            .tol(0.0)
            .alpha(0.1)
            .l1_ratio(0.5)
            .regularization(Regularization::Both)
            .random_state(42)
            .build()
            .unwrap();
        non_negative_factorization(&X, Some(W0.clone()), Some(H0.clone()), &params, true).unwrap()
    };

    for &beta_loss in &[-1.2, 0.0, 0.2, 1.0, 2.0, 2.5] {
        let reference = fit(beta_loss);
        let shifted = fit(beta_loss - 1e-5);
        assert!(max_abs_diff(&reference.w, &shifted.w) < 1.5e-4);
        assert!(max_abs_diff(&reference.h, &shifted.h) < 1.5e-4);
        assert_eq!(reference.n_iter, 20);
    }
}

#[test]
fn test_nmf_negative_beta_loss() {
    // X with zeros is rejected for beta_loss <= 0, and no NaN appears otherwise
    let n_components = 3;
    let X = RandomMatrix::new(42).normal((6, 5)).mapv(|v| v.max(0.0));
    assert!(X.iter().any(|&v| v == 0.0));

    let fit = |X: &Array2<f64>, beta_loss: f64| {
        let params = NmfParamsBuilder::default()
            .init(Init::Random)
            .n_components(n_components)
            .solver(Solver::MultiplicativeUpdate)
            .beta_loss(BetaLoss::Value(beta_loss))
            .random_state(0)
            .max_iter(1000)
            .build()
            .unwrap();
        non_negative_factorization(X, None, None, &params, true)
    };
    let assert_no_nan = |X: &Array2<f64>, beta_loss: f64| {
        let result = fit(X, beta_loss).unwrap();
        assert!(!MathUtils::has_missing(&result.w), "NaN in W for {}", beta_loss);
        assert!(!MathUtils::has_missing(&result.h), "NaN in H for {}", beta_loss);
    };

    for &beta_loss in &[-0.6, 0.0] {
        let err = fit(&X, beta_loss).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("When beta_loss <= 0 and X contains zeros, the solver may diverge."));
        assert_no_nan(&X.mapv(|v| v + 1e-9), beta_loss);
    }

    for &beta_loss in &[0.2, 1.0, 1.2, 2.0, 2.5] {
        assert_no_nan(&X, beta_loss);
    }
}

#[test]
fn test_nmf_regularization() {
    let n_components = 3;
    let X = RandomMatrix::new(42).abs_normal((6, 5), 1.0);

    let fit = |solver: Solver, alpha: f64, l1_ratio: f64, max_iter: usize, tol: f64| {
        let mut estimator = Nmf::new(
            NmfParamsBuilder::default()
                .n_components(n_components)
                .solver(solver)
                .alpha(alpha)
                .l1_ratio(l1_ratio)
                .max_iter(max_iter)
                .tol(tol)
                .random_state(42)
                .build()
                .unwrap(),
        );
        let W = estimator.fit_transform(&X, None, None).unwrap();
        (W, estimator.components().unwrap().to_owned())
    };
    // mu only shrinks coefficients geometrically, so zero means below machine epsilon
    let n_zeros = |a: &Array2<f64>| a.iter().filter(|&&v| v <= std::f64::EPSILON).count();

    // L1 regularization increases the number of zeros
    for &solver in SOLVERS.iter() {
        let (W_regul, H_regul) = fit(solver, 0.5, 1.0, 2000, 0.0);
        let (W_model, H_model) = fit(solver, 0.0, 1.0, 2000, 0.0);

        assert!(
            n_zeros(&W_regul) > n_zeros(&W_model),
            "{} zeros in regularized W against {} with {}",
            n_zeros(&W_regul),
            n_zeros(&W_model),
            solver
        );
        assert!(
            n_zeros(&H_regul) > n_zeros(&H_model),
            "{} zeros in regularized H against {} with {}",
            n_zeros(&H_regul),
            n_zeros(&H_model),
            solver
        );
    }

    // L2 regularization decreases the mean of the coefficients
    for &solver in SOLVERS.iter() {
        let (W_regul, H_regul) = fit(solver, 0.5, 0.0, 200, 1e-4);
        let (W_model, H_model) = fit(solver, 0.0, 0.0, 200, 1e-4);

        assert!(W_model.mean().unwrap() > W_regul.mean().unwrap());
        assert!(H_model.mean().unwrap() > H_regul.mean().unwrap());
    }
}

#[test]
fn test_nmf_with_nan() {
    // X can contain NaN values, but not W or H
    let (n_samples, n_features, n_components) = (20, 15, 10);
    let mut random = RandomMatrix::new(42);
    let X = random.abs_normal((n_samples, n_features), 1.0);
    let X_nan = random.with_missing(&X, n_samples * n_features / 2);

    let mut model = Nmf::new(
        NmfParamsBuilder::default()
            .n_components(n_components)
            .beta_loss(BetaLoss::Frobenius)
            .max_iter(1)
            .solver(Solver::MultiplicativeUpdate)
            .init(Init::Random)
            .build()
            .unwrap(),
    );
    model.fit(&X_nan).unwrap();
    // transform also accepts NaN in X
    let W = model.transform(&X_nan).unwrap();
    let H = model.components().unwrap().to_owned();

    let W_nan = random.with_missing(&W, 30);
    let H_nan = random.with_missing(&H, 30);

    let msg = "Input contains NaN, infinity or a value too large for dtype('float64').";
    model.params.init = Some(Init::Custom);
    assert_eq!(
        model
            .fit_transform(&X_nan, Some(W_nan), Some(H.clone()))
            .unwrap_err()
            .to_string(),
        msg
    );
    assert_eq!(
        model
            .fit_transform(&X_nan, Some(W.clone()), Some(H_nan.clone()))
            .unwrap_err()
            .to_string(),
        msg
    );

    model.set_components(H_nan);
    assert_eq!(model.transform(&X_nan).unwrap_err().to_string(), msg);
}

#[test]
fn test_nmf_decreasing() {
    // the objective function decreases at each iteration
    let (n_samples, n_features, n_components) = (20, 15, 10);
    let (alpha, l1_ratio) = (0.1, 0.5);
    let mut random = RandomMatrix::new(42);
    let X_full = random.abs_normal((n_samples, n_features), 1.0);
    let X_nan = random.with_missing(&X_full, n_samples * n_features / 2);

    let (W0, H0) = initialize_nmf(
        &X_full,
        n_components,
        Some(Init::Random),
        DEFAULT_SEED_EPS,
        Some(42),
    )
    .unwrap();

    for X in [&X_full, &X_nan].iter() {
        for &beta_loss in &[-1.2, 0.0, 0.2, 1.0, 2.0, 2.5] {
            for &solver in SOLVERS.iter() {
                if solver == Solver::CoordinateDescent
                    && (MathUtils::has_missing(*X) || beta_loss != 2.0)
                {
                    // not handled by coordinate descent
                    continue;
                }

                let params = NmfParamsBuilder::default()
                    .beta_loss(BetaLoss::Value(beta_loss))
                    .init(Init::Custom)
                    .n_components(n_components)
                    .max_iter(1)
                    .solver(solver)
                    .tol(0.0)
                    .alpha(alpha)
                    .l1_ratio(l1_ratio)
                    .regularization(Regularization::Both)
                    .random_state(0)
                    .build()
                    .unwrap();
                let (l1_reg, _, l2_reg, _) = params.regularization_terms();

                let (mut W, mut H) = (W0.clone(), H0.clone());
                let mut previous_loss = None;
                for _ in 0..30 {
                    // one more iteration starting from the previous results
                    let result = non_negative_factorization(X, Some(W), Some(H), &params, true).unwrap();
                    W = result.w;
                    H = result.h;

                    let loss = beta_divergence(X, &W, &H, beta_loss, false)
                        + l1_reg * (W.sum() + H.sum())
                        + 0.5 * l2_reg * (MathUtils::squared_norm(&W) + MathUtils::squared_norm(&H));
                    if let Some(previous_loss) = previous_loss {
                        assert!(
                            previous_loss > loss,
                            "loss increased from {} to {} with {} and beta {}",
                            previous_loss,
                            loss,
                            solver,
                            beta_loss
                        );
                    }
                    previous_loss = Some(loss);
                }
            }
        }
    }
}

#[test]
fn test_nmf_check_missing_values() {
    let nan = std::f64::NAN;
    let X = array![[2.0, 0.0], [nan, 2.0]];

    let nndsvdar = NmfParamsBuilder::default()
        .init(Init::Nndsvdar)
        .solver(Solver::MultiplicativeUpdate)
        .build()
        .unwrap();
    assert_eq!(
        non_negative_factorization(&X, None, None, &nndsvdar, true)
            .unwrap_err()
            .to_string(),
        "initializations with NNDSVD are not available with missing values (NaN)."
    );

    let cd = NmfParamsBuilder::default()
        .init(Init::Random)
        .solver(Solver::CoordinateDescent)
        .build()
        .unwrap();
    assert_eq!(
        non_negative_factorization(&X, None, None, &cd, true)
            .unwrap_err()
            .to_string(),
        "NMF solver 'cd' cannot handle missing values (NaN). Use solver 'mu'."
    );

    let mu = NmfParamsBuilder::default()
        .init(Init::Random)
        .solver(Solver::MultiplicativeUpdate)
        .random_state(0)
        .build()
        .unwrap();
    assert!(non_negative_factorization(&X, None, None, &mu, true).is_ok());
}

#[test]
fn test_nmf_imputation() {
    // a low rank X is recovered from its observed entries
    let (n_samples, n_features, n_components) = (20, 10, 3);
    let mut random = RandomMatrix::new(42);
    let X0 = random.low_rank((n_samples, n_features), n_components);
    let X = random.with_missing(&X0, n_samples * n_features / 10);

    for &beta_loss in &[0.0, 1.0, 2.0] {
        let params = NmfParamsBuilder::default()
            .beta_loss(BetaLoss::Value(beta_loss))
            .init(Init::Random)
            .max_iter(2000)
            .tol(0.0)
            .n_components(n_components)
            .solver(Solver::MultiplicativeUpdate)
            .random_state(0)
            .build()
            .unwrap();
        let result = non_negative_factorization(&X, None, None, &params, true).unwrap();
        let error = relative_error(&X0, &result.w.dot(&result.h));
        assert!(error < 0.1, "relative error {} with beta {}", error, beta_loss);

        let mut model = Nmf::new(params);
        model.fit(&X).unwrap();
        let imputed = model.impute(&X).unwrap();
        assert!(!MathUtils::has_missing(&imputed));
        assert!(relative_error(&X0, &imputed) < 0.1);
    }
}
