use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter};

use crate::utils::errors::NmfError;

fn quoted_variants<T: IntoEnumIterator + AsRef<str>>() -> Vec<String> {
    T::iter().map(|v| format!("'{}'", v.as_ref())).collect()
}

fn parse_variant<T: IntoEnumIterator + AsRef<str>>(
    to_match: &str,
    parameter: &'static str,
    allowed: String,
) -> Result<T, NmfError> {
    T::iter()
        .find(|v| v.as_ref() == to_match)
        .ok_or_else(|| NmfError::InvalidParameter {
            parameter,
            got: to_match.to_string(),
            allowed,
        })
}

/// Numerical solver used to fit the factorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumIter)]
pub enum Solver {
    /// Coordinate descent, Frobenius loss only
    #[strum(serialize = "cd")]
    CoordinateDescent,
    /// Multiplicative update, any beta divergence, handles missing values
    #[strum(serialize = "mu")]
    MultiplicativeUpdate,
}

impl FromStr for Solver {
    type Err = NmfError;

    fn from_str(to_match: &str) -> Result<Self, Self::Err> {
        let allowed = format!("({})", quoted_variants::<Solver>().join(", "));
        parse_variant(to_match, "solver", allowed)
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::CoordinateDescent
    }
}

/// Method used to initialize W and H
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumIter)]
pub enum Init {
    #[strum(serialize = "random")]
    Random,
    #[strum(serialize = "nndsvd")]
    Nndsvd,
    #[strum(serialize = "nndsvda")]
    Nndsvda,
    #[strum(serialize = "nndsvdar")]
    Nndsvdar,
    #[strum(serialize = "custom")]
    Custom,
}

impl Init {
    pub fn is_nndsvd(&self) -> bool {
        matches!(self, Init::Nndsvd | Init::Nndsvda | Init::Nndsvdar)
    }

    /**
     * Parses an optional init, where "none" selects the automatic choice
     */
    pub fn parse_optional(to_match: &str) -> Result<Option<Self>, NmfError> {
        match to_match {
            "none" | "None" => Ok(None),
            _ => to_match.parse().map(Some),
        }
    }
}

impl FromStr for Init {
    type Err = NmfError;

    fn from_str(to_match: &str) -> Result<Self, Self::Err> {
        let allowed = format!(
            "(None, {})",
            quoted_variants::<Init>().join(", ")
        );
        parse_variant(to_match, "init", allowed)
    }
}

/// Which factor(s) the regularization penalty applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumIter)]
pub enum Regularization {
    #[strum(serialize = "both")]
    Both,
    #[strum(serialize = "components")]
    Components,
    #[strum(serialize = "transformation")]
    Transformation,
}

impl Regularization {
    pub fn parse_optional(to_match: &str) -> Result<Option<Self>, NmfError> {
        match to_match {
            "none" | "None" => Ok(None),
            _ => to_match.parse().map(Some),
        }
    }
}

impl FromStr for Regularization {
    type Err = NmfError;

    fn from_str(to_match: &str) -> Result<Self, Self::Err> {
        let allowed = format!(
            "({}, None)",
            quoted_variants::<Regularization>().join(", ")
        );
        parse_variant(to_match, "regularization", allowed)
    }
}

/**
 * Beta divergence to be minimized, measuring the distance between X and the dot product WH.
 *
 * Frobenius, Kullback-Leibler and Itakura-Saito are the special cases beta = 2, 1 and 0.
 * Any other float is accepted as-is.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BetaLoss {
    Frobenius,
    KullbackLeibler,
    ItakuraSaito,
    Value(f64),
}

impl BetaLoss {
    const NAMES: [&'static str; 3] = ["frobenius", "kullback-leibler", "itakura-saito"];

    pub fn to_float(&self) -> f64 {
        match self {
            BetaLoss::Frobenius => 2.0,
            BetaLoss::KullbackLeibler => 1.0,
            BetaLoss::ItakuraSaito => 0.0,
            BetaLoss::Value(beta) => *beta,
        }
    }

    /// Rendering used in error messages: names quoted, floats with a decimal point
    pub fn repr(&self) -> String {
        match self {
            BetaLoss::Value(beta) => format!("{:?}", beta),
            named => format!("'{}'", named),
        }
    }
}

impl Default for BetaLoss {
    fn default() -> Self {
        BetaLoss::Frobenius
    }
}

impl From<f64> for BetaLoss {
    fn from(beta: f64) -> Self {
        BetaLoss::Value(beta)
    }
}

impl fmt::Display for BetaLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetaLoss::Frobenius => write!(f, "{}", Self::NAMES[0]),
            BetaLoss::KullbackLeibler => write!(f, "{}", Self::NAMES[1]),
            BetaLoss::ItakuraSaito => write!(f, "{}", Self::NAMES[2]),
            BetaLoss::Value(beta) => write!(f, "{}", beta),
        }
    }
}

impl FromStr for BetaLoss {
    type Err = NmfError;

    fn from_str(to_match: &str) -> Result<Self, Self::Err> {
        match to_match {
            "frobenius" => Ok(BetaLoss::Frobenius),
            "kullback-leibler" => Ok(BetaLoss::KullbackLeibler),
            "itakura-saito" => Ok(BetaLoss::ItakuraSaito),
            _ => to_match
                .parse::<f64>()
                .ok()
                .filter(|beta| beta.is_finite())
                .map(BetaLoss::Value)
                .ok_or_else(|| NmfError::InvalidParameter {
                    parameter: "beta_loss",
                    got: to_match.to_string(),
                    allowed: format!(
                        "({}), or a float.",
                        Self::NAMES.iter().map(|n| format!("'{}'", n)).join(", ")
                    ),
                }),
        }
    }
}

/**
 * Configuration of a factorization.
 *
 * Build one with `NmfParamsBuilder`, every field left unset takes its default:
 * cd solver, Frobenius loss, tol 1e-4, 200 iterations, no regularization.
 */
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct NmfParams {
    /// Number of components, defaults to the number of features
    #[builder(setter(strip_option))]
    pub n_components: Option<usize>,
    /// Initialization method, chosen automatically when unset
    #[builder(setter(strip_option))]
    pub init: Option<Init>,
    pub solver: Solver,
    pub beta_loss: BetaLoss,
    /// Tolerance of the stopping condition
    pub tol: f64,
    pub max_iter: usize,
    #[builder(setter(strip_option))]
    pub random_state: Option<u64>,
    /// Constant that multiplies the regularization terms, zero disables them
    pub alpha: f64,
    /// Mixing between elementwise L1 (1.0) and L2 (0.0) penalties
    pub l1_ratio: f64,
    #[builder(setter(strip_option))]
    pub regularization: Option<Regularization>,
    /// Randomize the order of coordinates in the cd solver
    pub shuffle: bool,
    pub verbose: bool,
}

impl Default for NmfParams {
    fn default() -> Self {
        NmfParams {
            n_components: None,
            init: None,
            solver: Solver::default(),
            beta_loss: BetaLoss::default(),
            tol: 1e-4,
            max_iter: 200,
            random_state: None,
            alpha: 0.0,
            l1_ratio: 0.0,
            regularization: None,
            shuffle: false,
            verbose: false,
        }
    }
}

impl From<NmfParamsBuilderError> for NmfError {
    fn from(err: NmfParamsBuilderError) -> Self {
        NmfError::Params(err.to_string())
    }
}

impl NmfParams {
    /**
     * Checks the solver, loss and init combination and returns the loss as a float.
     *
     * The cd solver only minimizes the Frobenius norm.
     */
    pub fn check_string_params(&self) -> Result<f64, NmfError> {
        let beta = self.beta_loss.to_float();
        if self.solver != Solver::MultiplicativeUpdate && beta != 2.0 {
            return Err(NmfError::UnsupportedBetaLoss {
                solver: self.solver.to_string(),
                beta_loss: self.beta_loss.repr(),
            });
        }

        if self.solver == Solver::MultiplicativeUpdate && self.init == Some(Init::Nndsvd) {
            warn!(
                "The multiplicative update ('mu') solver cannot update zeros present in the \
                 initialization, and so leads to poorer results when used jointly with \
                 init='nndsvd'. You may try init='nndsvda' or init='nndsvdar' instead."
            );
        }

        Ok(beta)
    }

    /**
     * Splits alpha into (l1_reg_w, l1_reg_h, l2_reg_w, l2_reg_h) according to the
     * regularization target and l1_ratio
     */
    pub fn regularization_terms(&self) -> (f64, f64, f64, f64) {
        let (alpha_w, alpha_h) = match self.regularization {
            Some(Regularization::Both) => (self.alpha, self.alpha),
            Some(Regularization::Components) => (0.0, self.alpha),
            Some(Regularization::Transformation) => (self.alpha, 0.0),
            None => (0.0, 0.0),
        };

        (
            alpha_w * self.l1_ratio,
            alpha_h * self.l1_ratio,
            alpha_w * (1.0 - self.l1_ratio),
            alpha_h * (1.0 - self.l1_ratio),
        )
    }
}
