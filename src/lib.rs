pub mod cli;
pub mod factorization;
pub mod matrix_handling;
pub mod test_utils;
pub mod utils;

// Linear algebra
extern crate nalgebra;
extern crate ndarray;
extern crate ndarray_npy;

// Utilities
extern crate ansi_term;
extern crate clap;
extern crate csv;
extern crate env_logger;
extern crate itertools;
extern crate rand;
extern crate rand_distr;
extern crate rayon;
extern crate strum;
extern crate thiserror;

#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
extern crate strum_macros;
#[macro_use]
extern crate lazy_static;

pub use factorization::nmf::{non_negative_factorization, Factorization, Nmf, RunFactorization};
pub use factorization::params::{
    BetaLoss, Init, NmfParams, NmfParamsBuilder, Regularization, Solver,
};
pub use utils::errors::NmfError;
