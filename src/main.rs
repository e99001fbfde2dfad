extern crate nmf;
use nmf::cli::*;
use nmf::factorization::nmf::{Nmf, RunFactorization};
use nmf::matrix_handling::{read_matrix_auto, write_output};
use nmf::utils::errors::NmfError;

use std::env;
use std::result::Result;
use std::process;

extern crate clap;
use clap::*;

#[macro_use]
extern crate log;
extern crate env_logger;
use env_logger::Builder;
use log::LevelFilter;

extern crate rayon;

fn main() {
    let app = build_cli();
    let matches = app.get_matches();
    set_log_level(&matches, false);

    let result = match matches.subcommand() {
        ("factorize", Some(m)) => {
            print_full_help_if_needed(m, factorize_full_help());
            set_log_level(m, true);
            set_threads(m).and_then(|_| run_factorize(m))
        }
        ("transform", Some(m)) => {
            print_full_help_if_needed(m, transform_full_help());
            set_log_level(m, true);
            set_threads(m).and_then(|_| run_transform(m))
        }
        ("impute", Some(m)) => {
            print_full_help_if_needed(m, impute_full_help());
            set_log_level(m, true);
            set_threads(m).and_then(|_| run_impute(m))
        }
        _ => {
            let mut app = build_cli();
            app.print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn set_threads(m: &clap::ArgMatches) -> Result<(), NmfError> {
    let threads = value_t!(m.value_of("threads"), usize).map_err(|_| NmfError::InvalidNumber {
        parameter: "threads",
        got: m.value_of("threads").unwrap_or_default().to_string(),
    })?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| NmfError::Params(e.to_string()))
}

fn read_input(m: &clap::ArgMatches, parameter: &str) -> Result<ndarray::Array2<f64>, NmfError> {
    let delimiter = parse_delimiter(m)?;
    let path = m.value_of(parameter).unwrap_or_default();
    info!("Reading matrix {}", path);
    read_matrix_auto(path, delimiter, m.is_present("header"))
}

fn run_factorize(m: &clap::ArgMatches) -> Result<(), NmfError> {
    let x = read_input(m, "input")?;
    let mut model = Nmf::new(generate_params_from_clap(m)?);
    let w = model.fit_transform(&x, None, None)?;

    info!(
        "Reconstruction error {} after {} iterations",
        model.reconstruction_err().unwrap_or(std::f64::NAN),
        model.n_iter().unwrap_or(0)
    );

    let delimiter = parse_delimiter(m)?;
    write_output(m.value_of("output-w").unwrap_or_default(), &w, delimiter)?;
    if let Some(components) = model.components() {
        write_output(m.value_of("output-h").unwrap_or_default(), components, delimiter)?;
    }
    Ok(())
}

fn run_transform(m: &clap::ArgMatches) -> Result<(), NmfError> {
    let x = read_input(m, "input")?;
    let components = read_input(m, "components")?;
    let mut model = Nmf::new(generate_params_from_clap(m)?);
    model.set_components(components);

    let w = model.transform(&x)?;
    write_output(m.value_of("output").unwrap_or_default(), &w, parse_delimiter(m)?)
}

fn run_impute(m: &clap::ArgMatches) -> Result<(), NmfError> {
    let x = read_input(m, "input")?;
    let mut params = generate_params_from_clap(m)?;
    if x.iter().any(|v| v.is_nan()) {
        if m.value_of("solver").is_none() {
            info!("Missing values found, using the mu solver");
            params.solver = nmf::Solver::MultiplicativeUpdate;
        }
        // NNDSVD needs a complete matrix
        if m.value_of("init").is_none() {
            info!("Missing values found, using random initialization");
            params.init = Some(nmf::Init::Random);
        }
    }

    let mut model = Nmf::new(params);
    model.fit(&x)?;
    let imputed = model.impute(&x)?;

    let n_missing = x.iter().filter(|v| v.is_nan()).count();
    info!("Imputed {} missing values", n_missing);
    write_output(m.value_of("output").unwrap_or_default(), &imputed, parse_delimiter(m)?)
}

fn set_log_level(matches: &clap::ArgMatches, is_last: bool) {
    let mut log_level = LevelFilter::Info;
    let mut specified = false;
    if matches.is_present("verbose") {
        specified = true;
        log_level = LevelFilter::Debug;
    }
    if matches.is_present("quiet") {
        specified = true;
        log_level = LevelFilter::Error;
    }
    if specified || is_last {
        let mut builder = Builder::new();
        builder.filter_level(log_level);
        if let Ok(filters) = env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        if builder.try_init().is_err() {
            debug!("Log level already set by the top level flags");
        }
    }
    if is_last {
        info!("nmf version {}", crate_version!());
    }
}
