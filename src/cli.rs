use clap::*;
use std::result::Result;
use std::str::FromStr;

use crate::factorization::params::{BetaLoss, Init, NmfParams, NmfParamsBuilder, Solver};
use crate::utils::errors::NmfError;

const SOLVER_LIST: &[&str] = &["cd", "mu"];
const INIT_LIST: &[&str] = &["none", "random", "nndsvd", "nndsvda", "nndsvdar"];

const SOLVER_HELP: &str =
    "    -k, --n-components <INT>        Number of components. [default: number of columns]\n
        --solver <NAME>                 Numerical solver, \"cd\" (coordinate descent,
                                        Frobenius loss only) or \"mu\" (multiplicative
                                        update, any beta loss, handles missing values).
                                        [default: \"cd\"]\n
        --init <NAME>                   Initialization of W and H: \"random\", \"nndsvd\",
                                        \"nndsvda\", \"nndsvdar\" or \"none\" for automatic.
                                        NNDSVD variants cannot be used with missing
                                        values. [default: \"none\"]\n
        --beta-loss <NAME|FLOAT>        Beta divergence to minimize: \"frobenius\",
                                        \"kullback-leibler\", \"itakura-saito\" or any
                                        float. Only \"mu\" handles losses other than
                                        frobenius. [default: \"frobenius\"]\n
        --tol <FLOAT>                   Tolerance of the stopping condition.
                                        [default: 0.0001]\n
        --max-iter <INT>                Maximum number of iterations. [default: 200]\n
        --alpha <FLOAT>                 Constant that multiplies the regularization
                                        terms, 0 disables them. [default: 0.0]\n
        --l1-ratio <FLOAT>              Mixing between L1 (1.0) and L2 (0.0) penalties.
                                        [default: 0.0]\n
        --seed <INT>                    Seed of the random number generator used by the
                                        random and nndsvdar inits and by --shuffle.\n
        --shuffle                       Randomize the order of coordinates in the cd
                                        solver.\n";

const INPUT_HELP: &str =
    "    -i, --input <PATH>              Data matrix X, delimited text or .npy. Empty cells,
                                        NA, NaN, nan and ? are missing values.\n
        -d, --delimiter <CHAR>          Field delimiter of text files. [default: \",\"]\n
        --header                        Text input files start with a header line.\n";

const OTHER_HELP: &str =
    "    -t, --threads <INT>             Number of threads. [default: 1]\n
        -v, --verbose                   Print extra debugging information\n
        -q, --quiet                     Unless there is an error, do not print
                                        log messages\n";

pub fn factorize_full_help() -> String {
    format!(
        "nmf factorize: Factorize a non-negative matrix X into W.H

Input:
{}
Output (both required):
    -W, --output-w <PATH>           File for W (n_samples x k). Files ending in .npy
                                    are written in NumPy format.
    -H, --output-h <PATH>           File for H (k x n_features).

Factorization:
{}
Other:
{}
Example usage:

  nmf factorize -i data.csv -k 5 --solver mu --init random --seed 0 -W w.csv -H h.csv

Igor Gotlibovych <igor.gotlibovych@gmail.com>",
        INPUT_HELP, SOLVER_HELP, OTHER_HELP
    )
}

pub fn transform_full_help() -> String {
    format!(
        "nmf transform: Solve W for fixed components H

Input:
{}
    -c, --components <PATH>         Fitted components H (k x n_features). [required]

Output:
    -o, --output <PATH>             File for W. [required]

Factorization:
{}
Other:
{}
Example usage:

  nmf transform -i new_data.csv --components h.csv --solver mu -o w_new.csv

Igor Gotlibovych <igor.gotlibovych@gmail.com>",
        INPUT_HELP, SOLVER_HELP, OTHER_HELP
    )
}

pub fn impute_full_help() -> String {
    format!(
        "nmf impute: Fill the missing entries of X from a low rank factorization

Input:
{}
Output:
    -o, --output <PATH>             File for X with its missing entries filled.
                                    [required]

Factorization (with missing values in X, mu and random init are the defaults):
{}
Other:
{}
Example usage:

  nmf impute -i data_with_gaps.csv -k 3 --max-iter 1000 -o filled.csv

Igor Gotlibovych <igor.gotlibovych@gmail.com>",
        INPUT_HELP, SOLVER_HELP, OTHER_HELP
    )
}

/// Prints the long help of a subcommand and exits when --full-help is given
pub fn print_full_help_if_needed(m: &clap::ArgMatches, full_help: String) {
    if m.is_present("full-help") {
        println!("{}", full_help);
        std::process::exit(0)
    }
}

fn parse_value<T: FromStr>(m: &clap::ArgMatches, parameter: &'static str) -> Result<Option<T>, NmfError> {
    match m.value_of(parameter) {
        Some(value) => value.parse::<T>().map(Some).map_err(|_| NmfError::InvalidNumber {
            parameter,
            got: value.to_string(),
        }),
        None => Ok(None),
    }
}

/// Field delimiter of text files, a single byte
pub fn parse_delimiter(m: &clap::ArgMatches) -> Result<u8, NmfError> {
    let value = m.value_of("delimiter").unwrap_or(",");
    let value = if value == "\\t" || value == "tab" { "\t" } else { value };
    match value.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(NmfError::Params(format!(
            "delimiter must be a single character, got '{}'",
            value
        ))),
    }
}

/**
 * Maps the factorization flags of a subcommand onto NmfParams.
 * Flags that are absent keep the NmfParams defaults.
 */
pub fn generate_params_from_clap(m: &clap::ArgMatches) -> Result<NmfParams, NmfError> {
    let mut builder = NmfParamsBuilder::default();

    if let Some(n_components) = parse_value::<usize>(m, "n-components")? {
        builder.n_components(n_components);
    }
    if let Some(solver) = m.value_of("solver") {
        builder.solver(Solver::from_str(solver)?);
    }
    if let Some(init) = m.value_of("init") {
        if let Some(init) = Init::parse_optional(init)? {
            builder.init(init);
        }
    }
    if let Some(beta_loss) = m.value_of("beta-loss") {
        builder.beta_loss(BetaLoss::from_str(beta_loss)?);
    }
    if let Some(tol) = parse_value::<f64>(m, "tol")? {
        builder.tol(tol);
    }
    if let Some(max_iter) = parse_value::<usize>(m, "max-iter")? {
        builder.max_iter(max_iter);
    }
    if let Some(alpha) = parse_value::<f64>(m, "alpha")? {
        builder.alpha(alpha);
    }
    if let Some(l1_ratio) = parse_value::<f64>(m, "l1-ratio")? {
        builder.l1_ratio(l1_ratio);
    }
    if let Some(seed) = parse_value::<u64>(m, "seed")? {
        builder.random_state(seed);
    }
    builder.shuffle(m.is_present("shuffle"));
    builder.verbose(m.is_present("verbose"));

    let params = builder.build()?;
    debug!("Factorization parameters: {:?}", params);
    Ok(params)
}

fn add_input_args<'a, 'b>(subcommand: App<'a, 'b>) -> App<'a, 'b> {
    subcommand
        .arg(Arg::with_name("full-help").long("full-help"))
        .arg(
            Arg::with_name("input")
                .short("i")
                .long("input")
                .takes_value(true)
                .required_unless_one(&["full-help"]),
        )
        .arg(
            Arg::with_name("delimiter")
                .short("d")
                .long("delimiter")
                .default_value(",")
                .takes_value(true),
        )
        .arg(Arg::with_name("header").long("header"))
}

fn add_factorization_args<'a, 'b>(subcommand: App<'a, 'b>) -> App<'a, 'b> {
    subcommand
        .arg(
            Arg::with_name("n-components")
                .short("k")
                .long("n-components")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("solver")
                .long("solver")
                .possible_values(SOLVER_LIST)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("init")
                .long("init")
                .possible_values(INIT_LIST)
                .takes_value(true),
        )
        .arg(Arg::with_name("beta-loss").long("beta-loss").takes_value(true))
        .arg(Arg::with_name("tol").long("tol").takes_value(true))
        .arg(Arg::with_name("max-iter").long("max-iter").takes_value(true))
        .arg(Arg::with_name("alpha").long("alpha").takes_value(true))
        .arg(Arg::with_name("l1-ratio").long("l1-ratio").takes_value(true))
        .arg(Arg::with_name("seed").long("seed").takes_value(true))
        .arg(Arg::with_name("shuffle").long("shuffle"))
}

fn add_other_args<'a, 'b>(subcommand: App<'a, 'b>) -> App<'a, 'b> {
    subcommand
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .default_value("1")
                .takes_value(true),
        )
        .arg(Arg::with_name("verbose").short("v").long("verbose"))
        .arg(Arg::with_name("quiet").short("q").long("quiet"))
}

pub fn build_cli() -> App<'static, 'static> {
    lazy_static! {
        static ref FACTORIZE_HELP: String = format!(
            "
                            {}
              {}

{}

  nmf factorize -i data.csv -k 5 -W w.csv -H h.csv

{}

  nmf factorize -i data.tsv -d tab --header -k 5 --solver mu --beta-loss kullback-leibler
    --init nndsvda --max-iter 500 -W w.npy -H h.npy --threads 4

See nmf factorize --full-help for further options and further detail.
",
            ansi_term::Colour::Green.paint("nmf factorize"),
            ansi_term::Colour::Green.paint("Factorize a non-negative matrix X into W.H"),
            ansi_term::Colour::Purple.paint("Example: Fit 5 components with coordinate descent:"),
            ansi_term::Colour::Purple.paint(
                "Example: Minimize the Kullback-Leibler divergence of a tab separated matrix\n\
                 with a header line, writing the factors in NumPy format:"
            ),
        );
        static ref TRANSFORM_HELP: String = format!(
            "
                            {}
              {}

{}

  nmf transform -i new_data.csv --components h.csv --solver mu -o w_new.csv

See nmf transform --full-help for further options and further detail.
",
            ansi_term::Colour::Green.paint("nmf transform"),
            ansi_term::Colour::Green.paint("Solve W for fixed components H"),
            ansi_term::Colour::Purple.paint(
                "Example: Project new samples onto components fitted by nmf factorize:"
            ),
        );
        static ref IMPUTE_HELP: String = format!(
            "
                            {}
              {}

{}

  nmf impute -i data_with_gaps.csv -k 3 --max-iter 1000 -o filled.csv

See nmf impute --full-help for further options and further detail.
",
            ansi_term::Colour::Green.paint("nmf impute"),
            ansi_term::Colour::Green.paint("Fill missing entries of X from a low rank factorization"),
            ansi_term::Colour::Purple.paint(
                "Example: Fill the empty cells of a matrix with a rank 3 model:"
            ),
        );
    }

    App::new("nmf")
        .version(crate_version!())
        .author("Igor Gotlibovych <igor.gotlibovych@gmail.com>")
        .about("Non-negative matrix factorization with missing values")
        .args_from_usage(
            "-v, --verbose       'Print extra debug logging information'
             -q, --quiet         'Unless there is an error, do not print logging information'",
        )
        .help(
            "
Non-negative matrix factorization with missing values

Usage: nmf <subcommand> ...

Main subcommands:
\tfactorize\tFactorize a non-negative matrix X into W.H
\ttransform\tSolve W for fixed components H
\timpute   \tFill missing entries of X from a low rank factorization

Other options:
\t-V, --version\tPrint version information

Igor Gotlibovych <igor.gotlibovych@gmail.com>
",
        )
        .global_setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(add_other_args(add_factorization_args(add_input_args(
            SubCommand::with_name("factorize")
                .about("Factorize a non-negative matrix X into W.H")
                .help(FACTORIZE_HELP.as_str())
                .arg(
                    Arg::with_name("output-w")
                        .short("W")
                        .long("output-w")
                        .takes_value(true)
                        .required_unless_one(&["full-help"]),
                )
                .arg(
                    Arg::with_name("output-h")
                        .short("H")
                        .long("output-h")
                        .takes_value(true)
                        .required_unless_one(&["full-help"]),
                ),
        ))))
        .subcommand(add_other_args(add_factorization_args(add_input_args(
            SubCommand::with_name("transform")
                .about("Solve W for fixed components H")
                .help(TRANSFORM_HELP.as_str())
                .arg(
                    Arg::with_name("components")
                        .short("c")
                        .long("components")
                        .takes_value(true)
                        .required_unless_one(&["full-help"]),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .required_unless_one(&["full-help"]),
                ),
        ))))
        .subcommand(add_other_args(add_factorization_args(add_input_args(
            SubCommand::with_name("impute")
                .about("Fill missing entries of X from a low rank factorization")
                .help(IMPUTE_HELP.as_str())
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .required_unless_one(&["full-help"]),
                ),
        ))))
}
