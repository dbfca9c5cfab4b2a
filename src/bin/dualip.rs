//! CLI entry point (spec §6 "Command-line surface").

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dualip::SolverOptions;
use dualip::driver::{DriverParams, InputParams, MaximizerKind, single_run};
use dualip::objective::registry::ProjectionType;
use dualip::objective::Verbosity;
use dualip::serializer::TableFormat;

/// Runs a single Lagrangian dual-decomposition solve.
///
/// Unknown flags are passed through as `--key value` pairs and handed to
/// the objective factory as `objective_args` (spec §6 "Unknown flags are
/// ignored (passed through to objective-specific parsers)").
#[derive(Parser, Debug)]
#[command(name = "dualip", trailing_var_arg = true)]
struct Cli {
    #[arg(long = "driver.projectionType", default_value = "Simplex")]
    driver_projection_type: String,

    #[arg(long = "driver.objectiveClass")]
    driver_objective_class: String,

    #[arg(long = "driver.solverOutputPath")]
    driver_solver_output_path: PathBuf,

    #[arg(long = "driver.initialLambdaPath")]
    driver_initial_lambda_path: Option<PathBuf>,

    #[arg(long = "driver.gamma", default_value_t = 1e-3)]
    driver_gamma: f64,

    #[arg(long = "driver.savePrimal", default_value_t = false)]
    driver_save_primal: bool,

    #[arg(long = "driver.verbosity", default_value_t = 1)]
    driver_verbosity: u8,

    #[arg(long = "driver.solver", default_value = "lbfgsb")]
    driver_solver: String,

    /// Spec §6 names `AVRO` as the default, but only `Csv` is backed by
    /// a writer (see `SPEC_FULL.md`), so that's the default here.
    #[arg(long = "driver.outputFormat", default_value = "Csv")]
    driver_output_format: String,

    #[arg(long = "input.ACblocksPath")]
    input_ac_blocks_path: Option<PathBuf>,

    #[arg(long = "input.vectorBPath")]
    input_vector_b_path: Option<PathBuf>,

    #[arg(long = "input.format", default_value = "AVRO")]
    input_format: String,

    #[arg(allow_hyphen_values = true)]
    extra: Vec<String>,
}

/// Parses `extra` (spec §6's passthrough flags) as alternating
/// `--key value` pairs into the objective-factory argument map.
fn parse_objective_args(extra: &[String]) -> HashMap<String, String> {
    let mut args = HashMap::new();
    let mut iter = extra.iter();
    while let Some(flag) = iter.next() {
        let key = flag.trim_start_matches("--").to_string();
        if let Some(value) = iter.next() {
            args.insert(key, value.clone());
        }
    }
    args
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let projection_type: ProjectionType = match cli.driver_projection_type.parse() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("argument error: {e}");
            return ExitCode::from(1);
        }
    };
    let maximizer: MaximizerKind = match cli.driver_solver.parse() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("argument error: {e}");
            return ExitCode::from(1);
        }
    };
    let output_format: TableFormat = match cli.driver_output_format.parse() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("argument error: {e}");
            return ExitCode::from(1);
        }
    };

    let driver = DriverParams {
        projection_type,
        objective_class: cli.driver_objective_class,
        solver_output_path: cli.driver_solver_output_path,
        initial_lambda_path: cli.driver_initial_lambda_path,
        gamma: cli.driver_gamma,
        save_primal: cli.driver_save_primal,
        verbosity: Verbosity::from_level(cli.driver_verbosity),
        maximizer,
        output_format,
    };
    let input = InputParams {
        ac_blocks_path: cli.input_ac_blocks_path,
        vector_b_path: cli.input_vector_b_path,
        objective_args: parse_objective_args(&cli.extra),
    };
    let options = SolverOptions::new();

    match single_run(&driver, &input, &options) {
        Ok(result) => {
            println!("{:?}: {} iterations, dual value {:.6e}", result.status, result.iterations, result.dual_value);
            ExitCode::from(0)
        }
        Err(problem) => {
            eprintln!("solve failed: {problem}");
            ExitCode::from(1)
        }
    }
}
