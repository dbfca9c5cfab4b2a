//! Solver driver (component C7, spec §4.4): composes an objective
//! instance with a maximizer, drives `maximize`, and hands the result to
//! the serializer.

use std::path::PathBuf;
use std::str::FromStr;

use derive_more::{Display, Error};
use problemo::Problem;

use crate::callback::{Callback, Callbacks};
use crate::dual_loader::load_initial_dual;
use crate::objective::registry::{self, ObjectiveArgs, ProjectionType};
use crate::objective::Verbosity;
use crate::optim::agd::AcceleratedGradientMaximizer;
use crate::optim::lbfgsb::LBfgsBMaximizer;
use crate::optim::OptimizerResult;
use crate::serializer::{write_results, TableFormat};
use crate::SolverOptions;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[display("unknown maximizer '{_0}'")]
    UnknownMaximizer(String),
}

/// Which maximizer runs the solve (spec.md §9 "parameter dispatch", in
/// the absence of a caller-supplied `fastSolver` override).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaximizerKind {
    Agd,
    #[default]
    Lbfgsb,
}

impl FromStr for MaximizerKind {
    type Err = ArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agd" | "AGD" => Ok(Self::Agd),
            "lbfgsb" | "LBFGSB" => Ok(Self::Lbfgsb),
            other => Err(ArgumentError::UnknownMaximizer(other.to_string())),
        }
    }
}

/// `--driver.*` flags (spec §6).
#[derive(Debug, Clone)]
pub struct DriverParams {
    pub projection_type: ProjectionType,
    pub objective_class: String,
    pub solver_output_path: PathBuf,
    pub initial_lambda_path: Option<PathBuf>,
    pub gamma: crate::E,
    pub save_primal: bool,
    pub verbosity: Verbosity,
    pub maximizer: MaximizerKind,
    pub output_format: TableFormat,
}

/// `--input.*` flags (spec §6). The AC-blocks/vector-B paths and the
/// AVRO/ORC `format` flag describe the external data-parallel layer's
/// inputs (out of scope, spec §1); this crate only needs the dual
/// dimensionality and whatever extra args the chosen objective wants.
#[derive(Debug, Clone)]
pub struct InputParams {
    pub ac_blocks_path: Option<PathBuf>,
    pub vector_b_path: Option<PathBuf>,
    pub objective_args: ObjectiveArgs,
}

/// `singleRun(driverParams, inputParams, args, fastSolver?)` (spec §4.4
/// steps 1-8). A caller-supplied `fastSolver` override (step 1's
/// `fastSolver?`) is modeled by pre-setting `driver.maximizer` rather
/// than a separate parameter, since `MaximizerKind` already carries that
/// choice end to end.
pub fn single_run(
    driver: &DriverParams,
    _input: &InputParams,
    options: &SolverOptions,
) -> Result<OptimizerResult, Problem> {
    let objective = registry::instantiate(
        &driver.objective_class,
        driver.gamma,
        driver.projection_type,
        &_input.objective_args,
    )?;

    let initial_lambda = load_initial_dual(driver.initial_lambda_path.as_deref(), objective.dual_dimensionality())?;

    let callback_kind = if driver.verbosity == Verbosity::Silent {
        Callbacks::NoOpCallback
    } else {
        Callbacks::ConvergenceOutput
    };
    let mut callback: Box<dyn Callback> = Callbacks::into_variant(callback_kind, options);

    let result = match driver.maximizer {
        MaximizerKind::Agd => {
            let maximizer = AcceleratedGradientMaximizer::new(objective.as_ref(), options);
            maximizer.maximize(&initial_lambda, driver.verbosity, |log| callback.call(log))
        }
        MaximizerKind::Lbfgsb => {
            let maximizer = LBfgsBMaximizer::new(objective.as_ref(), options);
            maximizer.maximize(&initial_lambda, driver.verbosity, |log| callback.call(log))
        }
    };

    tracing::info!(
        status = ?result.status,
        iterations = result.iterations,
        dual_value = result.dual_value,
        active_constraints = result.active_constraints(),
        "solve finished"
    );

    if driver.save_primal && result.primal_view.is_none() {
        tracing::warn!("--driver.savePrimal was set but the objective produced no primal view");
    }

    write_results(&driver.solver_output_path, &result, driver.output_format)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximizer_kind_parses_known_values_only() {
        assert_eq!("agd".parse::<MaximizerKind>().unwrap(), MaximizerKind::Agd);
        assert_eq!("lbfgsb".parse::<MaximizerKind>().unwrap(), MaximizerKind::Lbfgsb);
        assert!("bogus".parse::<MaximizerKind>().is_err());
    }

    #[test]
    fn single_run_drives_the_simple_objective_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let driver = DriverParams {
            projection_type: ProjectionType::Simplex,
            objective_class: "dualip.objective.SimpleObjective".to_string(),
            solver_output_path: dir.path().join("out"),
            initial_lambda_path: None,
            gamma: 1e-3,
            save_primal: true,
            verbosity: Verbosity::Silent,
            maximizer: MaximizerKind::Agd,
            output_format: TableFormat::Csv,
        };
        let input = InputParams { ac_blocks_path: None, vector_b_path: None, objective_args: ObjectiveArgs::new() };
        let mut options = SolverOptions::new();
        options.set_option("agd_max_iterations", 500usize).unwrap();

        let result = single_run(&driver, &input, &options).unwrap();
        assert!((result.lambda.get(0) - 3.0).abs() < 1e-2);
        assert!(dir.path().join("out/log/log.txt").is_file());
    }

    #[test]
    fn single_run_propagates_unknown_objective_class() {
        let dir = tempfile::tempdir().unwrap();
        let driver = DriverParams {
            projection_type: ProjectionType::Simplex,
            objective_class: "dualip.objective.DoesNotExist".to_string(),
            solver_output_path: dir.path().join("out"),
            initial_lambda_path: None,
            gamma: 1e-3,
            save_primal: false,
            verbosity: Verbosity::Silent,
            maximizer: MaximizerKind::Agd,
            output_format: TableFormat::Csv,
        };
        let input = InputParams { ac_blocks_path: None, vector_b_path: None, objective_args: ObjectiveArgs::new() };
        let options = SolverOptions::new();

        assert!(single_run(&driver, &input, &options).is_err());
    }
}
