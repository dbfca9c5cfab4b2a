//! Per-iteration observation hooks, driven by `--driver.verbosity` (spec
//! §6). Ambient observability, carried regardless of the logging/metrics
//! non-goal in spec §1 (see `SPEC_FULL.md`).

use macros::build_option_enum;

use crate::SolverOptions;
use crate::objective::IterLog;

/// Hook invoked once per evaluation-closure call for logging or monitoring.
pub trait Callback {
    fn new(options: &SolverOptions) -> Self
    where
        Self: Sized;

    fn call(&mut self, log: &IterLog);
}

/// A callback that does nothing (`--driver.verbosity 0`).
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn call(&mut self, _log: &IterLog) {}
}

/// Emits one `tracing` event per evaluation (`--driver.verbosity >= 2`).
pub struct ConvergenceOutput {}

impl Callback for ConvergenceOutput {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn call(&mut self, log: &IterLog) {
        tracing::info!(
            iteration = log.iteration,
            dual_value = log.dual_value,
            max_slack = log.max_slack,
            grad_nnz = log.grad_nnz,
            eval_time_us = log.eval_time.as_micros() as u64,
            "{}",
            log.summary_line()
        );
    }
}

build_option_enum!(
    trait_ = Callback,
    name = "Callbacks",
    variants = (NoOpCallback, ConvergenceOutput),
    new_arguments = (&SolverOptions,),
    doc_header = "An enum representing the available per-iteration observation hooks."
);
