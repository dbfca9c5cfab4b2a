//! The objective contract (spec §4.1): the polymorphic entity every LP
//! flavor (matching LP, inventory LP, ...) implements. Concrete LP flavors
//! are out of scope for this crate; [`examples`] carries only the small
//! fixtures the maximizers in [`crate::optim`] are tested against.

pub mod examples;
pub mod registry;

use std::time::Duration;

use derive_more::{Display, Error};

use crate::sparse::SparseVector;
use crate::{E, I};

/// Raised by [`Objective::calculate`] when the inner primal argmax is
/// non-unique at the supplied `λ` (e.g. a tie in a simplex projection).
/// A genuine outcome, not a bug: [`crate::optim::lbfgsb`] catches it and
/// reports [`crate::optim::Status::Failed`].
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("objective is non-differentiable at the supplied dual point")]
pub struct NonDifferentiable;

/// How much per-iteration detail the objective and driver should print,
/// set from `--driver.verbosity` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Silent,
    #[default]
    Summary,
    PerIteration,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Summary,
            _ => Verbosity::PerIteration,
        }
    }
}

/// One row of the running solver log, appended to on every call to
/// [`Objective::calculate`] (spec §3 "History" / §4.1 "Must populate
/// `iterLog` with timing fields").
#[derive(Debug, Clone)]
pub struct IterLog {
    pub iteration: usize,
    pub eval_time: Duration,
    pub dual_value: E,
    pub max_slack: E,
    pub grad_nnz: usize,
}

impl IterLog {
    pub fn new(iteration: usize) -> Self {
        Self {
            iteration,
            eval_time: Duration::ZERO,
            dual_value: 0.0,
            max_slack: 0.0,
            grad_nnz: 0,
        }
    }

    /// One-line summary in the teacher's `ConvergenceOutput` style.
    pub fn summary_line(&self) -> String {
        format!(
            "| {:6} | {:<12.6e} | {:<12.6e} | {:>6} | {:>9.2?} |",
            self.iteration, self.dual_value, self.max_slack, self.grad_nnz, self.eval_time
        )
    }
}

/// An opaque, serializable primal certificate (spec §3 "Computation
/// result" / §4.6 "primal/ — the primal view, ... in a schema chosen by
/// the objective").
#[derive(Debug, Clone, Default)]
pub struct PrimalView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<E>>,
}

impl PrimalView {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<E>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }
}

/// The immutable record returned by [`Objective::calculate`] (spec §3
/// "Computation result").
#[derive(Debug, Clone)]
pub struct DualResult {
    pub dual_value: E,
    pub gradient: SparseVector,
    pub primal_objective: E,
    pub primal_upper_bound: E,
    pub slack: SparseVector,
    pub max_slack: E,
}

impl DualResult {
    pub fn new(dual_value: E, gradient: SparseVector, primal_objective: E, primal_upper_bound: E) -> Self {
        let slack = gradient.clone();
        let max_slack = slack.max_violation();
        Self { dual_value, gradient, primal_objective, primal_upper_bound, slack, max_slack }
    }
}

/// The abstract interface every LP flavor implements (spec §4.1).
///
/// `calculate` is deterministic given `λ` and thread-safe only in the
/// sense that the maximizer calls it sequentially (spec §5): all
/// parallelism lives inside the implementation, which may fan out a
/// distributed matrix-vector computation and block the caller.
pub trait Objective: Send {
    /// Evaluates dual value, gradient, primal inner solution and slack at
    /// `lambda`. Populates `iter_log` with timing/value fields.
    fn calculate(
        &self,
        lambda: &SparseVector,
        iter_log: &mut IterLog,
        verbosity: Verbosity,
    ) -> Result<DualResult, NonDifferentiable>;

    fn dual_dimensionality(&self) -> I;

    /// Any finite valid primal objective value, used only by
    /// [`Objective::check_infeasibility`]. Default `+inf` disables the
    /// check.
    fn primal_upper_bound(&self) -> E {
        E::INFINITY
    }

    /// `true` when `dualObjective > primalUpperBound + eps` — by weak
    /// duality this proves primal infeasibility of the LP at this
    /// relaxation.
    fn check_infeasibility(&self, result: &DualResult) -> bool {
        const EPS: E = 1e-9;
        result.dual_value > self.primal_upper_bound() + EPS
    }

    /// The final primal certificate, if the implementation can produce
    /// one (spec's primal-recovery non-goal: absence is legal).
    fn primal_for_saving(&self, lambda: &SparseVector) -> Option<PrimalView>;
}
