//! Bound-constrained quasi-Newton maximizer (spec §4.3, component C5):
//! the centerpiece. The quasi-Newton step itself is delegated to
//! `argmin`'s `LBFGSB` solver (an external collaborator, per the
//! instruction that the interesting code here is the convergence
//! controller, not the line search, and per spec §3's note that the
//! history of the last `m` secant pairs must actually accumulate across
//! iterations): a single `Executor` runs the solver over the full
//! `maxIter` budget, and the evaluation closure it calls on every trial
//! point (spec §4.3 steps 1-6) carries the hold-convergence /
//! useful-improvement / infeasibility bookkeeping.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use argmin::core::{CostFunction, Executor, Gradient};
use argmin::solver::quasinewton::LBFGSB;
use macros::{explicit_options, use_option};
use ndarray::Array1;

use crate::objective::{DualResult, IterLog, Objective, Verbosity};
use crate::optim::state::{OptimizerResult, Status};
use crate::sparse::SparseVector;
use crate::{E, I, SolverOptions};

fn array_to_sparse(param: &Array1<f64>) -> SparseVector {
    let mut pairs = Vec::new();
    for (i, &v) in param.iter().enumerate() {
        if v != 0.0 {
            pairs.push((i, v));
        }
    }
    SparseVector::from_pairs(param.len(), pairs).expect("argmin iterate is always well-formed")
}

fn sparse_to_array(dim: usize, lambda: &SparseVector) -> Array1<f64> {
    let mut out = Array1::<f64>::zeros(dim);
    for (idx, val) in lambda.iter() {
        out[idx] = val;
    }
    out
}

/// The evaluation closure's running state (spec §4.3 steps 1-6), shared
/// by `cost`/`gradient` through a `RefCell` since `argmin`'s traits only
/// hand out `&self`.
struct ControllerState<'b> {
    log: Vec<IterLog>,
    status: Status,
    iteration: usize,
    dual_tolerance: E,
    slack_tolerance: E,
    hold_convergence_for_iter: usize,
    last_useful_dual: E,
    last_useful_iter: usize,
    last_useful_lambda: SparseVector,
    last_useful_result: Option<DualResult>,
    cached_param: Option<Array1<f64>>,
    cached_result: Option<DualResult>,
    on_iteration: Box<dyn FnMut(&IterLog) + 'b>,
}

/// Adapts [`Objective`] (maximize, sparse `λ`) to `argmin`'s
/// `CostFunction`/`Gradient` contract (minimize, dense `Array1<f64>`) and
/// runs the convergence controller from inside that adapter, once per
/// distinct evaluated point (trial points `cost` and `gradient` share
/// are evaluated once and cached, so the controller still sees exactly
/// one `IterLog` per accepted trial).
///
/// Once `status` leaves `Running`, further calls return `(−d(λ), 0)`:
/// the negated dual value but a zero gradient, which tells the inner
/// engine the point is stationary and forces it to stop (spec §4.3 step
/// 6, spec §5 "Cancellation ... modeled by returning a zero gradient").
struct ObjectiveAdapter<'a, 'b> {
    objective: &'a dyn Objective,
    verbosity: Verbosity,
    state: Rc<RefCell<ControllerState<'b>>>,
}

impl<'a, 'b> ObjectiveAdapter<'a, 'b> {
    fn evaluate(&self, param: &Array1<f64>) -> DualResult {
        {
            let state = self.state.borrow();
            if state.cached_param.as_ref() == Some(param) {
                return state.cached_result.clone().expect("cached alongside cached_param");
            }
            // Once the controller has left `Running` the point is
            // considered stationary (spec §4.3 step 6): don't re-invoke
            // the (potentially expensive, distributed) objective again,
            // just hand back the value that decided the status.
            if state.status != Status::Running {
                return state
                    .last_useful_result
                    .clone()
                    .unwrap_or_else(|| DualResult::new(0.0, SparseVector::zeros(param.len()), 0.0, self.objective.primal_upper_bound()));
            }
        }

        let lambda = array_to_sparse(param);
        let iteration = {
            let mut state = self.state.borrow_mut();
            let iteration = state.iteration;
            state.iteration += 1;
            iteration
        };

        let start = Instant::now();
        let mut iter_log = IterLog::new(iteration);
        let outcome = self.objective.calculate(&lambda, &mut iter_log, self.verbosity);
        iter_log.eval_time = start.elapsed();

        let mut state = self.state.borrow_mut();

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                state.status = Status::Failed;
                let stationary = state
                    .last_useful_result
                    .clone()
                    .unwrap_or_else(|| DualResult::new(0.0, SparseVector::zeros(param.len()), 0.0, self.objective.primal_upper_bound()));
                state.cached_param = Some(param.clone());
                state.cached_result = Some(stationary.clone());
                return stationary;
            }
        };

        (state.on_iteration)(&iter_log);
        state.log.push(iter_log);

        if self.objective.check_infeasibility(&result) {
            state.status = Status::Infeasible;
            state.last_useful_lambda = lambda.clone();
            state.last_useful_result = Some(result.clone());
        } else if iteration >= 2 {
            let denom = state.last_useful_dual.abs().max(1e-300);
            let relative_improvement = (result.dual_value - state.last_useful_dual) / denom;
            if result.dual_value > state.last_useful_dual && relative_improvement > state.dual_tolerance {
                state.last_useful_dual = result.dual_value;
                state.last_useful_iter = iteration;
                state.last_useful_lambda = lambda.clone();
                state.last_useful_result = Some(result.clone());
            }

            // Strictly past the hold window (spec §4.3 step 4): equality
            // does not yet count.
            let feasible = result.max_slack < state.slack_tolerance;
            if feasible && iteration - state.last_useful_iter > state.hold_convergence_for_iter {
                state.status = Status::Converged;
            }
        } else {
            // Iterations 0 and 1 are bootstrap calls: there is no prior
            // useful value to compare against yet.
            state.last_useful_dual = result.dual_value;
            state.last_useful_iter = iteration;
            state.last_useful_lambda = lambda.clone();
            state.last_useful_result = Some(result.clone());
        }

        state.cached_param = Some(param.clone());
        state.cached_result = Some(result.clone());
        result
    }
}

impl<'a, 'b> CostFunction for ObjectiveAdapter<'a, 'b> {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, param: &Array1<f64>) -> Result<f64, argmin::core::Error> {
        Ok(-self.evaluate(param).dual_value)
    }
}

impl<'a, 'b> Gradient for ObjectiveAdapter<'a, 'b> {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    fn gradient(&self, param: &Array1<f64>) -> Result<Array1<f64>, argmin::core::Error> {
        let result = self.evaluate(param);
        if self.state.borrow().status != Status::Running {
            return Ok(Array1::zeros(param.len()));
        }
        let dense = result.gradient.to_dense();
        Ok(Array1::from_iter((0..dense.nrows()).map(|i| -dense[i])))
    }
}

/// Drives `argmin::LBFGSB` over the non-negative orthant and layers the
/// hold-convergence controller from spec §4.3 on top of it.
///
/// Convergence is declared only once the max-slack has stayed below
/// `lbfgsb_slack_tolerance` for `lbfgsb_hold_convergence_for_iter`
/// iterations *past* the last iteration that produced a useful
/// (relatively-significant) dual-value improvement — a single slack dip
/// is not enough, since L-BFGS-B can transiently satisfy feasibility
/// while still climbing the dual.
#[explicit_options(name = SolverOptions)]
#[use_option(name = "lbfgsb_max_iterations", type_ = I, default = "1000", description = "Maximum number of L-BFGS-B outer iterations.")]
#[use_option(name = "lbfgsb_m", type_ = I, default = "50", description = "Number of correction pairs the quasi-Newton Hessian approximation retains.")]
#[use_option(name = "lbfgsb_dual_tolerance", type_ = E, default = "1e-8", description = "Relative dual-value improvement above which an iteration counts as useful.")]
#[use_option(name = "lbfgsb_slack_tolerance", type_ = E, default = "5e-6", description = "Max-slack threshold below which the iterate is considered primal-feasible.")]
#[use_option(name = "lbfgsb_hold_convergence_for_iter", type_ = I, default = "10", description = "Iterations slack must stay below tolerance, past the last useful improvement, before declaring convergence.")]
pub struct LBfgsBMaximizer<'a> {
    objective: &'a dyn Objective,
}

impl<'a> LBfgsBMaximizer<'a> {
    pub fn new(objective: &'a dyn Objective, options: &SolverOptions) -> Self {
        Self { objective, options: options.into() }
    }

    pub fn maximize(
        &self,
        initial_lambda: &SparseVector,
        verbosity: Verbosity,
        on_iteration: impl FnMut(&IterLog) + '_,
    ) -> OptimizerResult {
        let dim = self.objective.dual_dimensionality();
        let lower = Array1::<f64>::zeros(dim);
        let upper = Array1::<f64>::from_elem(dim, E::INFINITY);
        let initial = sparse_to_array(dim, initial_lambda);

        // Shared with the adapter via `Rc` so this method can read the
        // controller's final state back out regardless of what `argmin`
        // does with the `Problem` wrapper after `run()` returns.
        let controller = Rc::new(RefCell::new(ControllerState {
            log: Vec::new(),
            status: Status::Running,
            iteration: 0,
            dual_tolerance: self.options.lbfgsb_dual_tolerance,
            slack_tolerance: self.options.lbfgsb_slack_tolerance,
            hold_convergence_for_iter: self.options.lbfgsb_hold_convergence_for_iter,
            last_useful_dual: E::NEG_INFINITY,
            last_useful_iter: 0,
            last_useful_lambda: initial_lambda.clone(),
            last_useful_result: None,
            cached_param: None,
            cached_result: None,
            on_iteration: Box::new(on_iteration),
        }));
        let adapter = ObjectiveAdapter { objective: self.objective, verbosity, state: Rc::clone(&controller) };
        let solver = LBFGSB::new(lower, upper, self.options.lbfgsb_m);

        let outcome = Executor::new(adapter, solver)
            .configure(|state| state.param(initial).max_iters(self.options.lbfgsb_max_iterations as u64))
            .run();
        if outcome.is_err() {
            controller.borrow_mut().status = Status::Failed;
        }

        let mut state = controller.borrow_mut();
        let mut status = state.status;
        let iterations_run = state.iteration;

        if status == Status::Running {
            status = Status::Terminated;
        }

        let result = state.last_useful_result.take().unwrap_or_else(|| {
            DualResult::new(0.0, SparseVector::zeros(dim), 0.0, self.objective.primal_upper_bound())
        });
        let last_useful_lambda = std::mem::replace(&mut state.last_useful_lambda, SparseVector::zeros(dim));
        let log = std::mem::take(&mut state.log);
        drop(state);
        let primal_view = self.objective.primal_for_saving(&last_useful_lambda);

        OptimizerResult {
            status,
            iterations: iterations_run,
            lambda: last_useful_lambda,
            slack: result.slack,
            dual_value: result.dual_value,
            primal_view,
            log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SolverOptions;
    use crate::objective::examples::FlakyObjective;
    use crate::objective::examples::QuadraticDualObjective;

    fn default_options() -> SolverOptions {
        let mut options = SolverOptions::new();
        options.set_option("lbfgsb_max_iterations", 200usize).unwrap();
        options.set_option("lbfgsb_m", 10usize).unwrap();
        options.set_option("lbfgsb_dual_tolerance", 1e-9).unwrap();
        options.set_option("lbfgsb_slack_tolerance", 1e-6).unwrap();
        options.set_option("lbfgsb_hold_convergence_for_iter", 5usize).unwrap();
        options
    }

    #[test]
    fn converges_to_the_closed_form_optimum_of_a_diagonal_quadratic() {
        let objective = QuadraticDualObjective::synthetic(4);
        let options = default_options();
        let maximizer = LBfgsBMaximizer::new(&objective, &options);

        let initial = SparseVector::zeros(objective.dual_dimensionality());
        let result = maximizer.maximize(&initial, Verbosity::Silent, |_| {});

        let expected = objective.optimal_lambda();
        for i in 0..objective.dual_dimensionality() {
            assert!(
                (result.lambda.get(i) - expected.get(i)).abs() < 1e-2,
                "component {i}: got {}, expected {}",
                result.lambda.get(i),
                expected.get(i)
            );
        }
        assert!(matches!(result.status, Status::Converged | Status::Terminated));
    }

    #[test]
    fn propagates_non_differentiability_as_failed() {
        let objective = FlakyObjective::new(QuadraticDualObjective::synthetic(2), 0);
        let options = default_options();
        let maximizer = LBfgsBMaximizer::new(&objective, &options);

        let initial = SparseVector::zeros(2);
        let result = maximizer.maximize(&initial, Verbosity::Silent, |_| {});
        assert_eq!(result.status, Status::Failed);
    }
}
