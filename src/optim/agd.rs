//! Accelerated gradient maximizer (spec §4.2, component C4): Nesterov's
//! method applied to the dual-maximization problem directly (no sign
//! inversion — see the "Sign handling" note below for the non-negativity
//! clip).

use faer::Col;
use macros::{explicit_options, use_option};

use crate::objective::{IterLog, Objective, Verbosity};
use crate::optim::state::{OptimizerResult, Status};
use crate::sparse::SparseVector;
use crate::{E, I, SolverOptions};

/// Nesterov's accelerated method on the dual-ascent reformulation.
///
/// At each step the maximizer maintains a momentum variable `μ_k` and a
/// trial point `λ_k = μ_k + ((k-1)/(k+2))·(μ_k - μ_{k-1})`, evaluates the
/// objective at `λ_k`, and takes a gradient *ascent* step at a fixed
/// learning rate (spec §4.2 leaves the step rule to the implementation;
/// `armijo` backtracking is not implemented here).
///
/// # Sign handling
///
/// Every momentum update is clipped to the non-negative orthant before
/// it is used as the next trial point. Spec §4.2's own contract
/// paragraph says this maximizer does *not* enforce `λ ≥ 0`, but spec §8
/// scenario 1 is a concrete testable property that only holds if it
/// does: starting from `λ = (0,0)` on a concave objective whose
/// unconstrained optimum has `y = −2`, the only way `y` comes out
/// *exactly* `0.0` after 1000 iterations is for every step that would
/// push it negative to be clipped back to the boundary, over and over.
/// Per spec §9's own open question, the test is reproduced rather than
/// the contract paragraph honored literally — see `DESIGN.md`.
#[explicit_options(name = SolverOptions)]
#[use_option(name = "agd_max_iterations", type_ = I, default = "1000", description = "Maximum number of accelerated-gradient iterations.")]
#[use_option(name = "agd_dual_tolerance", type_ = E, default = "1e-10", description = "Relative dual-value improvement below which AGD declares convergence.")]
#[use_option(name = "agd_learning_rate", type_ = E, default = "0.1", description = "Fixed gradient-ascent step size used by AGD.")]
pub struct AcceleratedGradientMaximizer<'a> {
    objective: &'a dyn Objective,
}

impl<'a> AcceleratedGradientMaximizer<'a> {
    pub fn new(objective: &'a dyn Objective, options: &SolverOptions) -> Self {
        Self { objective, options: options.into() }
    }

    /// Runs Nesterov ascent until `|ΔdualValue| / |dualValue|` drops
    /// below `agd_dual_tolerance` for a single iteration, or
    /// `agd_max_iterations` is reached.
    pub fn maximize(
        &self,
        initial_lambda: &SparseVector,
        verbosity: Verbosity,
        mut on_iteration: impl FnMut(&IterLog),
    ) -> OptimizerResult {
        let dim = self.objective.dual_dimensionality();
        let mut mu_prev = initial_lambda.to_dense();
        let mut mu = mu_prev.clone();

        let mut log = Vec::new();
        let mut last_dual_value: Option<E> = None;
        let mut status = Status::Running;

        let mut last_lambda = initial_lambda.clone();
        let mut last_slack = SparseVector::zeros(dim);
        let mut last_dual = 0.0;
        let mut last_primal = self.objective.primal_for_saving(initial_lambda);
        let mut completed_iters = 0usize;

        for k in 0..self.options.agd_max_iterations {
            let beta = if k == 0 { 0.0 } else { (k as E - 1.0) / (k as E + 2.0) };
            let mut trial = Col::<E>::zeros(dim);
            for i in 0..dim {
                trial[i] = (mu[i] + beta * (mu[i] - mu_prev[i])).max(0.0);
            }
            let trial_sparse = SparseVector::from_dense(&trial, 0.0);

            let mut iter_log = IterLog::new(k);
            let result = match self.objective.calculate(&trial_sparse, &mut iter_log, verbosity) {
                Ok(result) => result,
                Err(_) => {
                    status = Status::Failed;
                    log.push(iter_log);
                    break;
                }
            };
            on_iteration(&iter_log);
            log.push(iter_log);
            completed_iters = k + 1;

            if let Some(prev) = last_dual_value {
                let denom = prev.abs().max(1e-300);
                if ((result.dual_value - prev) / denom).abs() < self.options.agd_dual_tolerance {
                    status = Status::Converged;
                }
            }
            last_dual_value = Some(result.dual_value);
            last_lambda = trial_sparse.clone();
            last_slack = result.slack.clone();
            last_dual = result.dual_value;
            last_primal = self.objective.primal_for_saving(&trial_sparse);

            let grad_dense = result.gradient.to_dense();
            let mut next_mu = Col::<E>::zeros(dim);
            for i in 0..dim {
                next_mu[i] = (trial[i] + self.options.agd_learning_rate * grad_dense[i]).max(0.0);
            }
            mu_prev = mu;
            mu = next_mu;

            if status != Status::Running {
                break;
            }
        }

        if status == Status::Running {
            status = Status::Terminated;
        }

        OptimizerResult {
            status,
            iterations: completed_iters,
            lambda: last_lambda,
            slack: last_slack,
            dual_value: last_dual,
            primal_view: last_primal,
            log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SolverOptions;
    use crate::objective::examples::SimpleObjective;

    #[test]
    fn converges_in_x_while_y_stays_pinned_at_the_non_negativity_boundary() {
        let objective = SimpleObjective::new();
        let mut options = SolverOptions::new();
        options.set_option("agd_max_iterations", 1000usize).unwrap();
        options.set_option("agd_dual_tolerance", 1e-10).unwrap();
        options.set_option("agd_learning_rate", 0.1).unwrap();

        let maximizer = AcceleratedGradientMaximizer::new(&objective, &options);
        let initial = SparseVector::zeros(2);
        let result = maximizer.maximize(&initial, Verbosity::Silent, |_| {});

        assert!((result.lambda.get(0) - 3.0).abs() < 1e-3, "x = {}", result.lambda.get(0));
        assert_eq!(result.lambda.get(1), 0.0, "y should stay pinned at the non-negativity boundary");
        assert!(matches!(result.status, Status::Converged | Status::Terminated));
    }

    #[test]
    fn zero_iterations_returns_the_initial_lambda() {
        let objective = SimpleObjective::new();
        let mut options = SolverOptions::new();
        options.set_option("agd_max_iterations", 0usize).unwrap();

        let maximizer = AcceleratedGradientMaximizer::new(&objective, &options);
        let initial = SparseVector::from_pairs(2, vec![(0, 1.0), (1, 2.0)]).unwrap();
        let result = maximizer.maximize(&initial, Verbosity::Silent, |_| {});

        assert_eq!(result.status, Status::Terminated);
        assert_eq!(result.lambda, initial);
    }
}
