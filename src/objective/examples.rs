//! Concrete objectives used to exercise the maximizers and the driver.
//!
//! Matching LP, inventory LP and the other production LP flavors this
//! contract is meant to support are explicitly out of scope (spec §1).
//! Everything here is a test double: small enough to reason about by
//! hand, registered in [`crate::objective::registry`] so the driver's
//! dynamic dispatch (spec §4.4 step 2) has real, testable targets.

use std::cell::Cell;
use std::time::Instant;

use crate::E;
use crate::objective::{DualResult, IterLog, NonDifferentiable, Objective, PrimalView, Verbosity};
use crate::sparse::SparseVector;

/// `f(x, y) = -(x-3)^2 - (y+2)^2`, used in spec §8 scenario 1 to drive
/// [`crate::optim::agd::AcceleratedGradientMaximizer`]. Unconstrained: no
/// coupling constraints, so `gradient` and `slack` coincide trivially and
/// carry no KKT meaning of their own.
pub struct SimpleObjective;

impl SimpleObjective {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimpleObjective {
    fn default() -> Self {
        Self::new()
    }
}

impl Objective for SimpleObjective {
    fn calculate(
        &self,
        lambda: &SparseVector,
        iter_log: &mut IterLog,
        _verbosity: Verbosity,
    ) -> Result<DualResult, NonDifferentiable> {
        let start = Instant::now();
        let x = lambda.get(0);
        let y = lambda.get(1);
        let value = -(x - 3.0).powi(2) - (y + 2.0).powi(2);
        let gradient =
            SparseVector::from_pairs(2, vec![(0, -2.0 * (x - 3.0)), (1, -2.0 * (y + 2.0))]).expect("valid pairs");
        let result = DualResult::new(value, gradient, value, E::INFINITY);
        iter_log.dual_value = result.dual_value;
        iter_log.max_slack = result.max_slack;
        iter_log.grad_nnz = result.gradient.nnz();
        iter_log.eval_time = start.elapsed();
        Ok(result)
    }

    fn dual_dimensionality(&self) -> usize {
        2
    }

    fn primal_for_saving(&self, lambda: &SparseVector) -> Option<PrimalView> {
        let mut view = PrimalView::new(vec!["x".to_string(), "y".to_string()]);
        view.push_row(vec![lambda.get(0), lambda.get(1)]);
        Some(view)
    }
}

/// `d(λ) = -2λ1² - 3λ2² + 8λ1 - 6λ2 - 37`, crafted so that
/// `d(1, 1) = -40` and `∇d(1, 1) = (4, -12)` — the single-evaluation
/// contract check in spec §8 scenario 2.
pub struct FixtureQuadraticObjective;

impl FixtureQuadraticObjective {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FixtureQuadraticObjective {
    fn default() -> Self {
        Self::new()
    }
}

impl Objective for FixtureQuadraticObjective {
    fn calculate(
        &self,
        lambda: &SparseVector,
        iter_log: &mut IterLog,
        _verbosity: Verbosity,
    ) -> Result<DualResult, NonDifferentiable> {
        let start = Instant::now();
        let l1 = lambda.get(0);
        let l2 = lambda.get(1);
        let value = -2.0 * l1 * l1 - 3.0 * l2 * l2 + 8.0 * l1 - 6.0 * l2 - 37.0;
        let gradient =
            SparseVector::from_pairs(2, vec![(0, -4.0 * l1 + 8.0), (1, -6.0 * l2 - 6.0)]).expect("valid pairs");
        let result = DualResult::new(value, gradient, value, E::INFINITY);
        iter_log.dual_value = result.dual_value;
        iter_log.max_slack = result.max_slack;
        iter_log.grad_nnz = result.gradient.nnz();
        iter_log.eval_time = start.elapsed();
        Ok(result)
    }

    fn dual_dimensionality(&self) -> usize {
        2
    }

    fn primal_for_saving(&self, _lambda: &SparseVector) -> Option<PrimalView> {
        None
    }
}

/// `d(λ) = bᵀλ - λᵀ D λ` for diagonal positive-definite `D`: a concave
/// quadratic with a closed-form optimum `λ*_i = max(0, b_i / (2 D_i))`,
/// used to exercise [`crate::optim::lbfgsb`] end-to-end (spec §8
/// scenarios 3-5) without the tie-breaking non-smoothness a simplex
/// projection can hit.
pub struct QuadraticDualObjective {
    b: Vec<E>,
    d: Vec<E>,
    primal_upper_bound: E,
}

impl QuadraticDualObjective {
    pub fn new(b: Vec<E>, d: Vec<E>) -> Self {
        assert_eq!(b.len(), d.len());
        Self { b, d, primal_upper_bound: E::INFINITY }
    }

    /// A deterministic instance with `n` coupling constraints, all
    /// strictly concave and with a strictly positive optimum so the
    /// "active constraints" count in spec §8 scenario 3 is meaningful.
    pub fn synthetic(n: usize) -> Self {
        let b: Vec<E> = (0..n).map(|i| 1.0 + (i as E) * 0.01).collect();
        let d: Vec<E> = (0..n).map(|i| 0.5 + (i as E) * 0.005).collect();
        Self::new(b, d)
    }

    pub fn with_primal_upper_bound(mut self, bound: E) -> Self {
        self.primal_upper_bound = bound;
        self
    }

    /// The closed-form maximizer, for test assertions.
    pub fn optimal_lambda(&self) -> Vec<E> {
        self.b.iter().zip(&self.d).map(|(b, d)| (b / (2.0 * d)).max(0.0)).collect()
    }
}

impl Objective for QuadraticDualObjective {
    fn calculate(
        &self,
        lambda: &SparseVector,
        iter_log: &mut IterLog,
        _verbosity: Verbosity,
    ) -> Result<DualResult, NonDifferentiable> {
        let start = Instant::now();
        let mut value = 0.0;
        let mut pairs = Vec::with_capacity(self.b.len());
        for i in 0..self.b.len() {
            let li = lambda.get(i);
            value += self.b[i] * li - self.d[i] * li * li;
            pairs.push((i, self.b[i] - 2.0 * self.d[i] * li));
        }
        let gradient = SparseVector::from_pairs(self.b.len(), pairs).expect("valid pairs");
        let result = DualResult::new(value, gradient, value, self.primal_upper_bound);
        iter_log.dual_value = result.dual_value;
        iter_log.max_slack = result.max_slack;
        iter_log.grad_nnz = result.gradient.nnz();
        iter_log.eval_time = start.elapsed();
        Ok(result)
    }

    fn dual_dimensionality(&self) -> usize {
        self.b.len()
    }

    fn primal_upper_bound(&self) -> E {
        self.primal_upper_bound
    }

    fn primal_for_saving(&self, lambda: &SparseVector) -> Option<PrimalView> {
        let mut view = PrimalView::new(vec!["index".to_string(), "lambda".to_string()]);
        for (idx, val) in lambda.iter() {
            view.push_row(vec![idx as E, val]);
        }
        Some(view)
    }
}

/// A block-separable LP dual with simplex-projected inner blocks (spec
/// glossary "Simplex projection"): each block picks the vertex
/// minimizing `c_block - A_blockᵀλ`, so a tie between two components at
/// the same λ raises [`NonDifferentiable`]. Registered under
/// `dualip.objective.SimplexCouplingObjective` to give the driver's
/// dynamic dispatch (spec §4.4 step 2) a multi-block fixture.
pub struct SimplexCouplingObjective {
    /// `cost[block][k]`.
    cost: Vec<Vec<E>>,
    /// `usage[block][k]`: the coupling-constraint-`block` usage of
    /// component `k` (every other coupling row is zero for this block,
    /// i.e. `A` is block-diagonal).
    usage: Vec<Vec<E>>,
    budget: Vec<E>,
}

impl SimplexCouplingObjective {
    pub fn new(cost: Vec<Vec<E>>, usage: Vec<Vec<E>>, budget: Vec<E>) -> Self {
        assert_eq!(cost.len(), usage.len());
        assert_eq!(cost.len(), budget.len());
        Self { cost, usage, budget }
    }

    /// Deterministic synthetic instance: `n_blocks` simplex blocks of
    /// dimension `block_dim`, one coupling constraint per block. `gamma`
    /// scales the usage coefficients, matching `--driver.gamma`'s role
    /// as a regularization/scaling knob on the coupling term.
    pub fn synthetic(n_blocks: usize, block_dim: usize, gamma: E) -> Self {
        let mut cost = Vec::with_capacity(n_blocks);
        let mut usage = Vec::with_capacity(n_blocks);
        let mut budget = Vec::with_capacity(n_blocks);
        for block in 0..n_blocks {
            let c: Vec<E> = (0..block_dim)
                .map(|k| 1.0 + ((block * 7 + k * 3) % 5) as E * 0.2)
                .collect();
            let u: Vec<E> = (0..block_dim).map(|k| gamma * (1.0 + k as E * 0.1)).collect();
            cost.push(c);
            usage.push(u);
            budget.push(0.5);
        }
        Self::new(cost, usage, budget)
    }

    fn block_argmin(&self, block: usize, lambda_i: E) -> Result<(usize, E), NonDifferentiable> {
        let c = &self.cost[block];
        let u = &self.usage[block];
        let mut best_k = 0usize;
        let mut best_val = c[0] - u[0] * lambda_i;
        let mut tie = false;
        for k in 1..c.len() {
            let val = c[k] - u[k] * lambda_i;
            if val < best_val - 1e-12 {
                best_val = val;
                best_k = k;
                tie = false;
            } else if (val - best_val).abs() <= 1e-12 {
                tie = true;
            }
        }
        if tie {
            return Err(NonDifferentiable);
        }
        Ok((best_k, best_val))
    }
}

impl Objective for SimplexCouplingObjective {
    fn calculate(
        &self,
        lambda: &SparseVector,
        iter_log: &mut IterLog,
        _verbosity: Verbosity,
    ) -> Result<DualResult, NonDifferentiable> {
        let start = Instant::now();
        let n = self.budget.len();
        let mut value = 0.0;
        let mut pairs = Vec::with_capacity(n);
        for i in 0..n {
            let li = lambda.get(i);
            let (best_k, best_val) = self.block_argmin(i, li)?;
            value += self.budget[i] * li + best_val;
            pairs.push((i, self.budget[i] - self.usage[i][best_k]));
        }
        let gradient = SparseVector::from_pairs(n, pairs).expect("valid pairs");
        let result = DualResult::new(value, gradient, value, E::INFINITY);
        iter_log.dual_value = result.dual_value;
        iter_log.max_slack = result.max_slack;
        iter_log.grad_nnz = result.gradient.nnz();
        iter_log.eval_time = start.elapsed();
        Ok(result)
    }

    fn dual_dimensionality(&self) -> usize {
        self.budget.len()
    }

    fn primal_for_saving(&self, lambda: &SparseVector) -> Option<PrimalView> {
        let mut view = PrimalView::new(vec!["block".to_string(), "selected".to_string()]);
        for i in 0..self.budget.len() {
            if let Ok((k, _)) = self.block_argmin(i, lambda.get(i)) {
                view.push_row(vec![i as E, k as E]);
            }
        }
        Some(view)
    }
}

/// A test double that raises [`NonDifferentiable`] on a prescribed call
/// index, used to exercise [`crate::optim::lbfgsb`]'s failure path (spec
/// §8 scenario 6) deterministically.
pub struct FlakyObjective {
    inner: QuadraticDualObjective,
    fail_on_call: usize,
    calls: Cell<usize>,
}

impl FlakyObjective {
    pub fn new(inner: QuadraticDualObjective, fail_on_call: usize) -> Self {
        Self { inner, fail_on_call, calls: Cell::new(0) }
    }
}

impl Objective for FlakyObjective {
    fn calculate(
        &self,
        lambda: &SparseVector,
        iter_log: &mut IterLog,
        verbosity: Verbosity,
    ) -> Result<DualResult, NonDifferentiable> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_on_call {
            return Err(NonDifferentiable);
        }
        self.inner.calculate(lambda, iter_log, verbosity)
    }

    fn dual_dimensionality(&self) -> usize {
        self.inner.dual_dimensionality()
    }

    fn primal_upper_bound(&self) -> E {
        self.inner.primal_upper_bound()
    }

    fn primal_for_saving(&self, lambda: &SparseVector) -> Option<PrimalView> {
        self.inner.primal_for_saving(lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_quadratic_matches_scenario_two() {
        let obj = FixtureQuadraticObjective::new();
        let lambda = SparseVector::from_pairs(2, vec![(0, 1.0), (1, 1.0)]).unwrap();
        let mut log = IterLog::new(0);
        let result = obj.calculate(&lambda, &mut log, Verbosity::Silent).unwrap();
        assert!((result.dual_value - (-40.0)).abs() < 1e-9);
        assert!((result.gradient.get(0) - 4.0).abs() < 1e-9);
        assert!((result.gradient.get(1) - (-12.0)).abs() < 1e-9);
    }

    #[test]
    fn quadratic_dual_objective_gradient_matches_closed_form() {
        let obj = QuadraticDualObjective::new(vec![2.0, 4.0], vec![1.0, 1.0]);
        let lambda = SparseVector::from_pairs(2, vec![(0, 0.5), (1, 1.0)]).unwrap();
        let mut log = IterLog::new(0);
        let result = obj.calculate(&lambda, &mut log, Verbosity::Silent).unwrap();
        assert!((result.gradient.get(0) - (2.0 - 1.0)).abs() < 1e-9);
        assert!((result.gradient.get(1) - (4.0 - 2.0)).abs() < 1e-9);
    }

    #[test]
    fn flaky_objective_fails_on_the_prescribed_call() {
        let inner = QuadraticDualObjective::synthetic(2);
        let flaky = FlakyObjective::new(inner, 2);
        let lambda = SparseVector::zeros(2);
        let mut log = IterLog::new(0);
        assert!(flaky.calculate(&lambda, &mut log, Verbosity::Silent).is_ok());
        assert!(flaky.calculate(&lambda, &mut log, Verbosity::Silent).is_ok());
        assert!(flaky.calculate(&lambda, &mut log, Verbosity::Silent).is_err());
    }
}
