//! The convex quadratic cost model and its closed-form minimizer.
//!
//! The objective over the allocation split `x` (calls routed to base 1, the
//! remaining `N - x` to the secondary pool) is
//!
//! ```text
//!   f(x) = C1*x + alpha*x^2 + K*(N - x) + beta*(N - x)^2
//! ```
//!
//! linear unit costs plus quadratic overload penalties on each side. With
//! `alpha + beta > 0` the objective is a strictly convex parabola, so the
//! stationary point of `f'` is the unique global minimum:
//!
//! ```text
//!   x* = (2*beta*N - (C1 - K)) / (2*(alpha + beta))
//! ```
//!
//! The feasible range is the box `[0, N]`; an unconstrained optimum outside
//! it (costs sufficiently skewed toward one side) is clamped to the nearest
//! boundary. The same derivation is reproduced in exact arithmetic by
//! [`crate::proof`], and the two paths are held in agreement by tests.

use thiserror::Error;
use tracing::debug;

use crate::{AggregatedCosts, CostParameters};

/// Errors raised by the cost model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// `alpha + beta` is zero, so the closed form would divide by zero.
    #[error("alpha + beta must be nonzero for the closed-form solve, got alpha={alpha}, beta={beta}")]
    DegenerateModel { alpha: f64, beta: f64 },
    /// An aggregated cost resolved to zero, which makes the model
    /// economically meaningless.
    #[error("aggregated cost {name} resolved to zero; check the input dataset")]
    InvalidCost { name: &'static str },
}

/// One instantiation of the objective: `N`, `C1`, `K`, `alpha`, `beta`.
///
/// A plain value type; construct one per request (or per perturbation) and
/// discard it. Carries no caches and no shared state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    n: usize,
    c1: f64,
    k: f64,
    alpha: f64,
    beta: f64,
}

/// Costs of the optimal split and of the two boundary scenarios.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScenarioComparison {
    /// The optimal split, already clamped and rounded.
    pub x_star: usize,
    pub cost_at_optimum: f64,
    /// `f(N)`: every call routed to base 1.
    pub cost_all_primary: f64,
    /// `f(0)`: every call routed to the secondary pool.
    pub cost_all_secondary: f64,
    pub savings_vs_primary: f64,
    pub savings_vs_secondary: f64,
    /// Improvement over the *worse* boundary scenario, in percent -- the
    /// guaranteed saving over doing nothing smart.
    pub savings_percent: f64,
}

impl CostModel {
    pub fn new(n: usize, c1: f64, k: f64, alpha: f64, beta: f64) -> Self {
        Self {
            n,
            c1,
            k,
            alpha,
            beta,
        }
    }

    /// Build the model for one request from its aggregates and configuration.
    pub fn from_parts(costs: &AggregatedCosts, params: &CostParameters) -> Self {
        Self::new(costs.n, costs.c1, costs.k, params.alpha, params.beta)
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn c1(&self) -> f64 {
        self.c1
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// A copy of this model with the primary unit cost replaced.
    ///
    /// Used by sensitivity sweeps; everything else is held fixed.
    pub fn with_primary_cost(&self, c1: f64) -> Self {
        Self { c1, ..*self }
    }

    /// The objective `f(x)` at any real `x`.
    ///
    /// Defined on all of `R`; feasibility of `x` is the caller's concern
    /// (the boundary scenarios evaluate at exactly 0 and N).
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.n as f64;
        let remaining = n - x;
        self.c1 * x + self.alpha * x * x + self.k * remaining + self.beta * remaining * remaining
    }

    /// The unconstrained stationary point of `f`, from `f'(x) = 0`.
    ///
    /// This is the raw real-valued solution, before clamping and rounding.
    pub fn critical_point(&self) -> Result<f64, ModelError> {
        let denominator = 2.0 * (self.alpha + self.beta);
        if denominator == 0.0 {
            return Err(ModelError::DegenerateModel {
                alpha: self.alpha,
                beta: self.beta,
            });
        }
        let n = self.n as f64;
        Ok((2.0 * self.beta * n - (self.c1 - self.k)) / denominator)
    }

    /// The optimal integer split.
    ///
    /// The unconstrained optimum is clamped into `[0, N]`, then rounded
    /// half-to-even (the policy this crate commits to; a half-up rule would
    /// differ by at most one call on exact ties).
    ///
    /// ```rust
    /// use apportion::model::CostModel;
    ///
    /// let model = CostModel::new(100, 5.0, 2.5, 0.25, 0.25);
    /// // Unconstrained optimum 47.5 rounds half-to-even.
    /// assert_eq!(model.solve()?, 48);
    /// # Ok::<(), apportion::model::ModelError>(())
    /// ```
    pub fn solve(&self) -> Result<usize, ModelError> {
        let raw = self.critical_point()?;
        let clamped = raw.clamp(0.0, self.n as f64);
        if clamped != raw {
            debug!(raw, clamped, "unconstrained optimum outside [0, N], clamped");
        }
        Ok(clamped.round_ties_even() as usize)
    }

    /// Constant curvature of the objective: `2*alpha + 2*beta`.
    pub fn second_derivative(&self) -> f64 {
        2.0 * self.alpha + 2.0 * self.beta
    }

    /// True iff the curvature is strictly positive, i.e. the stationary
    /// point is a global minimum rather than a maximum or a flat line.
    pub fn is_minimum(&self) -> bool {
        self.second_derivative() > 0.0
    }

    /// Solve and compare against the two boundary scenarios.
    ///
    /// The percentage saving is measured against whichever boundary scenario
    /// is worse, and is 0.0 when that scenario's cost is not strictly
    /// positive (degenerate all-zero-cost models).
    pub fn compare(&self) -> Result<ScenarioComparison, ModelError> {
        let x_star = self.solve()?;
        let cost_at_optimum = self.evaluate(x_star as f64);
        let cost_all_primary = self.evaluate(self.n as f64);
        let cost_all_secondary = self.evaluate(0.0);

        let worst = cost_all_primary.max(cost_all_secondary);
        let savings_percent = if worst > 0.0 {
            (worst - cost_at_optimum) / worst * 100.0
        } else {
            0.0
        };

        Ok(ScenarioComparison {
            x_star,
            cost_at_optimum,
            cost_all_primary,
            cost_all_secondary,
            savings_vs_primary: cost_all_primary - cost_at_optimum,
            savings_vs_secondary: cost_all_secondary - cost_at_optimum,
            savings_percent,
        })
    }
}
