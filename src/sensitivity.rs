//! Sensitivity of the recommended split to estimation error in `C1`.
//!
//! # The problem
//!
//! The primary-base average cost `C1` is estimated from historical data, so
//! the recommended split inherits that estimation error. Before acting on
//! `x*`, a dispatcher wants to know: if the true `C1` is 10% higher or lower
//! than measured, how far does the optimum move?
//!
//! # The sweep
//!
//! For each percentage perturbation `p` in a caller-supplied sequence, the
//! sweep recomputes
//!
//! ```text
//!   C1' = C1 * (1 + p/100)
//! ```
//!
//! and re-solves the model with every other parameter held fixed, yielding
//! the perturbed optimum and its cost. Because `f'` is linear in `C1`, the
//! unconstrained optimum moves linearly and monotonically: a cheaper primary
//! base never receives fewer calls. Clamping and rounding preserve that
//! monotonicity, which makes it a useful property to test against.
//!
//! The sweep is lazy and finite, follows the input order (it is not sorted
//! by magnitude), and is `Clone`, so it can be restarted from the beginning
//! by cloning before iteration.

use crate::model::{CostModel, ModelError};

/// Default perturbation grid, in percent.
pub const DEFAULT_PERTURBATIONS: [f64; 5] = [-20.0, -10.0, 0.0, 10.0, 20.0];

/// One step of a sensitivity sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensitivityPoint {
    /// The applied perturbation, in percent.
    pub perturbation: f64,
    /// The perturbed primary cost `C1 * (1 + perturbation/100)`.
    pub primary_cost: f64,
    /// The re-solved optimal split under the perturbed cost.
    pub x_star: usize,
    /// Total cost at that split, under the perturbed cost.
    pub cost: f64,
}

/// Lazy iterator over perturbations of the primary cost.
///
/// ```rust
/// use apportion::model::CostModel;
/// use apportion::sensitivity::{analyze, DEFAULT_PERTURBATIONS};
///
/// let model = CostModel::new(12, 4.4, 5.7625, 0.005, 0.003);
/// let points: Vec<_> = analyze(&model, &DEFAULT_PERTURBATIONS)?.collect();
/// assert_eq!(points.len(), 5);
/// // A cheaper primary base never routes fewer calls to it.
/// assert!(points[0].x_star >= points[4].x_star);
/// # Ok::<(), apportion::model::ModelError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SensitivitySweep<'a> {
    model: CostModel,
    perturbations: std::slice::Iter<'a, f64>,
}

impl<'a> SensitivitySweep<'a> {
    /// Validate the model once and set up the sweep.
    ///
    /// Degenerate coefficients surface here rather than in the middle of
    /// iteration; the perturbation only ever touches `C1`, which the solve
    /// does not divide by.
    pub fn new(model: &CostModel, perturbations: &'a [f64]) -> Result<Self, ModelError> {
        model.critical_point()?;
        Ok(Self {
            model: *model,
            perturbations: perturbations.iter(),
        })
    }
}

impl Iterator for SensitivitySweep<'_> {
    type Item = SensitivityPoint;

    fn next(&mut self) -> Option<SensitivityPoint> {
        let &perturbation = self.perturbations.next()?;
        let primary_cost = self.model.c1() * (1.0 + perturbation / 100.0);
        let perturbed = self.model.with_primary_cost(primary_cost);
        // alpha and beta were validated at construction and are unchanged
        // by the perturbation, so this solve cannot fail.
        let x_star = perturbed.solve().ok()?;
        Some(SensitivityPoint {
            perturbation,
            primary_cost,
            x_star,
            cost: perturbed.evaluate(x_star as f64),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.perturbations.size_hint()
    }
}

impl ExactSizeIterator for SensitivitySweep<'_> {}

/// Sweep the model across percentage perturbations of `C1`.
///
/// Order of the output follows `perturbations` exactly.
pub fn analyze<'a>(
    model: &CostModel,
    perturbations: &'a [f64],
) -> Result<SensitivitySweep<'a>, ModelError> {
    SensitivitySweep::new(model, perturbations)
}
