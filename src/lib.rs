//! Optimal allocation of service calls between a primary base and a blended
//! secondary pool.
//!
//! Given historical call distances grouped by base, the crate derives per-base
//! average costs, builds a convex quadratic cost model of the allocation
//! split, and computes the closed-form minimizer together with boundary
//! scenario comparisons, an exact-arithmetic cross-check of the calculus
//! ([`proof`]), and perturbation sweeps ([`sensitivity`]).

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

pub mod model;
pub mod proof;
pub mod report;
pub mod sensitivity;

pub use model::{CostModel, ModelError, ScenarioComparison};
pub use proof::SymbolicProof;
pub use report::Report;

/// One of the three known dispatch bases.
///
/// Base 1 is the primary resource; bases 2 and 3 form the secondary pool
/// whose average costs are blended into a single pooled cost `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Base {
    /// The primary resource ("Base 1").
    One,
    /// First secondary resource ("Base 2").
    Two,
    /// Second secondary resource ("Base 3").
    Three,
}

impl Base {
    /// All known bases, in identifier order.
    pub const ALL: [Base; 3] = [Base::One, Base::Two, Base::Three];

    /// Resolve a raw categorical identifier (1, 2, or 3).
    pub fn from_id(id: i64) -> Option<Base> {
        match id {
            1 => Some(Base::One),
            2 => Some(Base::Two),
            3 => Some(Base::Three),
            _ => None,
        }
    }

    /// The numeric identifier this base is known by in input data.
    pub fn id(self) -> u8 {
        match self {
            Base::One => 1,
            Base::Two => 2,
            Base::Three => 3,
        }
    }
}

/// One tabular row as handed over by the transport layer.
///
/// `Option` models an absent cell; both fields are required and their absence
/// is a validation failure, not a parse panic. Columns other than `base` and
/// `distance` are the caller's concern and are never represented here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawRecord {
    /// Categorical base identifier; expected to be 1, 2, or 3.
    pub base: Option<i64>,
    /// Call distance, the per-call cost proxy. Must be finite and >= 0.
    pub distance: Option<f64>,
}

impl RawRecord {
    /// A row with both fields present.
    pub fn new(base: i64, distance: f64) -> Self {
        Self {
            base: Some(base),
            distance: Some(distance),
        }
    }
}

/// One validated historical service call.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallRecord {
    pub base: Base,
    /// Finite and non-negative.
    pub distance: f64,
}

/// Ordered, non-empty collection of validated call records.
///
/// Constructed only through [`CallDataset::from_rows`], so its invariants
/// (every base known, every distance finite and non-negative, at least one
/// record) hold by construction. Built once per request and discarded after
/// aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDataset {
    records: Vec<CallRecord>,
}

/// Errors raised while validating raw tabular input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    /// A row is missing one of the required fields.
    #[error("row {row} is missing required field `{field}`")]
    MissingField { row: usize, field: &'static str },
    /// The input contains no rows at all.
    #[error("dataset contains no rows")]
    EmptyDataset,
    /// A distance is negative or not finite.
    #[error("row {row}: distance must be a non-negative finite number, got {value}")]
    InvalidValue { row: usize, value: f64 },
    /// A base identifier is not one of the three known bases.
    #[error("row {row}: base must be one of 1, 2, 3, got {id}")]
    UnknownBase { row: usize, id: i64 },
}

/// Non-fatal data-quality signals.
///
/// Warnings accompany a successful validation or aggregation; they never
/// abort a request. Each one is also emitted as a `tracing` event so callers
/// that discard the values still see them in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    /// Fewer than 3 distinct bases appear in the dataset.
    FewBases { distinct: usize },
    /// A base has no records; its mean cost was set to 0.
    EmptyGroup { base: Base },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::FewBases { distinct } => {
                write!(f, "only {distinct} of 3 bases present in dataset")
            }
            Warning::EmptyGroup { base } => {
                write!(f, "base {} has no records; mean cost set to 0", base.id())
            }
        }
    }
}

/// Validate raw rows without keeping the dataset.
///
/// Runs the same checks as [`CallDataset::from_rows`], in the same order,
/// and returns only the non-fatal warnings.
pub fn validate(rows: &[RawRecord]) -> Result<Vec<Warning>, DatasetError> {
    CallDataset::from_rows(rows).map(|(_, warnings)| warnings)
}

impl CallDataset {
    /// Validate raw rows and build the dataset.
    ///
    /// Checks run in order and short-circuit on the first failure:
    ///
    /// 1. both fields present on every row ([`DatasetError::MissingField`]);
    /// 2. at least one row ([`DatasetError::EmptyDataset`]);
    /// 3. every distance finite and non-negative ([`DatasetError::InvalidValue`]);
    /// 4. every base identifier known ([`DatasetError::UnknownBase`]).
    ///
    /// Fewer than 3 distinct bases is not an error: the dataset is returned
    /// together with [`Warning::FewBases`].
    pub fn from_rows(rows: &[RawRecord]) -> Result<(Self, Vec<Warning>), DatasetError> {
        for (row, r) in rows.iter().enumerate() {
            if r.base.is_none() {
                return Err(DatasetError::MissingField { row, field: "base" });
            }
            if r.distance.is_none() {
                return Err(DatasetError::MissingField {
                    row,
                    field: "distance",
                });
            }
        }

        if rows.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }

        for (row, r) in rows.iter().enumerate() {
            if let Some(value) = r.distance {
                if !value.is_finite() || value < 0.0 {
                    return Err(DatasetError::InvalidValue { row, value });
                }
            }
        }

        let mut records = Vec::with_capacity(rows.len());
        for (row, r) in rows.iter().enumerate() {
            let (Some(id), Some(distance)) = (r.base, r.distance) else {
                // Ruled out by the field check above.
                continue;
            };
            let base = Base::from_id(id).ok_or(DatasetError::UnknownBase { row, id })?;
            records.push(CallRecord { base, distance });
        }

        let mut seen = [false; 3];
        for rec in &records {
            seen[(rec.base.id() - 1) as usize] = true;
        }
        let distinct = seen.iter().filter(|&&s| s).count();

        let mut warnings = Vec::new();
        if distinct < 3 {
            warn!(distinct, "fewer than 3 bases present in dataset");
            warnings.push(Warning::FewBases { distinct });
        }

        Ok((Self { records }, warnings))
    }

    /// The validated records, in input order.
    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    /// Number of records (`N` in the cost model).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false: an empty input fails validation.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fixed model configuration.
///
/// `alpha` and `beta` are the quadratic overload coefficients of the primary
/// base and the secondary pool; both are expected to be positive (a zero sum
/// is rejected at solve time). `blend` is the convex-combination weight, in
/// `[0, 1]`, merging the two secondary-base average costs into the pooled
/// cost `K`.
///
/// This is read-only configuration, safe to share across requests.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostParameters {
    pub alpha: f64,
    pub beta: f64,
    pub blend: f64,
}

impl CostParameters {
    pub fn new(alpha: f64, beta: f64, blend: f64) -> Self {
        Self { alpha, beta, blend }
    }
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            alpha: 0.005,
            beta: 0.003,
            blend: 0.5,
        }
    }
}

/// Per-base average costs derived from one dataset.
///
/// Recomputed fresh for every request; never cached across requests.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregatedCosts {
    /// Mean distance of base-1 calls (0.0 if base 1 has no records).
    pub c1: f64,
    /// Mean distance of base-2 calls.
    pub c2: f64,
    /// Mean distance of base-3 calls.
    pub c3: f64,
    /// Blended secondary-pool cost: `blend * c2 + (1 - blend) * c3`.
    pub k: f64,
    /// Total record count; equals the dataset length exactly.
    pub n: usize,
}

/// Compute per-base mean distances and the blended secondary cost.
///
/// Means are computed in plain f64; rounding is a presentation concern and
/// happens only in [`Report`]. A base with no records gets mean 0.0 and a
/// [`Warning::EmptyGroup`] -- a tolerated degenerate case. Whether the
/// resulting costs are usable is decided by the [`ModelError::InvalidCost`]
/// gate in [`Optimizer::optimize`], not here.
pub fn aggregate(dataset: &CallDataset, params: &CostParameters) -> (AggregatedCosts, Vec<Warning>) {
    debug_assert!(
        (0.0..=1.0).contains(&params.blend),
        "blend must be in [0, 1]"
    );

    let mut sums = [0.0_f64; 3];
    let mut counts = [0_usize; 3];
    for rec in dataset.records() {
        let i = (rec.base.id() - 1) as usize;
        sums[i] += rec.distance;
        counts[i] += 1;
    }

    let mut warnings = Vec::new();
    let mut means = [0.0_f64; 3];
    for (i, base) in Base::ALL.iter().enumerate() {
        if counts[i] == 0 {
            warn!(base = base.id(), "base has no records; mean cost set to 0");
            warnings.push(Warning::EmptyGroup { base: *base });
        } else {
            means[i] = sums[i] / counts[i] as f64;
        }
    }

    let [c1, c2, c3] = means;
    let k = params.blend * c2 + (1.0 - params.blend) * c3;
    let costs = AggregatedCosts {
        c1,
        c2,
        c3,
        k,
        n: dataset.len(),
    };
    (costs, warnings)
}

/// Any failure of one optimization request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// The self-contained outcome of one optimization request.
///
/// Immutable once constructed. [`Report::from_result`] flattens it into the
/// wire-compatible key-value record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationResult {
    /// Optimal number of calls routed to base 1, in `[0, n]`.
    pub x_star: usize,
    /// Calls routed to the secondary pool: `n - x_star`.
    pub secondary_calls: usize,
    /// Total cost at the optimal split.
    pub cost_at_optimum: f64,
    /// Total cost of routing every call to base 1 (`x = n`).
    pub cost_all_primary: f64,
    /// Total cost of routing every call to the secondary pool (`x = 0`).
    pub cost_all_secondary: f64,
    pub savings_vs_primary: f64,
    pub savings_vs_secondary: f64,
    /// Guaranteed improvement over the worse boundary scenario, in percent.
    pub savings_percent: f64,
    /// Constant curvature `2*alpha + 2*beta` of the objective.
    pub second_derivative: f64,
    /// True iff the curvature is strictly positive.
    pub is_minimum: bool,
    /// Exact-arithmetic derivation attached for verification.
    pub proof: SymbolicProof,
    /// The aggregates the model was built from.
    pub costs: AggregatedCosts,
    /// The configuration in force for this request.
    pub params: CostParameters,
    /// Non-fatal data-quality signals collected along the way.
    pub warnings: Vec<Warning>,
    pub timestamp: DateTime<Utc>,
}

/// Per-request orchestration: validate, aggregate, gate, solve, compare.
///
/// Holds only the read-only [`CostParameters`]; construct one per request or
/// share one immutably, either is safe.
///
/// ```rust
/// use apportion::{Optimizer, RawRecord};
///
/// let rows = vec![
///     RawRecord::new(1, 1.0),
///     RawRecord::new(2, 10.0),
///     RawRecord::new(3, 10.0),
/// ];
/// let result = Optimizer::default().optimize(&rows)?;
/// // The primary base is far cheaper on average, so every call goes there.
/// assert_eq!(result.x_star, 3);
/// assert_eq!(result.secondary_calls, 0);
/// # Ok::<(), apportion::OptimizeError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimizer {
    params: CostParameters,
}

impl Optimizer {
    pub fn new(params: CostParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CostParameters {
        &self.params
    }

    /// Run one optimization request end to end.
    ///
    /// Aborts cleanly on the first validation or model failure; on success
    /// the returned record is self-contained and no partial state survives.
    pub fn optimize(&self, rows: &[RawRecord]) -> Result<OptimizationResult, OptimizeError> {
        let (dataset, mut warnings) = CallDataset::from_rows(rows)?;
        let (costs, aggregation_warnings) = aggregate(&dataset, &self.params);
        warnings.extend(aggregation_warnings);

        // A zero average cost signals upstream data problems (e.g. a base
        // with only zero distances) that make the model economically
        // meaningless; abort before any solve is attempted.
        if costs.c1 == 0.0 {
            return Err(ModelError::InvalidCost { name: "C1" }.into());
        }
        if costs.k == 0.0 {
            return Err(ModelError::InvalidCost { name: "K" }.into());
        }

        let model = CostModel::from_parts(&costs, &self.params);
        let comparison = model.compare()?;
        debug!(
            n = costs.n,
            x_star = comparison.x_star,
            "optimization complete"
        );

        Ok(OptimizationResult {
            x_star: comparison.x_star,
            secondary_calls: costs.n - comparison.x_star,
            cost_at_optimum: comparison.cost_at_optimum,
            cost_all_primary: comparison.cost_all_primary,
            cost_all_secondary: comparison.cost_all_secondary,
            savings_vs_primary: comparison.savings_vs_primary,
            savings_vs_secondary: comparison.savings_vs_secondary,
            savings_percent: comparison.savings_percent,
            second_derivative: model.second_derivative(),
            is_minimum: model.is_minimum(),
            proof: SymbolicProof::derive(),
            costs,
            params: self.params,
            warnings,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_base_rows() -> Vec<RawRecord> {
        vec![
            RawRecord::new(1, 4.0),
            RawRecord::new(2, 6.0),
            RawRecord::new(3, 8.0),
        ]
    }

    // ====================================================================
    // Validation checks and their order
    // ====================================================================

    #[test]
    fn missing_base_is_reported_with_row_and_field() {
        let rows = vec![
            RawRecord::new(1, 4.0),
            RawRecord {
                base: None,
                distance: Some(2.0),
            },
        ];
        let err = CallDataset::from_rows(&rows).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingField {
                row: 1,
                field: "base"
            }
        );
    }

    #[test]
    fn missing_distance_is_reported_with_row_and_field() {
        let rows = vec![RawRecord {
            base: Some(2),
            distance: None,
        }];
        let err = CallDataset::from_rows(&rows).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingField {
                row: 0,
                field: "distance"
            }
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = CallDataset::from_rows(&[]).unwrap_err();
        assert_eq!(err, DatasetError::EmptyDataset);
    }

    #[test]
    fn negative_distance_is_rejected() {
        let rows = vec![RawRecord::new(1, 4.0), RawRecord::new(2, -0.5)];
        let err = CallDataset::from_rows(&rows).unwrap_err();
        assert_eq!(
            err,
            DatasetError::InvalidValue {
                row: 1,
                value: -0.5
            }
        );
    }

    #[test]
    fn non_finite_distance_is_rejected() {
        let rows = vec![RawRecord::new(1, f64::NAN)];
        let err = CallDataset::from_rows(&rows).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { row: 0, .. }));
    }

    #[test]
    fn unknown_base_is_rejected() {
        let rows = vec![RawRecord::new(1, 4.0), RawRecord::new(7, 2.0)];
        let err = CallDataset::from_rows(&rows).unwrap_err();
        assert_eq!(err, DatasetError::UnknownBase { row: 1, id: 7 });
    }

    #[test]
    fn missing_field_wins_over_earlier_invalid_value() {
        // The field-presence pass runs before the value pass, so the missing
        // field in row 1 is reported even though row 0 has a bad value.
        let rows = vec![
            RawRecord::new(1, -3.0),
            RawRecord {
                base: None,
                distance: Some(1.0),
            },
        ];
        let err = CallDataset::from_rows(&rows).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingField {
                row: 1,
                field: "base"
            }
        );
    }

    #[test]
    fn fewer_than_three_bases_warns_but_succeeds() {
        let rows = vec![RawRecord::new(1, 4.0), RawRecord::new(2, 6.0)];
        let (dataset, warnings) = CallDataset::from_rows(&rows).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(warnings, vec![Warning::FewBases { distinct: 2 }]);
    }

    #[test]
    fn full_dataset_has_no_warnings() {
        let (dataset, warnings) = CallDataset::from_rows(&three_base_rows()).unwrap();
        assert_eq!(dataset.len(), 3);
        assert!(warnings.is_empty());
        assert!(!dataset.is_empty());
    }

    #[test]
    fn validate_matches_from_rows() {
        let warnings = validate(&three_base_rows()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(validate(&[]).unwrap_err(), DatasetError::EmptyDataset);
    }

    // ====================================================================
    // Aggregation
    // ====================================================================

    #[test]
    fn aggregate_computes_group_means_and_blend() {
        let rows = vec![
            RawRecord::new(1, 2.0),
            RawRecord::new(1, 4.0),
            RawRecord::new(2, 6.0),
            RawRecord::new(3, 10.0),
        ];
        let (dataset, _) = CallDataset::from_rows(&rows).unwrap();
        let (costs, warnings) = aggregate(&dataset, &CostParameters::default());
        assert!(warnings.is_empty());
        assert_eq!(costs.n, 4);
        assert!((costs.c1 - 3.0).abs() < 1e-12);
        assert!((costs.c2 - 6.0).abs() < 1e-12);
        assert!((costs.c3 - 10.0).abs() < 1e-12);
        // blend = 0.5 => K is the midpoint of C2 and C3.
        assert!((costs.k - 8.0).abs() < 1e-12);
    }

    #[test]
    fn aggregate_respects_blend_weight() {
        let rows = vec![
            RawRecord::new(1, 1.0),
            RawRecord::new(2, 4.0),
            RawRecord::new(3, 8.0),
        ];
        let (dataset, _) = CallDataset::from_rows(&rows).unwrap();
        let params = CostParameters::new(0.005, 0.003, 0.25);
        let (costs, _) = aggregate(&dataset, &params);
        assert!((costs.k - (0.25 * 4.0 + 0.75 * 8.0)).abs() < 1e-12);
    }

    #[test]
    fn empty_group_gets_zero_mean_and_warning() {
        let rows = vec![RawRecord::new(1, 4.0), RawRecord::new(2, 6.0)];
        let (dataset, _) = CallDataset::from_rows(&rows).unwrap();
        let (costs, warnings) = aggregate(&dataset, &CostParameters::default());
        assert_eq!(costs.c3, 0.0);
        assert_eq!(warnings, vec![Warning::EmptyGroup { base: Base::Three }]);
        // K still blends the zero in.
        assert!((costs.k - 3.0).abs() < 1e-12);
    }

    // ====================================================================
    // Orchestration gates
    // ====================================================================

    #[test]
    fn zero_primary_cost_aborts_before_solve() {
        let rows = vec![
            RawRecord::new(1, 0.0),
            RawRecord::new(2, 6.0),
            RawRecord::new(3, 8.0),
        ];
        let err = Optimizer::default().optimize(&rows).unwrap_err();
        assert_eq!(
            err,
            OptimizeError::Model(ModelError::InvalidCost { name: "C1" })
        );
    }

    #[test]
    fn zero_pooled_cost_aborts_before_solve() {
        // Only base 1 present: C2 = C3 = 0, so K = 0.
        let rows = vec![RawRecord::new(1, 4.0), RawRecord::new(1, 5.0)];
        let err = Optimizer::default().optimize(&rows).unwrap_err();
        assert_eq!(
            err,
            OptimizeError::Model(ModelError::InvalidCost { name: "K" })
        );
    }

    #[test]
    fn degenerate_coefficients_surface_as_model_error() {
        let params = CostParameters::new(0.0, 0.0, 0.5);
        let err = Optimizer::new(params)
            .optimize(&three_base_rows())
            .unwrap_err();
        assert!(matches!(
            err,
            OptimizeError::Model(ModelError::DegenerateModel { .. })
        ));
    }

    #[test]
    fn optimize_carries_warnings_into_the_result() {
        // Bases 1 and 2 only: a FewBases warning plus an EmptyGroup warning,
        // but the request still succeeds (K = C2 / 2 > 0).
        let rows = vec![RawRecord::new(1, 4.0), RawRecord::new(2, 6.0)];
        let result = Optimizer::default().optimize(&rows).unwrap();
        assert_eq!(
            result.warnings,
            vec![
                Warning::FewBases { distinct: 2 },
                Warning::EmptyGroup { base: Base::Three },
            ]
        );
        assert!(result.is_minimum);
    }

    #[test]
    fn warning_display_is_human_readable() {
        let w = Warning::FewBases { distinct: 2 };
        assert_eq!(w.to_string(), "only 2 of 3 bases present in dataset");
        let w = Warning::EmptyGroup { base: Base::Three };
        assert_eq!(w.to_string(), "base 3 has no records; mean cost set to 0");
    }

    #[test]
    fn base_id_round_trip() {
        for base in Base::ALL {
            assert_eq!(Base::from_id(i64::from(base.id())), Some(base));
        }
        assert_eq!(Base::from_id(0), None);
        assert_eq!(Base::from_id(4), None);
    }
}
