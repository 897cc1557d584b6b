//! Flat, wire-compatible rendering of an [`OptimizationResult`].
//!
//! The field set and names are a compatibility contract with the existing
//! consumer of this payload and must not change: `N`, `C1`, `C2`, `C3`,
//! `K`, `alpha`, `beta`, `x_otimo`, `chamados_bases23`, `custo_otimo`,
//! `custo_base1_total`, `custo_bases23_total`, `economia_vs_base1`,
//! `economia_vs_bases23`, `economia_percentual`, `f_segunda`, `eh_minimo`,
//! `prova_simbolica`, `timestamp`. Warnings deliberately stay off this
//! record; they live on [`OptimizationResult::warnings`].
//!
//! All rounding happens here and only here -- monetary fields to 2 decimals,
//! the saving percentage to 1, the curvature to 4 -- so the core computes in
//! full precision and presentation stays a boundary concern.

use chrono::{DateTime, Utc};

use crate::proof::SymbolicProof;
use crate::OptimizationResult;

/// The flat key-value result record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    #[cfg_attr(feature = "serde", serde(rename = "N"))]
    pub n: usize,
    #[cfg_attr(feature = "serde", serde(rename = "C1"))]
    pub c1: f64,
    #[cfg_attr(feature = "serde", serde(rename = "C2"))]
    pub c2: f64,
    #[cfg_attr(feature = "serde", serde(rename = "C3"))]
    pub c3: f64,
    #[cfg_attr(feature = "serde", serde(rename = "K"))]
    pub k: f64,
    pub alpha: f64,
    pub beta: f64,
    pub x_otimo: usize,
    pub chamados_bases23: usize,
    pub custo_otimo: f64,
    pub custo_base1_total: f64,
    pub custo_bases23_total: f64,
    pub economia_vs_base1: f64,
    pub economia_vs_bases23: f64,
    pub economia_percentual: f64,
    pub f_segunda: f64,
    pub eh_minimo: bool,
    pub prova_simbolica: SymbolicProof,
    pub timestamp: DateTime<Utc>,
}

/// Round to `places` decimal digits, ties to even -- the same tie rule the
/// solver commits to.
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10.0_f64.powi(places);
    (value * factor).round_ties_even() / factor
}

impl Report {
    /// Flatten a result into the wire record, applying presentation rounding.
    pub fn from_result(result: &OptimizationResult) -> Self {
        Self {
            n: result.costs.n,
            c1: round_to(result.costs.c1, 2),
            c2: round_to(result.costs.c2, 2),
            c3: round_to(result.costs.c3, 2),
            k: round_to(result.costs.k, 2),
            alpha: result.params.alpha,
            beta: result.params.beta,
            x_otimo: result.x_star,
            chamados_bases23: result.secondary_calls,
            custo_otimo: round_to(result.cost_at_optimum, 2),
            custo_base1_total: round_to(result.cost_all_primary, 2),
            custo_bases23_total: round_to(result.cost_all_secondary, 2),
            economia_vs_base1: round_to(result.savings_vs_primary, 2),
            economia_vs_bases23: round_to(result.savings_vs_secondary, 2),
            economia_percentual: round_to(result.savings_percent, 1),
            f_segunda: round_to(result.second_derivative, 4),
            eh_minimo: result.is_minimum,
            prova_simbolica: result.proof.clone(),
            timestamp: result.timestamp,
        }
    }
}

impl From<&OptimizationResult> for Report {
    fn from(result: &OptimizationResult) -> Self {
        Self::from_result(result)
    }
}
