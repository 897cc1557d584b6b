//! Property tests for the cost model and its exact-arithmetic cross-check.
//!
//! These verify invariants that must hold for ANY parameter values, not just
//! the specific examples in the unit tests: convexity, domain clamping,
//! boundary dominance, determinism, and agreement between the f64 closed
//! form and the independent rational derivation.

use apportion::model::CostModel;
use apportion::proof::{critical_point_exact, second_derivative_exact, Ratio};
use proptest::prelude::*;

/// Models with positive coefficients across several orders of magnitude.
fn model_strategy() -> impl Strategy<Value = CostModel> {
    (
        1_usize..=500,
        0.01_f64..100.0,
        0.01_f64..100.0,
        1e-4_f64..1.0,
        1e-4_f64..1.0,
    )
        .prop_map(|(n, c1, k, alpha, beta)| CostModel::new(n, c1, k, alpha, beta))
}

proptest! {
    // ====================================================================
    // Convexity
    // ====================================================================

    /// The curvature is a positive constant for all valid coefficients, so
    /// every stationary point is a global minimum.
    #[test]
    fn curvature_is_always_positive(model in model_strategy()) {
        let f2 = model.second_derivative();
        prop_assert!(f2 > 0.0, "second derivative {f2} must be positive");
        prop_assert!(model.is_minimum());
        let expected = 2.0 * (model.alpha() + model.beta());
        prop_assert!((f2 - expected).abs() < 1e-12 * expected.max(1.0));
    }

    // ====================================================================
    // Domain clamping
    // ====================================================================

    /// The returned split is always an integer in [0, N], and when the
    /// unconstrained optimum falls outside the box it is clamped to the
    /// nearest boundary.
    #[test]
    fn solve_stays_in_the_box(model in model_strategy()) {
        let raw = model.critical_point().unwrap();
        let x = model.solve().unwrap();
        prop_assert!(x <= model.n(), "x*={x} exceeds N={}", model.n());
        if raw < 0.0 {
            prop_assert_eq!(x, 0, "raw optimum {} should clamp to 0", raw);
        }
        if raw > model.n() as f64 {
            prop_assert_eq!(x, model.n(), "raw optimum {} should clamp to N", raw);
        }
    }

    // ====================================================================
    // Boundary dominance
    // ====================================================================

    /// The chosen split is never worse than either boundary scenario.
    ///
    /// The objective is a parabola with its constrained real minimum inside
    /// [0, N]; rounding moves the split by at most 1/2, which cannot push
    /// its cost above a boundary's.
    #[test]
    fn optimum_dominates_both_boundaries(model in model_strategy()) {
        let x = model.solve().unwrap();
        let at_optimum = model.evaluate(x as f64);
        let at_zero = model.evaluate(0.0);
        let at_n = model.evaluate(model.n() as f64);

        let tol = 1e-9 * at_zero.abs().max(at_n.abs()).max(1.0);
        prop_assert!(at_optimum <= at_zero + tol,
            "f(x*)={at_optimum} worse than f(0)={at_zero}");
        prop_assert!(at_optimum <= at_n + tol,
            "f(x*)={at_optimum} worse than f(N)={at_n}");
    }

    /// Savings are non-negative against both scenarios, and the guaranteed
    /// percentage stays within [0, 100].
    #[test]
    fn savings_are_well_formed(model in model_strategy()) {
        let cmp = model.compare().unwrap();
        let tol = 1e-9 * cmp.cost_all_primary.abs().max(cmp.cost_all_secondary.abs()).max(1.0);
        prop_assert!(cmp.savings_vs_primary >= -tol);
        prop_assert!(cmp.savings_vs_secondary >= -tol);
        prop_assert!(cmp.savings_percent >= -1e-9, "percent = {}", cmp.savings_percent);
        prop_assert!(cmp.savings_percent <= 100.0 + 1e-9, "percent = {}", cmp.savings_percent);
    }

    // ====================================================================
    // Determinism
    // ====================================================================

    /// Identical inputs produce bit-identical outputs: the solve is a pure
    /// closed-form computation with no iteration or ambient state.
    #[test]
    fn solve_is_bit_deterministic(model in model_strategy(), x in 0.0_f64..500.0) {
        prop_assert_eq!(model.solve().unwrap(), model.solve().unwrap());
        prop_assert_eq!(
            model.critical_point().unwrap().to_bits(),
            model.critical_point().unwrap().to_bits()
        );
        prop_assert_eq!(model.evaluate(x).to_bits(), model.evaluate(x).to_bits());
    }

    // ====================================================================
    // Symbolic/numeric agreement
    // ====================================================================

    /// The f64 closed form and the exact rational derivation must land on
    /// the same critical point for all parameters. Parameters are drawn as
    /// rationals and handed to both paths so they consume the same values.
    #[test]
    fn exact_and_float_critical_points_agree(
        n in 1_i128..=200,
        c1_num in 1_i128..=2000,
        k_num in 1_i128..=2000,
        alpha_num in 1_i128..=1000,
        beta_num in 1_i128..=1000,
    ) {
        let c1 = Ratio::new(c1_num, 50);
        let k = Ratio::new(k_num, 50);
        let alpha = Ratio::new(alpha_num, 1000);
        let beta = Ratio::new(beta_num, 1000);

        let exact = critical_point_exact(n, c1, k, alpha, beta).unwrap().to_f64();
        let model = CostModel::new(n as usize, c1.to_f64(), k.to_f64(), alpha.to_f64(), beta.to_f64());
        let float = model.critical_point().unwrap();

        prop_assert!(
            (exact - float).abs() <= 1e-8 * exact.abs().max(1.0),
            "exact = {exact}, float = {float}"
        );
    }

    /// Same agreement for the curvature.
    #[test]
    fn exact_and_float_curvature_agree(
        alpha_num in 1_i128..=1000,
        beta_num in 1_i128..=1000,
    ) {
        let alpha = Ratio::new(alpha_num, 1000);
        let beta = Ratio::new(beta_num, 1000);
        let exact = second_derivative_exact(alpha, beta).to_f64();
        let model = CostModel::new(10, 1.0, 1.0, alpha.to_f64(), beta.to_f64());
        let float = model.second_derivative();
        prop_assert!((exact - float).abs() <= 1e-12 * exact.max(1.0),
            "exact = {exact}, float = {float}");
    }
}
