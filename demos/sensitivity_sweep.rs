//! End-to-end walkthrough: optimize the sample dataset and sweep the
//! primary cost.
//!
//! Run: `cargo run --example sensitivity_sweep`

use apportion::model::CostModel;
use apportion::sensitivity::{analyze, DEFAULT_PERTURBATIONS};
use apportion::{Optimizer, RawRecord, Report};

fn sample_rows() -> Vec<RawRecord> {
    vec![
        RawRecord::new(1, 4.2),
        RawRecord::new(1, 5.1),
        RawRecord::new(1, 3.8),
        RawRecord::new(2, 5.5),
        RawRecord::new(2, 6.2),
        RawRecord::new(2, 4.9),
        RawRecord::new(3, 5.8),
        RawRecord::new(3, 6.5),
        RawRecord::new(3, 5.2),
        RawRecord::new(1, 4.5),
        RawRecord::new(2, 5.9),
        RawRecord::new(3, 6.1),
    ]
}

fn main() {
    println!("=== Optimal Call Allocation ===\n");

    let result = Optimizer::default().optimize(&sample_rows()).unwrap();
    let report = Report::from_result(&result);

    println!(
        "Dataset: N = {} calls, average costs C1 = {:.2}, C2 = {:.2}, C3 = {:.2}, K = {:.2}",
        report.n, report.c1, report.c2, report.c3, report.k
    );
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }

    println!("\nScenario comparison:");
    println!("{:>22}  {:>10}  {:>10}", "scenario", "split", "cost");
    println!("{}", "-".repeat(48));
    println!(
        "{:>22}  {:>10}  {:>10.2}",
        "optimal",
        format!("{}/{}", result.x_star, result.secondary_calls),
        result.cost_at_optimum
    );
    println!(
        "{:>22}  {:>10}  {:>10.2}",
        "all to base 1",
        format!("{}/0", report.n),
        result.cost_all_primary
    );
    println!(
        "{:>22}  {:>10}  {:>10.2}",
        "all to bases 2/3",
        format!("0/{}", report.n),
        result.cost_all_secondary
    );
    println!(
        "\nGuaranteed saving vs the worse scenario: {:.1}%",
        result.savings_percent
    );

    println!("\nDerivation:");
    println!("  f(x)   = {}", result.proof.objective);
    println!("  f'(x)  = {}", result.proof.first_derivative);
    println!("  f''(x) = {}", result.proof.second_derivative);
    println!("  x*     = {}", result.proof.critical_point);
    println!(
        "  minimum: {} ({})",
        result.is_minimum, result.proof.minimality
    );

    println!("\nSensitivity of x* to estimation error in C1:");
    println!("{:>8}  {:>8}  {:>6}  {:>10}", "shift", "C1'", "x*", "cost");
    println!("{}", "-".repeat(40));
    let model = CostModel::from_parts(&result.costs, &result.params);
    for point in analyze(&model, &DEFAULT_PERTURBATIONS).unwrap() {
        println!(
            "{:>+7.0}%  {:>8.2}  {:>6}  {:>10.2}",
            point.perturbation, point.primary_cost, point.x_star, point.cost
        );
    }
}
