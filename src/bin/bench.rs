//! End-to-end solve benchmark on the LARGE demo ward.
//!
//! Run with: cargo run --release --bin bench

use std::time::Instant;

use nurse_scheduling::analysis::analyze;
use nurse_scheduling::compile;
use nurse_scheduling::demo_data::{self, DemoData};
use nurse_scheduling::solver::{self, CancelFlag};

fn main() {
    let request = demo_data::generate(DemoData::Large);
    let instance = compile::compile(request.year, request.month, &request.nurses, &request.policy)
        .expect("demo data compiles");

    println!("Benchmark: roster optimization (HiGHS)");
    println!("  Nurses: {}", instance.nurse_count());
    println!("  Days: {}", instance.day_count());
    println!(
        "  Cells: {}",
        instance.nurse_count() * instance.day_count()
    );
    println!();

    let cfg = request.solver;
    let start = Instant::now();
    let outcome =
        solver::optimize(&instance, 3, &cfg, &CancelFlag::new()).expect("solver backend");
    let elapsed = start.elapsed();

    println!("Results:");
    println!("  Status: {}", outcome.status.as_str());
    println!("  Plans: {}", outcome.solutions.len());
    println!("  Time: {elapsed:.2?}");
    for warning in &outcome.warnings {
        println!("  Warning: {warning}");
    }
    for solution in &outcome.solutions {
        let report = analyze(&solution.assignment, &instance);
        println!(
            "  {}: objective {:.1}, violations {}, warnings {}",
            solution.plan_id,
            solution.objective,
            report.violations.len(),
            report.warnings.len()
        );
        assert!(report.is_clean(), "emitted plan must satisfy every rule");
    }
}
