//! Solver driver and re-optimization controller.
//!
//! Wraps the HiGHS backend behind `good_lp`: one blocking solve per model,
//! a wall-clock budget split across the enumeration loop, cooperative
//! cancellation between rounds, Hamming no-good cuts plus an objective
//! band for diverse alternatives, and the slack relaxation used to explain
//! infeasible instances.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use good_lp::solvers::highs::highs;
use good_lp::{Expression, ResolutionError, Solution as _, SolverModel, WithTimeLimit};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::analysis::{self, analyze, RosterSummary};
use crate::compile::{apply_pins, CompileError};
use crate::domain::{Assignment, AssignmentCell, ProblemInstance, Shift, Solution, SolverConfig};
use crate::model::{self, RosterModel};
use crate::recommend;

/// Terminal status of an optimize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Ok,
    Infeasible,
    TimeLimit,
    Cancelled,
}

impl SolveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SolveStatus::Ok => "OK",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::TimeLimit => "TIME_LIMIT",
            SolveStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Cooperative cancellation token, polled between enumeration rounds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Unrecoverable failures, as opposed to INFEASIBLE / TIME_LIMIT outcomes.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("solver backend failure: {0}")]
    Backend(String),
}

/// Full validation output for one assignment: ingestion problems, the
/// analyzer report and ranked repair suggestions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecheckReport {
    pub ok: bool,
    /// Grid ingestion problems (unknown nurses, duplicate or missing cells).
    pub violations: Vec<String>,
    pub summary: RosterSummary,
    pub warnings: Vec<String>,
    pub violations_detail: Vec<analysis::Violation>,
    pub violation_cells: Vec<analysis::ViolationCell>,
    pub recommendations: Vec<recommend::Recommendation>,
}

/// Result of `optimize` / `reoptimize`.
#[derive(Debug)]
pub struct OptimizeOutcome {
    pub status: SolveStatus,
    pub solutions: Vec<Solution>,
    pub warnings: Vec<String>,
    /// Diagnostic analysis, populated on INFEASIBLE.
    pub analysis: Option<RecheckReport>,
}

enum RoundOutcome {
    Solved { assignment: Assignment, objective: f64 },
    Infeasible,
    Failed(String),
}

/// Builds one fresh model and runs one blocking solve.
fn solve_round(
    instance: &ProblemInstance,
    cfg: &SolverConfig,
    with_slack: bool,
    previous: &[Assignment],
    band: Option<f64>,
    time_limit: Duration,
) -> RoundOutcome {
    let RosterModel {
        vars,
        x,
        objective,
        constraints,
        slack_count,
    } = model::build(instance, &cfg.weights, with_slack);
    let objective_probe = objective.clone();
    let row_count = constraints.len();

    let mut problem = vars
        .minimise(objective)
        .using(highs)
        .with_time_limit(time_limit.as_secs_f64().max(0.1));
    for constraint in constraints {
        problem.add_constraint(constraint);
    }
    if let Some(limit) = band {
        problem.add_constraint(objective_probe.clone().leq(limit));
    }

    // Hamming no-good cuts: a new plan may agree with each previously
    // emitted plan on at most `cells - delta` cells.
    let cells = instance.nurse_count() * instance.day_count();
    let delta = cfg.hamming_delta(instance);
    for prev in previous {
        let mut agreement = Expression::from(0.0);
        for n in 0..instance.nurse_count() {
            for d in 0..instance.day_count() {
                agreement += x[n][d][prev.get(n, d).index()];
            }
        }
        problem.add_constraint(agreement.leq((cells.saturating_sub(delta)) as f64));
    }

    info!(
        rows = row_count,
        slack = slack_count,
        cuts = previous.len(),
        limit_secs = time_limit.as_secs_f64(),
        "solving roster model"
    );

    match problem.solve() {
        Ok(solution) => {
            let mut assignment = Assignment::new(instance.nurse_count(), instance.day_count());
            for n in 0..instance.nurse_count() {
                for d in 0..instance.day_count() {
                    for shift in Shift::ALL {
                        if solution.value(x[n][d][shift.index()]) >= 0.5 {
                            assignment.set(n, d, shift);
                            break;
                        }
                    }
                }
            }
            let objective = model::objective_value(&assignment, instance, &cfg.weights);
            RoundOutcome::Solved {
                assignment,
                objective,
            }
        }
        Err(ResolutionError::Infeasible) => RoundOutcome::Infeasible,
        Err(other) => RoundOutcome::Failed(other.to_string()),
    }
}

/// Re-solves the elastic model and analyzes the relaxed roster, so an
/// INFEASIBLE response can show which rules had to give and by how much.
fn diagnose(
    instance: &ProblemInstance,
    cfg: &SolverConfig,
    time_limit: Duration,
    warnings: &mut Vec<String>,
) -> Option<RecheckReport> {
    match solve_round(instance, cfg, true, &[], None, time_limit) {
        RoundOutcome::Solved { assignment, .. } => {
            Some(report_for(&assignment, instance, Vec::new()))
        }
        _ => {
            warnings.push(
                "slack diagnosis could not produce a relaxed roster; structural rules conflict"
                    .to_string(),
            );
            None
        }
    }
}

fn report_for(
    assignment: &Assignment,
    instance: &ProblemInstance,
    ingestion_problems: Vec<String>,
) -> RecheckReport {
    let report = analyze(assignment, instance);
    let recommendations = recommend::recommendations(assignment, instance, &report);
    RecheckReport {
        ok: ingestion_problems.is_empty() && report.violations.is_empty(),
        violations: ingestion_problems,
        summary: report.summary(),
        warnings: report.warnings,
        violations_detail: report.violations,
        violation_cells: report.violation_cells,
        recommendations,
    }
}

/// Solves the instance and enumerates up to `alternatives` diverse plans.
pub fn optimize(
    instance: &ProblemInstance,
    alternatives: usize,
    cfg: &SolverConfig,
    cancel: &CancelFlag,
) -> Result<OptimizeOutcome, SolveError> {
    let started = Instant::now();
    let k = alternatives.max(1);
    let mut warnings = Vec::new();

    // Aggregate night capacity pre-flight: a demand total outside the
    // reachable range is provably infeasible, so skip straight to the
    // slack diagnosis.
    let total_night = u64::from(instance.total_night_demand());
    let min_sum: u64 = instance
        .nurses
        .iter()
        .map(|n| u64::from(n.rules.night_min))
        .sum();
    let max_sum: u64 = instance
        .nurses
        .iter()
        .map(|n| u64::from(n.rules.night_max))
        .sum();
    if min_sum > total_night || total_night > max_sum {
        warnings.push(format!(
            "night demand {total_night} lies outside the reachable range {min_sum}..{max_sum}"
        ));
        let analysis = diagnose(instance, cfg, cfg.solve_budget(), &mut warnings);
        return Ok(OptimizeOutcome {
            status: SolveStatus::Infeasible,
            solutions: Vec::new(),
            warnings,
            analysis,
        });
    }

    let first_limit = cfg.solve_budget().min(cfg.total_budget());
    let (first_assignment, z1) = match solve_round(instance, cfg, false, &[], None, first_limit) {
        RoundOutcome::Solved {
            assignment,
            objective,
        } => (assignment, objective),
        RoundOutcome::Infeasible => {
            let analysis = diagnose(instance, cfg, cfg.solve_budget(), &mut warnings);
            return Ok(OptimizeOutcome {
                status: SolveStatus::Infeasible,
                solutions: Vec::new(),
                warnings,
                analysis,
            });
        }
        RoundOutcome::Failed(reason) => {
            return if started.elapsed() >= cfg.total_budget() {
                warnings
                    .push("time budget exhausted before a first roster was proven".to_string());
                Ok(OptimizeOutcome {
                    status: SolveStatus::TimeLimit,
                    solutions: Vec::new(),
                    warnings,
                    analysis: None,
                })
            } else {
                Err(SolveError::Backend(reason))
            };
        }
    };

    let mut solutions = vec![Solution {
        plan_id: "plan-1".to_string(),
        assignment: first_assignment,
        objective: z1,
    }];
    let mut status = SolveStatus::Ok;

    if k > 1 && started.elapsed() >= cfg.total_budget() {
        // An exhausted first solve is an unproven base; do not enumerate.
        status = SolveStatus::TimeLimit;
        warnings.push("budget exhausted after the first plan; enumeration skipped".to_string());
    } else {
        let band = z1 * (1.0 + cfg.epsilon);
        for i in 1..k {
            if cancel.is_cancelled() {
                status = SolveStatus::Cancelled;
                warnings.push("solve cancelled; returning plans found so far".to_string());
                break;
            }
            let Some(remaining) = cfg.total_budget().checked_sub(started.elapsed()) else {
                status = SolveStatus::TimeLimit;
                warnings.push(format!("time budget exhausted after {i} plans"));
                break;
            };
            if remaining.is_zero() {
                status = SolveStatus::TimeLimit;
                warnings.push(format!("time budget exhausted after {i} plans"));
                break;
            }
            let per_round = remaining / (k - i) as u32;
            let limit = per_round.min(cfg.solve_budget());
            let previous: Vec<Assignment> =
                solutions.iter().map(|s| s.assignment.clone()).collect();
            match solve_round(instance, cfg, false, &previous, Some(band), limit) {
                RoundOutcome::Solved {
                    assignment,
                    objective,
                } => {
                    solutions.push(Solution {
                        plan_id: format!("plan-{}", i + 1),
                        assignment,
                        objective,
                    });
                }
                RoundOutcome::Infeasible => {
                    info!(plans = solutions.len(), "no further plan inside the diversity band");
                    break;
                }
                RoundOutcome::Failed(reason) => {
                    if started.elapsed() >= cfg.total_budget() {
                        status = SolveStatus::TimeLimit;
                        warnings.push(format!("time budget exhausted after {i} plans"));
                    } else {
                        warnings.push(format!("enumeration stopped early: {reason}"));
                    }
                    break;
                }
            }
        }
    }

    info!(
        status = status.as_str(),
        plans = solutions.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "optimize finished"
    );
    Ok(OptimizeOutcome {
        status,
        solutions,
        warnings,
        analysis: None,
    })
}

/// Re-solves with user-pinned cells injected as fixed shifts. On an
/// infeasible pin set the report explains the current grid instead.
pub fn reoptimize(
    instance: &ProblemInstance,
    base_assignment: Option<&[AssignmentCell]>,
    pinned: &[AssignmentCell],
    alternatives: usize,
    cfg: &SolverConfig,
    cancel: &CancelFlag,
) -> Result<OptimizeOutcome, SolveError> {
    let pinned_instance = apply_pins(instance, pinned)?;
    let mut outcome = optimize(&pinned_instance, alternatives, cfg, cancel)?;
    if outcome.status == SolveStatus::Infeasible {
        if let Some(cells) = base_assignment {
            outcome.analysis = Some(recheck(cells, &pinned_instance));
        }
    }
    Ok(outcome)
}

/// Validate-only flow: no solver call, just ingestion + analysis + repairs.
pub fn recheck(cells: &[AssignmentCell], instance: &ProblemInstance) -> RecheckReport {
    let (assignment, problems) = analysis::ingest(cells, instance);
    report_for(&assignment, instance, problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Team;
    use crate::test_support::ward_of_four;

    fn cfg() -> SolverConfig {
        SolverConfig::default()
    }

    #[test]
    fn small_ward_yields_a_clean_plan() {
        let instance = ward_of_four();
        let outcome = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Ok);
        assert_eq!(outcome.solutions.len(), 1);

        let plan = &outcome.solutions[0];
        assert_eq!(plan.plan_id, "plan-1");
        let report = analyze(&plan.assignment, &instance);
        assert!(report.is_clean(), "violations: {:?}", report.violations);
        for day in &report.per_day {
            assert_eq!(day.filled.night, 1);
            assert!((2..=3).contains(&day.filled.day));
        }
        // Night fairness spreads the three nights over three nurses, so
        // nobody works nights back to back.
        for n in 0..instance.nurse_count() {
            for d in 0..instance.day_count() - 1 {
                assert!(
                    !(plan.assignment.get(n, d) == Shift::Night
                        && plan.assignment.get(n, d + 1) == Shift::Night),
                    "nurse {n} works consecutive nights"
                );
            }
        }
    }

    #[test]
    fn emitted_plan_survives_recheck() {
        let instance = ward_of_four();
        let outcome = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        let cells = outcome.solutions[0].assignment.to_cells(&instance);
        let report = recheck(&cells, &instance);
        assert!(report.ok);
        assert!(report.violations_detail.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn alternatives_are_pairwise_diverse_and_near_optimal() {
        let instance = ward_of_four();
        let outcome = optimize(&instance, 3, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Ok);
        assert_eq!(outcome.solutions.len(), 3);

        let delta = cfg().hamming_delta(&instance);
        let z1 = outcome.solutions[0].objective;
        for (i, a) in outcome.solutions.iter().enumerate() {
            assert_eq!(a.plan_id, format!("plan-{}", i + 1));
            assert!(
                a.objective <= z1 * 1.15 + 1e-6,
                "plan {} objective {} outside the band ({z1})",
                a.plan_id,
                a.objective
            );
            assert!(analyze(&a.assignment, &instance).is_clean());
            for b in &outcome.solutions[i + 1..] {
                assert!(
                    a.assignment.hamming_distance(&b.assignment) >= delta,
                    "plans too similar"
                );
            }
        }
    }

    #[test]
    fn pinned_cell_is_honored() {
        let instance = ward_of_four();
        let pin = AssignmentCell {
            nurse_id: "n2".to_string(),
            date: instance.dates[1],
            shift: Shift::Night,
        };
        let outcome =
            reoptimize(&instance, None, &[pin], 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Ok);
        assert_eq!(outcome.solutions[0].assignment.get(1, 1), Shift::Night);
    }

    #[test]
    fn repinning_a_full_plan_reproduces_it() {
        let instance = ward_of_four();
        let first = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        let plan = &first.solutions[0];
        let pins = plan.assignment.to_cells(&instance);
        let again =
            reoptimize(&instance, None, &pins, 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(again.status, SolveStatus::Ok);
        assert_eq!(again.solutions[0].assignment, plan.assignment);
    }

    #[test]
    fn unreachable_night_demand_is_diagnosed() {
        let mut instance = ward_of_four();
        for nurse in &mut instance.nurses {
            nurse.rules.night_min = 2;
        }
        let outcome = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.solutions.is_empty());
        let analysis = outcome.analysis.expect("slack diagnosis");
        assert!(!analysis.ok);
        assert!(
            analysis.violations_detail.iter().any(|v| matches!(
                v.kind,
                crate::analysis::ViolationKind::NightCapExceeded
                    | crate::analysis::ViolationKind::Excess
                    | crate::analysis::ViolationKind::Shortage
            )),
            "diagnosis should expose the broken night bounds"
        );
    }

    #[test]
    fn zero_night_bounds_keep_a_nurse_off_nights() {
        let mut instance = ward_of_four();
        instance.nurses[3].rules.night_min = 0;
        instance.nurses[3].rules.night_max = 0;
        let outcome = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Ok);
        let plan = &outcome.solutions[0];
        for d in 0..instance.day_count() {
            assert_ne!(plan.assignment.get(3, d), Shift::Night);
        }
    }

    #[test]
    fn forbidding_a_whole_team_for_nights_makes_deep_nights_infeasible() {
        // Six nurses, two nights demanded: the crew must mix teams A and B,
        // so banning team A from nights has no legal roster.
        let mut instance = ward_of_four();
        instance.nurses.push(crate::domain::Nurse {
            id: "n5".to_string(),
            name: None,
            team: Team::A,
            leader_ok: true,
            rules: instance.nurses[0].rules.clone(),
        });
        instance.nurses.push(crate::domain::Nurse {
            id: "n6".to_string(),
            name: None,
            team: Team::B,
            leader_ok: true,
            rules: instance.nurses[0].rules.clone(),
        });
        for day in &mut instance.demand {
            day.night = 2;
            day.day_min = 1;
            day.day_max = 4;
        }

        let feasible = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(feasible.status, SolveStatus::Ok);

        for nurse in instance
            .nurses
            .iter_mut()
            .filter(|n| n.team == Team::A)
        {
            for d in 0..3 {
                nurse.rules.forbidden.insert((d, Shift::Night));
            }
        }
        let outcome = optimize(&instance, 1, &cfg(), &CancelFlag::new()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        // The structural team-mix rows stay hard even under slack, so the
        // diagnosis cannot relax its way to a roster here.
        assert!(outcome.analysis.is_none());
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn cancelled_enumeration_returns_partial_results() {
        let instance = ward_of_four();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = optimize(&instance, 3, &cfg(), &cancel).unwrap();
        assert_eq!(outcome.status, SolveStatus::Cancelled);
        assert_eq!(outcome.solutions.len(), 1);
    }
}
