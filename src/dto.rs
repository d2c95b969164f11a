//! DTOs for the REST surface.
//!
//! Requests carry the raw domain records directly (they are serde types);
//! responses wrap solver output with the per-plan analysis blocks the UI
//! renders.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::{analyze, RosterSummary, Violation, ViolationCell};
use crate::domain::{
    AssignmentCell, NurseRecord, Policy, ProblemInstance, Solution, SolverConfig, Team,
};
use crate::recommend::{self, Recommendation};
use crate::solver::{OptimizeOutcome, RecheckReport, SolveStatus};

fn default_alternatives() -> u32 {
    1
}

/// Body of `POST /optimize`. Also serializable so the demo-data endpoint
/// can hand out ready-to-post payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub year: i32,
    pub month: u32,
    /// Number of diverse plans to enumerate, clamped to 1..=10.
    #[serde(default = "default_alternatives")]
    pub alternatives: u32,
    pub nurses: Vec<NurseRecord>,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Body of `POST /reoptimize`: the optimize payload plus the current grid
/// and the cells to pin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReoptimizeRequest {
    #[serde(flatten)]
    pub base: OptimizeRequest,
    /// The grid currently on screen, analyzed when the pins are infeasible.
    #[serde(default)]
    pub assignments: Vec<AssignmentCell>,
    /// User-locked cells that must appear in every returned plan.
    #[serde(default)]
    pub fixed: Vec<AssignmentCell>,
}

/// Body of `POST /recheck` and `POST /recommend`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecheckRequest {
    pub year: i32,
    pub month: u32,
    pub nurses: Vec<NurseRecord>,
    #[serde(default)]
    pub policy: Policy,
    pub assignments: Vec<AssignmentCell>,
}

/// Nurse metadata echoed back with resolved flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NurseMeta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub team: Team,
    pub leader_ok: bool,
}

/// One enumerated plan with its full analysis block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDto {
    pub plan_id: String,
    pub label: String,
    pub objective: f64,
    pub assignments: Vec<AssignmentCell>,
    pub summary: RosterSummary,
    pub warnings: Vec<String>,
    pub violations: Vec<Violation>,
    pub violation_cells: Vec<ViolationCell>,
    pub recommendations: Vec<Recommendation>,
}

impl PlanDto {
    pub fn from_solution(index: usize, solution: &Solution, instance: &ProblemInstance) -> Self {
        let report = analyze(&solution.assignment, instance);
        let recommendations =
            recommend::recommendations(&solution.assignment, instance, &report);
        Self {
            plan_id: solution.plan_id.clone(),
            label: format!("Plan {}", index + 1),
            objective: solution.objective,
            assignments: solution.assignment.to_cells(instance),
            summary: report.summary(),
            warnings: report.warnings,
            violations: report.violations,
            violation_cells: report.violation_cells,
            recommendations,
        }
    }
}

/// Body of optimize / reoptimize responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub status: SolveStatus,
    pub year: i32,
    pub month: u32,
    pub days: Vec<NaiveDate>,
    pub nurses: Vec<NurseMeta>,
    pub solutions: Vec<PlanDto>,
    pub alternatives_returned: usize,
    pub seed: u64,
    pub warnings: Vec<String>,
    /// Diagnostic analysis of the closest feasible relaxation (or of the
    /// submitted grid on an infeasible re-optimize).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RecheckReport>,
}

impl OptimizeResponse {
    pub fn from_outcome(
        outcome: OptimizeOutcome,
        instance: &ProblemInstance,
        cfg: &SolverConfig,
    ) -> Self {
        let solutions: Vec<PlanDto> = outcome
            .solutions
            .iter()
            .enumerate()
            .map(|(i, solution)| PlanDto::from_solution(i, solution, instance))
            .collect();
        Self {
            status: outcome.status,
            year: instance.year,
            month: instance.month,
            days: instance.dates.clone(),
            nurses: instance
                .nurses
                .iter()
                .map(|n| NurseMeta {
                    id: n.id.clone(),
                    name: n.name.clone(),
                    team: n.team,
                    leader_ok: n.leader_ok,
                })
                .collect(),
            alternatives_returned: solutions.len(),
            solutions,
            seed: cfg.seed,
            warnings: outcome.warnings,
            analysis: outcome.analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_optimize_request_fills_defaults() {
        let body = r#"{
            "year": 2025,
            "month": 10,
            "nurses": [
                {"id": "n1", "team": "A", "leaderOk": true}
            ]
        }"#;
        let request: OptimizeRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.alternatives, 1);
        assert_eq!(request.nurses.len(), 1);
        assert!(request.nurses[0].leader_ok);
        assert!(request.nurses[0].night_ok);
        assert_eq!(request.solver.total_budget_ms, 60_000);
        assert_eq!(request.policy.rule_defaults.weekly_work_max, 5);
    }

    #[test]
    fn reoptimize_request_flattens_base_fields() {
        let body = r#"{
            "year": 2025,
            "month": 10,
            "alternatives": 2,
            "nurses": [],
            "fixed": [
                {"nurseId": "n1", "date": "2025-10-03", "shift": "NIGHT"}
            ]
        }"#;
        let request: ReoptimizeRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.base.alternatives, 2);
        assert_eq!(request.fixed.len(), 1);
        assert_eq!(request.fixed[0].shift, crate::domain::Shift::Night);
        assert!(request.assignments.is_empty());
    }

    #[test]
    fn nurse_rule_overrides_deserialize() {
        let body = r#"{
            "id": "n7",
            "team": "EMG",
            "nightOk": false,
            "rules": {
                "nightMax": 4,
                "requestedOff": ["2025-10-20"],
                "fixedShifts": [{"date": "2025-10-02", "shift": "DAY"}]
            }
        }"#;
        let record: NurseRecord = serde_json::from_str(body).unwrap();
        assert_eq!(record.team, Team::Emg);
        assert!(!record.night_ok);
        assert_eq!(record.rules.night_max, Some(4));
        assert_eq!(record.rules.fixed_shifts.len(), 1);
    }
}
