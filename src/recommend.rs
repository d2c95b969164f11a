//! Single-cell repair suggestions for demand-bound violations.
//!
//! The recommender is purely local: for each shortage or excess it
//! simulates moving one nurse onto (or off) the affected shift, re-analyzes
//! the mutated grid, and ranks candidates by how much the repair helps
//! without breaking anything else. It never re-invokes the solver and never
//! proposes multi-cell edits.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::{analyze, AnalysisReport, Violation, ViolationKind};
use crate::domain::{Assignment, ProblemInstance, Shift, Team};

/// Cap on suggestions per violation.
const MAX_SUGGESTIONS: usize = 5;

/// One candidate repair for a single cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub nurse_id: String,
    pub current_shift: Shift,
    pub suggested_shift: Shift,
    pub reason: String,
    pub locked: bool,
}

/// Ranked repairs for one demand-bound violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub date: NaiveDate,
    pub shift: Shift,
    pub kind: ViolationKind,
    pub difference: i64,
    pub suggestions: Vec<Suggestion>,
}

/// Builds repair recommendations for every shortage and excess in `report`.
pub fn recommendations(
    assignment: &Assignment,
    instance: &ProblemInstance,
    report: &AnalysisReport,
) -> Vec<Recommendation> {
    report
        .violations
        .iter()
        .filter_map(|violation| match violation.kind {
            ViolationKind::Shortage => {
                let suggestions = shortage_candidates(assignment, instance, report, violation);
                (!suggestions.is_empty()).then(|| Recommendation {
                    date: violation.date,
                    shift: violation.shift,
                    kind: violation.kind,
                    difference: violation.difference,
                    suggestions,
                })
            }
            ViolationKind::Excess => {
                let suggestions = excess_candidates(assignment, instance, report, violation);
                (!suggestions.is_empty()).then(|| Recommendation {
                    date: violation.date,
                    shift: violation.shift,
                    kind: violation.kind,
                    difference: violation.difference,
                    suggestions,
                })
            }
            _ => None,
        })
        .collect()
}

/// Multiset of violation fingerprints, for before/after comparison.
fn fingerprints(report: &AnalysisReport) -> BTreeMap<(NaiveDate, Shift, ViolationKind, Option<String>), usize> {
    let mut out = BTreeMap::new();
    for v in &report.violations {
        *out.entry((v.date, v.shift, v.kind, v.nurse_id.clone()))
            .or_insert(0) += 1;
    }
    out
}

/// Counts violations of `sim` that are absent from `base`, skipping the
/// demand bounds the repair itself is expected to disturb.
fn new_violations(
    base: &AnalysisReport,
    sim: &AnalysisReport,
    date: NaiveDate,
    touched: &[Shift],
) -> usize {
    let mut seen = fingerprints(base);
    let mut fresh = 0;
    for v in &sim.violations {
        let key = (v.date, v.shift, v.kind, v.nurse_id.clone());
        if let Some(count) = seen.get_mut(&key) {
            if *count > 0 {
                *count -= 1;
                continue;
            }
        }
        let is_touched_demand = matches!(v.kind, ViolationKind::Shortage | ViolationKind::Excess)
            && v.date == date
            && touched.contains(&v.shift);
        if !is_touched_demand {
            fresh += 1;
        }
    }
    fresh
}

/// Teams absent from the night crew of `day`, when the demanded depth
/// requires a mix.
fn missing_night_teams(assignment: &Assignment, instance: &ProblemInstance, day: usize) -> Vec<Team> {
    if instance.demand[day].night < 2 {
        return Vec::new();
    }
    let on_night: Vec<Team> = (0..instance.nurse_count())
        .filter(|&n| assignment.get(n, day) == Shift::Night)
        .map(|n| instance.nurses[n].team)
        .collect();
    [Team::A, Team::B]
        .into_iter()
        .filter(|team| !on_night.contains(team))
        .collect()
}

fn shortage_candidates(
    assignment: &Assignment,
    instance: &ProblemInstance,
    base: &AnalysisReport,
    violation: &Violation,
) -> Vec<Suggestion> {
    let day = instance
        .day_index(violation.date)
        .expect("violation date inside month");
    let target = violation.shift;
    let missing_teams = if target == Shift::Night {
        missing_night_teams(assignment, instance, day)
    } else {
        Vec::new()
    };

    let mut ranked: Vec<((bool, i64, i64, i64, i64, String), Suggestion)> = Vec::new();
    for (n, nurse) in instance.nurses.iter().enumerate() {
        let current = assignment.get(n, day);
        if current == target {
            continue;
        }
        let locked = nurse.rules.fixed.contains_key(&day);

        let mut sim = assignment.clone();
        sim.set(n, day, target);
        let sim_report = analyze(&sim, instance);
        let fresh = new_violations(base, &sim_report, violation.date, &[target, current]);
        if fresh > 0 && !locked {
            continue;
        }

        let resolved = base.violations.len() as i64 - sim_report.violations.len() as i64;
        let soft_delta = sim_report.warnings.len() as i64 - base.warnings.len() as i64;
        let team_gap = if missing_teams.is_empty() || missing_teams.contains(&nurse.team) {
            0
        } else {
            1
        };
        let target_count = assignment.row(n).iter().filter(|&&s| s == target).count() as i64;

        ranked.push((
            (locked, team_gap, -resolved, soft_delta, target_count, nurse.id.clone()),
            Suggestion {
                nurse_id: nurse.id.clone(),
                current_shift: current,
                suggested_shift: target,
                reason: if locked {
                    format!("{} {target} is locked for this nurse", violation.date)
                } else {
                    format!("fills the {target} shortage on {}", violation.date)
                },
                locked,
            },
        ));
    }

    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, s)| s)
        .collect()
}

fn excess_candidates(
    assignment: &Assignment,
    instance: &ProblemInstance,
    base: &AnalysisReport,
    violation: &Violation,
) -> Vec<Suggestion> {
    let day = instance
        .day_index(violation.date)
        .expect("violation date inside month");
    let target = violation.shift;

    // The most undersupplied shift of the same day, as a fallback landing
    // spot when plain OFF creates a fresh problem.
    let deficient = base
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::Shortage && v.date == violation.date)
        .min_by_key(|v| v.difference)
        .map(|v| v.shift);

    let mut ranked: Vec<((bool, i64, i64, i64, String), Suggestion)> = Vec::new();
    for (n, nurse) in instance.nurses.iter().enumerate() {
        if assignment.get(n, day) != target {
            continue;
        }
        let locked = nurse.rules.fixed.contains_key(&day);

        let mut chosen: Option<(Shift, AnalysisReport)> = None;
        for candidate in std::iter::once(Shift::Off).chain(deficient) {
            let mut sim = assignment.clone();
            sim.set(n, day, candidate);
            let sim_report = analyze(&sim, instance);
            if new_violations(base, &sim_report, violation.date, &[target, candidate]) == 0 {
                chosen = Some((candidate, sim_report));
                break;
            }
        }
        let Some((suggested, sim_report)) = chosen else {
            if locked {
                ranked.push((
                    (true, 0, 0, 0, nurse.id.clone()),
                    Suggestion {
                        nurse_id: nurse.id.clone(),
                        current_shift: target,
                        suggested_shift: Shift::Off,
                        reason: format!("{} {target} is locked for this nurse", violation.date),
                        locked: true,
                    },
                ));
            }
            continue;
        };

        let resolved = base.violations.len() as i64 - sim_report.violations.len() as i64;
        let soft_delta = sim_report.warnings.len() as i64 - base.warnings.len() as i64;
        let target_count = assignment.row(n).iter().filter(|&&s| s == target).count() as i64;

        ranked.push((
            (locked, -resolved, soft_delta, -target_count, nurse.id.clone()),
            Suggestion {
                nurse_id: nurse.id.clone(),
                current_shift: target,
                suggested_shift: suggested,
                reason: if locked {
                    format!("{} {target} is locked for this nurse", violation.date)
                } else {
                    format!("frees the {target} surplus on {}", violation.date)
                },
                locked,
            },
        ));
    }

    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, s)| s)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ward_of_four, ward_of_four_roster};

    /// The user swaps one DAY onto an already-covered night; the top
    /// suggestion for the resulting shortage undoes a night assignment.
    #[test]
    fn swap_repair_reverses_the_swap_first() {
        let instance = ward_of_four();
        let mut roster = ward_of_four_roster();
        roster.set(2, 1, Shift::Night);
        let report = analyze(&roster, &instance);
        let recs = recommendations(&roster, &instance, &report);
        assert_eq!(recs.len(), 2);

        let shortage = &recs[0];
        assert_eq!(shortage.kind, ViolationKind::Shortage);
        assert_eq!(shortage.shift, Shift::Day);
        let top = &shortage.suggestions[0];
        // Only a night nurse can step in without breaking another rule:
        // the resting nurse just came off a night shift.
        assert_eq!(top.current_shift, Shift::Night);
        assert_eq!(top.suggested_shift, Shift::Day);
        assert!(!top.locked);

        let excess = &recs[1];
        assert_eq!(excess.kind, ViolationKind::Excess);
        assert_eq!(excess.shift, Shift::Night);
        // The nurse with more nights this month is asked to stand down.
        assert_eq!(excess.suggestions[0].nurse_id, "n3");
        assert_eq!(excess.suggestions[0].suggested_shift, Shift::Off);
    }

    #[test]
    fn locked_cells_sink_to_the_bottom() {
        let mut instance = ward_of_four();
        let mut roster = ward_of_four_roster();
        roster.set(2, 1, Shift::Night);
        // Lock both night nurses of the broken day in place.
        instance.nurses[1].rules.fixed.insert(1, Shift::Night);
        instance.nurses[2].rules.fixed.insert(1, Shift::Night);
        let report = analyze(&roster, &instance);
        let recs = recommendations(&roster, &instance, &report);

        let excess = recs
            .iter()
            .find(|r| r.kind == ViolationKind::Excess)
            .expect("excess recommendation");
        assert!(excess.suggestions.iter().all(|s| s.locked));
    }

    #[test]
    fn night_shortage_prefers_missing_team() {
        let instance = ward_of_four();
        // Demand one night; leave the night slot empty on day 0.
        let mut roster = ward_of_four_roster();
        roster.set(0, 0, Shift::Off);
        let report = analyze(&roster, &instance);
        let recs = recommendations(&roster, &instance, &report);
        let night = recs
            .iter()
            .find(|r| r.shift == Shift::Night && r.kind == ViolationKind::Shortage)
            .expect("night shortage");
        assert!(!night.suggestions.is_empty());
        // Every suggested stand-in actually fixes the gap.
        for s in &night.suggestions {
            assert_eq!(s.suggested_shift, Shift::Night);
        }
    }

    #[test]
    fn clean_roster_produces_no_recommendations() {
        let instance = ward_of_four();
        let roster = ward_of_four_roster();
        let report = analyze(&roster, &instance);
        assert!(recommendations(&roster, &instance, &report).is_empty());
    }
}
