//! Summary & analyzer: pure re-examination of an assignment against the
//! full rule set.
//!
//! `analyze` never touches the solver; it recomputes per-day fill counts,
//! per-nurse counters and every rule violation from the grid alone, so it
//! can audit solver output and user-edited rosters alike.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Assignment, AssignmentCell, DemandTemplate, ProblemInstance, Shift, Team};

/// Violation taxonomy, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Shortage,
    Excess,
    NightLeaderMissing,
    DayLeaderMissing,
    NightTeamMix,
    ConsecutiveWork,
    ConsecutiveNight,
    ForbiddenAssigned,
    FixedViolated,
    NightCapExceeded,
    WeeklyCapExceeded,
    WeekendCapExceeded,
    NightAfterNightDay,
    RestQuotaUnmet,
    ForbiddenPairNight,
}

/// One detected rule violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub date: NaiveDate,
    pub shift: Shift,
    pub kind: ViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurse_id: Option<String>,
    /// Signed gap where meaningful: negative for shortfalls, positive for
    /// overruns.
    pub difference: i64,
    pub message: String,
}

/// Deduplicated demand-bound cell for UI highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationCell {
    pub date: NaiveDate,
    pub shift: Shift,
    pub kind: ViolationKind,
}

/// Fill counts for the working shifts of one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledCounts {
    pub day: u32,
    pub late: u32,
    pub night: u32,
}

/// Per-day roll-up: what was required and what the grid provides.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub weekday: String,
    pub is_weekend: bool,
    pub is_holiday: bool,
    pub requirements: DemandTemplate,
    pub filled: FilledCounts,
}

/// Shift counters for one nurse across the month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftCounts {
    pub day: u32,
    pub late: u32,
    pub night: u32,
    pub off: u32,
}

/// The caps a nurse was checked against, echoed for display.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub night_min: u32,
    pub night_max: u32,
    pub weekly_work_max: u32,
    pub weekend_holiday_max: u32,
}

/// Per-nurse roll-up.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NurseSummary {
    pub nurse_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub team: Team,
    pub counts: ShiftCounts,
    pub weekend_work: u32,
    pub total_work_days: u32,
    pub rule: RuleSummary,
}

/// The per-day / per-nurse roll-up block shared by plan and recheck
/// responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub per_day: Vec<DaySummary>,
    pub per_nurse: Vec<NurseSummary>,
}

/// Everything the analyzer can say about one assignment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub per_day: Vec<DaySummary>,
    pub per_nurse: Vec<NurseSummary>,
    pub violations: Vec<Violation>,
    pub violation_cells: Vec<ViolationCell>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn summary(&self) -> RosterSummary {
        RosterSummary {
            per_day: self.per_day.clone(),
            per_nurse: self.per_nurse.clone(),
        }
    }
}

/// Re-examines `assignment` against every rule of `instance`.
pub fn analyze(assignment: &Assignment, instance: &ProblemInstance) -> AnalysisReport {
    let nurse_count = instance.nurse_count();
    let day_count = instance.day_count();
    debug_assert_eq!(assignment.nurse_count(), nurse_count);
    debug_assert_eq!(assignment.day_count(), day_count);

    let mut violations: Vec<Violation> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // Per-day fill and demand checks.
    let mut per_day = Vec::with_capacity(day_count);
    for (d, day) in instance.demand.iter().enumerate() {
        let mut filled = FilledCounts::default();
        for n in 0..nurse_count {
            match assignment.get(n, d) {
                Shift::Day => filled.day += 1,
                Shift::Late => filled.late += 1,
                Shift::Night => filled.night += 1,
                Shift::Off => {}
            }
        }

        if filled.day < day.day_min {
            let deficit = (day.day_min - filled.day) as i64;
            violations.push(Violation {
                date: day.date,
                shift: Shift::Day,
                kind: ViolationKind::Shortage,
                nurse_id: None,
                difference: -deficit,
                message: format!(
                    "{} DAY staffing short by {deficit} ({}/{})",
                    day.date, filled.day, day.day_min
                ),
            });
        }
        if filled.day > day.day_max {
            let over = (filled.day - day.day_max) as i64;
            violations.push(Violation {
                date: day.date,
                shift: Shift::Day,
                kind: ViolationKind::Excess,
                nurse_id: None,
                difference: over,
                message: format!(
                    "{} DAY staffing over by {over} ({}/{})",
                    day.date, filled.day, day.day_max
                ),
            });
        }
        for (shift, actual, required) in [
            (Shift::Late, filled.late, day.late),
            (Shift::Night, filled.night, day.night),
        ] {
            if actual != required {
                let diff = actual as i64 - required as i64;
                let kind = if diff < 0 {
                    ViolationKind::Shortage
                } else {
                    ViolationKind::Excess
                };
                violations.push(Violation {
                    date: day.date,
                    shift,
                    kind,
                    nurse_id: None,
                    difference: diff,
                    message: format!(
                        "{} {shift} count differs from demand ({actual}/{required})",
                        day.date
                    ),
                });
            }
        }

        // Every night shift needs a leader, whatever the demanded depth.
        let on_night: Vec<usize> = (0..nurse_count)
            .filter(|&n| assignment.get(n, d) == Shift::Night)
            .collect();
        if !on_night.iter().any(|&n| instance.nurses[n].leader_ok) {
            violations.push(Violation {
                date: day.date,
                shift: Shift::Night,
                kind: ViolationKind::NightLeaderMissing,
                nurse_id: None,
                difference: -1,
                message: format!("{} night shift has no leader", day.date),
            });
        }
        if day.night >= 2 {
            let mut missing: Vec<&str> = Vec::new();
            for team in [Team::A, Team::B] {
                if !on_night.iter().any(|&n| instance.nurses[n].team == team) {
                    missing.push(team.as_str());
                }
            }
            if day.night >= 3
                && !on_night
                    .iter()
                    .any(|&n| instance.nurses[n].team == Team::Emg || instance.nurses[n].leader_ok)
            {
                missing.push("EMG/leader");
            }
            if !missing.is_empty() {
                violations.push(Violation {
                    date: day.date,
                    shift: Shift::Night,
                    kind: ViolationKind::NightTeamMix,
                    nurse_id: None,
                    difference: -(missing.len() as i64),
                    message: format!(
                        "{} night crew missing {}",
                        day.date,
                        missing.join(", ")
                    ),
                });
            }
        }

        // Weekend and holiday day duty needs one of the designated anchors.
        if day.is_weekend_or_holiday()
            && !instance.weekend_day_leaders.is_empty()
            && !instance
                .weekend_day_leaders
                .iter()
                .any(|&n| assignment.get(n, d) == Shift::Day)
        {
            violations.push(Violation {
                date: day.date,
                shift: Shift::Day,
                kind: ViolationKind::DayLeaderMissing,
                nurse_id: None,
                difference: -1,
                message: format!(
                    "{} weekend/holiday day shift lacks a designated leader",
                    day.date
                ),
            });
        }

        for &(a, b) in &instance.forbidden_night_pairs {
            if assignment.get(a, d) == Shift::Night && assignment.get(b, d) == Shift::Night {
                violations.push(Violation {
                    date: day.date,
                    shift: Shift::Night,
                    kind: ViolationKind::ForbiddenPairNight,
                    nurse_id: Some(instance.nurses[a].id.clone()),
                    difference: 1,
                    message: format!(
                        "{} nurses {} and {} share the night shift",
                        day.date, instance.nurses[a].id, instance.nurses[b].id
                    ),
                });
            }
        }

        per_day.push(DaySummary {
            date: day.date,
            weekday: day.date.format("%a").to_string(),
            is_weekend: day.is_weekend,
            is_holiday: day.is_holiday,
            requirements: DemandTemplate {
                day_min: day.day_min,
                day_max: day.day_max,
                late: day.late,
                night: day.night,
            },
            filled,
        });
    }

    // Per-nurse counters and rule checks.
    let weekend_days: Vec<usize> = instance
        .demand
        .iter()
        .enumerate()
        .filter(|(_, day)| day.is_weekend_or_holiday())
        .map(|(d, _)| d)
        .collect();

    let mut per_nurse = Vec::with_capacity(nurse_count);
    for (n, nurse) in instance.nurses.iter().enumerate() {
        let rules = &nurse.rules;
        let row = assignment.row(n);

        let mut counts = ShiftCounts::default();
        for &shift in row {
            match shift {
                Shift::Day => counts.day += 1,
                Shift::Late => counts.late += 1,
                Shift::Night => counts.night += 1,
                Shift::Off => counts.off += 1,
            }
        }
        let weekend_work = weekend_days
            .iter()
            .filter(|&&d| row[d].is_work())
            .count() as u32;
        let total_work_days = counts.day + counts.late + counts.night;

        for &(d, shift) in &rules.forbidden {
            if row[d] == shift {
                violations.push(Violation {
                    date: instance.dates[d],
                    shift,
                    kind: ViolationKind::ForbiddenAssigned,
                    nurse_id: Some(nurse.id.clone()),
                    difference: 1,
                    message: format!(
                        "{} {shift} is forbidden for nurse {}",
                        instance.dates[d], nurse.id
                    ),
                });
            }
        }
        for (&d, &shift) in &rules.fixed {
            if row[d] != shift {
                violations.push(Violation {
                    date: instance.dates[d],
                    shift,
                    kind: ViolationKind::FixedViolated,
                    nurse_id: Some(nurse.id.clone()),
                    difference: 1,
                    message: format!(
                        "{} expected fixed {shift} for nurse {}, found {}",
                        instance.dates[d], nurse.id, row[d]
                    ),
                });
            }
        }

        // Night followed by a day or late duty.
        for d in 0..day_count.saturating_sub(1) {
            if row[d] == Shift::Night && matches!(row[d + 1], Shift::Day | Shift::Late) {
                violations.push(Violation {
                    date: instance.dates[d + 1],
                    shift: row[d + 1],
                    kind: ViolationKind::NightAfterNightDay,
                    nurse_id: Some(nurse.id.clone()),
                    difference: 1,
                    message: format!(
                        "{} {} follows a night shift for nurse {}",
                        instance.dates[d + 1],
                        row[d + 1],
                        nurse.id
                    ),
                });
            }
        }

        // Maximal runs of consecutive nights (cap 2) and work days (cap 5).
        for (run_len_cap, kind) in [
            (2usize, ViolationKind::ConsecutiveNight),
            (5usize, ViolationKind::ConsecutiveWork),
        ] {
            let matches_run = |s: Shift| match kind {
                ViolationKind::ConsecutiveNight => s == Shift::Night,
                _ => s.is_work(),
            };
            let mut d = 0;
            while d < day_count {
                if !matches_run(row[d]) {
                    d += 1;
                    continue;
                }
                let start = d;
                while d < day_count && matches_run(row[d]) {
                    d += 1;
                }
                let run = d - start;
                if run > run_len_cap {
                    let anchor = start + run_len_cap;
                    let noun = if kind == ViolationKind::ConsecutiveNight {
                        "consecutive nights"
                    } else {
                        "consecutive work days"
                    };
                    violations.push(Violation {
                        date: instance.dates[anchor],
                        shift: row[anchor],
                        kind,
                        nurse_id: Some(nurse.id.clone()),
                        difference: (run - run_len_cap) as i64,
                        message: format!("nurse {} works {run} {noun}", nurse.id),
                    });
                }
            }
        }

        // Monthly night count range.
        let night_dates: Vec<usize> = (0..day_count).filter(|&d| row[d] == Shift::Night).collect();
        if counts.night > rules.night_max {
            let anchor = night_dates[rules.night_max as usize];
            violations.push(Violation {
                date: instance.dates[anchor],
                shift: Shift::Night,
                kind: ViolationKind::NightCapExceeded,
                nurse_id: Some(nurse.id.clone()),
                difference: counts.night as i64 - rules.night_max as i64,
                message: format!(
                    "nurse {} has {} nights, cap {}",
                    nurse.id, counts.night, rules.night_max
                ),
            });
        } else if counts.night < rules.night_min {
            violations.push(Violation {
                date: instance.dates[day_count - 1],
                shift: Shift::Night,
                kind: ViolationKind::NightCapExceeded,
                nurse_id: Some(nurse.id.clone()),
                difference: counts.night as i64 - rules.night_min as i64,
                message: format!(
                    "nurse {} has {} nights, below minimum {}",
                    nurse.id, counts.night, rules.night_min
                ),
            });
        }

        // Weekly work cap over ISO-week buckets.
        for bucket in &instance.week_buckets {
            let worked: Vec<usize> = bucket.iter().copied().filter(|&d| row[d].is_work()).collect();
            if worked.len() as u32 > rules.weekly_work_max {
                let anchor = worked[rules.weekly_work_max as usize];
                violations.push(Violation {
                    date: instance.dates[anchor],
                    shift: row[anchor],
                    kind: ViolationKind::WeeklyCapExceeded,
                    nurse_id: Some(nurse.id.clone()),
                    difference: worked.len() as i64 - rules.weekly_work_max as i64,
                    message: format!(
                        "nurse {} works {} days in the week of {}, cap {}",
                        nurse.id,
                        worked.len(),
                        instance.dates[bucket[0]],
                        rules.weekly_work_max
                    ),
                });
            }
        }

        // Weekend / holiday cap.
        let weekend_worked: Vec<usize> = weekend_days
            .iter()
            .copied()
            .filter(|&d| row[d].is_work())
            .collect();
        if weekend_worked.len() as u32 > rules.weekend_holiday_max {
            let anchor = weekend_worked[rules.weekend_holiday_max as usize];
            violations.push(Violation {
                date: instance.dates[anchor],
                shift: row[anchor],
                kind: ViolationKind::WeekendCapExceeded,
                nurse_id: Some(nurse.id.clone()),
                difference: weekend_worked.len() as i64 - rules.weekend_holiday_max as i64,
                message: format!(
                    "nurse {} works {} weekend/holiday days, cap {}",
                    nurse.id,
                    weekend_worked.len(),
                    rules.weekend_holiday_max
                ),
            });
        }

        // Monthly rest quota.
        if let Some(off_min) = rules.off_min {
            if counts.off < off_min {
                violations.push(Violation {
                    date: instance.dates[day_count - 1],
                    shift: Shift::Off,
                    kind: ViolationKind::RestQuotaUnmet,
                    nurse_id: Some(nurse.id.clone()),
                    difference: counts.off as i64 - off_min as i64,
                    message: format!(
                        "nurse {} has {} rest days, below quota {}",
                        nurse.id, counts.off, off_min
                    ),
                });
            }
        }

        // Non-violation observations.
        for &d in &rules.requested_off {
            if row[d].is_work() {
                warnings.push(format!(
                    "nurse {} works {} on requested off day {}",
                    nurse.id, row[d], instance.dates[d]
                ));
            }
        }
        if rules.night_min > 0 && counts.night == rules.night_min {
            warnings.push(format!(
                "nurse {} night count sits exactly at its lower bound ({})",
                nurse.id, rules.night_min
            ));
        }
        if (rules.night_max as usize) < day_count && counts.night == rules.night_max {
            warnings.push(format!(
                "nurse {} night count sits exactly at its cap ({})",
                nurse.id, rules.night_max
            ));
        }
        if weekend_work == rules.weekend_holiday_max {
            warnings.push(format!(
                "nurse {} weekend/holiday work has reached its cap ({})",
                nurse.id, rules.weekend_holiday_max
            ));
        }

        per_nurse.push(NurseSummary {
            nurse_id: nurse.id.clone(),
            name: nurse.name.clone(),
            team: nurse.team,
            counts,
            weekend_work,
            total_work_days,
            rule: RuleSummary {
                night_min: rules.night_min,
                night_max: rules.night_max,
                weekly_work_max: rules.weekly_work_max,
                weekend_holiday_max: rules.weekend_holiday_max,
            },
        });
    }

    violations.sort_by(|a, b| {
        (a.date, a.shift, a.kind, &a.nurse_id).cmp(&(b.date, b.shift, b.kind, &b.nurse_id))
    });

    let violation_cells: Vec<ViolationCell> = violations
        .iter()
        .filter(|v| matches!(v.kind, ViolationKind::Shortage | ViolationKind::Excess))
        .map(|v| ViolationCell {
            date: v.date,
            shift: v.shift,
            kind: v.kind,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    AnalysisReport {
        per_day,
        per_nurse,
        violations,
        violation_cells,
        warnings,
    }
}

/// Folds a flat cell list into a dense grid, collecting ingestion problems
/// (unknown nurses, out-of-month dates, duplicate or missing cells) as
/// human-readable strings.
pub fn ingest(cells: &[AssignmentCell], instance: &ProblemInstance) -> (Assignment, Vec<String>) {
    let mut grid = Assignment::new(instance.nurse_count(), instance.day_count());
    let mut problems = Vec::new();
    let mut seen = BTreeSet::new();

    for cell in cells {
        let Some(n) = instance.nurse_index(&cell.nurse_id) else {
            problems.push(format!("unknown nurse id {}", cell.nurse_id));
            continue;
        };
        let Some(d) = instance.day_index(cell.date) else {
            problems.push(format!("date out of month: {}", cell.date));
            continue;
        };
        if !seen.insert((n, d)) {
            problems.push(format!(
                "multiple shifts for nurse {} at {}",
                cell.nurse_id, cell.date
            ));
            continue;
        }
        grid.set(n, d, cell.shift);
    }

    for (n, nurse) in instance.nurses.iter().enumerate() {
        for (d, date) in instance.dates.iter().enumerate() {
            if !seen.contains(&(n, d)) {
                problems.push(format!("nurse {} missing assignment at {}", nurse.id, date));
            }
        }
    }

    (grid, problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ward_of_four, ward_of_four_roster, week_long_ward};

    #[test]
    fn clean_roster_has_no_violations() {
        let instance = ward_of_four();
        let report = analyze(&ward_of_four_roster(), &instance);
        assert!(report.is_clean(), "unexpected: {:?}", report.violations);
        assert!(report.violation_cells.is_empty());
        // Every day fully staffed.
        for day in &report.per_day {
            assert_eq!(day.filled.night, 1);
            assert!(day.filled.day >= 2);
        }
    }

    #[test]
    fn per_nurse_counters_add_up() {
        let instance = ward_of_four();
        let report = analyze(&ward_of_four_roster(), &instance);
        let n1 = &report.per_nurse[0];
        assert_eq!(n1.counts.night, 1);
        assert_eq!(n1.counts.day, 1);
        assert_eq!(n1.counts.off, 1);
        assert_eq!(n1.total_work_days, 2);
        let total_work: u32 = report.per_nurse.iter().map(|n| n.total_work_days).sum();
        // 3 days x (2 day + 1 night) = 9 worked cells in the fixture roster.
        assert_eq!(total_work, 9);
    }

    #[test]
    fn swapped_cell_yields_ordered_shortage_and_excess() {
        let instance = ward_of_four();
        let mut roster = ward_of_four_roster();
        // Move n3 off day duty onto the already-covered night of day 2.
        roster.set(2, 1, Shift::Night);
        let report = analyze(&roster, &instance);

        let demand_violations: Vec<_> = report
            .violations
            .iter()
            .filter(|v| matches!(v.kind, ViolationKind::Shortage | ViolationKind::Excess))
            .collect();
        assert_eq!(demand_violations.len(), 2);
        // DAY sorts before NIGHT on the same date.
        assert_eq!(demand_violations[0].shift, Shift::Day);
        assert_eq!(demand_violations[0].kind, ViolationKind::Shortage);
        assert_eq!(demand_violations[0].difference, -1);
        assert_eq!(demand_violations[1].shift, Shift::Night);
        assert_eq!(demand_violations[1].kind, ViolationKind::Excess);
        assert_eq!(demand_violations[1].difference, 1);
        assert_eq!(report.violation_cells.len(), 2);
    }

    #[test]
    fn detects_night_without_leader() {
        let mut instance = ward_of_four();
        instance.nurses[0].leader_ok = false;
        // Roster has n1 on night duty for day 0; nobody else is on.
        instance.nurses[1].leader_ok = true;
        let mut roster = ward_of_four_roster();
        // Keep only day 0: n1 night with no leader flag.
        let report = analyze(&roster, &instance);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::NightLeaderMissing
                && v.date == instance.dates[0]));

        // Restoring the flag clears it.
        instance.nurses[0].leader_ok = true;
        roster.set(0, 0, Shift::Night);
        let report = analyze(&roster, &instance);
        assert!(!report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::NightLeaderMissing));
    }

    #[test]
    fn empty_night_slot_is_missing_its_leader() {
        let instance = ward_of_four();
        let mut roster = ward_of_four_roster();
        // Nobody works the night of day 0 at all.
        roster.set(0, 0, Shift::Off);
        let report = analyze(&roster, &instance);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::NightLeaderMissing
                && v.date == instance.dates[0]));
    }

    #[test]
    fn weekend_day_duty_needs_a_designated_leader() {
        let mut instance = week_long_ward();
        instance.weekend_day_leaders = vec![0];
        let mut roster = Assignment::new(4, 7);
        // Saturday covered only by a non-designated nurse; Sunday anchored.
        roster.set(1, 5, Shift::Day);
        roster.set(0, 6, Shift::Day);
        let report = analyze(&roster, &instance);
        let hits: Vec<_> = report
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::DayLeaderMissing)
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].date, instance.dates[5]);
        assert_eq!(hits[0].shift, Shift::Day);
    }

    #[test]
    fn detects_day_after_night() {
        let instance = ward_of_four();
        let mut roster = ward_of_four_roster();
        // n1 worked night on day 0; give them day duty on day 1.
        roster.set(0, 1, Shift::Day);
        let report = analyze(&roster, &instance);
        let hit = report
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::NightAfterNightDay)
            .expect("transition violation");
        assert_eq!(hit.date, instance.dates[1]);
        assert_eq!(hit.shift, Shift::Day);
        assert_eq!(hit.nurse_id.as_deref(), Some("n1"));
    }

    #[test]
    fn detects_three_consecutive_nights() {
        let instance = week_long_ward();
        let mut roster = Assignment::new(4, 7);
        for d in 0..3 {
            roster.set(0, d, Shift::Night);
        }
        let report = analyze(&roster, &instance);
        let hit = report
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::ConsecutiveNight)
            .expect("night run violation");
        assert_eq!(hit.date, instance.dates[2]);
        assert_eq!(hit.difference, 1);
    }

    #[test]
    fn detects_six_consecutive_work_days() {
        let instance = week_long_ward();
        let mut roster = Assignment::new(4, 7);
        for d in 0..6 {
            roster.set(1, d, Shift::Day);
        }
        let report = analyze(&roster, &instance);
        let hit = report
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::ConsecutiveWork)
            .expect("work run violation");
        assert_eq!(hit.nurse_id.as_deref(), Some("n2"));
        assert_eq!(hit.date, instance.dates[5]);
    }

    #[test]
    fn detects_weekly_and_night_caps() {
        let mut instance = week_long_ward();
        instance.nurses[0].rules.weekly_work_max = 2;
        instance.nurses[0].rules.night_max = 1;
        let mut roster = Assignment::new(4, 7);
        roster.set(0, 0, Shift::Night);
        roster.set(0, 2, Shift::Night);
        roster.set(0, 4, Shift::Day);
        let report = analyze(&roster, &instance);
        let weekly = report
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::WeeklyCapExceeded)
            .expect("weekly cap violation");
        assert_eq!(weekly.difference, 1);
        assert_eq!(weekly.date, instance.dates[4]);
        let night_cap = report
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::NightCapExceeded)
            .expect("night cap violation");
        assert_eq!(night_cap.date, instance.dates[2]);
    }

    #[test]
    fn night_below_minimum_is_reported() {
        let mut instance = ward_of_four();
        instance.nurses[3].rules.night_min = 1;
        let report = analyze(&ward_of_four_roster(), &instance);
        let hit = report
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::NightCapExceeded)
            .expect("minimum violation");
        assert_eq!(hit.nurse_id.as_deref(), Some("n4"));
        assert_eq!(hit.difference, -1);
    }

    #[test]
    fn requested_off_breach_is_a_warning_not_a_violation() {
        let mut instance = ward_of_four();
        instance.nurses[1].rules.requested_off.insert(0);
        let report = analyze(&ward_of_four_roster(), &instance);
        assert!(report.is_clean());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("n2") && w.contains("requested off")));
    }

    #[test]
    fn forbidden_and_fixed_cells_are_audited() {
        let mut instance = ward_of_four();
        instance.nurses[0].rules.forbidden.insert((0, Shift::Night));
        instance.nurses[1].rules.fixed.insert(0, Shift::Late);
        let report = analyze(&ward_of_four_roster(), &instance);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::ForbiddenAssigned
                && v.nurse_id.as_deref() == Some("n1")));
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::FixedViolated
                && v.nurse_id.as_deref() == Some("n2")));
    }

    #[test]
    fn ingest_flags_unknown_duplicate_and_missing_cells() {
        let instance = ward_of_four();
        let cells = vec![
            AssignmentCell {
                nurse_id: "n1".to_string(),
                date: instance.dates[0],
                shift: Shift::Day,
            },
            AssignmentCell {
                nurse_id: "n1".to_string(),
                date: instance.dates[0],
                shift: Shift::Night,
            },
            AssignmentCell {
                nurse_id: "ghost".to_string(),
                date: instance.dates[0],
                shift: Shift::Day,
            },
        ];
        let (grid, problems) = ingest(&cells, &instance);
        assert_eq!(grid.get(0, 0), Shift::Day);
        assert!(problems.iter().any(|p| p.contains("multiple shifts")));
        assert!(problems.iter().any(|p| p.contains("unknown nurse")));
        // 4 nurses x 3 days minus the one accepted cell.
        assert_eq!(
            problems
                .iter()
                .filter(|p| p.contains("missing assignment"))
                .count(),
            11
        );
    }

    #[test]
    fn full_grid_ingests_without_problems() {
        let instance = ward_of_four();
        let roster = ward_of_four_roster();
        let mut cells = Vec::new();
        for (n, nurse) in instance.nurses.iter().enumerate() {
            for (d, &date) in instance.dates.iter().enumerate() {
                cells.push(AssignmentCell {
                    nurse_id: nurse.id.clone(),
                    date,
                    shift: roster.get(n, d),
                });
            }
        }
        let (grid, problems) = ingest(&cells, &instance);
        assert!(problems.is_empty());
        assert_eq!(grid, roster);
    }
}
