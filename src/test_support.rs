//! Shared fixtures for unit tests: small hand-built instances with known
//! feasible rosters.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{
    Assignment, DayDemand, Nurse, NurseRules, ProblemInstance, Shift, Team,
};

fn nurse(id: &str, team: Team, leader_ok: bool, days: u32) -> Nurse {
    Nurse {
        id: id.to_string(),
        name: None,
        team,
        leader_ok,
        rules: NurseRules {
            night_min: 0,
            night_max: days,
            weekly_work_max: 5,
            weekend_holiday_max: 4,
            off_min: None,
            requested_off: BTreeSet::new(),
            forbidden: BTreeSet::new(),
            fixed: BTreeMap::new(),
        },
    }
}

fn day(date: NaiveDate, day_min: u32, day_max: u32, late: u32, night: u32) -> DayDemand {
    let weekday = chrono::Datelike::weekday(&date).num_days_from_monday() as u8;
    DayDemand {
        date,
        day_min,
        day_max,
        late,
        night,
        weekday,
        is_weekend: weekday >= 5,
        is_holiday: false,
    }
}

/// Four leaders (two per team) over Mon-Wed 2025-10-06..08; each day wants
/// 2-3 on day duty and exactly one night.
pub(crate) fn ward_of_four() -> ProblemInstance {
    let dates: Vec<NaiveDate> = (6..=8)
        .map(|d| NaiveDate::from_ymd_opt(2025, 10, d).unwrap())
        .collect();
    let demand = dates.iter().map(|&d| day(d, 2, 3, 0, 1)).collect();
    ProblemInstance {
        year: 2025,
        month: 10,
        dates,
        nurses: vec![
            nurse("n1", Team::A, true, 3),
            nurse("n2", Team::A, true, 3),
            nurse("n3", Team::B, true, 3),
            nurse("n4", Team::B, true, 3),
        ],
        demand,
        week_buckets: vec![vec![0, 1, 2]],
        forbidden_night_pairs: Vec::new(),
        weekend_day_leaders: Vec::new(),
    }
}

/// A violation-free roster for [`ward_of_four`].
pub(crate) fn ward_of_four_roster() -> Assignment {
    let rows = [
        [Shift::Night, Shift::Off, Shift::Day],
        [Shift::Day, Shift::Night, Shift::Off],
        [Shift::Day, Shift::Day, Shift::Night],
        [Shift::Off, Shift::Day, Shift::Day],
    ];
    let mut assignment = Assignment::new(4, 3);
    for (n, row) in rows.iter().enumerate() {
        for (d, &shift) in row.iter().enumerate() {
            assignment.set(n, d, shift);
        }
    }
    assignment
}

/// Four nurses over a full ISO week (Mon-Sun 2025-10-06..12) with loose
/// demand, for run-length and cap checks.
pub(crate) fn week_long_ward() -> ProblemInstance {
    let dates: Vec<NaiveDate> = (6..=12)
        .map(|d| NaiveDate::from_ymd_opt(2025, 10, d).unwrap())
        .collect();
    let demand = dates.iter().map(|&d| day(d, 0, 9999, 0, 0)).collect();
    let mut nurses: Vec<Nurse> = ["n1", "n2", "n3", "n4"]
        .iter()
        .map(|id| nurse(id, Team::A, true, 7))
        .collect();
    for n in &mut nurses {
        n.rules.weekly_work_max = 7;
        n.rules.night_max = 7;
    }
    ProblemInstance {
        year: 2025,
        month: 10,
        dates,
        nurses,
        demand,
        week_buckets: vec![vec![0, 1, 2, 3, 4, 5, 6]],
        forbidden_night_pairs: Vec::new(),
        weekend_day_leaders: Vec::new(),
    }
}
