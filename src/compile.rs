//! Rule compiler: raw caller records in, immutable [`ProblemInstance`] out.
//!
//! All defaults are resolved here, dates are expanded from `(year, month)`
//! on the proleptic Gregorian calendar, and malformed input is rejected
//! with a structured [`CompileError`] before any model is built.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::domain::{
    AssignmentCell, DayDemand, DemandTemplate, Nurse, NurseRecord, NurseRules, Policy,
    ProblemInstance, Shift,
};

/// Structured rejection reasons for bad rostering input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("duplicate nurse id `{id}`")]
    DuplicateNurseId { id: String },
    #[error("no such calendar month: {year}-{month:02}")]
    BadDateRange { year: i32, month: u32 },
    #[error("infeasible bounds for nurse `{nurse_id}`: {detail}")]
    InfeasibleBounds { nurse_id: String, detail: String },
    #[error("infeasible demand on {date}: {detail}")]
    InfeasibleDemand { date: NaiveDate, detail: String },
    #[error("nurse `{nurse_id}` has {date} {shift} both fixed and forbidden")]
    ConflictingFixed {
        nurse_id: String,
        date: NaiveDate,
        shift: Shift,
    },
    #[error("date {date} does not fall in the planning month")]
    DateOutOfMonth { date: NaiveDate },
    #[error("unknown nurse id `{id}`")]
    UnknownNurse { id: String },
}

impl CompileError {
    /// Stable machine-readable tag for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::DuplicateNurseId { .. } => "duplicate_nurse_id",
            CompileError::BadDateRange { .. } => "bad_date_range",
            CompileError::InfeasibleBounds { .. } => "infeasible_bounds",
            CompileError::InfeasibleDemand { .. } => "infeasible_demand",
            CompileError::ConflictingFixed { .. } => "conflicting_fixed",
            CompileError::DateOutOfMonth { .. } => "date_out_of_month",
            CompileError::UnknownNurse { .. } => "unknown_nurse",
        }
    }
}

/// Expands the planning month into its ordered date list.
pub fn month_dates(year: i32, month: u32) -> Result<Vec<NaiveDate>, CompileError> {
    if !(2000..=2100).contains(&year) || !(1..=12).contains(&month) {
        return Err(CompileError::BadDateRange { year, month });
    }
    let first =
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(CompileError::BadDateRange { year, month })?;
    let mut dates = Vec::with_capacity(31);
    let mut cursor = first;
    while cursor.month() == month {
        dates.push(cursor);
        match cursor.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    Ok(dates)
}

/// Resolves the demand numbers for one date: explicit override first, then
/// holiday, Sunday, Saturday, weekday templates.
fn demand_for_day(policy: &Policy, date: NaiveDate) -> DemandTemplate {
    if let Some(overridden) = policy.demand_overrides.get(&date) {
        return *overridden;
    }
    let weekday = date.weekday().num_days_from_monday();
    if policy.holidays.contains(&date) {
        policy.demand_defaults.saturday_holiday
    } else if weekday == 6 {
        policy.demand_defaults.sunday
    } else if weekday == 5 {
        policy.demand_defaults.saturday_holiday
    } else {
        policy.demand_defaults.weekday
    }
}

/// Groups day offsets into ISO-week buckets (Monday start), clipped at the
/// month boundaries.
fn week_buckets(dates: &[NaiveDate]) -> Vec<Vec<usize>> {
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut current_key: Option<(i32, u32)> = None;
    for (offset, date) in dates.iter().enumerate() {
        let iso = date.iso_week();
        let key = (iso.year(), iso.week());
        if current_key != Some(key) {
            buckets.push(Vec::new());
            current_key = Some(key);
        }
        buckets
            .last_mut()
            .expect("bucket pushed above")
            .push(offset);
    }
    buckets
}

/// Compiles raw records into a [`ProblemInstance`], or rejects them.
pub fn compile(
    year: i32,
    month: u32,
    nurses: &[NurseRecord],
    policy: &Policy,
) -> Result<ProblemInstance, CompileError> {
    let dates = month_dates(year, month)?;
    let day_count = dates.len() as u32;
    let day_index: BTreeMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

    let mut seen_ids = HashSet::new();
    for record in nurses {
        if !seen_ids.insert(record.id.as_str()) {
            return Err(CompileError::DuplicateNurseId {
                id: record.id.clone(),
            });
        }
    }

    let demand: Vec<DayDemand> = dates
        .iter()
        .map(|&date| {
            let template = demand_for_day(policy, date);
            let weekday = date.weekday().num_days_from_monday() as u8;
            DayDemand {
                date,
                day_min: template.day_min,
                day_max: template.day_max,
                late: template.late,
                night: template.night,
                weekday,
                is_weekend: weekday >= 5,
                is_holiday: policy.holidays.contains(&date),
            }
        })
        .collect();

    for day in &demand {
        if day.day_min > day.day_max {
            return Err(CompileError::InfeasibleDemand {
                date: day.date,
                detail: format!("day_min {} exceeds day_max {}", day.day_min, day.day_max),
            });
        }
    }
    for date in policy.demand_overrides.keys() {
        if !day_index.contains_key(date) {
            return Err(CompileError::DateOutOfMonth { date: *date });
        }
    }

    let resolve_day = |date: NaiveDate| -> Result<usize, CompileError> {
        day_index
            .get(&date)
            .copied()
            .ok_or(CompileError::DateOutOfMonth { date })
    };

    let defaults = &policy.rule_defaults;
    let mut compiled = Vec::with_capacity(nurses.len());
    for record in nurses {
        let night_min = record.rules.night_min.unwrap_or(defaults.night_min);
        let night_max = record
            .rules
            .night_max
            .or(defaults.night_max)
            .unwrap_or(day_count);
        let weekly_work_max = record
            .rules
            .weekly_work_max
            .unwrap_or(defaults.weekly_work_max);
        let weekend_holiday_max = record
            .rules
            .weekend_holiday_max
            .unwrap_or(defaults.weekend_holiday_max);
        let off_min = record.rules.off_min.or(defaults.off_min);

        if night_min > night_max {
            return Err(CompileError::InfeasibleBounds {
                nurse_id: record.id.clone(),
                detail: format!("night_min {night_min} exceeds night_max {night_max}"),
            });
        }
        if night_max > day_count {
            return Err(CompileError::InfeasibleBounds {
                nurse_id: record.id.clone(),
                detail: format!("night_max {night_max} exceeds the {day_count} days of the month"),
            });
        }
        if !(1..=7).contains(&weekly_work_max) {
            return Err(CompileError::InfeasibleBounds {
                nurse_id: record.id.clone(),
                detail: format!("weekly_work_max {weekly_work_max} outside 1..=7"),
            });
        }

        let mut requested_off = BTreeSet::new();
        for &date in &record.rules.requested_off {
            requested_off.insert(resolve_day(date)?);
        }

        let mut forbidden = BTreeSet::new();
        for cell in &record.rules.forbidden_shifts {
            forbidden.insert((resolve_day(cell.date)?, cell.shift));
        }
        // Capability flags expand into month-wide forbidden entries.
        for (allowed, shift) in [
            (record.day_ok, Shift::Day),
            (record.late_ok, Shift::Late),
            (record.night_ok, Shift::Night),
        ] {
            if !allowed {
                for offset in 0..dates.len() {
                    forbidden.insert((offset, shift));
                }
            }
        }

        let mut fixed = BTreeMap::new();
        for cell in &record.rules.fixed_shifts {
            let offset = resolve_day(cell.date)?;
            match fixed.insert(offset, cell.shift) {
                Some(previous) if previous != cell.shift => {
                    return Err(CompileError::ConflictingFixed {
                        nurse_id: record.id.clone(),
                        date: cell.date,
                        shift: cell.shift,
                    });
                }
                _ => {}
            }
        }
        for (&offset, &shift) in &fixed {
            if forbidden.contains(&(offset, shift)) {
                return Err(CompileError::ConflictingFixed {
                    nurse_id: record.id.clone(),
                    date: dates[offset],
                    shift,
                });
            }
        }

        compiled.push(Nurse {
            id: record.id.clone(),
            name: record.name.clone(),
            team: record.team,
            leader_ok: record.leader_ok,
            rules: NurseRules {
                night_min,
                night_max,
                weekly_work_max,
                weekend_holiday_max,
                off_min,
                requested_off,
                forbidden,
                fixed,
            },
        });
    }

    let mut forbidden_night_pairs = Vec::new();
    for (left, right) in &policy.forbidden_night_pairs {
        let a = compiled
            .iter()
            .position(|n| &n.id == left)
            .ok_or_else(|| CompileError::UnknownNurse { id: left.clone() })?;
        let b = compiled
            .iter()
            .position(|n| &n.id == right)
            .ok_or_else(|| CompileError::UnknownNurse { id: right.clone() })?;
        forbidden_night_pairs.push((a, b));
    }

    let mut weekend_day_leaders = Vec::new();
    for id in &policy.weekend_day_leaders {
        let n = compiled
            .iter()
            .position(|nurse| &nurse.id == id)
            .ok_or_else(|| CompileError::UnknownNurse { id: id.clone() })?;
        weekend_day_leaders.push(n);
    }

    Ok(ProblemInstance {
        year,
        month,
        dates: dates.clone(),
        nurses: compiled,
        demand,
        week_buckets: week_buckets(&dates),
        forbidden_night_pairs,
        weekend_day_leaders,
    })
}

/// Returns a copy of the instance with the given cells pinned as fixed
/// shifts, rejecting pins that reference unknown cells or contradict a
/// forbidden entry.
pub fn apply_pins(
    instance: &ProblemInstance,
    pins: &[AssignmentCell],
) -> Result<ProblemInstance, CompileError> {
    let mut pinned = instance.clone();
    for pin in pins {
        let nurse = pinned
            .nurse_index(&pin.nurse_id)
            .ok_or_else(|| CompileError::UnknownNurse {
                id: pin.nurse_id.clone(),
            })?;
        let day = pinned
            .day_index(pin.date)
            .ok_or(CompileError::DateOutOfMonth { date: pin.date })?;
        let rules = &mut pinned.nurses[nurse].rules;
        if rules.forbidden.contains(&(day, pin.shift)) {
            return Err(CompileError::ConflictingFixed {
                nurse_id: pin.nurse_id.clone(),
                date: pin.date,
                shift: pin.shift,
            });
        }
        match rules.fixed.insert(day, pin.shift) {
            Some(previous) if previous != pin.shift => {
                return Err(CompileError::ConflictingFixed {
                    nurse_id: pin.nurse_id.clone(),
                    date: pin.date,
                    shift: pin.shift,
                });
            }
            _ => {}
        }
    }
    Ok(pinned)
}
