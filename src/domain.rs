//! Domain model for monthly nurse rostering.
//!
//! The raw input records (`NurseRecord`, `Policy`) are what callers send;
//! the rule compiler normalizes them into an immutable [`ProblemInstance`]
//! with every default resolved. Solutions carry a dense assignment grid
//! indexed by nurse position and day offset.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One duty slot. `Off` is the only value consistent with "not working".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shift {
    Day,
    Late,
    Night,
    Off,
}

impl Shift {
    /// All shifts, in enum order.
    pub const ALL: [Shift; 4] = [Shift::Day, Shift::Late, Shift::Night, Shift::Off];

    /// The working shifts (everything except `Off`).
    pub const WORK: [Shift; 3] = [Shift::Day, Shift::Late, Shift::Night];

    /// Position of this shift in [`Shift::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn is_work(self) -> bool {
        self != Shift::Off
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Day => "DAY",
            Shift::Late => "LATE",
            Shift::Night => "NIGHT",
            Shift::Off => "OFF",
        }
    }
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ward team tag. Every nurse belongs to exactly one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Team {
    A,
    B,
    Emg,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Team::A => "A",
            Team::B => "B",
            Team::Emg => "EMG",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (date, shift) cell reference used by forbidden/fixed rule entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedShift {
    pub date: NaiveDate,
    pub shift: Shift,
}

/// Per-nurse rule overrides as supplied by the caller. Missing fields
/// inherit from the policy-level [`RuleDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleOverride {
    pub night_min: Option<u32>,
    pub night_max: Option<u32>,
    pub weekly_work_max: Option<u32>,
    pub weekend_holiday_max: Option<u32>,
    pub off_min: Option<u32>,
    pub requested_off: Vec<NaiveDate>,
    pub forbidden_shifts: Vec<DatedShift>,
    pub fixed_shifts: Vec<DatedShift>,
}

/// A nurse as supplied by the caller, before rule resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NurseRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub team: Team,
    #[serde(default)]
    pub leader_ok: bool,
    #[serde(default = "default_true")]
    pub day_ok: bool,
    #[serde(default = "default_true")]
    pub late_ok: bool,
    #[serde(default = "default_true")]
    pub night_ok: bool,
    #[serde(default)]
    pub rules: RuleOverride,
}

fn default_true() -> bool {
    true
}

impl NurseRecord {
    pub fn new(id: impl Into<String>, team: Team) -> Self {
        Self {
            id: id.into(),
            name: None,
            team,
            leader_ok: false,
            day_ok: true,
            late_ok: true,
            night_ok: true,
            rules: RuleOverride::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_leader_ok(mut self, leader_ok: bool) -> Self {
        self.leader_ok = leader_ok;
        self
    }

    pub fn with_rules(mut self, rules: RuleOverride) -> Self {
        self.rules = rules;
        self
    }
}

/// Policy-level defaults a nurse inherits when an override field is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleDefaults {
    pub night_min: u32,
    /// `None` means "as many as the month allows".
    pub night_max: Option<u32>,
    pub weekly_work_max: u32,
    pub weekend_holiday_max: u32,
    pub off_min: Option<u32>,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            night_min: 0,
            night_max: None,
            weekly_work_max: 5,
            weekend_holiday_max: 4,
            off_min: None,
        }
    }
}

/// Demand numbers for one day class (or one explicit date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DemandTemplate {
    pub day_min: u32,
    pub day_max: u32,
    pub late: u32,
    pub night: u32,
}

impl Default for DemandTemplate {
    fn default() -> Self {
        Self {
            day_min: 0,
            day_max: 9999,
            late: 0,
            night: 0,
        }
    }
}

/// Demand templates keyed by day class. Resolution order for a date:
/// explicit override, holiday, Sunday, Saturday, weekday.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DemandDefaults {
    pub weekday: DemandTemplate,
    pub saturday_holiday: DemandTemplate,
    pub sunday: DemandTemplate,
}

/// Global policy block: rule defaults, demand table, holiday set and
/// ward-level pairing restrictions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    pub rule_defaults: RuleDefaults,
    pub demand_defaults: DemandDefaults,
    pub demand_overrides: BTreeMap<NaiveDate, DemandTemplate>,
    pub holidays: BTreeSet<NaiveDate>,
    /// Pairs of nurses that must never share a NIGHT on the same date.
    pub forbidden_night_pairs: Vec<(String, String)>,
    /// Nurses who may anchor weekend/holiday day duty. When any are named,
    /// every weekend or holiday date needs at least one of them on DAY.
    pub weekend_day_leaders: BTreeSet<String>,
}

/// Fully resolved per-nurse rules. Date references are day offsets into
/// `ProblemInstance::dates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NurseRules {
    pub night_min: u32,
    pub night_max: u32,
    pub weekly_work_max: u32,
    pub weekend_holiday_max: u32,
    pub off_min: Option<u32>,
    pub requested_off: BTreeSet<usize>,
    pub forbidden: BTreeSet<(usize, Shift)>,
    pub fixed: BTreeMap<usize, Shift>,
}

/// A nurse after compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Nurse {
    pub id: String,
    pub name: Option<String>,
    pub team: Team,
    pub leader_ok: bool,
    pub rules: NurseRules,
}

/// Resolved demand and calendar flags for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayDemand {
    pub date: NaiveDate,
    pub day_min: u32,
    pub day_max: u32,
    pub late: u32,
    pub night: u32,
    /// ISO weekday index, Monday = 0.
    pub weekday: u8,
    pub is_weekend: bool,
    pub is_holiday: bool,
}

impl DayDemand {
    #[inline]
    pub fn is_weekend_or_holiday(&self) -> bool {
        self.is_weekend || self.is_holiday
    }
}

/// An immutable, fully resolved rostering problem. Produced by the rule
/// compiler, consumed by the model builder, analyzer and recommender.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemInstance {
    pub year: i32,
    pub month: u32,
    pub dates: Vec<NaiveDate>,
    pub nurses: Vec<Nurse>,
    pub demand: Vec<DayDemand>,
    /// ISO-week buckets clipped at month boundaries; each bucket lists day
    /// offsets in ascending order.
    pub week_buckets: Vec<Vec<usize>>,
    /// Nurse position pairs that must never share a NIGHT.
    pub forbidden_night_pairs: Vec<(usize, usize)>,
    /// Positions of the designated weekend/holiday day-duty anchors.
    pub weekend_day_leaders: Vec<usize>,
}

impl ProblemInstance {
    #[inline]
    pub fn nurse_count(&self) -> usize {
        self.nurses.len()
    }

    #[inline]
    pub fn day_count(&self) -> usize {
        self.dates.len()
    }

    /// Position of a nurse id, if present.
    pub fn nurse_index(&self, id: &str) -> Option<usize> {
        self.nurses.iter().position(|n| n.id == id)
    }

    /// Day offset of a date, if it falls inside the month.
    pub fn day_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.iter().position(|d| *d == date)
    }

    pub fn total_night_demand(&self) -> u32 {
        self.demand.iter().map(|d| d.night).sum()
    }
}

/// A total `(nurse, date) -> Shift` function, stored densely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    grid: Vec<Vec<Shift>>,
}

impl Assignment {
    /// An all-OFF grid of the given dimensions.
    pub fn new(nurse_count: usize, day_count: usize) -> Self {
        Self {
            grid: vec![vec![Shift::Off; day_count]; nurse_count],
        }
    }

    #[inline]
    pub fn get(&self, nurse: usize, day: usize) -> Shift {
        self.grid[nurse][day]
    }

    #[inline]
    pub fn set(&mut self, nurse: usize, day: usize, shift: Shift) {
        self.grid[nurse][day] = shift;
    }

    #[inline]
    pub fn nurse_count(&self) -> usize {
        self.grid.len()
    }

    #[inline]
    pub fn day_count(&self) -> usize {
        self.grid.first().map_or(0, Vec::len)
    }

    /// Row of one nurse across the month.
    pub fn row(&self, nurse: usize) -> &[Shift] {
        &self.grid[nurse]
    }

    /// Flattens the grid into wire-format cells, nurse-major.
    pub fn to_cells(&self, instance: &ProblemInstance) -> Vec<AssignmentCell> {
        let mut cells = Vec::with_capacity(self.nurse_count() * self.day_count());
        for (n, nurse) in instance.nurses.iter().enumerate() {
            for (d, &date) in instance.dates.iter().enumerate() {
                cells.push(AssignmentCell {
                    nurse_id: nurse.id.clone(),
                    date,
                    shift: self.get(n, d),
                });
            }
        }
        cells
    }

    /// Number of cells on which the two grids disagree.
    pub fn hamming_distance(&self, other: &Assignment) -> usize {
        self.grid
            .iter()
            .zip(&other.grid)
            .map(|(a, b)| a.iter().zip(b).filter(|(x, y)| x != y).count())
            .sum()
    }
}

/// A single flat assignment cell as exchanged over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCell {
    pub nurse_id: String,
    pub date: NaiveDate,
    pub shift: Shift,
}

/// An assignment together with its objective value and stable plan id.
#[derive(Debug, Clone)]
pub struct Solution {
    pub plan_id: String,
    pub assignment: Assignment,
    pub objective: f64,
}

/// Soft-objective weights, sorted by descending priority in the default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectiveWeights {
    pub fair_night: f64,
    pub fair_weekend: f64,
    pub pattern: f64,
    pub req_off: f64,
    pub slack: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            fair_night: 10.0,
            fair_weekend: 5.0,
            pattern: 3.0,
            req_off: 1.0,
            slack: 10_000.0,
        }
    }
}

/// Immutable solve configuration, threaded through every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    pub weights: ObjectiveWeights,
    /// Wall-clock budget for a single solve.
    pub solve_budget_ms: u64,
    /// Combined budget for the whole enumeration loop.
    pub total_budget_ms: u64,
    /// Relative objective band for alternative plans.
    pub epsilon: f64,
    /// Lower bound on the Hamming diversity radius.
    pub delta_floor: usize,
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            weights: ObjectiveWeights::default(),
            solve_budget_ms: 30_000,
            total_budget_ms: 60_000,
            epsilon: 0.15,
            delta_floor: 3,
            seed: 1,
        }
    }
}

impl SolverConfig {
    #[inline]
    pub fn solve_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.solve_budget_ms)
    }

    #[inline]
    pub fn total_budget(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.total_budget_ms)
    }

    /// Minimum Hamming distance between any two emitted plans.
    pub fn hamming_delta(&self, instance: &ProblemInstance) -> usize {
        let cells = instance.nurse_count() * instance.day_count();
        let scaled = (0.05 * cells as f64).ceil() as usize;
        scaled.max(self.delta_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_enum_order_matches_wire_order() {
        assert!(Shift::Day < Shift::Late);
        assert!(Shift::Late < Shift::Night);
        assert!(Shift::Night < Shift::Off);
        assert_eq!(Shift::Day.index(), 0);
        assert_eq!(Shift::Off.index(), 3);
    }

    #[test]
    fn shift_serde_uses_screaming_names() {
        assert_eq!(serde_json::to_string(&Shift::Night).unwrap(), "\"NIGHT\"");
        assert_eq!(
            serde_json::from_str::<Shift>("\"OFF\"").unwrap(),
            Shift::Off
        );
        assert_eq!(serde_json::to_string(&Team::Emg).unwrap(), "\"EMG\"");
    }

    #[test]
    fn hamming_distance_counts_differing_cells() {
        let mut a = Assignment::new(2, 3);
        let b = Assignment::new(2, 3);
        assert_eq!(a.hamming_distance(&b), 0);
        a.set(0, 0, Shift::Day);
        a.set(1, 2, Shift::Night);
        assert_eq!(a.hamming_distance(&b), 2);
    }

    #[test]
    fn default_weights_rank_night_fairness_highest() {
        let w = ObjectiveWeights::default();
        assert!(w.fair_night > w.fair_weekend);
        assert!(w.fair_weekend > w.pattern);
        assert!(w.pattern > w.req_off);
        assert!(w.slack > w.fair_night);
    }

    #[test]
    fn hamming_delta_has_floor_of_three() {
        let cfg = SolverConfig::default();
        // 4 nurses x 3 days = 12 cells, 5% of that rounds up to 1.
        let instance = tiny(4, 3);
        assert_eq!(cfg.hamming_delta(&instance), 3);
        let instance = tiny(30, 31);
        assert_eq!(cfg.hamming_delta(&instance), 47);
    }

    fn tiny(nurses: usize, days: usize) -> ProblemInstance {
        let dates: Vec<NaiveDate> = (1..=days as u32)
            .map(|d| NaiveDate::from_ymd_opt(2025, 10, d).unwrap())
            .collect();
        let demand = dates
            .iter()
            .map(|&date| DayDemand {
                date,
                day_min: 0,
                day_max: 9999,
                late: 0,
                night: 0,
                weekday: 0,
                is_weekend: false,
                is_holiday: false,
            })
            .collect();
        ProblemInstance {
            year: 2025,
            month: 10,
            dates,
            nurses: (0..nurses)
                .map(|i| Nurse {
                    id: format!("n{i}"),
                    name: None,
                    team: Team::A,
                    leader_ok: true,
                    rules: NurseRules {
                        night_min: 0,
                        night_max: days as u32,
                        weekly_work_max: 5,
                        weekend_holiday_max: 4,
                        off_min: None,
                        requested_off: BTreeSet::new(),
                        forbidden: BTreeSet::new(),
                        fixed: BTreeMap::new(),
                    },
                })
                .collect(),
            demand,
            week_buckets: Vec::new(),
            forbidden_night_pairs: Vec::new(),
            weekend_day_leaders: Vec::new(),
        }
    }
}
