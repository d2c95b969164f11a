//! Demo data generators for the rostering service.
//!
//! Deterministic (seeded) ward setups in two sizes, returned as
//! ready-to-post optimize requests.

use chrono::NaiveDate;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::{DemandTemplate, NurseRecord, Policy, SolverConfig, Team};
use crate::dto::OptimizeRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                year: 2025,
                month: 10,
                // (team, size, leaders among them)
                teams: vec![(Team::A, 4, 2), (Team::B, 4, 2), (Team::Emg, 2, 1)],
                weekday: DemandTemplate {
                    day_min: 3,
                    day_max: 5,
                    late: 1,
                    night: 1,
                },
                weekend: DemandTemplate {
                    day_min: 2,
                    day_max: 4,
                    late: 1,
                    night: 1,
                },
                holidays: vec![],
                requested_off_per_nurse: 2,
            },
            DemoData::Large => DemoDataParameters {
                year: 2025,
                month: 10,
                teams: vec![(Team::A, 10, 3), (Team::B, 10, 3), (Team::Emg, 6, 2)],
                weekday: DemandTemplate {
                    day_min: 6,
                    day_max: 9,
                    late: 2,
                    night: 3,
                },
                weekend: DemandTemplate {
                    day_min: 4,
                    day_max: 6,
                    late: 2,
                    night: 3,
                },
                holidays: vec![13],
                requested_off_per_nurse: 3,
            },
        }
    }
}

struct DemoDataParameters {
    year: i32,
    month: u32,
    teams: Vec<(Team, usize, usize)>,
    weekday: DemandTemplate,
    weekend: DemandTemplate,
    holidays: Vec<u32>,
    requested_off_per_nurse: usize,
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

/// Generates a demo optimize request for the given size.
pub fn generate(demo: DemoData) -> OptimizeRequest {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    let names = generate_name_permutations(&mut rng);
    let mut name_iter = names.into_iter().cycle();

    let days: Vec<u32> = (1..=31).collect();
    let mut nurses = Vec::new();
    for (team, size, leaders) in &params.teams {
        let prefix = match team {
            Team::A => "a",
            Team::B => "b",
            Team::Emg => "e",
        };
        for i in 0..*size {
            let mut record = NurseRecord::new(format!("{prefix}{}", i + 1), *team)
                .with_name(name_iter.next().expect("name pool is cyclic"))
                .with_leader_ok(i < *leaders);
            record.rules.requested_off = days
                .choose_multiple(&mut rng, params.requested_off_per_nurse)
                .filter_map(|&d| NaiveDate::from_ymd_opt(params.year, params.month, d))
                .collect();
            nurses.push(record);
        }
    }

    let mut policy = Policy::default();
    policy.demand_defaults.weekday = params.weekday;
    policy.demand_defaults.saturday_holiday = params.weekend;
    policy.demand_defaults.sunday = params.weekend;
    for day in &params.holidays {
        if let Some(date) = NaiveDate::from_ymd_opt(params.year, params.month, *day) {
            policy.holidays.insert(date);
        }
    }
    // The senior A/B leaders anchor weekend and holiday day duty.
    for id in ["a1", "a2", "b1", "b2"] {
        policy.weekend_day_leaders.insert(id.to_string());
    }

    OptimizeRequest {
        year: params.year,
        month: params.month,
        alternatives: 1,
        nurses,
        policy,
        solver: SolverConfig::default(),
    }
}

const FIRST_NAMES: &[&str] = &[
    "Amy", "Beth", "Carl", "Dan", "Elsa", "Flo", "Gus", "Hugo", "Ivy", "Jay",
];
const LAST_NAMES: &[&str] = &[
    "Cole", "Fox", "Green", "Jones", "King", "Li", "Poe", "Rye", "Smith", "Watt",
];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    #[test]
    fn test_generate_small() {
        let request = generate(DemoData::Small);
        assert_eq!(request.nurses.len(), 10);
        assert_eq!(request.year, 2025);
        // Demo payloads must compile cleanly.
        let instance =
            compile::compile(request.year, request.month, &request.nurses, &request.policy)
                .expect("demo data compiles");
        assert_eq!(instance.day_count(), 31);
        assert_eq!(instance.total_night_demand(), 31);
        // All four designated weekend anchors resolve to ward positions.
        assert_eq!(instance.weekend_day_leaders.len(), 4);
    }

    #[test]
    fn test_generate_large() {
        let request = generate(DemoData::Large);
        assert_eq!(request.nurses.len(), 26);
        let leaders = request.nurses.iter().filter(|n| n.leader_ok).count();
        assert_eq!(leaders, 8);
        let instance =
            compile::compile(request.year, request.month, &request.nurses, &request.policy)
                .expect("demo data compiles");
        // One flagged holiday on a Monday.
        assert!(instance.demand.iter().any(|d| d.is_holiday && !d.is_weekend));
        assert_eq!(instance.total_night_demand(), 31 * 3);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = serde_json::to_string(&generate(DemoData::Large)).unwrap();
        let b = serde_json::to_string(&generate(DemoData::Large)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_team_is_represented() {
        let request = generate(DemoData::Small);
        for team in [Team::A, Team::B, Team::Emg] {
            assert!(request.nurses.iter().any(|n| n.team == team));
        }
    }

    #[test]
    fn test_demo_data_from_str() {
        assert_eq!("SMALL".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("large".parse::<DemoData>(), Ok(DemoData::Large));
        assert!("invalid".parse::<DemoData>().is_err());
    }
}
