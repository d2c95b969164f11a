//! MILP model builder.
//!
//! Translates a [`ProblemInstance`] into a 0/1 model over `x[n][d][s]`
//! assignment variables: hard rows for staffing demand, rest rules and
//! cell locks, plus a weighted linear objective for the soft goals. The
//! same builder produces the slack relaxation used for infeasibility
//! diagnosis, where demand rows and per-nurse caps receive penalized
//! non-negative slack variables.

use good_lp::{variable, variables, Constraint, Expression, ProblemVariables, Variable};

use crate::domain::{ObjectiveWeights, ProblemInstance, Shift, Team};

/// Number of values in the [`Shift`] enum.
pub const SHIFT_COUNT: usize = 4;

/// A built model, ready to be handed to a backend.
pub struct RosterModel {
    pub vars: ProblemVariables,
    /// Boolean assignment variables indexed `[nurse][day][shift]`.
    pub x: Vec<Vec<[Variable; SHIFT_COUNT]>>,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
    /// Number of elastic slack columns (zero outside slack mode).
    pub slack_count: usize,
}

/// Builds the roster model. With `with_slack` the demand rows (day range,
/// late exact, night exact) and the per-nurse count caps become elastic,
/// each slack weighted by `weights.slack` in the objective.
pub fn build(
    instance: &ProblemInstance,
    weights: &ObjectiveWeights,
    with_slack: bool,
) -> RosterModel {
    let nurse_count = instance.nurse_count();
    let day_count = instance.day_count();

    let mut vars = variables!();
    let x: Vec<Vec<[Variable; SHIFT_COUNT]>> = (0..nurse_count)
        .map(|_| {
            (0..day_count)
                .map(|_| {
                    [
                        vars.add(variable().binary()),
                        vars.add(variable().binary()),
                        vars.add(variable().binary()),
                        vars.add(variable().binary()),
                    ]
                })
                .collect()
        })
        .collect();

    let mut constraints: Vec<Constraint> = Vec::new();
    let mut objective = Expression::from(0.0);

    let cell = |n: usize, d: usize, s: Shift| x[n][d][s.index()];
    let mut slack_count = 0usize;
    let mut slack = |vars: &mut ProblemVariables, objective: &mut Expression| -> Variable {
        let s = vars.add(variable().min(0.0));
        *objective += weights.slack * s;
        slack_count += 1;
        s
    };

    // Exactly one shift per nurse per day.
    for n in 0..nurse_count {
        for d in 0..day_count {
            let total = cell(n, d, Shift::Day)
                + cell(n, d, Shift::Late)
                + cell(n, d, Shift::Night)
                + cell(n, d, Shift::Off);
            constraints.push(total.eq(1.0));
        }
    }

    // Per-day staffing demand.
    for (d, day) in instance.demand.iter().enumerate() {
        let day_sum = (0..nurse_count).fold(Expression::from(0.0), |acc, n| {
            acc + cell(n, d, Shift::Day)
        });
        let late_sum = (0..nurse_count).fold(Expression::from(0.0), |acc, n| {
            acc + cell(n, d, Shift::Late)
        });
        let night_sum = (0..nurse_count).fold(Expression::from(0.0), |acc, n| {
            acc + cell(n, d, Shift::Night)
        });

        if with_slack {
            let short = slack(&mut vars, &mut objective);
            let over = slack(&mut vars, &mut objective);
            constraints.push((day_sum.clone() + short).geq(day.day_min as f64));
            constraints.push((day_sum - over).leq(day.day_max as f64));
            let late_short = slack(&mut vars, &mut objective);
            let late_over = slack(&mut vars, &mut objective);
            constraints.push((late_sum + late_short - late_over).eq(day.late as f64));
            let night_short = slack(&mut vars, &mut objective);
            let night_over = slack(&mut vars, &mut objective);
            constraints.push((night_sum + night_short - night_over).eq(day.night as f64));
        } else {
            constraints.push(day_sum.clone().geq(day.day_min as f64));
            constraints.push(day_sum.leq(day.day_max as f64));
            constraints.push(late_sum.eq(day.late as f64));
            constraints.push(night_sum.eq(day.night as f64));
        }

        // Every night shift is led, whatever the demanded depth.
        let leaders = instance
            .nurses
            .iter()
            .enumerate()
            .filter(|(_, nurse)| nurse.leader_ok)
            .fold(Expression::from(0.0), |acc, (n, _)| {
                acc + cell(n, d, Shift::Night)
            });
        constraints.push(leaders.geq(1.0));

        // Team composition, keyed on demanded depth.
        if day.night >= 2 {
            for team in [Team::A, Team::B] {
                let members = instance
                    .nurses
                    .iter()
                    .enumerate()
                    .filter(|(_, nurse)| nurse.team == team)
                    .fold(Expression::from(0.0), |acc, (n, _)| {
                        acc + cell(n, d, Shift::Night)
                    });
                constraints.push(members.geq(1.0));
            }
        }
        if day.night >= 3 {
            let emg_or_leader = instance
                .nurses
                .iter()
                .enumerate()
                .filter(|(_, nurse)| nurse.team == Team::Emg || nurse.leader_ok)
                .fold(Expression::from(0.0), |acc, (n, _)| {
                    acc + cell(n, d, Shift::Night)
                });
            constraints.push(emg_or_leader.geq(1.0));
        }

        // Weekend and holiday day duty is anchored by a designated leader,
        // when the ward names any.
        if day.is_weekend_or_holiday() && !instance.weekend_day_leaders.is_empty() {
            let anchors = instance
                .weekend_day_leaders
                .iter()
                .fold(Expression::from(0.0), |acc, &n| acc + cell(n, d, Shift::Day));
            constraints.push(anchors.geq(1.0));
        }

        for &(a, b) in &instance.forbidden_night_pairs {
            constraints.push((cell(a, d, Shift::Night) + cell(b, d, Shift::Night)).leq(1.0));
        }
    }

    // Per-nurse rules.
    let weekend_days: Vec<usize> = instance
        .demand
        .iter()
        .enumerate()
        .filter(|(_, day)| day.is_weekend_or_holiday())
        .map(|(d, _)| d)
        .collect();

    // Ward-level fairness targets, shared by every nurse.
    let night_bar = instance.total_night_demand() as f64 / nurse_count.max(1) as f64;
    let weekend_bar = weekend_days
        .iter()
        .map(|&d| {
            let day = &instance.demand[d];
            (day.day_min + day.late + day.night) as f64
        })
        .sum::<f64>()
        / nurse_count.max(1) as f64;

    for (n, nurse) in instance.nurses.iter().enumerate() {
        let rules = &nurse.rules;

        // Night after night: no day or late duty the next morning.
        for d in 0..day_count.saturating_sub(1) {
            constraints.push((cell(n, d, Shift::Night) + cell(n, d + 1, Shift::Day)).leq(1.0));
            constraints.push((cell(n, d, Shift::Night) + cell(n, d + 1, Shift::Late)).leq(1.0));
        }

        // No three nights in a row.
        for d in 0..day_count.saturating_sub(2) {
            let run = cell(n, d, Shift::Night)
                + cell(n, d + 1, Shift::Night)
                + cell(n, d + 2, Shift::Night);
            constraints.push(run.leq(2.0));
        }

        // At least one rest day in every six-day window.
        for start in 0..day_count.saturating_sub(5) {
            let rest = (start..start + 6).fold(Expression::from(0.0), |acc, d| {
                acc + cell(n, d, Shift::Off)
            });
            constraints.push(rest.geq(1.0));
        }

        // Monthly night count range.
        let nights = (0..day_count).fold(Expression::from(0.0), |acc, d| {
            acc + cell(n, d, Shift::Night)
        });
        if with_slack {
            let short = slack(&mut vars, &mut objective);
            let over = slack(&mut vars, &mut objective);
            constraints.push((nights.clone() + short).geq(rules.night_min as f64));
            constraints.push((nights.clone() - over).leq(rules.night_max as f64));
        } else {
            constraints.push(nights.clone().geq(rules.night_min as f64));
            constraints.push(nights.clone().leq(rules.night_max as f64));
        }

        // Weekly work cap over ISO-week buckets.
        for bucket in &instance.week_buckets {
            let worked = bucket.iter().fold(Expression::from(0.0), |acc, &d| {
                acc + cell(n, d, Shift::Day) + cell(n, d, Shift::Late) + cell(n, d, Shift::Night)
            });
            if with_slack {
                let over = slack(&mut vars, &mut objective);
                constraints.push((worked - over).leq(rules.weekly_work_max as f64));
            } else {
                constraints.push(worked.leq(rules.weekly_work_max as f64));
            }
        }

        // Weekend / holiday work cap.
        let weekend_worked = weekend_days.iter().fold(Expression::from(0.0), |acc, &d| {
            acc + cell(n, d, Shift::Day) + cell(n, d, Shift::Late) + cell(n, d, Shift::Night)
        });
        if with_slack {
            let over = slack(&mut vars, &mut objective);
            constraints.push((weekend_worked - over).leq(rules.weekend_holiday_max as f64));
        } else {
            constraints.push(weekend_worked.leq(rules.weekend_holiday_max as f64));
        }

        // Monthly rest quota, when configured.
        if let Some(off_min) = rules.off_min {
            let rest = (0..day_count).fold(Expression::from(0.0), |acc, d| {
                acc + cell(n, d, Shift::Off)
            });
            constraints.push(rest.geq(off_min as f64));
        }

        // Forbidden and fixed cells.
        for &(d, shift) in &rules.forbidden {
            constraints.push(Expression::from(cell(n, d, shift)).eq(0.0));
        }
        for (&d, &shift) in &rules.fixed {
            constraints.push(Expression::from(cell(n, d, shift)).eq(1.0));
        }

        // Soft: unhonored OFF requests, one unit each.
        for &d in &rules.requested_off {
            objective = objective + Expression::from(weights.req_off)
                - weights.req_off * cell(n, d, Shift::Off);
        }

        // Soft: late duty two days after a night.
        for d in 0..day_count.saturating_sub(2) {
            let p = vars.add(variable().min(0.0));
            constraints.push(
                (Expression::from(p) - cell(n, d, Shift::Night) - cell(n, d + 2, Shift::Late))
                    .geq(-1.0),
            );
            objective += weights.pattern * p;
        }

        // Soft: night-count fairness around the ward average.
        let night_dev = vars.add(variable().min(0.0));
        constraints.push((Expression::from(night_dev) - nights.clone()).geq(-night_bar));
        constraints.push((Expression::from(night_dev) + nights).geq(night_bar));
        objective += weights.fair_night * night_dev;

        // Soft: weekend-work fairness around the expected average load.
        let weekend_worked = weekend_days.iter().fold(Expression::from(0.0), |acc, &d| {
            acc + cell(n, d, Shift::Day) + cell(n, d, Shift::Late) + cell(n, d, Shift::Night)
        });
        let weekend_dev = vars.add(variable().min(0.0));
        constraints
            .push((Expression::from(weekend_dev) - weekend_worked.clone()).geq(-weekend_bar));
        constraints.push((Expression::from(weekend_dev) + weekend_worked).geq(weekend_bar));
        objective += weights.fair_weekend * weekend_dev;
    }

    RosterModel {
        vars,
        x,
        objective,
        constraints,
        slack_count,
    }
}

/// Evaluates the soft objective of a concrete assignment, mirroring the
/// model's linearized terms at their tight values.
pub fn objective_value(
    assignment: &crate::domain::Assignment,
    instance: &ProblemInstance,
    weights: &ObjectiveWeights,
) -> f64 {
    let nurse_count = instance.nurse_count();
    let day_count = instance.day_count();
    let weekend_days: Vec<usize> = instance
        .demand
        .iter()
        .enumerate()
        .filter(|(_, day)| day.is_weekend_or_holiday())
        .map(|(d, _)| d)
        .collect();
    let night_bar = instance.total_night_demand() as f64 / nurse_count.max(1) as f64;
    let weekend_bar = weekend_days
        .iter()
        .map(|&d| {
            let day = &instance.demand[d];
            (day.day_min + day.late + day.night) as f64
        })
        .sum::<f64>()
        / nurse_count.max(1) as f64;

    let mut objective = 0.0;
    for (n, nurse) in instance.nurses.iter().enumerate() {
        let nights = (0..day_count)
            .filter(|&d| assignment.get(n, d) == Shift::Night)
            .count() as f64;
        let weekend_worked = weekend_days
            .iter()
            .filter(|&&d| assignment.get(n, d).is_work())
            .count() as f64;
        objective += weights.fair_night * (nights - night_bar).abs();
        objective += weights.fair_weekend * (weekend_worked - weekend_bar).abs();
        objective += weights.req_off
            * nurse
                .rules
                .requested_off
                .iter()
                .filter(|&&d| assignment.get(n, d).is_work())
                .count() as f64;
        for d in 0..day_count.saturating_sub(2) {
            if assignment.get(n, d) == Shift::Night && assignment.get(n, d + 2) == Shift::Late {
                objective += weights.pattern;
            }
        }
    }
    objective
}
