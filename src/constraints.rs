//! Hard constraints and objective for the roster model.
//!
//! The builder references doctors and shifts by position only; identity
//! lookups stay in the snapshot. Constraint groups are added in a fixed
//! order so runs are reproducible model-for-model.

use tracing::debug;

use crate::dataset::Dataset;
use crate::domain::ShiftKind;
use crate::solver::{CmpOp, DecisionMatrix, SolverEngine, Var};

/// Builds all hard constraints over the decision matrix.
pub struct ConstraintBuilder<'a, E: SolverEngine> {
    engine: &'a mut E,
    data: &'a Dataset,
    x: &'a DecisionMatrix,
}

impl<'a, E: SolverEngine> ConstraintBuilder<'a, E> {
    pub fn new(engine: &'a mut E, data: &'a Dataset, x: &'a DecisionMatrix) -> Self {
        Self { engine, data, x }
    }

    /// Adds every hard constraint group, in order.
    pub fn build_all_hard_constraints(&mut self) {
        debug!("building hard constraints");
        self.add_coverage_constraints();
        self.add_leave_constraints();
        self.add_shift_count_constraints();
        self.add_consecutive_shift_constraints();
        self.add_rest_period_constraints();
        self.add_single_day_off_constraints();
        self.add_max_consecutive_days_off_constraints();
        self.add_skill_mix_constraints();
        debug!("hard constraints built");
    }

    /// Every shift gets at least its minimum number of doctors.
    fn add_coverage_constraints(&mut self) {
        for s in 0..self.data.shift_count() {
            let min_doctors = self.data.min_doctors_for(s);
            let terms: Vec<(Var, i64)> = (0..self.data.doctor_count())
                .map(|d| (self.x.var(d, s), 1))
                .collect();
            self.engine.add_linear(&terms, CmpOp::Ge, i64::from(min_doctors));
        }
    }

    /// Doctors cannot work on days they have approved leave.
    fn add_leave_constraints(&mut self) {
        for (d, doctor) in self.data.doctors.iter().enumerate() {
            for (s, shift) in self.data.shifts.iter().enumerate() {
                if self.data.is_doctor_on_leave(doctor.id, shift) {
                    self.engine.add_linear(&[(self.x.var(d, s), 1)], CmpOp::Eq, 0);
                }
            }
        }
    }

    /// Each doctor works between the configured minimum and maximum number
    /// of shifts this month.
    fn add_shift_count_constraints(&mut self) {
        let config = &self.data.configuration;
        for d in 0..self.data.doctor_count() {
            let terms: Vec<(Var, i64)> = (0..self.data.shift_count())
                .map(|s| (self.x.var(d, s), 1))
                .collect();
            self.engine
                .add_linear(&terms, CmpOp::Ge, i64::from(config.min_shifts_per_doctor));
            self.engine
                .add_linear(&terms, CmpOp::Le, i64::from(config.max_shifts_per_doctor));
        }
    }

    /// No more than `max_consecutive_shifts` in a row, where "in a row"
    /// means adjacent positions in the `(date, day < night)` order.
    fn add_consecutive_shift_constraints(&mut self) {
        let max_consecutive = self.data.configuration.max_consecutive_shifts as usize;
        let shift_count = self.data.shift_count();
        if shift_count <= max_consecutive {
            return;
        }

        for d in 0..self.data.doctor_count() {
            // Every window of (max_consecutive + 1) positions sums to at
            // most max_consecutive.
            for start in 0..shift_count - max_consecutive {
                let terms: Vec<(Var, i64)> = (start..=start + max_consecutive)
                    .map(|s| (self.x.var(d, s), 1))
                    .collect();
                self.engine
                    .add_linear(&terms, CmpOp::Le, max_consecutive as i64);
            }
        }
    }

    /// Forbids a night shift directly followed by a day shift on the same
    /// or next date. Applies only when the configured rest floor is at
    /// least twelve hours.
    fn add_rest_period_constraints(&mut self) {
        if self.data.configuration.min_rest_hours_between_shifts < 12 {
            return;
        }

        for d in 0..self.data.doctor_count() {
            for s in 0..self.data.shift_count().saturating_sub(1) {
                let current = &self.data.shifts[s];
                let next = &self.data.shifts[s + 1];
                if current.kind == ShiftKind::Night
                    && next.kind == ShiftKind::Day
                    && (next.date - current.date).num_days() <= 1
                {
                    self.engine.add_linear(
                        &[(self.x.var(d, s), 1), (self.x.var(d, s + 1), 1)],
                        CmpOp::Le,
                        1,
                    );
                }
            }
        }
    }

    /// Avoids a single day off sandwiched between working days: over each
    /// consecutive calendar triple, working the outer days forces the
    /// middle one.
    fn add_single_day_off_constraints(&mut self) {
        if !self.data.configuration.avoid_single_day_off {
            return;
        }

        let daily = self.data.daily_shifts();
        let dates: Vec<_> = daily.keys().copied().collect();

        for d in 0..self.data.doctor_count() {
            for i in 0..dates.len().saturating_sub(2) {
                if (dates[i + 1] - dates[i]).num_days() != 1
                    || (dates[i + 2] - dates[i + 1]).num_days() != 1
                {
                    continue;
                }

                let mut works = Vec::with_capacity(3);
                for day in i..i + 3 {
                    let target = self.engine.new_bool_var(&format!("works_d{d}_day{day}"));
                    let inputs: Vec<Var> =
                        daily[&dates[day]].iter().map(|&s| self.x.var(d, s)).collect();
                    self.engine.add_max_equality(target, &inputs);
                    works.push(target);
                }

                // works[i] + works[i+2] <= 1 + works[i+1]
                self.engine.add_linear(
                    &[(works[0], 1), (works[2], 1), (works[1], -1)],
                    CmpOp::Le,
                    1,
                );
            }
        }
    }

    /// At least one shift in every window of `max_consecutive_days_off + 1`
    /// consecutive calendar days. Windows spanning a calendar gap are
    /// skipped.
    fn add_max_consecutive_days_off_constraints(&mut self) {
        let max_days_off = self.data.configuration.max_consecutive_days_off as usize;
        let daily = self.data.daily_shifts();
        let dates: Vec<_> = daily.keys().copied().collect();
        if dates.len() <= max_days_off {
            return;
        }

        for d in 0..self.data.doctor_count() {
            for i in 0..dates.len() - max_days_off {
                let window = &dates[i..=i + max_days_off];
                let consecutive = window
                    .windows(2)
                    .all(|pair| (pair[1] - pair[0]).num_days() == 1);
                if !consecutive {
                    continue;
                }

                let terms: Vec<(Var, i64)> = window
                    .iter()
                    .flat_map(|date| daily[date].iter().map(|&s| (self.x.var(d, s), 1)))
                    .collect();
                self.engine.add_linear(&terms, CmpOp::Ge, 1);
            }
        }
    }

    /// Minimum specialty mix per shift. A requirement naming a specialty
    /// with no qualified doctor is omitted here; the validator surfaces it
    /// as a warning.
    fn add_skill_mix_constraints(&mut self) {
        for (s, shift) in self.data.shifts.iter().enumerate() {
            for requirement in self.data.requirements_for_shift(shift) {
                if requirement.min_with_specialty == 0 {
                    continue;
                }
                let Some(specialty) = requirement.required_specialty else {
                    continue;
                };
                let Some(positions) = self.data.doctors_by_specialty.get(&specialty) else {
                    continue;
                };
                if positions.is_empty() {
                    continue;
                }

                let terms: Vec<(Var, i64)> =
                    positions.iter().map(|&d| (self.x.var(d, s), 1)).collect();
                self.engine.add_linear(
                    &terms,
                    CmpOp::Ge,
                    i64::from(requirement.min_with_specialty),
                );
            }
        }
    }

    /// The default objective: one unit per filled `(doctor, shift)` pair,
    /// biasing the engine toward fuller coverage when workload bounds
    /// permit. Weighted soft terms hook in through
    /// [`crate::solver::ScheduleSolver::with_extra_objective`].
    pub fn coverage_objective_terms(&self) -> Vec<(Var, i64)> {
        let mut terms = Vec::with_capacity(self.x.len());
        for d in 0..self.data.doctor_count() {
            for s in 0..self.data.shift_count() {
                terms.push((self.x.var(d, s), 1));
            }
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Doctor, ScheduleConfig, Shift, ShiftKind};
    use crate::engine::DfsEngine;
    use crate::solver::{SolverParams, SolverStatus};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn ymd(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn solve(data: &Dataset) -> (DfsEngine, DecisionMatrix, SolverStatus) {
        let mut engine = DfsEngine::new();
        let matrix = DecisionMatrix::build(&mut engine, data.doctor_count(), data.shift_count());
        let mut builder = ConstraintBuilder::new(&mut engine, data, &matrix);
        builder.build_all_hard_constraints();
        let objective = builder.coverage_objective_terms();
        engine.maximize(&objective);
        let status = engine.solve(&SolverParams::default().with_time_limit(10));
        (engine, matrix, status)
    }

    #[test]
    fn leave_pins_the_variable_to_zero() {
        let store = MemoryStore::new();
        store.add_configuration(
            ScheduleConfig::new("test")
                .activated()
                .with_shift_bounds(0, 4)
                .with_default_min_doctors(1)
                .with_avoid_single_day_off(false),
        );
        let resting = store.add_doctor(Doctor::new("Dr. A"));
        store.add_doctor(Doctor::new("Dr. B"));
        store.add_shift(Shift::new(ymd(2), ShiftKind::Day));
        store.add_leave(
            crate::domain::LeaveInterval::new(resting, ymd(2), ymd(2), crate::domain::LeaveKind::Vacation)
                .approved(),
        );

        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let (engine, matrix, status) = solve(&data);

        assert!(status.is_feasible());
        let resting_pos = data.doctor_index[&resting];
        assert!(!engine.value(matrix.var(resting_pos, 0)));
    }

    #[test]
    fn single_day_off_forces_the_middle_day() {
        let store = MemoryStore::new();
        // One doctor, three consecutive days, exactly two shifts allowed:
        // without the middle day the only pattern is work-off-work, which
        // the single-day-off rule forbids, so the run is infeasible.
        store.add_configuration(
            ScheduleConfig::new("test")
                .activated()
                .with_shift_bounds(2, 2)
                .with_default_min_doctors(0)
                .with_max_consecutive_shifts(1)
                .with_avoid_single_day_off(true)
                .with_max_consecutive_days_off(5),
        );
        store.add_doctor(Doctor::new("Dr. A"));
        for day in 1..=3 {
            store.add_shift(Shift::new(ymd(day), ShiftKind::Day));
        }

        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let (_, _, status) = solve(&data);
        assert_eq!(status, SolverStatus::Infeasible);
    }

    #[test]
    fn days_off_windows_skip_calendar_gaps() {
        let store = MemoryStore::new();
        // Shifts on days 1 and 10 only; with max_consecutive_days_off = 1
        // the two-day windows all span gaps, so a zero-assignment doctor
        // stays feasible.
        store.add_configuration(
            ScheduleConfig::new("test")
                .activated()
                .with_shift_bounds(0, 2)
                .with_default_min_doctors(0)
                .with_max_consecutive_days_off(1)
                .with_avoid_single_day_off(false),
        );
        store.add_doctor(Doctor::new("Dr. A"));
        store.add_shift(Shift::new(ymd(1), ShiftKind::Day));
        store.add_shift(Shift::new(ymd(10), ShiftKind::Day));

        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let (_, _, status) = solve(&data);
        assert!(status.is_feasible());
    }

    #[test]
    fn skill_mix_without_qualified_doctors_is_omitted() {
        let store = MemoryStore::new();
        let config = ScheduleConfig::new("test")
            .activated()
            .with_shift_bounds(0, 2)
            .with_default_min_doctors(1)
            .with_avoid_single_day_off(false);
        let config_id = config.id;
        store.add_configuration(config);
        store.add_doctor(Doctor::new("Dr. A"));
        store.add_shift(Shift::new(ymd(2), ShiftKind::Day));

        let ghost_specialty = uuid::Uuid::new_v4();
        store.add_requirement(
            crate::domain::ShiftRequirement::new(config_id, crate::domain::AppliesTo::All)
                .with_specialty(ghost_specialty, 1),
        );

        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let (_, _, status) = solve(&data);
        // The requirement would be unsatisfiable; omitting it keeps the
        // model feasible.
        assert!(status.is_feasible());
    }
}
