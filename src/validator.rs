//! Solution validator: re-derives every hard rule from the raw assignment
//! and persists the run atomically.
//!
//! The validator never consults the model. It evaluates the same logical
//! predicates the builder encoded, directly against the returned
//! assignment set, so a bug in either the builder or the engine surfaces
//! as recorded violations instead of silently shipping a bad roster.

use chrono::Local;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::domain::{
    Assignment, AssignmentKind, Severity, ShiftKind, Violation, ViolationKind,
};
use crate::error::Error;
use crate::solver::ScheduleSolution;
use crate::store::{RosterStore, ScheduleMetadata};

const INFEASIBLE_NOTE: &str = "Schedule generation failed - no feasible solution found";

pub struct SolutionValidator<'a> {
    solution: &'a ScheduleSolution,
    data: &'a Dataset,
    violations: Vec<Violation>,
}

impl<'a> SolutionValidator<'a> {
    pub fn new(solution: &'a ScheduleSolution, data: &'a Dataset) -> Self {
        Self {
            solution,
            data,
            violations: Vec::new(),
        }
    }

    /// Converts the raw `(doctor position, shift position)` pairs back to
    /// identity pairs for persistence.
    pub fn assignments(&self) -> Vec<Assignment> {
        self.solution
            .assignments
            .iter()
            .map(|&(d, s)| Assignment {
                doctor: self.data.doctors[d].id,
                shift: self.data.shifts[s].id,
                kind: AssignmentKind::Scheduled,
            })
            .collect()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Re-derives all violations from the raw assignment set.
    pub fn detect_violations(&mut self) -> &[Violation] {
        self.violations.clear();
        self.check_coverage_violations();
        self.check_workload_violations();
        self.check_consecutive_shift_violations();
        self.check_rest_period_violations();
        self.check_leave_violations();
        self.check_unsatisfiable_requirements();
        &self.violations
    }

    fn check_coverage_violations(&mut self) {
        let mut coverage = vec![0u32; self.data.shift_count()];
        for &(_, s) in &self.solution.assignments {
            coverage[s] += 1;
        }

        for (s, shift) in self.data.shifts.iter().enumerate() {
            let min_required = self.data.min_doctors_for(s);
            if coverage[s] < min_required {
                self.violations.push(Violation::new(
                    ViolationKind::UnderCoverage,
                    Severity::Error,
                    format!(
                        "Shift {} {} has only {} doctors (minimum: {})",
                        shift.date,
                        shift.kind.as_str(),
                        coverage[s],
                        min_required
                    ),
                ));
            }
        }
    }

    fn check_workload_violations(&mut self) {
        let config = &self.data.configuration;
        let mut counts = vec![0u32; self.data.doctor_count()];
        for &(d, _) in &self.solution.assignments {
            counts[d] += 1;
        }

        for (d, doctor) in self.data.doctors.iter().enumerate() {
            if counts[d] < config.min_shifts_per_doctor {
                self.violations.push(
                    Violation::new(
                        ViolationKind::UnderMinShifts,
                        Severity::Warning,
                        format!(
                            "Doctor {} has only {} shifts (minimum: {})",
                            doctor.name, counts[d], config.min_shifts_per_doctor
                        ),
                    )
                    .for_doctor(doctor.id),
                );
            }
            if counts[d] > config.max_shifts_per_doctor {
                self.violations.push(
                    Violation::new(
                        ViolationKind::OverMaxShifts,
                        Severity::Error,
                        format!(
                            "Doctor {} has {} shifts (maximum: {})",
                            doctor.name, counts[d], config.max_shifts_per_doctor
                        ),
                    )
                    .for_doctor(doctor.id),
                );
            }
        }
    }

    /// Walks each doctor's assigned positions in order and flags the first
    /// run longer than the configured maximum. At most one violation per
    /// doctor.
    fn check_consecutive_shift_violations(&mut self) {
        let max_consecutive = self.data.configuration.max_consecutive_shifts;

        for (d, doctor) in self.data.doctors.iter().enumerate() {
            let mut positions: Vec<usize> = self
                .solution
                .assignments
                .iter()
                .filter(|&&(doc, _)| doc == d)
                .map(|&(_, s)| s)
                .collect();
            positions.sort_unstable();
            if positions.len() < 2 {
                continue;
            }

            let mut consecutive = 1u32;
            for pair in positions.windows(2) {
                if pair[1] == pair[0] + 1 {
                    consecutive += 1;
                    if consecutive > max_consecutive {
                        self.violations.push(
                            Violation::new(
                                ViolationKind::TooManyConsecutiveShifts,
                                Severity::Error,
                                format!(
                                    "Doctor {} has {} consecutive shifts (maximum: {})",
                                    doctor.name, consecutive, max_consecutive
                                ),
                            )
                            .for_doctor(doctor.id),
                        );
                        break;
                    }
                } else {
                    consecutive = 1;
                }
            }
        }
    }

    fn check_rest_period_violations(&mut self) {
        let min_rest = self.data.configuration.min_rest_hours_between_shifts;
        if min_rest < 12 {
            return;
        }

        let shift_count = self.data.shift_count();
        for (d, doctor) in self.data.doctors.iter().enumerate() {
            let mut assigned = vec![false; shift_count];
            for &(doc, s) in &self.solution.assignments {
                if doc == d {
                    assigned[s] = true;
                }
            }

            for s in 0..shift_count.saturating_sub(1) {
                let current = &self.data.shifts[s];
                let next = &self.data.shifts[s + 1];
                if assigned[s]
                    && assigned[s + 1]
                    && current.kind == ShiftKind::Night
                    && next.kind == ShiftKind::Day
                    && (next.date - current.date).num_days() <= 1
                {
                    self.violations.push(
                        Violation::new(
                            ViolationKind::InsufficientRest,
                            Severity::Error,
                            format!(
                                "Doctor {} has night shift on {} followed by day shift on {} (less than {} hours rest)",
                                doctor.name, current.date, next.date, min_rest
                            ),
                        )
                        .for_doctor(doctor.id),
                    );
                }
            }
        }
    }

    /// An assignment landing on a leave date means the builder or the
    /// engine disagreed with the snapshot; either way the roster is wrong.
    fn check_leave_violations(&mut self) {
        for &(d, s) in &self.solution.assignments {
            let doctor = &self.data.doctors[d];
            let shift = &self.data.shifts[s];
            if self.data.is_doctor_on_leave(doctor.id, shift) {
                self.violations.push(
                    Violation::new(
                        ViolationKind::LeaveBreach,
                        Severity::Error,
                        format!(
                            "Doctor {} is assigned to shift {} {} while on approved leave",
                            doctor.name,
                            shift.date,
                            shift.kind.as_str()
                        ),
                    )
                    .for_doctor(doctor.id),
                );
            }
        }
    }

    /// The builder drops requirements no active doctor can satisfy; record
    /// the staffing gap so it is visible next to the other findings.
    fn check_unsatisfiable_requirements(&mut self) {
        for requirement in &self.data.requirements {
            if requirement.min_with_specialty == 0 {
                continue;
            }
            let Some(specialty) = requirement.required_specialty else {
                continue;
            };
            let qualified = self
                .data
                .doctors_by_specialty
                .get(&specialty)
                .map(|positions| positions.len())
                .unwrap_or(0);
            if qualified == 0 {
                self.violations.push(Violation::new(
                    ViolationKind::UnsatisfiableRequirement,
                    Severity::Warning,
                    format!(
                        "No active doctor holds the specialty required by a {} requirement (needs {})",
                        requirement.applies_to.as_str(),
                        requirement.min_with_specialty
                    ),
                ));
            }
        }
    }

    /// Persists the run inside one transaction: replaces all prior
    /// assignments and violations for the `(month, year)` schedule, then
    /// writes the solver metadata. Running it twice with the same solution
    /// leaves the store in the same state.
    ///
    /// On an infeasible or unknown status nothing but the status, the
    /// solve time and an operator note is written; the schedule record is
    /// retained for inspection and retry.
    pub fn save(&mut self, store: &dyn RosterStore) -> Result<Uuid, Error> {
        let month = self.data.month;
        let year = self.data.year;
        let generated_at = Local::now().naive_local();

        if !self.solution.is_feasible() {
            warn!(status = self.solution.status.as_str(), "not feasible, saving status only");
            let metadata = ScheduleMetadata {
                solver_status: self.solution.status,
                solver_time_seconds: self.solution.solver_time_seconds,
                objective_value: None,
                generated_at,
                notes: INFEASIBLE_NOTE.to_string(),
            };
            let mut schedule = None;
            store.transaction(&mut |tx| {
                let id = tx.upsert_schedule(month, year)?;
                tx.update_schedule_metadata(id, &metadata)?;
                schedule = Some(id);
                Ok(())
            })?;
            return schedule
                .ok_or_else(|| Error::Internal("transaction yielded no schedule id".into()));
        }

        let assignments = self.assignments();
        self.detect_violations();
        let violations = self.violations.clone();

        info!(assignments = assignments.len(), "saving schedule");
        if violations.is_empty() {
            info!("no constraint violations detected");
        } else {
            warn!(count = violations.len(), "constraint violations detected");
        }

        let metadata = ScheduleMetadata {
            solver_status: self.solution.status,
            solver_time_seconds: self.solution.solver_time_seconds,
            objective_value: self.solution.objective_value,
            generated_at,
            notes: String::new(),
        };

        let mut schedule = None;
        store.transaction(&mut |tx| {
            let id = tx.upsert_schedule(month, year)?;
            let replaced = tx.delete_assignments(id)?;
            if replaced > 0 {
                debug!(replaced, "deleted existing assignments");
            }
            tx.insert_assignments(id, &assignments)?;
            tx.delete_violations(id)?;
            tx.insert_violations(id, &violations)?;
            tx.update_schedule_metadata(id, &metadata)?;
            schedule = Some(id);
            Ok(())
        })?;
        schedule.ok_or_else(|| Error::Internal("transaction yielded no schedule id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppliesTo, Doctor, LeaveInterval, LeaveKind, ScheduleConfig, Shift, ShiftRequirement};
    use crate::solver::SolverStatus;
    use crate::store::{MemoryStore, RosterRead};
    use chrono::NaiveDate;

    fn ymd(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    /// Two doctors, two days with a day and a night shift each, loose
    /// workload bounds.
    fn two_doctor_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_configuration(
            ScheduleConfig::new("test")
                .activated()
                .with_shift_bounds(1, 4)
                .with_max_consecutive_shifts(4)
                .with_default_min_doctors(1)
                .with_avoid_single_day_off(false),
        );
        store.add_doctor(Doctor::new("Dr. A"));
        store.add_doctor(Doctor::new("Dr. B"));
        for day in [2, 3] {
            store.add_shift(Shift::new(ymd(day), ShiftKind::Day));
            store.add_shift(Shift::new(ymd(day), ShiftKind::Night));
        }
        store
    }

    fn solution_with(assignments: Vec<(usize, usize)>) -> ScheduleSolution {
        let objective = assignments.len() as i64;
        ScheduleSolution {
            status: SolverStatus::Feasible,
            assignments,
            solver_time_seconds: 0.1,
            objective_value: Some(objective),
        }
    }

    fn kinds(violations: &[Violation]) -> Vec<ViolationKind> {
        violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn a_clean_solution_has_no_violations() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        // Doctor 0 works the days, doctor 1 the nights.
        let solution = solution_with(vec![(0, 0), (1, 1), (0, 2), (1, 3)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        assert!(validator.detect_violations().is_empty());
    }

    #[test]
    fn missing_coverage_is_an_error() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        // Shift position 3 is uncovered; both doctors miss nothing else.
        let solution = solution_with(vec![(0, 0), (1, 1), (0, 2)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations();
        assert!(kinds(violations).contains(&ViolationKind::UnderCoverage));
        let coverage = violations
            .iter()
            .find(|v| v.kind == ViolationKind::UnderCoverage)
            .unwrap();
        assert_eq!(coverage.severity, Severity::Error);
        assert!(coverage.description.contains("minimum: 1"));
    }

    #[test]
    fn workload_bounds_split_warning_and_error() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        // Doctor 0 hoards everything, doctor 1 works nothing.
        let solution = solution_with(vec![(0, 0), (0, 1), (0, 2), (0, 3)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations().to_vec();

        let under = violations
            .iter()
            .find(|v| v.kind == ViolationKind::UnderMinShifts)
            .unwrap();
        assert_eq!(under.severity, Severity::Warning);
        assert_eq!(under.doctor, Some(data.doctors[1].id));
        // Four shifts is within the max of four, so no over-max error.
        assert!(!kinds(&violations).contains(&ViolationKind::OverMaxShifts));
    }

    #[test]
    fn over_max_shifts_is_an_error() {
        let store = two_doctor_store();
        let mut data = Dataset::snapshot(&store, 6, 2025).unwrap();
        data.configuration.max_shifts_per_doctor = 2;
        let solution = solution_with(vec![(0, 0), (0, 1), (0, 2), (1, 3)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations();
        let over = violations
            .iter()
            .find(|v| v.kind == ViolationKind::OverMaxShifts)
            .unwrap();
        assert_eq!(over.severity, Severity::Error);
        assert_eq!(over.doctor, Some(data.doctors[0].id));
    }

    #[test]
    fn long_runs_emit_one_violation_per_doctor() {
        let store = two_doctor_store();
        let mut data = Dataset::snapshot(&store, 6, 2025).unwrap();
        data.configuration.max_consecutive_shifts = 2;
        data.configuration.min_rest_hours_between_shifts = 0;
        // Positions 0..=3 form a run of four.
        let solution = solution_with(vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations();
        let runs: Vec<_> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::TooManyConsecutiveShifts)
            .collect();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].description.contains("3 consecutive shifts"));
    }

    #[test]
    fn night_into_day_is_insufficient_rest() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        // Position 1 is the night of day 2, position 2 the day of day 3.
        let solution = solution_with(vec![(0, 1), (0, 2), (1, 0), (1, 3)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations();
        let rest = violations
            .iter()
            .find(|v| v.kind == ViolationKind::InsufficientRest)
            .unwrap();
        assert_eq!(rest.severity, Severity::Error);
        assert_eq!(rest.doctor, Some(data.doctors[0].id));
    }

    #[test]
    fn rest_rule_is_disabled_below_twelve_hours() {
        let store = two_doctor_store();
        let mut data = Dataset::snapshot(&store, 6, 2025).unwrap();
        data.configuration.min_rest_hours_between_shifts = 8;
        let solution = solution_with(vec![(0, 1), (0, 2), (1, 0), (1, 3)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        assert!(!kinds(validator.detect_violations()).contains(&ViolationKind::InsufficientRest));
    }

    #[test]
    fn assignments_on_leave_dates_are_breaches() {
        let store = two_doctor_store();
        let resting = store.list_active_doctors().unwrap()[0].id;
        store.add_leave(LeaveInterval::new(resting, ymd(2), ymd(2), LeaveKind::Vacation).approved());
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();

        let resting_pos = data.doctor_index[&resting];
        let other_pos = 1 - resting_pos;
        let solution = solution_with(vec![
            (resting_pos, 0),
            (other_pos, 1),
            (other_pos, 2),
            (other_pos, 3),
        ]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations();
        let breach = violations
            .iter()
            .find(|v| v.kind == ViolationKind::LeaveBreach)
            .unwrap();
        assert_eq!(breach.severity, Severity::Error);
        assert_eq!(breach.doctor, Some(resting));
    }

    #[test]
    fn requirements_without_qualified_doctors_warn() {
        let store = two_doctor_store();
        let config = store.active_configuration().unwrap().unwrap();
        store.add_requirement(
            ShiftRequirement::new(config.id, AppliesTo::Weekend)
                .with_specialty(Uuid::new_v4(), 1),
        );
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let solution = solution_with(vec![(0, 0), (1, 1), (0, 2), (1, 3)]);

        let mut validator = SolutionValidator::new(&solution, &data);
        let violations = validator.detect_violations();
        let gap = violations
            .iter()
            .find(|v| v.kind == ViolationKind::UnsatisfiableRequirement)
            .unwrap();
        assert_eq!(gap.severity, Severity::Warning);
    }

    #[test]
    fn save_is_idempotent() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let solution = solution_with(vec![(0, 0), (1, 1), (0, 2), (1, 3)]);

        let first = SolutionValidator::new(&solution, &data).save(&store).unwrap();
        let after_first = store.assignments_for(first).unwrap();

        let second = SolutionValidator::new(&solution, &data).save(&store).unwrap();
        let after_second = store.assignments_for(second).unwrap();

        assert_eq!(first, second);
        assert_eq!(after_first, after_second);
        assert_eq!(after_second.len(), 4);
        assert_eq!(store.violations_for(second).unwrap().len(), 0);
    }

    #[test]
    fn infeasible_runs_save_status_only() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let solution = ScheduleSolution {
            status: SolverStatus::Infeasible,
            assignments: Vec::new(),
            solver_time_seconds: 0.2,
            objective_value: None,
        };

        let schedule = SolutionValidator::new(&solution, &data).save(&store).unwrap();
        assert!(store.assignments_for(schedule).unwrap().is_empty());
        assert!(store.violations_for(schedule).unwrap().is_empty());

        let record = store.schedule_by_id(schedule).unwrap().unwrap();
        assert_eq!(record.solver_status, Some(SolverStatus::Infeasible));
        assert_eq!(record.notes, INFEASIBLE_NOTE);
        assert!(record.generated_at.is_some());
    }

    #[test]
    fn unknown_status_is_treated_as_infeasible_for_persistence() {
        let store = two_doctor_store();
        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        let solution = ScheduleSolution {
            status: SolverStatus::Unknown,
            assignments: Vec::new(),
            solver_time_seconds: 1.0,
            objective_value: None,
        };

        let schedule = SolutionValidator::new(&solution, &data).save(&store).unwrap();
        assert!(store.assignments_for(schedule).unwrap().is_empty());
        let record = store.schedule_by_id(schedule).unwrap().unwrap();
        assert_eq!(record.solver_status, Some(SolverStatus::Unknown));
    }
}
