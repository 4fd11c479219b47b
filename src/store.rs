//! Persistence collaborator interfaces and the in-memory reference store.
//!
//! The core only ever talks to the traits here: [`RosterRead`] for the
//! loader's read path and [`RosterStore`] for schedule lookups plus the
//! transactional write path. [`MemoryStore`] backs tests and the demo CLI;
//! a relational implementation would satisfy the same traits.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{
    Assignment, Doctor, LeaveInterval, LeaveStatus, ScheduleConfig, ScheduleRecord,
    ScheduleStatus, Shift, ShiftRequirement, Specialty, Violation,
};
use crate::error::Error;
use crate::solver::SolverStatus;

/// Read path used by the data loader.
pub trait RosterRead {
    fn list_active_doctors(&self) -> Result<Vec<Doctor>, Error>;

    /// Shifts of the month, ordered by `(date, kind)`.
    fn list_shifts(&self, year: i32, month: u32) -> Result<Vec<Shift>, Error>;

    /// Approved leave overlapping the inclusive `[first_day, last_day]` range.
    fn list_approved_leave(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<Vec<LeaveInterval>, Error>;

    fn active_configuration(&self) -> Result<Option<ScheduleConfig>, Error>;

    fn shift_requirements(&self, configuration: Uuid) -> Result<Vec<ShiftRequirement>, Error>;
}

/// Solver metadata written onto the schedule record after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleMetadata {
    pub solver_status: SolverStatus,
    pub solver_time_seconds: f64,
    pub objective_value: Option<i64>,
    pub generated_at: NaiveDateTime,
    pub notes: String,
}

/// Write surface available inside one transaction. All mutations either
/// commit together or leave no trace.
pub trait ScheduleWriter {
    fn upsert_schedule(&mut self, month: u32, year: i32) -> Result<Uuid, Error>;

    fn delete_assignments(&mut self, schedule: Uuid) -> Result<usize, Error>;

    fn insert_assignments(&mut self, schedule: Uuid, rows: &[Assignment]) -> Result<(), Error>;

    fn delete_violations(&mut self, schedule: Uuid) -> Result<usize, Error>;

    fn insert_violations(&mut self, schedule: Uuid, rows: &[Violation]) -> Result<(), Error>;

    fn update_schedule_metadata(
        &mut self,
        schedule: Uuid,
        metadata: &ScheduleMetadata,
    ) -> Result<(), Error>;
}

/// Full collaborator surface: reads plus schedule lookups plus the
/// transactional write entry point.
pub trait RosterStore: RosterRead {
    fn schedule_by_id(&self, id: Uuid) -> Result<Option<ScheduleRecord>, Error>;

    fn schedule_for_month(&self, month: u32, year: i32) -> Result<Option<ScheduleRecord>, Error>;

    fn assignments_for(&self, schedule: Uuid) -> Result<Vec<Assignment>, Error>;

    fn violations_for(&self, schedule: Uuid) -> Result<Vec<Violation>, Error>;

    /// Runs `work` against a writer; commits on `Ok`, rolls back on `Err`.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn ScheduleWriter) -> Result<(), Error>,
    ) -> Result<(), Error>;
}

#[derive(Debug, Clone, Default)]
struct Inner {
    doctors: Vec<Doctor>,
    specialties: Vec<Specialty>,
    shifts: Vec<Shift>,
    leave: Vec<LeaveInterval>,
    configurations: Vec<ScheduleConfig>,
    requirements: Vec<ShiftRequirement>,
    schedules: Vec<ScheduleRecord>,
    assignments: HashMap<Uuid, Vec<Assignment>>,
    violations: HashMap<Uuid, Vec<Violation>>,
}

/// In-memory reference store. Transactions stage a copy of the state and
/// swap it in on commit, so a failing closure leaves nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_doctor(&self, doctor: Doctor) -> Uuid {
        let id = doctor.id;
        self.inner.write().doctors.push(doctor);
        id
    }

    pub fn add_specialty(&self, specialty: Specialty) -> Uuid {
        let id = specialty.id;
        self.inner.write().specialties.push(specialty);
        id
    }

    pub fn add_shift(&self, shift: Shift) -> Uuid {
        let id = shift.id;
        self.inner.write().shifts.push(shift);
        id
    }

    pub fn add_leave(&self, interval: LeaveInterval) -> Uuid {
        let id = interval.id;
        self.inner.write().leave.push(interval);
        id
    }

    /// Registers a configuration. Only one may be active: activating this
    /// one deactivates every other.
    pub fn add_configuration(&self, configuration: ScheduleConfig) -> Uuid {
        let id = configuration.id;
        let mut inner = self.inner.write();
        if configuration.active {
            for existing in inner.configurations.iter_mut() {
                existing.active = false;
            }
        }
        inner.configurations.push(configuration);
        id
    }

    pub fn add_requirement(&self, requirement: ShiftRequirement) -> Uuid {
        let id = requirement.id;
        self.inner.write().requirements.push(requirement);
        id
    }

    /// Moves a schedule through its lifecycle (draft, published, finalized).
    pub fn set_schedule_status(&self, schedule: Uuid, status: ScheduleStatus) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let record = inner
            .schedules
            .iter_mut()
            .find(|r| r.id == schedule)
            .ok_or(Error::UnknownSchedule(schedule))?;
        record.status = status;
        Ok(())
    }
}

impl RosterRead for MemoryStore {
    fn list_active_doctors(&self) -> Result<Vec<Doctor>, Error> {
        let mut doctors: Vec<Doctor> = self
            .inner
            .read()
            .doctors
            .iter()
            .filter(|d| d.active)
            .cloned()
            .collect();
        doctors.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id)));
        Ok(doctors)
    }

    fn list_shifts(&self, year: i32, month: u32) -> Result<Vec<Shift>, Error> {
        let mut shifts: Vec<Shift> = self
            .inner
            .read()
            .shifts
            .iter()
            .filter(|s| s.date.year() == year && s.date.month() == month)
            .cloned()
            .collect();
        shifts.sort_by_key(|s| (s.date, s.kind));
        Ok(shifts)
    }

    fn list_approved_leave(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<Vec<LeaveInterval>, Error> {
        let mut leave: Vec<LeaveInterval> = self
            .inner
            .read()
            .leave
            .iter()
            .filter(|l| l.status == LeaveStatus::Approved && l.overlaps(first_day, last_day))
            .cloned()
            .collect();
        leave.sort_by_key(|l| (l.start_date, l.id));
        Ok(leave)
    }

    fn active_configuration(&self) -> Result<Option<ScheduleConfig>, Error> {
        Ok(self
            .inner
            .read()
            .configurations
            .iter()
            .find(|c| c.active)
            .cloned())
    }

    fn shift_requirements(&self, configuration: Uuid) -> Result<Vec<ShiftRequirement>, Error> {
        let mut requirements: Vec<ShiftRequirement> = self
            .inner
            .read()
            .requirements
            .iter()
            .filter(|r| r.configuration == configuration)
            .cloned()
            .collect();
        requirements.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Ok(requirements)
    }
}

impl RosterStore for MemoryStore {
    fn schedule_by_id(&self, id: Uuid) -> Result<Option<ScheduleRecord>, Error> {
        Ok(self.inner.read().schedules.iter().find(|r| r.id == id).cloned())
    }

    fn schedule_for_month(&self, month: u32, year: i32) -> Result<Option<ScheduleRecord>, Error> {
        Ok(self
            .inner
            .read()
            .schedules
            .iter()
            .find(|r| r.month == month && r.year == year)
            .cloned())
    }

    fn assignments_for(&self, schedule: Uuid) -> Result<Vec<Assignment>, Error> {
        Ok(self
            .inner
            .read()
            .assignments
            .get(&schedule)
            .cloned()
            .unwrap_or_default())
    }

    fn violations_for(&self, schedule: Uuid) -> Result<Vec<Violation>, Error> {
        Ok(self
            .inner
            .read()
            .violations
            .get(&schedule)
            .cloned()
            .unwrap_or_default())
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn ScheduleWriter) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let mut staged = inner.clone();
        let mut writer = MemoryWriter { inner: &mut staged };
        work(&mut writer)?;
        *inner = staged;
        Ok(())
    }
}

struct MemoryWriter<'a> {
    inner: &'a mut Inner,
}

impl ScheduleWriter for MemoryWriter<'_> {
    fn upsert_schedule(&mut self, month: u32, year: i32) -> Result<Uuid, Error> {
        if let Some(existing) = self
            .inner
            .schedules
            .iter()
            .find(|r| r.month == month && r.year == year)
        {
            return Ok(existing.id);
        }
        let record = ScheduleRecord::new(month, year);
        let id = record.id;
        self.inner.schedules.push(record);
        Ok(id)
    }

    fn delete_assignments(&mut self, schedule: Uuid) -> Result<usize, Error> {
        Ok(self
            .inner
            .assignments
            .remove(&schedule)
            .map(|rows| rows.len())
            .unwrap_or(0))
    }

    fn insert_assignments(&mut self, schedule: Uuid, rows: &[Assignment]) -> Result<(), Error> {
        self.inner
            .assignments
            .entry(schedule)
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    fn delete_violations(&mut self, schedule: Uuid) -> Result<usize, Error> {
        Ok(self
            .inner
            .violations
            .remove(&schedule)
            .map(|rows| rows.len())
            .unwrap_or(0))
    }

    fn insert_violations(&mut self, schedule: Uuid, rows: &[Violation]) -> Result<(), Error> {
        self.inner
            .violations
            .entry(schedule)
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    fn update_schedule_metadata(
        &mut self,
        schedule: Uuid,
        metadata: &ScheduleMetadata,
    ) -> Result<(), Error> {
        let record = self
            .inner
            .schedules
            .iter_mut()
            .find(|r| r.id == schedule)
            .ok_or(Error::UnknownSchedule(schedule))?;
        record.solver_status = Some(metadata.solver_status);
        record.solver_time_seconds = Some(metadata.solver_time_seconds);
        record.objective_value = metadata.objective_value;
        record.generated_at = Some(metadata.generated_at);
        record.notes = metadata.notes.clone();
        Ok(())
    }
}
