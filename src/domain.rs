//! Domain model for physician roster generation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A physician who can be assigned to shifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    /// Identifiers of the specialties this doctor holds.
    pub specialties: HashSet<Uuid>,
    pub active: bool,
}

impl Doctor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            specialties: HashSet::new(),
            active: true,
        }
    }

    pub fn with_specialty(mut self, specialty: Uuid) -> Self {
        self.specialties.insert(specialty);
        self
    }

    pub fn with_specialties(mut self, specialties: impl IntoIterator<Item = Uuid>) -> Self {
        for specialty in specialties {
            self.specialties.insert(specialty);
        }
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn has_specialty(&self, specialty: Uuid) -> bool {
        self.specialties.contains(&specialty)
    }
}

/// A medical specialty (e.g. Emergency Medicine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
}

impl Specialty {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Kind of a staffed interval. Day shifts sort before night shifts on the
/// same date; the snapshot's position order depends on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftKind {
    Day,
    Night,
}

impl ShiftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftKind::Day => "day",
            ShiftKind::Night => "night",
        }
    }
}

/// A shift that needs to be staffed on a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub date: NaiveDate,
    pub kind: ShiftKind,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Per-shift override of the configured minimum staffing.
    pub min_doctors: Option<u32>,
}

impl Shift {
    /// Creates a shift with the default wall-clock times for its kind
    /// (day 07:00-19:00, night 19:00-07:00).
    pub fn new(date: NaiveDate, kind: ShiftKind) -> Self {
        let (start_time, end_time) = match kind {
            ShiftKind::Day => (hms(7, 0), hms(19, 0)),
            ShiftKind::Night => (hms(19, 0), hms(7, 0)),
        };
        Self {
            id: Uuid::new_v4(),
            date,
            kind,
            start_time,
            end_time,
            min_doctors: None,
        }
    }

    pub fn with_min_doctors(mut self, min_doctors: u32) -> Self {
        self.min_doctors = Some(min_doctors);
        self
    }

    pub fn is_day_shift(&self) -> bool {
        self.kind == ShiftKind::Day
    }
}

fn hms(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall-clock time")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Vacation,
    StudyLeave,
    PracticeDevelopment,
    Sick,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// An inclusive date interval of requested leave for one doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveInterval {
    pub id: Uuid,
    pub doctor: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: LeaveKind,
    pub status: LeaveStatus,
}

impl LeaveInterval {
    pub fn new(doctor: Uuid, start_date: NaiveDate, end_date: NaiveDate, kind: LeaveKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor,
            start_date,
            end_date,
            kind,
            status: LeaveStatus::Pending,
        }
    }

    pub fn approved(mut self) -> Self {
        self.status = LeaveStatus::Approved;
        self
    }

    /// Whether this interval overlaps the inclusive `[first_day, last_day]` range.
    pub fn overlaps(&self, first_day: NaiveDate, last_day: NaiveDate) -> bool {
        self.start_date <= last_day && self.end_date >= first_day
    }
}

/// Scalar parameters governing a generation run. At most one configuration
/// is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub id: Uuid,
    pub name: String,
    pub min_shifts_per_doctor: u32,
    pub max_shifts_per_doctor: u32,
    pub max_consecutive_shifts: u32,
    pub min_rest_hours_between_shifts: u32,
    pub max_consecutive_days_off: u32,
    pub avoid_single_day_off: bool,
    pub default_min_doctors_per_shift: u32,
    pub active: bool,
}

impl ScheduleConfig {
    /// Creates a configuration with the standard urgent-care defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            min_shifts_per_doctor: 14,
            max_shifts_per_doctor: 16,
            max_consecutive_shifts: 4,
            min_rest_hours_between_shifts: 12,
            max_consecutive_days_off: 5,
            avoid_single_day_off: true,
            default_min_doctors_per_shift: 2,
            active: false,
        }
    }

    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn with_shift_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_shifts_per_doctor = min;
        self.max_shifts_per_doctor = max;
        self
    }

    pub fn with_max_consecutive_shifts(mut self, max: u32) -> Self {
        self.max_consecutive_shifts = max;
        self
    }

    pub fn with_min_rest_hours(mut self, hours: u32) -> Self {
        self.min_rest_hours_between_shifts = hours;
        self
    }

    pub fn with_max_consecutive_days_off(mut self, days: u32) -> Self {
        self.max_consecutive_days_off = days;
        self
    }

    pub fn with_avoid_single_day_off(mut self, avoid: bool) -> Self {
        self.avoid_single_day_off = avoid;
        self
    }

    pub fn with_default_min_doctors(mut self, min_doctors: u32) -> Self {
        self.default_min_doctors_per_shift = min_doctors;
        self
    }
}

/// Which shifts a staffing requirement applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    All,
    Day,
    Night,
    Weekday,
    Weekend,
}

impl AppliesTo {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliesTo::All => "all",
            AppliesTo::Day => "day",
            AppliesTo::Night => "night",
            AppliesTo::Weekday => "weekday",
            AppliesTo::Weekend => "weekend",
        }
    }
}

/// A minimum specialty mix for the shifts selected by `applies_to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRequirement {
    pub id: Uuid,
    pub configuration: Uuid,
    pub applies_to: AppliesTo,
    pub required_specialty: Option<Uuid>,
    pub min_with_specialty: u32,
    /// Higher priority requirements sort first when loading.
    pub priority: u32,
}

impl ShiftRequirement {
    pub fn new(configuration: Uuid, applies_to: AppliesTo) -> Self {
        Self {
            id: Uuid::new_v4(),
            configuration,
            applies_to,
            required_specialty: None,
            min_with_specialty: 0,
            priority: 10,
        }
    }

    pub fn with_specialty(mut self, specialty: Uuid, min_with_specialty: u32) -> Self {
        self.required_specialty = Some(specialty);
        self.min_with_specialty = min_with_specialty;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Scheduled,
    Manual,
    Swap,
    Extra,
}

/// A confirmed pairing of one doctor to one shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub doctor: Uuid,
    pub shift: Uuid,
    pub kind: AssignmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnderCoverage,
    UnderMinShifts,
    OverMaxShifts,
    TooManyConsecutiveShifts,
    InsufficientRest,
    LeaveBreach,
    UnsatisfiableRequirement,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::UnderCoverage => "under_coverage",
            ViolationKind::UnderMinShifts => "under_min_shifts",
            ViolationKind::OverMaxShifts => "over_max_shifts",
            ViolationKind::TooManyConsecutiveShifts => "too_many_consecutive_shifts",
            ViolationKind::InsufficientRest => "insufficient_rest",
            ViolationKind::LeaveBreach => "leave_breach",
            ViolationKind::UnsatisfiableRequirement => "unsatisfiable_requirement",
        }
    }
}

/// A hard-rule breach detected by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub doctor: Option<Uuid>,
    pub description: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            doctor: None,
            description: description.into(),
        }
    }

    pub fn for_doctor(mut self, doctor: Uuid) -> Self {
        self.doctor = Some(doctor);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    Published,
    Finalized,
}

/// The persisted record for one `(month, year)` roster, including the solver
/// metadata written after each generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: Uuid,
    pub month: u32,
    pub year: i32,
    pub status: ScheduleStatus,
    pub solver_status: Option<crate::solver::SolverStatus>,
    pub solver_time_seconds: Option<f64>,
    pub objective_value: Option<i64>,
    pub generated_at: Option<NaiveDateTime>,
    pub notes: String,
}

impl ScheduleRecord {
    pub fn new(month: u32, year: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            month,
            year,
            status: ScheduleStatus::Draft,
            solver_status: None,
            solver_time_seconds: None,
            objective_value: None,
            generated_at: None,
            notes: String::new(),
        }
    }
}
