//! Data loader: snapshots the relational source into indexed in-memory
//! arrays for one generation run.
//!
//! Everything downstream (builder, adapter, validator) operates on
//! positions into `doctors` and `shifts`; only the snapshot maps
//! identities to positions. The snapshot is read-only for the remainder
//! of the run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    AppliesTo, Doctor, LeaveStatus, ScheduleConfig, Shift, ShiftKind, ShiftRequirement,
};
use crate::error::Error;
use crate::store::RosterRead;

/// Immutable input bundle for a single generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub month: u32,
    pub year: i32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub configuration: ScheduleConfig,
    /// Requirements of the active configuration, highest priority first.
    pub requirements: Vec<ShiftRequirement>,
    /// Active doctors in the store's order.
    pub doctors: Vec<Doctor>,
    /// Month shifts ordered by `(date, day < night)`.
    pub shifts: Vec<Shift>,
    pub doctor_index: HashMap<Uuid, usize>,
    pub shift_index: HashMap<Uuid, usize>,
    /// Specialty identity to doctor positions, in doctor order.
    pub doctors_by_specialty: HashMap<Uuid, Vec<usize>>,
    /// Doctor identity to the month dates the doctor is unavailable.
    pub leave_dates: HashMap<Uuid, BTreeSet<NaiveDate>>,
}

impl Dataset {
    /// Loads and indexes everything a run needs for `(month, year)`.
    pub fn snapshot(store: &dyn RosterRead, month: u32, year: i32) -> Result<Self, Error> {
        if !(1..=12).contains(&month) || year < 2024 {
            return Err(Error::InvalidPeriod { month, year });
        }

        let configuration = store
            .active_configuration()?
            .ok_or(Error::NoActiveConfiguration)?;

        let (first_day, last_day) = month_bounds(month, year);

        let mut doctors = store.list_active_doctors()?;
        doctors.retain(|d| d.active);

        let mut shifts = store.list_shifts(year, month)?;
        shifts.retain(|s| s.date >= first_day && s.date <= last_day);
        shifts.sort_by_key(|s| (s.date, s.kind));

        let mut requirements = store.shift_requirements(configuration.id)?;
        requirements.sort_by_key(|r| std::cmp::Reverse(r.priority));

        let mut leave_dates: HashMap<Uuid, BTreeSet<NaiveDate>> = HashMap::new();
        for interval in store.list_approved_leave(first_day, last_day)? {
            if interval.status != LeaveStatus::Approved
                || !interval.overlaps(first_day, last_day)
            {
                continue;
            }
            let mut current = interval.start_date.max(first_day);
            let end = interval.end_date.min(last_day);
            while current <= end {
                leave_dates.entry(interval.doctor).or_default().insert(current);
                current = current.succ_opt().expect("date within calendar range");
            }
        }

        let doctor_index = doctors.iter().enumerate().map(|(i, d)| (d.id, i)).collect();
        let shift_index = shifts.iter().enumerate().map(|(i, s)| (s.id, i)).collect();

        let mut doctors_by_specialty: HashMap<Uuid, Vec<usize>> = HashMap::new();
        for (i, doctor) in doctors.iter().enumerate() {
            for &specialty in &doctor.specialties {
                doctors_by_specialty.entry(specialty).or_default().push(i);
            }
        }

        info!(
            year,
            month,
            doctors = doctors.len(),
            shifts = shifts.len(),
            requirements = requirements.len(),
            doctors_on_leave = leave_dates.len(),
            "snapshot loaded"
        );

        Ok(Self {
            month,
            year,
            first_day,
            last_day,
            configuration,
            requirements,
            doctors,
            shifts,
            doctor_index,
            shift_index,
            doctors_by_specialty,
            leave_dates,
        })
    }

    pub fn doctor_count(&self) -> usize {
        self.doctors.len()
    }

    pub fn shift_count(&self) -> usize {
        self.shifts.len()
    }

    /// Minimum staffing for the shift at position `s`: the per-shift
    /// override, or the configured default.
    pub fn min_doctors_for(&self, s: usize) -> u32 {
        self.shifts[s]
            .min_doctors
            .unwrap_or(self.configuration.default_min_doctors_per_shift)
    }

    pub fn is_doctor_on_leave(&self, doctor: Uuid, shift: &Shift) -> bool {
        self.leave_dates
            .get(&doctor)
            .is_some_and(|dates| dates.contains(&shift.date))
    }

    /// Shift positions grouped by date, dates ascending.
    pub fn daily_shifts(&self) -> BTreeMap<NaiveDate, Vec<usize>> {
        let mut daily: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (s, shift) in self.shifts.iter().enumerate() {
            daily.entry(shift.date).or_default().push(s);
        }
        daily
    }

    pub fn requirement_matches(&self, shift: &Shift, requirement: &ShiftRequirement) -> bool {
        match requirement.applies_to {
            AppliesTo::All => true,
            AppliesTo::Day => shift.kind == ShiftKind::Day,
            AppliesTo::Night => shift.kind == ShiftKind::Night,
            AppliesTo::Weekday => shift.date.weekday().num_days_from_monday() < 5,
            AppliesTo::Weekend => shift.date.weekday().num_days_from_monday() >= 5,
        }
    }

    pub fn requirements_for_shift<'a>(
        &'a self,
        shift: &'a Shift,
    ) -> impl Iterator<Item = &'a ShiftRequirement> {
        self.requirements
            .iter()
            .filter(move |r| self.requirement_matches(shift, r))
    }
}

/// First and last calendar day of the month, accounting for the December
/// roll-over. Callers validate the period first.
fn month_bounds(month: u32, year: i32) -> (NaiveDate, NaiveDate) {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1).expect("validated period");
    let last_day = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31).expect("validated period")
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
            .and_then(|d| d.pred_opt())
            .expect("validated period")
    };
    (first_day, last_day)
}
