//! Demo fixture generators seeding a [`MemoryStore`] for one month.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{
    AppliesTo, Doctor, LeaveInterval, LeaveKind, ScheduleConfig, Shift, ShiftKind,
    ShiftRequirement, Specialty,
};
use crate::store::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    /// Loose staffing rules; small enough for the reference engine to
    /// solve a whole month quickly.
    Small,
    /// The production-like configuration (14-16 shifts per doctor, two per
    /// shift). Sized for a real CP-SAT backend.
    Standard,
}

impl std::str::FromStr for DemoData {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "STANDARD" => Ok(DemoData::Standard),
            other => Err(format!("unknown demo data set: {other}")),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Standard => "STANDARD",
        }
    }
}

const DOCTOR_NAMES: &[&str] = &[
    "Dr. Sarah Johnson",
    "Dr. Michael Chen",
    "Dr. Emily Rodriguez",
    "Dr. James Wilson",
    "Dr. Anna Kim",
    "Dr. David Brown",
    "Dr. Lisa Martinez",
    "Dr. Robert Taylor",
    "Dr. Jennifer Lee",
    "Dr. Thomas Anderson",
];

/// Seeds `store` with a complete fixture for `(month, year)`: specialties,
/// doctors, an active configuration with a weekend requirement, day and
/// night shifts for every calendar day, and a little approved leave.
/// Deterministic for a given fixture and month.
pub fn seed(store: &MemoryStore, demo: DemoData, month: u32, year: i32) {
    let mut rng = StdRng::seed_from_u64(0);

    let emergency = store.add_specialty(Specialty::new("Emergency Medicine"));
    let general = store.add_specialty(Specialty::new("General Practice"));
    let urgent = store.add_specialty(Specialty::new("Urgent Care Physician"));
    let rotation = [
        vec![emergency, urgent],
        vec![general, urgent],
        vec![emergency],
        vec![general],
        vec![urgent],
    ];

    let doctor_count = match demo {
        DemoData::Small => 4,
        DemoData::Standard => DOCTOR_NAMES.len(),
    };
    let mut doctors = Vec::with_capacity(doctor_count);
    for (i, name) in DOCTOR_NAMES.iter().take(doctor_count).enumerate() {
        let specialties = rotation[i % rotation.len()].clone();
        doctors.push(store.add_doctor(Doctor::new(*name).with_specialties(specialties)));
    }

    let configuration = match demo {
        DemoData::Small => ScheduleConfig::new("Demo Configuration")
            .activated()
            .with_shift_bounds(1, 62)
            .with_max_consecutive_shifts(5)
            .with_max_consecutive_days_off(5)
            .with_default_min_doctors(1),
        DemoData::Standard => ScheduleConfig::new("Default Configuration").activated(),
    };
    let configuration_id = store.add_configuration(configuration);

    store.add_requirement(
        ShiftRequirement::new(configuration_id, AppliesTo::Weekend)
            .with_specialty(urgent, 1)
            .with_priority(90),
    );

    let min_doctors = match demo {
        DemoData::Small => 1,
        DemoData::Standard => 2,
    };
    let first_day = NaiveDate::from_ymd_opt(year, month, 1).expect("valid demo period");
    let mut date = first_day;
    while date.month() == month {
        store.add_shift(Shift::new(date, ShiftKind::Day).with_min_doctors(min_doctors));
        store.add_shift(Shift::new(date, ShiftKind::Night).with_min_doctors(min_doctors));
        date = date.succ_opt().expect("date within calendar range");
    }

    // A couple of short approved leave blocks mid-month.
    for &doctor in doctors.iter().skip(1).take(2) {
        let start_day = rng.gen_range(5..=20);
        let length = rng.gen_range(2..=4);
        let start = NaiveDate::from_ymd_opt(year, month, start_day).expect("valid demo period");
        let end = start + chrono::Duration::days(length - 1);
        store.add_leave(LeaveInterval::new(doctor, start, end, LeaveKind::Vacation).approved());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use chrono::Datelike;

    #[test]
    fn small_fixture_snapshots_cleanly() {
        let store = MemoryStore::new();
        seed(&store, DemoData::Small, 6, 2025);

        let data = Dataset::snapshot(&store, 6, 2025).unwrap();
        assert_eq!(data.doctor_count(), 4);
        assert_eq!(data.shift_count(), 60);
        assert_eq!(data.configuration.name, "Demo Configuration");
        assert_eq!(data.requirements.len(), 1);
        for dates in data.leave_dates.values() {
            assert!(dates.iter().all(|d| d.month() == 6));
        }
    }

    #[test]
    fn standard_fixture_uses_the_production_rules() {
        let store = MemoryStore::new();
        seed(&store, DemoData::Standard, 7, 2025);

        let data = Dataset::snapshot(&store, 7, 2025).unwrap();
        assert_eq!(data.doctor_count(), 10);
        assert_eq!(data.shift_count(), 62);
        assert_eq!(data.configuration.min_shifts_per_doctor, 14);
        assert_eq!(data.configuration.max_shifts_per_doctor, 16);
        assert_eq!(data.min_doctors_for(0), 2);
    }

    #[test]
    fn fixture_names_parse_back() {
        assert_eq!("small".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("STANDARD".parse::<DemoData>(), Ok(DemoData::Standard));
        assert!("huge".parse::<DemoData>().is_err());
    }
}
