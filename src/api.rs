//! Entry points for roster generation and re-validation.
//!
//! `generate` runs the full pipeline (snapshot, model, solve, validate,
//! save) for one month; `validate` re-runs the validator against an
//! already persisted schedule. Both are synchronous; dispatching them
//! from a task queue is the caller's concern.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::domain::{ScheduleStatus, Violation};
use crate::error::Error;
use crate::solver::{ScheduleSolver, SolverEngine, SolverParams, SolverStatus};
use crate::store::RosterStore;
use crate::validator::SolutionValidator;

/// Summary of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub schedule_id: Uuid,
    pub solver_status: SolverStatus,
    pub solver_time_seconds: f64,
    pub assignment_count: usize,
    pub objective_value: Option<i64>,
    pub violation_count: usize,
    pub generated_at: NaiveDateTime,
}

impl GenerationReport {
    pub fn is_feasible(&self) -> bool {
        self.solver_status.is_feasible()
    }
}

/// Summary of one re-validation run.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub schedule_id: Uuid,
    pub violation_count: usize,
    pub violations: Vec<Violation>,
}

/// Generates the roster for `(month, year)` and persists the outcome.
///
/// Fails without side effects on invalid input, a missing active
/// configuration, or an already finalized schedule. An infeasible solve is
/// not a failure: the schedule record keeps the engine status and a note.
pub fn generate<S, E>(
    store: &S,
    engine: E,
    month: u32,
    year: i32,
    timeout_seconds: u64,
) -> Result<GenerationReport, Error>
where
    S: RosterStore,
    E: SolverEngine,
{
    let data = Dataset::snapshot(store, month, year)?;

    if let Some(existing) = store.schedule_for_month(month, year)? {
        if existing.status == ScheduleStatus::Finalized {
            return Err(Error::ScheduleFinalized { month, year });
        }
    }

    let params = SolverParams::default().with_time_limit(timeout_seconds);
    let solution = ScheduleSolver::new(&data, engine).with_params(params).solve();

    let mut validator = SolutionValidator::new(&solution, &data);
    let schedule_id = validator.save(store)?;

    let report = GenerationReport {
        schedule_id,
        solver_status: solution.status,
        solver_time_seconds: solution.solver_time_seconds,
        assignment_count: solution.assignments.len(),
        objective_value: solution.objective_value,
        violation_count: validator.violations().len(),
        generated_at: Local::now().naive_local(),
    };
    info!(
        schedule = %report.schedule_id,
        status = report.solver_status.as_str(),
        assignments = report.assignment_count,
        violations = report.violation_count,
        "generation run complete"
    );
    Ok(report)
}

/// Re-checks an existing schedule against the hard rules, replacing its
/// stored violations. Useful after manual roster edits.
pub fn validate<S: RosterStore>(store: &S, schedule_id: Uuid) -> Result<ValidationReport, Error> {
    let record = store
        .schedule_by_id(schedule_id)?
        .ok_or(Error::UnknownSchedule(schedule_id))?;

    let data = Dataset::snapshot(store, record.month, record.year)?;

    let rows = store.assignments_for(schedule_id)?;
    let mut assignments = Vec::with_capacity(rows.len());
    for row in &rows {
        let d = data.doctor_index.get(&row.doctor).copied().ok_or_else(|| {
            Error::Internal(format!(
                "assignment references doctor {} outside the snapshot",
                row.doctor
            ))
        })?;
        let s = data.shift_index.get(&row.shift).copied().ok_or_else(|| {
            Error::Internal(format!(
                "assignment references shift {} outside the snapshot",
                row.shift
            ))
        })?;
        assignments.push((d, s));
    }

    let solution = crate::solver::ScheduleSolution {
        status: SolverStatus::Feasible,
        objective_value: Some(assignments.len() as i64),
        assignments,
        solver_time_seconds: 0.0,
    };

    let mut validator = SolutionValidator::new(&solution, &data);
    let violations = validator.detect_violations().to_vec();

    store.transaction(&mut |tx| {
        tx.delete_violations(schedule_id)?;
        tx.insert_violations(schedule_id, &violations)?;
        Ok(())
    })?;

    info!(
        schedule = %schedule_id,
        violations = violations.len(),
        "validation complete"
    );
    Ok(ValidationReport {
        schedule_id,
        violation_count: violations.len(),
        violations,
    })
}
