//! Error taxonomy for roster generation.
//!
//! Infeasibility is not an error (it is a solver status), and hard-rule
//! breaches in a returned solution are not errors either (the validator
//! records them as violations). Everything here aborts the run.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid period: month {month} year {year} (month must be 1-12, year >= 2024)")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("no active schedule configuration found")]
    NoActiveConfiguration,

    #[error("schedule {0} not found")]
    UnknownSchedule(Uuid),

    #[error("schedule {year}-{month:02} is finalized and cannot be regenerated")]
    ScheduleFinalized { month: u32, year: i32 },

    #[error("persistence failure: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller supplied bad input, as opposed to the run itself
    /// going wrong. Drives the CLI's exit-code split (64 vs 70).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPeriod { .. }
                | Error::NoActiveConfiguration
                | Error::UnknownSchedule(_)
                | Error::ScheduleFinalized { .. }
        )
    }
}
