//! Monthly physician roster generation.
//!
//! Encodes a staffing problem as a boolean decision matrix with hard
//! constraints, delegates search to a CP-SAT style engine behind a minimal
//! adapter trait, and independently re-validates the returned assignment
//! against the same rules before persisting it.

pub mod api;
pub mod constraints;
pub mod dataset;
pub mod demo_data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod solver;
pub mod store;
pub mod validator;
