//! Solver adapter: the minimal surface the roster core needs from any
//! CP-SAT style engine, plus the run orchestration around it.
//!
//! The adapter owns all engine vocabulary (variables, linear constraints,
//! status values); the builder and validator stay engine-agnostic. Any
//! backend implementing [`SolverEngine`] can be slotted in; the crate ships
//! [`crate::engine::DfsEngine`] as the reference implementation.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constraints::ConstraintBuilder;
use crate::dataset::Dataset;

/// Handle to a boolean decision variable. Valid only for the engine that
/// created it, and only within the run that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    pub fn from_index(index: usize) -> Self {
        Var(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Comparison operator of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Le,
    Ge,
    Eq,
}

/// Engine status after a solve call. Closed set; `as_str` yields the
/// canonical upper-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStatus::Optimal => "OPTIMAL",
            SolverStatus::Feasible => "FEASIBLE",
            SolverStatus::Infeasible => "INFEASIBLE",
            SolverStatus::Unknown => "UNKNOWN",
        }
    }

    /// Whether a usable assignment was found.
    pub fn is_feasible(&self) -> bool {
        matches!(self, SolverStatus::Optimal | SolverStatus::Feasible)
    }
}

/// Engine parameters for one solve call.
#[derive(Debug, Clone, Copy)]
pub struct SolverParams {
    pub time_limit_seconds: u64,
    pub num_workers: usize,
    pub log_search_progress: bool,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            time_limit_seconds: 300,
            num_workers: 8,
            log_search_progress: false,
        }
    }
}

impl SolverParams {
    pub fn with_time_limit(mut self, seconds: u64) -> Self {
        self.time_limit_seconds = seconds;
        self
    }
}

/// The minimal engine surface: boolean variables, linear constraints over
/// them, a max-equality primitive (engines without one may desugar it),
/// a linear maximization objective, and value readout after solving.
pub trait SolverEngine {
    fn new_bool_var(&mut self, name: &str) -> Var;

    fn add_linear(&mut self, terms: &[(Var, i64)], op: CmpOp, rhs: i64);

    fn add_max_equality(&mut self, target: Var, inputs: &[Var]);

    fn maximize(&mut self, terms: &[(Var, i64)]);

    fn solve(&mut self, params: &SolverParams) -> SolverStatus;

    /// Value of `var` in the best solution found. Meaningful only after a
    /// solve that returned a feasible status.
    fn value(&self, var: Var) -> bool;

    fn objective_value(&self) -> i64;
}

/// Dense doctor-by-shift grid of decision variables: `var(d, s) = 1` iff
/// doctor `d` works shift `s`.
pub struct DecisionMatrix {
    vars: Vec<Var>,
    doctor_count: usize,
    shift_count: usize,
}

impl DecisionMatrix {
    /// Allocates one boolean per `(doctor, shift)` pair, doctor-major.
    pub fn build(engine: &mut impl SolverEngine, doctor_count: usize, shift_count: usize) -> Self {
        let mut vars = Vec::with_capacity(doctor_count * shift_count);
        for d in 0..doctor_count {
            for s in 0..shift_count {
                vars.push(engine.new_bool_var(&format!("x_d{d}_s{s}")));
            }
        }
        Self {
            vars,
            doctor_count,
            shift_count,
        }
    }

    pub fn var(&self, doctor: usize, shift: usize) -> Var {
        self.vars[doctor * self.shift_count + shift]
    }

    pub fn doctor_count(&self) -> usize {
        self.doctor_count
    }

    pub fn shift_count(&self) -> usize {
        self.shift_count
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Raw solve result: status, `(doctor position, shift position)` pairs for
/// every set variable, and run metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSolution {
    pub status: SolverStatus,
    pub assignments: Vec<(usize, usize)>,
    pub solver_time_seconds: f64,
    pub objective_value: Option<i64>,
}

impl ScheduleSolution {
    pub fn is_feasible(&self) -> bool {
        self.status.is_feasible()
    }
}

type ObjectiveHook<'a> = Box<dyn Fn(&Dataset, &DecisionMatrix) -> Vec<(Var, i64)> + 'a>;

/// Orchestrates one generation run against an engine: decision variables,
/// hard constraints, objective, solve, extraction.
pub struct ScheduleSolver<'a, E: SolverEngine> {
    data: &'a Dataset,
    engine: E,
    params: SolverParams,
    extra_objective: Option<ObjectiveHook<'a>>,
}

impl<'a, E: SolverEngine> ScheduleSolver<'a, E> {
    pub fn new(data: &'a Dataset, engine: E) -> Self {
        Self {
            data,
            engine,
            params: SolverParams::default(),
            extra_objective: None,
        }
    }

    pub fn with_params(mut self, params: SolverParams) -> Self {
        self.params = params;
        self
    }

    /// Hook for additional weighted objective terms. The default objective
    /// is pure coverage maximization; none are defined here.
    pub fn with_extra_objective<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Dataset, &DecisionMatrix) -> Vec<(Var, i64)> + 'a,
    {
        self.extra_objective = Some(Box::new(hook));
        self
    }

    pub fn solve(mut self) -> ScheduleSolution {
        info!(
            doctors = self.data.doctor_count(),
            shifts = self.data.shift_count(),
            time_limit_seconds = self.params.time_limit_seconds,
            configuration = %self.data.configuration.name,
            "starting schedule generation"
        );
        let started = Instant::now();

        let matrix = DecisionMatrix::build(
            &mut self.engine,
            self.data.doctor_count(),
            self.data.shift_count(),
        );
        debug!(variables = matrix.len(), "created decision variables");

        let mut builder = ConstraintBuilder::new(&mut self.engine, self.data, &matrix);
        builder.build_all_hard_constraints();

        let mut objective = builder.coverage_objective_terms();
        if let Some(hook) = &self.extra_objective {
            objective.extend(hook(self.data, &matrix));
        }
        self.engine.maximize(&objective);

        let status = self.engine.solve(&self.params);
        let solver_time_seconds = started.elapsed().as_secs_f64();
        info!(status = status.as_str(), seconds = solver_time_seconds, "solver finished");

        if status.is_feasible() {
            let assignments = self.extract_assignments(&matrix);
            let objective_value = self.engine.objective_value();
            info!(
                assignments = assignments.len(),
                objective = objective_value,
                "solution extracted"
            );
            self.log_coverage_summary(&assignments);

            ScheduleSolution {
                status,
                assignments,
                solver_time_seconds,
                objective_value: Some(objective_value),
            }
        } else {
            warn!("no feasible solution found");
            warn!(
                "possible causes: too many doctors on leave, too-restrictive \
                 shift pattern constraints, not enough active doctors, or \
                 unsatisfiable skill mix requirements"
            );

            ScheduleSolution {
                status,
                assignments: Vec::new(),
                solver_time_seconds,
                objective_value: None,
            }
        }
    }

    fn extract_assignments(&self, matrix: &DecisionMatrix) -> Vec<(usize, usize)> {
        let mut assignments = Vec::new();
        for d in 0..matrix.doctor_count() {
            for s in 0..matrix.shift_count() {
                if self.engine.value(matrix.var(d, s)) {
                    assignments.push((d, s));
                }
            }
        }
        assignments
    }

    fn log_coverage_summary(&self, assignments: &[(usize, usize)]) {
        let mut coverage = vec![0u32; self.data.shift_count()];
        for &(_, s) in assignments {
            coverage[s] += 1;
        }

        let mut under_covered = 0usize;
        for (s, shift) in self.data.shifts.iter().enumerate() {
            let required = self.data.min_doctors_for(s);
            if coverage[s] < required {
                under_covered += 1;
                debug!(
                    date = %shift.date,
                    kind = shift.kind.as_str(),
                    actual = coverage[s],
                    required,
                    "shift under-covered"
                );
            }
        }
        if under_covered > 0 {
            warn!(shifts = under_covered, "some shifts are under-covered");
        } else {
            debug!("all shifts meet minimum coverage");
        }

        let mut per_doctor = vec![0u32; self.data.doctor_count()];
        for &(d, _) in assignments {
            per_doctor[d] += 1;
        }
        if let (Some(min), Some(max)) = (per_doctor.iter().min(), per_doctor.iter().max()) {
            debug!(min_shifts = min, max_shifts = max, "doctor workload range");
        }
    }
}
