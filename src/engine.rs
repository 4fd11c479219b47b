//! Reference engine: exact depth-first branch-and-bound over boolean
//! linear models.
//!
//! Implements [`SolverEngine`] so the crate is runnable and testable
//! without an external CP-SAT process. Pruning is by per-constraint
//! interval bounds (fixed prefix plus the free variables' extremes) and by
//! the incumbent objective. Exhausted search proves optimality or
//! infeasibility; hitting the deadline downgrades to FEASIBLE or UNKNOWN.
//!
//! `num_workers` is accepted and ignored: the reference search is
//! single-threaded. Production deployments slot a real engine behind the
//! same trait.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::solver::{CmpOp, SolverEngine, SolverParams, SolverStatus, Var};

const DEADLINE_CHECK_INTERVAL: u64 = 1024;
const PROGRESS_LOG_INTERVAL: u64 = 1 << 20;

struct Constraint {
    terms: Vec<(usize, i64)>,
    op: CmpOp,
    rhs: i64,
}

/// Working bounds of one constraint during search: the sum over fixed
/// variables plus the extremes still reachable through free variables.
#[derive(Clone, Copy)]
struct Bounds {
    fixed: i64,
    free_pos: i64,
    free_neg: i64,
}

impl Bounds {
    fn admits(&self, op: CmpOp, rhs: i64) -> bool {
        let min = self.fixed + self.free_neg;
        let max = self.fixed + self.free_pos;
        match op {
            CmpOp::Le => min <= rhs,
            CmpOp::Ge => max >= rhs,
            CmpOp::Eq => min <= rhs && max >= rhs,
        }
    }
}

/// Exact reference engine for small and mid-size rosters.
#[derive(Default)]
pub struct DfsEngine {
    names: Vec<String>,
    constraints: Vec<Constraint>,
    objective: Vec<i64>,
    best: Option<Vec<bool>>,
    best_objective: i64,
}

impl DfsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn var_count(&self) -> usize {
        self.names.len()
    }
}

impl SolverEngine for DfsEngine {
    fn new_bool_var(&mut self, name: &str) -> Var {
        let index = self.names.len();
        self.names.push(name.to_string());
        self.objective.push(0);
        Var::from_index(index)
    }

    fn add_linear(&mut self, terms: &[(Var, i64)], op: CmpOp, rhs: i64) {
        self.constraints.push(Constraint {
            terms: terms.iter().map(|&(v, w)| (v.index(), w)).collect(),
            op,
            rhs,
        });
    }

    fn add_max_equality(&mut self, target: Var, inputs: &[Var]) {
        if inputs.is_empty() {
            self.add_linear(&[(target, 1)], CmpOp::Eq, 0);
            return;
        }
        // target >= each input, target <= sum of inputs
        for &input in inputs {
            self.add_linear(&[(target, 1), (input, -1)], CmpOp::Ge, 0);
        }
        let mut terms = vec![(target, 1)];
        terms.extend(inputs.iter().map(|&input| (input, -1)));
        self.add_linear(&terms, CmpOp::Le, 0);
    }

    fn maximize(&mut self, terms: &[(Var, i64)]) {
        for weight in self.objective.iter_mut() {
            *weight = 0;
        }
        for &(var, weight) in terms {
            self.objective[var.index()] += weight;
        }
    }

    fn solve(&mut self, params: &SolverParams) -> SolverStatus {
        let deadline = Instant::now() + Duration::from_secs(params.time_limit_seconds);
        self.best = None;
        self.best_objective = i64::MIN;

        let mut search = Search::new(self, deadline, params.log_search_progress);
        if !search.root_feasible() {
            return SolverStatus::Infeasible;
        }
        let exhausted = search.run();
        let (best, best_objective) = search.into_best();
        self.best = best;
        self.best_objective = best_objective;

        match (exhausted, self.best.is_some()) {
            (true, true) => SolverStatus::Optimal,
            (true, false) => SolverStatus::Infeasible,
            (false, true) => SolverStatus::Feasible,
            (false, false) => SolverStatus::Unknown,
        }
    }

    fn value(&self, var: Var) -> bool {
        self.best
            .as_ref()
            .map(|values| values[var.index()])
            .unwrap_or(false)
    }

    fn objective_value(&self) -> i64 {
        if self.best.is_some() {
            self.best_objective
        } else {
            0
        }
    }
}

struct Search<'a> {
    constraints: &'a [Constraint],
    objective: &'a [i64],
    /// Per variable, the constraints it participates in and its weight there.
    var_terms: Vec<Vec<(usize, i64)>>,
    bounds: Vec<Bounds>,
    values: Vec<bool>,
    obj_fixed: i64,
    obj_free_pos: i64,
    best: Option<Vec<bool>>,
    best_objective: i64,
    deadline: Instant,
    nodes: u64,
    log_progress: bool,
}

impl<'a> Search<'a> {
    fn new(engine: &'a DfsEngine, deadline: Instant, log_progress: bool) -> Self {
        let n = engine.var_count();
        let mut var_terms: Vec<Vec<(usize, i64)>> = vec![Vec::new(); n];
        let mut bounds = Vec::with_capacity(engine.constraints.len());
        for (c, constraint) in engine.constraints.iter().enumerate() {
            let mut b = Bounds {
                fixed: 0,
                free_pos: 0,
                free_neg: 0,
            };
            for &(v, w) in &constraint.terms {
                var_terms[v].push((c, w));
                if w >= 0 {
                    b.free_pos += w;
                } else {
                    b.free_neg += w;
                }
            }
            bounds.push(b);
        }
        let obj_free_pos = engine.objective.iter().map(|&w| w.max(0)).sum();

        Self {
            constraints: &engine.constraints,
            objective: &engine.objective,
            var_terms,
            bounds,
            values: vec![false; n],
            obj_fixed: 0,
            obj_free_pos,
            best: None,
            best_objective: i64::MIN,
            deadline,
            nodes: 0,
            log_progress,
        }
    }

    fn root_feasible(&self) -> bool {
        self.bounds
            .iter()
            .zip(self.constraints)
            .all(|(b, c)| b.admits(c.op, c.rhs))
    }

    fn run(&mut self) -> bool {
        self.descend(0)
    }

    fn into_best(self) -> (Option<Vec<bool>>, i64) {
        (self.best, self.best_objective)
    }

    /// Returns false when the deadline cut the search short.
    fn descend(&mut self, var: usize) -> bool {
        self.nodes += 1;
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            return false;
        }
        if self.log_progress && self.nodes % PROGRESS_LOG_INTERVAL == 0 {
            debug!(nodes = self.nodes, incumbent = self.best_objective, "search progress");
        }

        if var == self.values.len() {
            if self.obj_fixed > self.best_objective {
                self.best_objective = self.obj_fixed;
                self.best = Some(self.values.clone());
            }
            return true;
        }

        // An incumbent at least as good as anything below makes the whole
        // subtree irrelevant; skipping it keeps the optimality claim.
        if self.best.is_some() && self.obj_fixed + self.obj_free_pos <= self.best_objective {
            return true;
        }

        let preferred = self.objective[var] >= 0;
        for value in [preferred, !preferred] {
            if self.fix(var, value) {
                if !self.descend(var + 1) {
                    self.unfix(var, value);
                    return false;
                }
            }
            self.unfix(var, value);
        }
        true
    }

    /// Fixes `var` to `value`, tightening every constraint it touches.
    /// Returns false when some touched constraint can no longer be met.
    fn fix(&mut self, var: usize, value: bool) -> bool {
        self.values[var] = value;
        for &(c, w) in &self.var_terms[var] {
            let b = &mut self.bounds[c];
            if value {
                b.fixed += w;
            }
            if w >= 0 {
                b.free_pos -= w;
            } else {
                b.free_neg -= w;
            }
        }
        let weight = self.objective[var];
        if value {
            self.obj_fixed += weight;
        }
        self.obj_free_pos -= weight.max(0);

        self.var_terms[var]
            .iter()
            .all(|&(c, _)| self.bounds[c].admits(self.constraints[c].op, self.constraints[c].rhs))
    }

    fn unfix(&mut self, var: usize, value: bool) {
        for &(c, w) in &self.var_terms[var] {
            let b = &mut self.bounds[c];
            if value {
                b.fixed -= w;
            }
            if w >= 0 {
                b.free_pos += w;
            } else {
                b.free_neg += w;
            }
        }
        let weight = self.objective[var];
        if value {
            self.obj_fixed -= weight;
        }
        self.obj_free_pos += weight.max(0);
        self.values[var] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SolverParams {
        SolverParams::default().with_time_limit(10)
    }

    #[test]
    fn empty_model_is_optimal() {
        let mut engine = DfsEngine::new();
        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert_eq!(engine.objective_value(), 0);
    }

    #[test]
    fn maximizes_within_a_cap() {
        let mut engine = DfsEngine::new();
        let x = engine.new_bool_var("x");
        let y = engine.new_bool_var("y");
        let z = engine.new_bool_var("z");
        engine.add_linear(&[(x, 1), (y, 1), (z, 1)], CmpOp::Le, 2);
        engine.maximize(&[(x, 1), (y, 1), (z, 1)]);

        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert_eq!(engine.objective_value(), 2);
        let set = [x, y, z].iter().filter(|&&v| engine.value(v)).count();
        assert_eq!(set, 2);
    }

    #[test]
    fn contradictory_bounds_are_infeasible() {
        let mut engine = DfsEngine::new();
        let x = engine.new_bool_var("x");
        engine.add_linear(&[(x, 1)], CmpOp::Ge, 1);
        engine.add_linear(&[(x, 1)], CmpOp::Le, 0);

        assert_eq!(engine.solve(&params()), SolverStatus::Infeasible);
        assert_eq!(engine.objective_value(), 0);
    }

    #[test]
    fn unreachable_rhs_is_infeasible_at_the_root() {
        let mut engine = DfsEngine::new();
        let x = engine.new_bool_var("x");
        engine.add_linear(&[(x, 1)], CmpOp::Ge, 2);

        assert_eq!(engine.solve(&params()), SolverStatus::Infeasible);
    }

    #[test]
    fn equality_pins_variables() {
        let mut engine = DfsEngine::new();
        let x = engine.new_bool_var("x");
        let y = engine.new_bool_var("y");
        engine.add_linear(&[(x, 1)], CmpOp::Eq, 0);
        engine.add_linear(&[(x, 1), (y, 1)], CmpOp::Ge, 1);
        engine.maximize(&[(x, 1), (y, 1)]);

        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert!(!engine.value(x));
        assert!(engine.value(y));
    }

    #[test]
    fn max_equality_tracks_its_inputs() {
        let mut engine = DfsEngine::new();
        let a = engine.new_bool_var("a");
        let b = engine.new_bool_var("b");
        let works = engine.new_bool_var("works");
        engine.add_max_equality(works, &[a, b]);
        engine.add_linear(&[(a, 1)], CmpOp::Eq, 1);
        engine.add_linear(&[(b, 1)], CmpOp::Eq, 0);
        // No objective: any satisfying assignment will do.
        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert!(engine.value(works));

        let mut engine = DfsEngine::new();
        let a = engine.new_bool_var("a");
        let works = engine.new_bool_var("works");
        engine.add_max_equality(works, &[a]);
        engine.add_linear(&[(a, 1)], CmpOp::Eq, 0);
        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert!(!engine.value(works));
    }

    #[test]
    fn max_equality_with_no_inputs_is_zero() {
        let mut engine = DfsEngine::new();
        let works = engine.new_bool_var("works");
        engine.add_max_equality(works, &[]);
        engine.maximize(&[(works, 1)]);

        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert!(!engine.value(works));
        assert_eq!(engine.objective_value(), 0);
    }

    #[test]
    fn negative_weights_prefer_zero() {
        let mut engine = DfsEngine::new();
        let x = engine.new_bool_var("x");
        let y = engine.new_bool_var("y");
        engine.add_linear(&[(x, 1), (y, 1)], CmpOp::Ge, 1);
        engine.maximize(&[(x, -1), (y, 2)]);

        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert!(!engine.value(x));
        assert!(engine.value(y));
        assert_eq!(engine.objective_value(), 2);
    }

    #[test]
    fn resolving_resets_prior_state() {
        let mut engine = DfsEngine::new();
        let x = engine.new_bool_var("x");
        engine.maximize(&[(x, 1)]);
        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert_eq!(engine.objective_value(), 1);

        engine.add_linear(&[(x, 1)], CmpOp::Le, 0);
        assert_eq!(engine.solve(&params()), SolverStatus::Optimal);
        assert_eq!(engine.objective_value(), 0);
        assert!(!engine.value(x));
    }
}
