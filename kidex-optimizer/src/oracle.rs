//! Solver-neutral linear models and the oracle that solves them.
//!
//! The sequencer never talks to a solver library directly: it builds a
//! [`LinearModel`], hands it to a [`SolverOracle`] and reads back a
//! [`SolveOutcome`].

use std::time::Duration;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VariableSpec {
    pub lower: f64,
    pub upper: f64,
    pub kind: VarKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    Eq,
    GreaterEq,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sense {
    Maximize,
    Minimize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    /// Zero coefficients are dropped so that they never count as non-zeros.
    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coefficient)| coefficient * values.get(var.0).copied().unwrap_or(0.0))
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinearConstraint {
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn is_satisfied_by(&self, lhs: f64, tolerance: f64) -> bool {
        match self.relation {
            Relation::LessEq => lhs <= self.rhs + tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
            Relation::GreaterEq => lhs >= self.rhs - tolerance,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LinearModel {
    variables: Vec<VariableSpec>,
    constraints: Vec<Option<LinearConstraint>>,
    objective: LinearExpr,
    sense: Sense,
    time_limit: Option<Duration>,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearModel {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: LinearExpr::default(),
            sense: Sense::Maximize,
            time_limit: None,
        }
    }

    pub fn create_variable(&mut self, lower: f64, upper: f64, kind: VarKind) -> VarId {
        self.variables.push(VariableSpec { lower, upper, kind });
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) -> ConstraintId {
        self.constraints.push(Some(LinearConstraint {
            expr,
            relation,
            rhs,
        }));
        ConstraintId(self.constraints.len() - 1)
    }

    /// Removes a constraint; ids of the remaining constraints stay valid.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<LinearConstraint> {
        self.constraints.get_mut(id.0).and_then(Option::take)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&LinearConstraint> {
        self.constraints.get(id.0).and_then(Option::as_ref)
    }

    pub fn set_objective(&mut self, expr: LinearExpr, sense: Sense) {
        self.objective = expr;
        self.sense = sense;
    }

    pub fn set_time_limit(&mut self, limit: Duration) {
        self.time_limit = Some(limit);
    }

    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    pub fn constraints(&self) -> impl Iterator<Item = &LinearConstraint> + '_ {
        self.constraints.iter().flatten()
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints().count()
    }

    pub fn num_nonzeros(&self) -> usize {
        self.constraints()
            .map(|constraint| constraint.expr.terms().len())
            .sum()
    }

    /// True when no variable is integral.
    pub fn is_relaxation(&self) -> bool {
        self.variables
            .iter()
            .all(|spec| spec.kind == VarKind::Continuous)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    /// Stopped on the time limit with a feasible incumbent.
    TimeLimit,
    Infeasible,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective_value: f64,
    pub objective_bound: Option<f64>,
    pub values: Vec<f64>,
    /// Per-variable reduced costs; only relaxations report them.
    pub reduced_costs: Option<Vec<f64>>,
}

impl SolveOutcome {
    pub fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            objective_value: 0.0,
            objective_bound: None,
            values: Vec::new(),
            reduced_costs: None,
        }
    }

    pub fn has_solution(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::TimeLimit)
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }

    pub fn reduced_cost(&self, var: VarId) -> Option<f64> {
        self.reduced_costs
            .as_ref()
            .and_then(|costs| costs.get(var.0).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("Solver backend failed: {0}")]
    Backend(String),
    #[error("Solver returned an unbounded model")]
    Unbounded,
    #[error("Solver stopped on the time limit without a feasible solution")]
    TimeLimitWithoutSolution,
}

/// Something that can solve a [`LinearModel`] to optimality.
///
/// Infeasibility is an ordinary outcome, not an error: errors are reserved
/// for the backend failing to produce an answer at all.
pub trait SolverOracle {
    fn solve(&mut self, model: &LinearModel) -> Result<SolveOutcome, OracleError>;
}

impl<F> SolverOracle for F
where
    F: FnMut(&LinearModel) -> Result<SolveOutcome, OracleError>,
{
    fn solve(&mut self, model: &LinearModel) -> Result<SolveOutcome, OracleError> {
        self(model)
    }
}
