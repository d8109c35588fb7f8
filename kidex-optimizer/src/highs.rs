use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    solvers::{DualValues, SolutionStatus, SolutionWithDual, highs::highs},
    variable,
};

use crate::oracle::{
    LinearConstraint, LinearExpr, LinearModel, OracleError, Relation, Sense, SolveOutcome,
    SolveStatus, SolverOracle, VarKind,
};

const ROW_TOLERANCE: f64 = 1e-9;
// good_lp's HiGHS backend reports a run that stopped without a primal
// solution with this message.
const NO_SOLUTION_FOUND: &str = "NoSolutionFound";

/// [`SolverOracle`] backed by HiGHS through `good_lp`.
///
/// MIPs are solved with a zero relative gap so that reported objective
/// values are exact.
#[derive(Debug, Default, Clone, Copy)]
pub struct HighsOracle;

impl HighsOracle {
    pub fn new() -> Self {
        Self
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut expression = Expression::with_capacity(expr.terms().len());
    for &(var, coefficient) in expr.terms() {
        expression.add_mul(coefficient, handles[var.index()]);
    }
    expression
}

fn to_constraint(constraint: &LinearConstraint, handles: &[Variable]) -> Constraint {
    let expression = to_expression(&constraint.expr, handles);
    match constraint.relation {
        Relation::LessEq => expression.leq(constraint.rhs),
        Relation::Eq => expression.eq(constraint.rhs),
        Relation::GreaterEq => expression.geq(constraint.rhs),
    }
}

// Rows without terms never reach HiGHS: they are either trivially true or
// make the whole model infeasible.
fn empty_rows_feasible(model: &LinearModel) -> bool {
    model
        .constraints()
        .filter(|constraint| constraint.expr.is_empty())
        .all(|constraint| constraint.is_satisfied_by(0.0, ROW_TOLERANCE))
}

fn trivial_outcome(model: &LinearModel) -> SolveOutcome {
    SolveOutcome {
        status: SolveStatus::Optimal,
        objective_value: 0.0,
        objective_bound: Some(0.0),
        values: Vec::new(),
        reduced_costs: model.is_relaxation().then(Vec::new),
    }
}

fn resolution_failure(
    err: ResolutionError,
    time_limited: bool,
) -> Result<SolveOutcome, OracleError> {
    match err {
        ResolutionError::Infeasible => Ok(SolveOutcome::infeasible()),
        ResolutionError::Unbounded => Err(OracleError::Unbounded),
        ResolutionError::Other(reason) if time_limited && reason == NO_SOLUTION_FOUND => {
            Err(OracleError::TimeLimitWithoutSolution)
        }
        err => Err(OracleError::Backend(err.to_string())),
    }
}

impl SolverOracle for HighsOracle {
    fn solve(&mut self, model: &LinearModel) -> Result<SolveOutcome, OracleError> {
        if !empty_rows_feasible(model) {
            return Ok(SolveOutcome::infeasible());
        }
        if model.num_variables() == 0 {
            return Ok(trivial_outcome(model));
        }

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .variables()
            .iter()
            .map(|spec| {
                let definition = variable().min(spec.lower).max(spec.upper);
                match spec.kind {
                    VarKind::Binary => vars.add(definition.integer()),
                    VarKind::Continuous => vars.add(definition),
                }
            })
            .collect();

        let objective = to_expression(model.objective(), &handles);
        let unsolved = match model.sense() {
            Sense::Maximize => vars.maximise(objective),
            Sense::Minimize => vars.minimise(objective),
        };
        let mut problem = unsolved.using(highs).set_option("mip_rel_gap", 0.0);
        if let Some(limit) = model.time_limit() {
            problem = problem.set_time_limit(limit.as_secs_f64());
        }

        let mut rows = Vec::with_capacity(model.num_constraints());
        for constraint in model.constraints().filter(|c| !c.expr.is_empty()) {
            let reference = problem.add_constraint(to_constraint(constraint, &handles));
            rows.push((reference, constraint));
        }

        let mut solution = match problem.solve() {
            Ok(solution) => solution,
            Err(err) => return resolution_failure(err, model.time_limit().is_some()),
        };

        let status = match solution.status() {
            SolutionStatus::Optimal => SolveStatus::Optimal,
            _ => SolveStatus::TimeLimit,
        };
        let values: Vec<f64> = handles.iter().map(|&handle| solution.value(handle)).collect();
        let objective_value = model.objective().evaluate(&values);
        let objective_bound = (status == SolveStatus::Optimal).then_some(objective_value);

        let reduced_costs = if model.is_relaxation() {
            let duals = solution.compute_dual();
            let mut costs = vec![0.0; handles.len()];
            for &(var, coefficient) in model.objective().terms() {
                costs[var.index()] += coefficient;
            }
            for (reference, constraint) in &rows {
                let dual = duals.dual(*reference);
                for &(var, coefficient) in constraint.expr.terms() {
                    costs[var.index()] -= coefficient * dual;
                }
            }
            Some(costs)
        } else {
            None
        };

        Ok(SolveOutcome {
            status,
            objective_value,
            objective_bound,
            values,
            reduced_costs,
        })
    }
}
