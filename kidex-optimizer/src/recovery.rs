//! Final-pass fallback for when the fixed value of an earlier objective,
//! combined with everything fixed after it, leaves no integer solution.

use crate::deadline::Deadline;
use crate::oracle::{
    ConstraintId, LinearModel, OracleError, Relation, Sense, SolveOutcome, SolverOracle,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Feasible again once the objective was held to `relaxed`.
    Recovered { relaxed: i64 },
    /// Infeasible even without the suspect equality.
    Structural,
    /// Every looser value was tried without success.
    Exhausted,
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Position of the relaxed objective in the plan.
    pub objective: usize,
    pub fixed: i64,
    pub outcome: RecoveryOutcome,
}

/// The equality row suspected of causing infeasibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Suspect {
    pub objective: usize,
    pub row: ConstraintId,
    pub fixed: i64,
    pub sense: Sense,
}

enum Attempt {
    Solved(SolveOutcome),
    Infeasible,
    OutOfTime,
}

pub struct InfeasibilityRecovery {
    deadline: Deadline,
}

impl InfeasibilityRecovery {
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline }
    }

    /// Replaces the suspect equality by progressively looser ones until the
    /// model solves. On success the model keeps the loosened row and the
    /// solution is returned alongside the report.
    pub fn recover(
        &self,
        model: &mut LinearModel,
        suspect: Suspect,
        oracle: &mut impl SolverOracle,
    ) -> (RecoveryReport, Option<SolveOutcome>) {
        let report = |outcome| RecoveryReport {
            objective: suspect.objective,
            fixed: suspect.fixed,
            outcome,
        };

        let Some(removed) = model.remove_constraint(suspect.row) else {
            return (report(RecoveryOutcome::Structural), None);
        };
        tracing::info!(
            objective = suspect.objective,
            fixed = suspect.fixed,
            "final pass infeasible, re-solving without fixed objective"
        );

        let free = match self.attempt(model, oracle) {
            Attempt::Solved(outcome) => outcome,
            Attempt::Infeasible => {
                tracing::warn!("model stays infeasible without the fixed objective");
                return (report(RecoveryOutcome::Structural), None);
            }
            Attempt::OutOfTime => return (report(RecoveryOutcome::TimedOut), None),
        };
        let free_value = removed.expr.evaluate(&free.values).round() as i64;

        let steps: Vec<i64> = match suspect.sense {
            Sense::Maximize => (0..suspect.fixed).rev().collect(),
            Sense::Minimize => (suspect.fixed + 1..=free_value).collect(),
        };
        for relaxed in steps {
            let row = model.add_constraint(removed.expr.clone(), Relation::Eq, relaxed as f64);
            match self.attempt(model, oracle) {
                Attempt::Solved(outcome) => {
                    tracing::info!(
                        objective = suspect.objective,
                        fixed = suspect.fixed,
                        relaxed,
                        "recovered feasibility"
                    );
                    return (report(RecoveryOutcome::Recovered { relaxed }), Some(outcome));
                }
                Attempt::Infeasible => {
                    tracing::debug!(relaxed, "relaxed value still infeasible");
                    model.remove_constraint(row);
                }
                Attempt::OutOfTime => {
                    tracing::warn!(relaxed, "time limit reached during recovery");
                    return (report(RecoveryOutcome::TimedOut), None);
                }
            }
        }

        tracing::warn!(
            objective = suspect.objective,
            free_value,
            "no relaxed value restores feasibility"
        );
        (report(RecoveryOutcome::Exhausted), None)
    }

    fn attempt(&self, model: &mut LinearModel, oracle: &mut impl SolverOracle) -> Attempt {
        let Some(remaining) = self.deadline.remaining() else {
            return Attempt::OutOfTime;
        };
        model.set_time_limit(remaining);
        match oracle.solve(model) {
            Ok(outcome) if outcome.has_solution() => Attempt::Solved(outcome),
            Ok(_) => Attempt::Infeasible,
            Err(OracleError::TimeLimitWithoutSolution) => Attempt::OutOfTime,
            Err(err) => {
                tracing::warn!(error = %err, "solver error during recovery");
                Attempt::Infeasible
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{LinearExpr, SolveStatus, VarKind};
    use std::time::Duration;

    // Three binaries with the suspect row `x0 + x1 + x2 = fixed`.
    fn model_with_suspect(fixed: i64) -> (LinearModel, ConstraintId) {
        let mut model = LinearModel::new();
        let mut expr = LinearExpr::default();
        for _ in 0..3 {
            let var = model.create_variable(0.0, 1.0, VarKind::Binary);
            expr.add_term(var, 1.0);
        }
        let row = model.add_constraint(expr, Relation::Eq, fixed as f64);
        (model, row)
    }

    fn suspect(row: ConstraintId, fixed: i64, sense: Sense) -> Suspect {
        Suspect {
            objective: 0,
            row,
            fixed,
            sense,
        }
    }

    fn solved(values: Vec<f64>) -> SolveOutcome {
        SolveOutcome {
            status: SolveStatus::Optimal,
            objective_value: 0.0,
            objective_bound: Some(0.0),
            values,
            reduced_costs: None,
        }
    }

    // Feasible exactly when every equality row satisfies `accept`.
    fn oracle(
        accept: impl Fn(f64) -> bool,
    ) -> impl FnMut(&LinearModel) -> Result<SolveOutcome, OracleError> {
        move |model: &LinearModel| {
            let feasible = model
                .constraints()
                .filter(|row| row.relation == Relation::Eq)
                .all(|row| accept(row.rhs));
            Ok(if feasible {
                solved(vec![1.0; model.num_variables()])
            } else {
                SolveOutcome::infeasible()
            })
        }
    }

    fn recovery() -> InfeasibilityRecovery {
        InfeasibilityRecovery::new(Deadline::start(Duration::from_secs(60)))
    }

    #[test]
    fn maximised_objective_steps_down_until_feasible() {
        let (mut model, row) = model_with_suspect(6);
        let mut oracle = oracle(|rhs| rhs <= 4.0);

        let target = suspect(row, 6, Sense::Maximize);
        let (report, outcome) = recovery().recover(&mut model, target, &mut oracle);

        assert_eq!(report.outcome, RecoveryOutcome::Recovered { relaxed: 4 });
        assert_eq!(report.fixed, 6);
        assert!(outcome.is_some());
        let rhs: Vec<f64> = model.constraints().map(|row| row.rhs).collect();
        assert_eq!(rhs, vec![4.0]);
    }

    #[test]
    fn minimised_objective_steps_up_to_unconstrained_value() {
        let (mut model, row) = model_with_suspect(1);
        let mut oracle = oracle(|rhs| rhs >= 3.0);

        let target = suspect(row, 1, Sense::Minimize);
        let (report, _) = recovery().recover(&mut model, target, &mut oracle);

        assert_eq!(report.outcome, RecoveryOutcome::Recovered { relaxed: 3 });
    }

    #[test]
    fn infeasible_without_suspect_is_structural() {
        let (mut model, row) = model_with_suspect(2);
        let mut oracle = |_: &LinearModel| Ok::<_, OracleError>(SolveOutcome::infeasible());

        let target = suspect(row, 2, Sense::Maximize);
        let (report, outcome) = recovery().recover(&mut model, target, &mut oracle);

        assert_eq!(report.outcome, RecoveryOutcome::Structural);
        assert!(outcome.is_none());
    }

    #[test]
    fn runs_out_of_values() {
        let (mut model, row) = model_with_suspect(2);
        let mut oracle = oracle(|_| false);

        let target = suspect(row, 2, Sense::Maximize);
        let (report, _) = recovery().recover(&mut model, target, &mut oracle);

        assert_eq!(report.outcome, RecoveryOutcome::Exhausted);
        assert_eq!(model.num_constraints(), 0);
    }

    #[test]
    fn spent_deadline_times_out() {
        let (mut model, row) = model_with_suspect(2);
        let mut oracle = oracle(|_| true);
        let recovery = InfeasibilityRecovery::new(Deadline::start(Duration::ZERO));

        let target = suspect(row, 2, Sense::Maximize);
        let (report, _) = recovery.recover(&mut model, target, &mut oracle);

        assert_eq!(report.outcome, RecoveryOutcome::TimedOut);
    }
}
