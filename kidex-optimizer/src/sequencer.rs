//! Lexicographic optimisation over the enumerated catalog.
//!
//! Objectives are optimised one at a time, most important first. Each pass
//! solves the LP relaxation once, derives an integer target from it and
//! then alternates reduced-cost pruning with integer solves until the
//! target is met. A met target becomes an equality constraint for every
//! later pass.

use std::time::{Duration, Instant};

use kidex_domain::{CycleChain, GraphModel};

use crate::catalog::{Activation, Catalog};
use crate::deactivation::{DeactivationFilter, LpBound};
use crate::deadline::Deadline;
use crate::model::{ModelStats, ObjectiveResult, ObjectiveStatus};
use crate::objective::{Objective, ObjectivePlan};
use crate::oracle::{
    ConstraintId, LinearExpr, LinearModel, OracleError, Relation, Sense, SolveOutcome,
    SolveStatus, SolverOracle, VarId, VarKind,
};
use crate::recovery::{InfeasibilityRecovery, RecoveryOutcome, RecoveryReport, Suspect};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SequencerConfig {
    /// Tolerance used when turning LP values into integer targets.
    pub epsilon: f64,
    /// Wall-clock budget for the whole run.
    pub time_limit: Duration,
    /// Integer solves allowed per objective.
    pub max_iterations: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            time_limit: Duration::from_secs(7200),
            max_iterations: 2000,
        }
    }
}

/// Everything a finished run produced.
#[derive(Clone, Debug)]
pub struct SequencerRun {
    pub objectives: Vec<ObjectiveResult>,
    pub selected: Vec<CycleChain>,
    pub model_stats: ModelStats,
    pub recovery: Option<RecoveryReport>,
    /// Catalog entries pruned for good by fixed objectives.
    pub excluded: usize,
    pub optimization: Duration,
    pub final_solve: Duration,
}

struct PassModel {
    model: LinearModel,
    /// `(catalog index, variable)` for every active entry.
    columns: Vec<(usize, VarId)>,
    /// `(objective position, equality row)` in plan order.
    fixed_rows: Vec<(usize, ConstraintId)>,
}

struct FinalPass {
    result: ObjectiveResult,
    selected: Vec<usize>,
    model_stats: ModelStats,
    recovery: Option<RecoveryReport>,
}

pub struct ObjectiveSequencer<'a> {
    graph: &'a GraphModel,
    plan: &'a ObjectivePlan,
    catalog: Catalog,
    config: SequencerConfig,
    filter: DeactivationFilter,
    deadline: Deadline,
    results: Vec<ObjectiveResult>,
}

impl<'a> ObjectiveSequencer<'a> {
    pub fn new(
        graph: &'a GraphModel,
        catalog: Catalog,
        plan: &'a ObjectivePlan,
        config: SequencerConfig,
    ) -> Self {
        Self {
            graph,
            plan,
            catalog,
            config,
            filter: DeactivationFilter::new(config.epsilon),
            deadline: Deadline::start(config.time_limit),
            results: Vec::with_capacity(plan.len()),
        }
    }

    pub fn run(mut self, oracle: &mut impl SolverOracle) -> SequencerRun {
        self.deadline = Deadline::start(self.config.time_limit);
        let plan = self.plan;

        let Some((last, leading)) = plan.objectives().split_last() else {
            return SequencerRun {
                objectives: Vec::new(),
                selected: Vec::new(),
                model_stats: ModelStats::default(),
                recovery: None,
                excluded: 0,
                optimization: Duration::ZERO,
                final_solve: Duration::ZERO,
            };
        };

        let optimization_started = Instant::now();
        for (position, objective) in leading.iter().enumerate() {
            let result = self.run_pass(position, objective, oracle);
            self.results.push(result);
        }
        let optimization = optimization_started.elapsed();

        let final_started = Instant::now();
        let final_pass = self.final_pass(last, oracle);
        let final_solve = final_started.elapsed();
        self.results.push(final_pass.result);

        let selected = final_pass
            .selected
            .iter()
            .filter_map(|&idx| self.catalog.get(idx).cloned())
            .collect();

        SequencerRun {
            objectives: self.results,
            selected,
            model_stats: final_pass.model_stats,
            recovery: final_pass.recovery,
            excluded: self.catalog.count(Activation::Excluded),
            optimization,
            final_solve,
        }
    }

    fn run_pass(
        &mut self,
        position: usize,
        objective: &Objective,
        oracle: &mut impl SolverOracle,
    ) -> ObjectiveResult {
        let started = Instant::now();
        let mut result = ObjectiveResult::new(*objective);
        let sense = objective.sense;
        self.catalog.restore_suspended();

        let Some(remaining) = self.deadline.remaining() else {
            tracing::warn!(objective = %objective, "time limit reached before relaxation");
            return finish(result, ObjectiveStatus::Unresolved, started);
        };
        let mut relaxation = self.build_model(objective, VarKind::Continuous);
        relaxation.model.set_time_limit(remaining);

        let lp = match oracle.solve(&relaxation.model) {
            Ok(outcome) if outcome.status == SolveStatus::Optimal => outcome,
            Ok(outcome) if outcome.status == SolveStatus::TimeLimit => {
                tracing::warn!(objective = %objective, "relaxation hit the time limit");
                return finish(result, ObjectiveStatus::Unresolved, started);
            }
            Ok(_) => {
                tracing::warn!(objective = %objective, "relaxation is infeasible");
                return finish(result, ObjectiveStatus::Failed, started);
            }
            Err(OracleError::TimeLimitWithoutSolution) => {
                tracing::warn!(objective = %objective, "relaxation hit the time limit");
                return finish(result, ObjectiveStatus::Unresolved, started);
            }
            Err(err) => {
                tracing::warn!(objective = %objective, error = %err, "relaxation failed");
                return finish(result, ObjectiveStatus::Failed, started);
            }
        };

        let bound = LpBound::from_relaxation(
            lp.objective_value,
            self.catalog.len(),
            relaxation.columns.iter().map(|&(idx, var)| {
                (idx, lp.value(var), lp.reduced_cost(var).unwrap_or(0.0))
            }),
            sense,
            self.filter.epsilon(),
        );
        let mut target = self.filter.initial_target(lp.objective_value, sense);
        tracing::info!(
            objective = %objective,
            position,
            lp_value = lp.objective_value,
            target,
            active = relaxation.columns.len(),
            "solved relaxation"
        );

        loop {
            if result.iterations >= self.config.max_iterations {
                tracing::warn!(
                    objective = %objective,
                    iterations = result.iterations,
                    "iteration budget exhausted"
                );
                return finish(result, ObjectiveStatus::Unresolved, started);
            }
            let Some(remaining) = self.deadline.remaining() else {
                tracing::warn!(objective = %objective, target, "time limit reached");
                return finish(result, ObjectiveStatus::Unresolved, started);
            };
            result.iterations += 1;

            let suspended = self.filter.apply(&mut self.catalog, &bound, target, sense);
            let mut integer = self.build_model(objective, VarKind::Binary);
            integer.model.set_time_limit(remaining);

            let outcome = match oracle.solve(&integer.model) {
                Ok(outcome) => outcome,
                Err(OracleError::TimeLimitWithoutSolution) => {
                    tracing::warn!(objective = %objective, target, "integer solve timed out");
                    return finish(result, ObjectiveStatus::Unresolved, started);
                }
                Err(err) => {
                    tracing::warn!(objective = %objective, error = %err, "integer solve failed");
                    return finish(result, ObjectiveStatus::Failed, started);
                }
            };
            match outcome.status {
                SolveStatus::Optimal => {}
                SolveStatus::TimeLimit => {
                    tracing::warn!(objective = %objective, target, "integer solve timed out");
                    return finish(result, ObjectiveStatus::Unresolved, started);
                }
                SolveStatus::Infeasible => {
                    tracing::warn!(objective = %objective, target, "integer model is infeasible");
                    return finish(result, ObjectiveStatus::Failed, started);
                }
            }

            let achieved = round_count_objective(outcome.objective_value);
            tracing::debug!(
                objective = %objective,
                iteration = result.iterations,
                target,
                achieved,
                suspended,
                "integer solve"
            );

            let reached = match sense {
                Sense::Maximize => achieved >= target,
                Sense::Minimize => achieved <= target,
            };
            if reached {
                self.catalog.exclude_suspended();
                tracing::info!(
                    objective = %objective,
                    value = achieved,
                    failures = result.failures,
                    excluded = suspended,
                    "fixed objective"
                );
                return finish(result, ObjectiveStatus::Fixed(achieved), started);
            }

            result.failures += 1;
            target = DeactivationFilter::tighten(target, sense);
        }
    }

    fn final_pass(&mut self, objective: &Objective, oracle: &mut impl SolverOracle) -> FinalPass {
        let started = Instant::now();
        let mut result = ObjectiveResult::new(*objective);
        self.catalog.restore_suspended();

        let mut pass = self.build_model(objective, VarKind::Binary);
        let model_stats = ModelStats {
            variables: pass.model.num_variables(),
            constraints: pass.model.num_constraints(),
            nonzeros: pass.model.num_nonzeros(),
        };
        let unsolved = |result, status| FinalPass {
            result: finish(result, status, started),
            selected: Vec::new(),
            model_stats,
            recovery: None,
        };

        let Some(remaining) = self.deadline.remaining() else {
            tracing::warn!(objective = %objective, "time limit reached before final solve");
            return unsolved(result, ObjectiveStatus::Unresolved);
        };
        pass.model.set_time_limit(remaining);
        result.iterations = 1;

        let solved = match oracle.solve(&pass.model) {
            Ok(outcome) if outcome.has_solution() => Some(outcome),
            Ok(_) => None,
            Err(OracleError::TimeLimitWithoutSolution) => {
                tracing::warn!(objective = %objective, "final solve timed out");
                return unsolved(result, ObjectiveStatus::Unresolved);
            }
            Err(err) => {
                tracing::warn!(objective = %objective, error = %err, "final solve failed");
                return unsolved(result, ObjectiveStatus::Failed);
            }
        };

        let mut recovery = None;
        let outcome = match solved {
            Some(outcome) => outcome,
            None => {
                let (report, outcome) = self.recover(&mut pass, oracle);
                recovery = report;
                match outcome {
                    Some(outcome) => outcome,
                    None => {
                        let status = match report.map(|report| report.outcome) {
                            Some(RecoveryOutcome::TimedOut) => ObjectiveStatus::Unresolved,
                            _ => ObjectiveStatus::Failed,
                        };
                        let mut failed = unsolved(result, status);
                        failed.recovery = recovery;
                        return failed;
                    }
                }
            }
        };

        let value = round_count_objective(outcome.objective_value);
        let status = match outcome.status {
            SolveStatus::Optimal => ObjectiveStatus::Fixed(value),
            _ => ObjectiveStatus::Incumbent(value),
        };
        let selected: Vec<usize> = pass
            .columns
            .iter()
            .filter(|&&(_, var)| outcome.value(var) > 0.5)
            .map(|&(idx, _)| idx)
            .collect();
        tracing::info!(
            objective = %objective,
            value,
            selected = selected.len(),
            proven = status.is_fixed(),
            "final solve complete"
        );

        FinalPass {
            result: finish(result, status, started),
            selected,
            model_stats,
            recovery,
        }
    }

    fn recover(
        &mut self,
        pass: &mut PassModel,
        oracle: &mut impl SolverOracle,
    ) -> (Option<RecoveryReport>, Option<SolveOutcome>) {
        let Some(&(position, row)) = pass.fixed_rows.first() else {
            tracing::warn!("final model is infeasible without any fixed objective");
            return (None, None);
        };
        let earlier = &self.results[position];
        let suspect = Suspect {
            objective: position,
            row,
            fixed: earlier.status.value(),
            sense: earlier.objective.sense,
        };

        let (report, outcome) =
            InfeasibilityRecovery::new(self.deadline).recover(&mut pass.model, suspect, oracle);
        if let RecoveryOutcome::Recovered { relaxed } = report.outcome {
            self.results[position].status = ObjectiveStatus::Relaxed {
                fixed: suspect.fixed,
                relaxed,
            };
        }
        (Some(report), outcome)
    }

    /// Binary or continuous model over the active entries: one packing row
    /// per vertex and one equality per objective with a binding value.
    fn build_model(&self, objective: &Objective, kind: VarKind) -> PassModel {
        let entries = self.catalog.entries();
        let mut model = LinearModel::new();
        let mut columns = Vec::new();
        let mut objective_expr = LinearExpr::default();
        let mut cover: Vec<Vec<VarId>> = vec![Vec::new(); self.graph.id_space()];

        for idx in self.catalog.active_indices() {
            let structure = &entries[idx];
            let var = model.create_variable(0.0, 1.0, kind);
            columns.push((idx, var));
            objective_expr.add_term(var, objective.coefficient(structure));
            for member in &structure.members {
                cover[member.index()].push(var);
            }
        }

        for vars in cover.iter().filter(|vars| !vars.is_empty()) {
            let mut expr = LinearExpr::with_capacity(vars.len());
            for &var in vars {
                expr.add_term(var, 1.0);
            }
            model.add_constraint(expr, Relation::LessEq, 1.0);
        }

        let mut fixed_rows = Vec::new();
        for (position, earlier) in self.results.iter().enumerate() {
            let Some(value) = earlier.status.binding_value() else {
                continue;
            };
            let mut expr = LinearExpr::with_capacity(columns.len());
            for &(idx, var) in &columns {
                expr.add_term(var, earlier.objective.coefficient(&entries[idx]));
            }
            let row = model.add_constraint(expr, Relation::Eq, value as f64);
            fixed_rows.push((position, row));
        }

        model.set_objective(objective_expr, objective.sense);
        PassModel {
            model,
            columns,
            fixed_rows,
        }
    }
}

fn finish(
    mut result: ObjectiveResult,
    status: ObjectiveStatus,
    started: Instant,
) -> ObjectiveResult {
    result.status = status;
    result.elapsed = started.elapsed();
    result
}

fn round_count_objective(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{brute_force, graph};
    use kidex_domain::{CycleChainEnumerator, EnumerationLimits};
    use rstest::rstest;

    fn run(
        graph: &GraphModel,
        plan: &ObjectivePlan,
        config: SequencerConfig,
        oracle: &mut impl SolverOracle,
    ) -> SequencerRun {
        let limits = EnumerationLimits::new(3, 3);
        let catalog = Catalog::new(CycleChainEnumerator::new(graph, limits).enumerate());
        ObjectiveSequencer::new(graph, catalog, plan, config).run(oracle)
    }

    fn statuses(run: &SequencerRun) -> Vec<ObjectiveStatus> {
        run.objectives.iter().map(|result| result.status).collect()
    }

    #[test]
    fn fixes_every_objective_on_two_cycle() {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(3, 3);

        let run = run(&graph, &plan, SequencerConfig::default(), &mut brute_force);

        assert_eq!(
            statuses(&run),
            vec![
                ObjectiveStatus::Fixed(2),
                ObjectiveStatus::Fixed(0),
                ObjectiveStatus::Fixed(0),
                ObjectiveStatus::Fixed(10),
            ]
        );
        assert_eq!(run.selected.len(), 1);
        assert_eq!(run.selected[0].size(), 2);
        assert!(run.recovery.is_none());
        assert_eq!(run.model_stats.variables, 1);
    }

    #[test]
    fn prefers_fewer_long_structures_at_equal_transplants() {
        // Either the 3-cycle 0-1-2 or the 2-cycle 0-1 plus the chain 3-2
        // transplants three patients; the second uses no size-3 structure.
        let graph = graph(
            &[0, 1, 2],
            &[3],
            &[(0, 1, 1), (1, 0, 1), (1, 2, 1), (2, 0, 1), (3, 2, 1)],
        );
        let plan = ObjectivePlan::for_lengths(3, 3);

        let run = run(&graph, &plan, SequencerConfig::default(), &mut brute_force);

        assert_eq!(run.objectives[0].status, ObjectiveStatus::Fixed(3));
        assert_eq!(run.objectives[1].status, ObjectiveStatus::Fixed(0));
        assert_eq!(run.selected.len(), 2);
        assert!(run.selected.iter().all(|structure| structure.size() == 2));
    }

    #[test]
    fn optimistic_relaxation_costs_failures() {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(2, 2);
        // Relaxations overstate transplants by two.
        let mut oracle = |model: &LinearModel| {
            let mut outcome = brute_force(model)?;
            if model.is_relaxation() && model.num_constraints() == 2 {
                outcome.objective_value += 2.0;
            }
            Ok::<_, OracleError>(outcome)
        };

        let run = run(&graph, &plan, SequencerConfig::default(), &mut oracle);

        assert_eq!(run.objectives[0].status, ObjectiveStatus::Fixed(2));
        assert_eq!(run.objectives[0].failures, 2);
        assert_eq!(run.objectives[0].iterations, 3);
    }

    #[test]
    fn iteration_budget_leaves_objective_unresolved() {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(2, 2);
        let mut oracle = |model: &LinearModel| {
            let mut outcome = brute_force(model)?;
            if model.is_relaxation() {
                outcome.objective_value += 5.0;
            }
            Ok::<_, OracleError>(outcome)
        };
        let config = SequencerConfig {
            max_iterations: 2,
            ..SequencerConfig::default()
        };

        let run = run(&graph, &plan, config, &mut oracle);

        assert_eq!(run.objectives[0].status, ObjectiveStatus::Unresolved);
        assert_eq!(run.objectives[0].iterations, 2);
        // Later passes ignore the unresolved objective and still finish.
        assert_eq!(run.objectives[2].status, ObjectiveStatus::Fixed(10));
    }

    #[rstest]
    #[case::backend_error(OracleError::Backend("boom".to_string()), ObjectiveStatus::Failed)]
    #[case::timeout(OracleError::TimeLimitWithoutSolution, ObjectiveStatus::Unresolved)]
    fn relaxation_errors_end_only_that_pass(
        #[case] error: OracleError,
        #[case] expected: ObjectiveStatus,
    ) {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(2, 2);
        let mut relaxations = 0;
        let mut oracle = |model: &LinearModel| {
            if model.is_relaxation() {
                relaxations += 1;
                if relaxations == 1 {
                    return Err(error.clone());
                }
            }
            brute_force(model)
        };

        let run = run(&graph, &plan, SequencerConfig::default(), &mut oracle);

        assert_eq!(run.objectives[0].status, expected);
        assert_eq!(run.objectives[0].status.value(), -1);
        assert_eq!(run.objectives[2].status, ObjectiveStatus::Fixed(10));
        assert_eq!(run.selected.len(), 1);
    }

    #[test]
    fn infeasible_integer_model_fails_the_pass() {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(2, 2);
        let mut integer_solves = 0;
        let mut oracle = |model: &LinearModel| {
            if !model.is_relaxation() {
                integer_solves += 1;
                if integer_solves == 1 {
                    return Ok(SolveOutcome::infeasible());
                }
            }
            brute_force(model)
        };

        let run = run(&graph, &plan, SequencerConfig::default(), &mut oracle);

        assert_eq!(run.objectives[0].status, ObjectiveStatus::Failed);
        assert_eq!(run.objectives[1].status, ObjectiveStatus::Fixed(0));
    }

    #[test]
    fn spent_budget_leaves_everything_unresolved() {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(2, 2);
        let config = SequencerConfig {
            time_limit: Duration::ZERO,
            ..SequencerConfig::default()
        };

        let run = run(&graph, &plan, config, &mut brute_force);

        assert!(
            run.objectives
                .iter()
                .all(|result| result.status == ObjectiveStatus::Unresolved)
        );
        assert!(run.selected.is_empty());
    }

    #[test]
    fn final_infeasibility_relaxes_earliest_fixed_objective() {
        let graph = graph(&[0, 1], &[], &[(0, 1, 5), (1, 0, 5)]);
        let plan = ObjectivePlan::for_lengths(2, 2);
        // The final model (two equality rows) is infeasible while
        // transplants stay fixed at two.
        let mut oracle = |model: &LinearModel| {
            let equalities: Vec<f64> = model
                .constraints()
                .filter(|row| row.relation == Relation::Eq)
                .map(|row| row.rhs)
                .collect();
            if !model.is_relaxation() && equalities.len() == 2 && equalities[0] >= 2.0 {
                return Ok(SolveOutcome::infeasible());
            }
            brute_force(model)
        };

        let run = run(&graph, &plan, SequencerConfig::default(), &mut oracle);

        let report = run.recovery.expect("recovery ran");
        assert_eq!(report.objective, 0);
        assert_eq!(report.outcome, RecoveryOutcome::Recovered { relaxed: 0 });
        assert_eq!(
            run.objectives[0].status,
            ObjectiveStatus::Relaxed {
                fixed: 2,
                relaxed: 0
            }
        );
        assert_eq!(run.objectives[2].status, ObjectiveStatus::Fixed(0));
        assert!(run.selected.is_empty());
    }

    #[test]
    fn priced_out_entries_are_excluded_for_good() {
        // Path of 2-cycles 0-1, 1-2, 2-3: the middle one is priced out.
        let graph = graph(
            &[0, 1, 2, 3],
            &[],
            &[(0, 1, 1), (1, 0, 1), (1, 2, 1), (2, 1, 1), (2, 3, 1), (3, 2, 1)],
        );
        let plan = ObjectivePlan::for_lengths(2, 2);
        let mut relaxation_columns = Vec::new();
        let mut oracle = |model: &LinearModel| {
            let mut outcome = brute_force(model)?;
            if model.is_relaxation() {
                relaxation_columns.push(model.num_variables());
                outcome.reduced_costs = Some(
                    outcome
                        .values
                        .iter()
                        .map(|&value| if value < 0.5 { -3.0 } else { 0.0 })
                        .collect(),
                );
            }
            Ok::<_, OracleError>(outcome)
        };

        let run = run(&graph, &plan, SequencerConfig::default(), &mut oracle);

        assert_eq!(run.objectives[0].status, ObjectiveStatus::Fixed(4));
        assert_eq!(run.objectives[0].iterations, 1);
        assert_eq!(run.excluded, 1);
        assert_eq!(relaxation_columns, vec![3, 2]);
        assert_eq!(run.model_stats.variables, 2);
        let members: Vec<Vec<u32>> = run
            .selected
            .iter()
            .map(|structure| structure.members.iter().map(|id| id.0).collect())
            .collect();
        assert_eq!(members, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn selected_entries_never_share_vertices() {
        let graph = graph(
            &[0, 1, 2, 3],
            &[4],
            &[
                (0, 1, 2),
                (1, 0, 2),
                (1, 2, 3),
                (2, 1, 3),
                (2, 3, 1),
                (3, 0, 1),
                (4, 3, 4),
                (3, 2, 2),
            ],
        );
        let plan = ObjectivePlan::for_lengths(3, 3);

        let run = run(&graph, &plan, SequencerConfig::default(), &mut brute_force);

        for (i, first) in run.selected.iter().enumerate() {
            for second in &run.selected[i + 1..] {
                assert!(!first.shares_vertex_with(second), "{first} overlaps {second}");
            }
        }
        assert_eq!(run.objectives[0].status, ObjectiveStatus::Fixed(4));
    }
}
