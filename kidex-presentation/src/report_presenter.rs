use std::{borrow::Cow, fmt::Write as _, time::Duration};

use kidex_domain::{CycleChain, EnumerationLimits};
use kidex_optimizer::{Allocation, ObjectiveStatus, RecoveryOutcome, RecoveryReport};

use crate::text_table::{Alignment, TextTableBuilder};

const SEPARATOR: &str = "-------------------------------------------";

/// Run parameters echoed in the report.
pub struct ReportContext<'a> {
    pub instance: &'a str,
    pub limits: EnumerationLimits,
}

pub struct ReportPresenter;

impl ReportPresenter {
    pub fn render(allocation: &Allocation, context: &ReportContext<'_>) -> String {
        let mut report = String::with_capacity(2048);
        let _ = writeln!(&mut report, "Instance: {}", context.instance);
        let _ = writeln!(&mut report);

        if has_solution(allocation) {
            render_solution(&mut report, &allocation.selected);
            let _ = writeln!(&mut report, "Total score: {}", allocation.total_score());
            let _ = writeln!(
                &mut report,
                "Total transplants: {}",
                allocation.total_transplants()
            );
        } else {
            let _ = writeln!(&mut report, "No feasible solution found.");
        }

        let _ = writeln!(&mut report);
        let _ = writeln!(&mut report, "Optimization information:");
        let yes_no = if allocation.optimal { "yes" } else { "no" };
        let _ = writeln!(&mut report, "Optimal solution found: {yes_no}");
        let _ = writeln!(
            &mut report,
            "Max cycle length: {}",
            context.limits.max_cycle_length
        );
        let _ = writeln!(
            &mut report,
            "Max chain length: {}",
            context.limits.max_chain_length
        );
        let _ = writeln!(&mut report, "Cycles enumerated: {}", allocation.catalog.cycles);
        let _ = writeln!(&mut report, "Chains enumerated: {}", allocation.catalog.chains);

        let timings = &allocation.timings;
        for (label, elapsed) in [
            ("Total time (s)", timings.total),
            ("Initialization time (s)", timings.initialization),
            ("Optimization time (s)", timings.optimization),
            ("Final solve time (s)", timings.final_solve),
        ] {
            let _ = writeln!(&mut report, "{label}: {}", seconds(elapsed));
        }

        let _ = writeln!(&mut report);
        report.push_str(&objectives_table(allocation));
        if let Some(recovery) = &allocation.recovery {
            let _ = writeln!(&mut report, "{}", describe_recovery(allocation, recovery));
        }

        let _ = writeln!(&mut report);
        let stats = &allocation.model_stats;
        let _ = writeln!(&mut report, "Number of variables: {}", stats.variables);
        let _ = writeln!(&mut report, "Number of constraints: {}", stats.constraints);
        let _ = writeln!(&mut report, "Number of non-zeros: {}", stats.nonzeros);

        report
    }
}

fn has_solution(allocation: &Allocation) -> bool {
    allocation.objectives.last().is_some_and(|result| {
        !matches!(
            result.status,
            ObjectiveStatus::Failed | ObjectiveStatus::Unresolved
        )
    })
}

fn render_solution(report: &mut String, selected: &[CycleChain]) {
    let _ = writeln!(report, "Solution:");
    for (idx, structure) in selected.iter().enumerate() {
        let nodes = structure
            .members
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(report, "{}:", idx + 1);
        let _ = writeln!(report, "Type: {}", structure.kind);
        let _ = writeln!(report, "Size: {}", structure.size());
        let _ = writeln!(report, "Nodes: {nodes}");
        let _ = writeln!(report, "Number of Back Arcs: {}", structure.back_arcs);
        let _ = writeln!(report, "Score: {}", structure.score);
        let _ = writeln!(report, "{SEPARATOR}");
    }
}

static OBJECTIVE_HEADERS: [Cow<'static, str>; 6] = [
    Cow::Borrowed("#"),
    Cow::Borrowed("Objective"),
    Cow::Borrowed("Value"),
    Cow::Borrowed("Failures"),
    Cow::Borrowed("Solves"),
    Cow::Borrowed("Time (s)"),
];
static OBJECTIVE_ALIGNMENTS: [Alignment; 6] = [
    Alignment::Right,
    Alignment::Left,
    Alignment::Left,
    Alignment::Right,
    Alignment::Right,
    Alignment::Right,
];

fn objectives_table(allocation: &Allocation) -> String {
    TextTableBuilder::new()
        .alignments(&OBJECTIVE_ALIGNMENTS)
        .headers(&OBJECTIVE_HEADERS)
        .rows(allocation.objectives.iter().enumerate().map(|(idx, result)| {
            [
                Cow::Owned((idx + 1).to_string()),
                Cow::Owned(result.objective.name()),
                Cow::Owned(format_status(result.status)),
                Cow::Owned(result.failures.to_string()),
                Cow::Owned(result.iterations.to_string()),
                Cow::Owned(seconds(result.elapsed)),
            ]
        }))
        .build()
}

fn format_status(status: ObjectiveStatus) -> String {
    match status {
        ObjectiveStatus::Fixed(value) => value.to_string(),
        ObjectiveStatus::Relaxed { fixed, relaxed } => format!("{relaxed} (relaxed from {fixed})"),
        ObjectiveStatus::Incumbent(value) => format!("{value} (not proven)"),
        ObjectiveStatus::Failed => format!("{} (failed)", status.value()),
        ObjectiveStatus::Unresolved => format!("{} (unresolved)", status.value()),
    }
}

fn describe_recovery(allocation: &Allocation, recovery: &RecoveryReport) -> String {
    let name = allocation
        .objectives
        .get(recovery.objective)
        .map(|result| result.objective.name())
        .unwrap_or_else(|| format!("objective {}", recovery.objective + 1));
    match recovery.outcome {
        RecoveryOutcome::Recovered { relaxed } => format!(
            "Recovery: {name} relaxed from {} to {relaxed}",
            recovery.fixed
        ),
        RecoveryOutcome::Structural => {
            format!("Recovery: infeasible even without fixing {name}")
        }
        RecoveryOutcome::Exhausted => {
            format!("Recovery: no value of {name} restores feasibility")
        }
        RecoveryOutcome::TimedOut => {
            format!("Recovery: time limit reached while relaxing {name}")
        }
    }
}

fn seconds(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidex_domain::{StructureKind, VertexId};
    use kidex_optimizer::{
        CatalogSummary, ModelStats, Objective, ObjectiveKind, ObjectiveResult, PhaseTimings,
    };
    use rstest::rstest;

    fn result(kind: ObjectiveKind, status: ObjectiveStatus) -> ObjectiveResult {
        ObjectiveResult {
            status,
            failures: 1,
            iterations: 2,
            ..ObjectiveResult::new(Objective::new(kind))
        }
    }

    fn allocation(final_status: ObjectiveStatus, selected: Vec<CycleChain>) -> Allocation {
        Allocation {
            catalog: CatalogSummary {
                cycles: 4,
                chains: 2,
            },
            objectives: vec![
                result(ObjectiveKind::TotalTransplants, ObjectiveStatus::Fixed(3)),
                result(ObjectiveKind::Score, final_status),
            ],
            selected,
            model_stats: ModelStats {
                variables: 6,
                constraints: 9,
                nonzeros: 21,
            },
            timings: PhaseTimings {
                total: Duration::from_millis(1500),
                ..PhaseTimings::default()
            },
            recovery: None,
            optimal: final_status.is_fixed(),
        }
    }

    fn context() -> ReportContext<'static> {
        ReportContext {
            instance: "toy.txt",
            limits: EnumerationLimits::new(3, 4),
        }
    }

    fn chain() -> CycleChain {
        CycleChain {
            id: 5,
            kind: StructureKind::Chain,
            members: vec![VertexId(7), VertexId(2), VertexId(5)],
            score: 4,
            back_arcs: 1,
        }
    }

    #[test]
    fn lists_selected_structures() {
        let report = ReportPresenter::render(
            &allocation(ObjectiveStatus::Fixed(4), vec![chain()]),
            &context(),
        );

        assert!(report.contains(
            "Solution:\n1:\nType: Chain\nSize: 3\nNodes: 7, 2, 5\nNumber of Back Arcs: 1\nScore: 4\n"
        ));
        assert!(report.contains("Total score: 4\n"));
        assert!(report.contains("Total transplants: 2\n"));
        assert!(report.contains("Optimal solution found: yes\n"));
        assert!(report.contains("Total time (s): 1.500\n"));
        assert!(report.contains("Number of non-zeros: 21\n"));
    }

    #[rstest]
    #[case::failed(ObjectiveStatus::Failed, "-1 (failed)")]
    #[case::unresolved(ObjectiveStatus::Unresolved, "-1 (unresolved)")]
    fn unsolved_final_pass_reports_no_solution(
        #[case] status: ObjectiveStatus,
        #[case] marker: &str,
    ) {
        let report = ReportPresenter::render(&allocation(status, Vec::new()), &context());

        assert!(report.contains("No feasible solution found.\n"));
        assert!(!report.contains("Solution:"));
        assert!(report.contains(marker));
        assert!(report.contains("Optimal solution found: no\n"));
    }

    #[rstest]
    #[case::fixed(ObjectiveStatus::Fixed(7), "7")]
    #[case::relaxed(ObjectiveStatus::Relaxed { fixed: 6, relaxed: 5 }, "5 (relaxed from 6)")]
    #[case::incumbent(ObjectiveStatus::Incumbent(9), "9 (not proven)")]
    fn formats_objective_status(#[case] status: ObjectiveStatus, #[case] expected: &str) {
        assert_eq!(format_status(status), expected);
    }

    #[test]
    fn describes_recovery() {
        let mut allocation = allocation(ObjectiveStatus::Fixed(0), Vec::new());
        allocation.objectives[0].status = ObjectiveStatus::Relaxed {
            fixed: 3,
            relaxed: 1,
        };
        allocation.recovery = Some(RecoveryReport {
            objective: 0,
            fixed: 3,
            outcome: RecoveryOutcome::Recovered { relaxed: 1 },
        });

        let report = ReportPresenter::render(&allocation, &context());

        assert!(report.contains("Recovery: Total transplants relaxed from 3 to 1\n"));
        assert!(report.contains("Solution:\nTotal score: 0\n"));
    }
}
