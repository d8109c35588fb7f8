#![warn(clippy::uninlined_format_args)]

pub mod catalog;
pub mod deactivation;
pub mod deadline;
pub mod highs;
mod model;
pub mod objective;
pub mod oracle;
pub mod recovery;
pub mod sequencer;
#[cfg(test)]
mod test_utils;

use std::time::Instant;

use kidex_domain::{CycleChainEnumerator, EnumerationLimits, GraphModel, StructureKind};
use thiserror::Error;

pub use catalog::{Activation, Catalog};
pub use deactivation::{DeactivationFilter, LpBound};
pub use highs::HighsOracle;
pub use model::{
    Allocation, CatalogSummary, ModelStats, ObjectiveResult, ObjectiveStatus, PhaseTimings,
};
pub use objective::{Objective, ObjectiveKind, ObjectivePlan};
pub use oracle::{OracleError, SolveOutcome, SolveStatus, SolverOracle};
pub use recovery::{RecoveryOutcome, RecoveryReport};
pub use sequencer::{ObjectiveSequencer, SequencerConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("Iteration budget must allow at least one integer solve")]
    ZeroIterations,
    #[error("Epsilon must lie strictly between 0 and 0.5 (found {0})")]
    InvalidEpsilon(f64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AllocationConfig {
    pub limits: EnumerationLimits,
    pub sequencer: SequencerConfig,
}

impl AllocationConfig {
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.sequencer.max_iterations == 0 {
            return Err(AllocationError::ZeroIterations);
        }
        let epsilon = self.sequencer.epsilon;
        if !(epsilon > 0.0 && epsilon < 0.5) {
            return Err(AllocationError::InvalidEpsilon(epsilon));
        }
        Ok(())
    }
}

/// Enumerates the admissible cycles and chains of `graph` and selects a
/// vertex-disjoint subset that is lexicographically optimal for the
/// objective plan implied by the length limits.
///
/// Solver trouble never aborts the run: it shows up as failed or
/// unresolved objectives in the returned [`Allocation`].
pub fn allocate(
    graph: &GraphModel,
    config: &AllocationConfig,
    oracle: &mut impl SolverOracle,
) -> Result<Allocation, AllocationError> {
    config.validate()?;
    let started = Instant::now();

    let entries = CycleChainEnumerator::new(graph, config.limits).enumerate();
    let catalog = Catalog::new(entries);
    let summary = CatalogSummary {
        cycles: catalog.count_kind(StructureKind::Cycle),
        chains: catalog.count_kind(StructureKind::Chain),
    };
    let plan = ObjectivePlan::for_lengths(
        config.limits.max_cycle_length,
        config.limits.max_chain_length,
    );
    let initialization = started.elapsed();
    if catalog.is_empty() {
        tracing::warn!("no admissible cycle or chain; the allocation will be empty");
    }
    tracing::info!(
        vertices = graph.vertex_count(),
        arcs = graph.arc_count(),
        cycles = summary.cycles,
        chains = summary.chains,
        objectives = plan.len(),
        "starting allocation"
    );

    let run = ObjectiveSequencer::new(graph, catalog, &plan, config.sequencer).run(oracle);
    let optimal = run.objectives.iter().all(|result| result.status.is_fixed());
    tracing::info!(excluded = run.excluded, optimal, "allocation complete");

    Ok(Allocation {
        catalog: summary,
        objectives: run.objectives,
        selected: run.selected,
        model_stats: run.model_stats,
        timings: PhaseTimings {
            initialization,
            optimization: run.optimization,
            final_solve: run.final_solve,
            total: started.elapsed(),
        },
        recovery: run.recovery,
        optimal,
    })
}
