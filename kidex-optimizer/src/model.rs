use std::time::Duration;

use kidex_domain::CycleChain;

use crate::objective::{Objective, ObjectiveKind};
use crate::recovery::RecoveryReport;

/// How an objective's pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectiveStatus {
    /// Proven value, enforced as an equality on every later pass.
    Fixed(i64),
    /// Fixed once, then loosened by recovery in the final pass.
    Relaxed { fixed: i64, relaxed: i64 },
    /// Best solution found before the time limit, not proven optimal.
    Incumbent(i64),
    /// No integer solution under the earlier fixed values, or the solver
    /// errored.
    Failed,
    /// Ran out of time or iterations.
    Unresolved,
}

impl ObjectiveStatus {
    /// Achieved value, with `-1` standing in for objectives that have none.
    pub fn value(&self) -> i64 {
        match *self {
            ObjectiveStatus::Fixed(value) | ObjectiveStatus::Incumbent(value) => value,
            ObjectiveStatus::Relaxed { relaxed, .. } => relaxed,
            ObjectiveStatus::Failed | ObjectiveStatus::Unresolved => -1,
        }
    }

    /// Value later passes must reproduce, if any.
    pub fn binding_value(&self) -> Option<i64> {
        match *self {
            ObjectiveStatus::Fixed(value) => Some(value),
            ObjectiveStatus::Relaxed { relaxed, .. } => Some(relaxed),
            _ => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, ObjectiveStatus::Fixed(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectiveResult {
    pub objective: Objective,
    pub status: ObjectiveStatus,
    /// Integer targets that turned out to be out of reach.
    pub failures: u32,
    /// Integer solves issued for this objective.
    pub iterations: u32,
    pub elapsed: Duration,
}

impl ObjectiveResult {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            status: ObjectiveStatus::Unresolved,
            failures: 0,
            iterations: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Size of the final integer model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub variables: usize,
    pub constraints: usize,
    pub nonzeros: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    pub initialization: Duration,
    pub optimization: Duration,
    pub final_solve: Duration,
    pub total: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub cycles: usize,
    pub chains: usize,
}

impl CatalogSummary {
    pub fn total(&self) -> usize {
        self.cycles + self.chains
    }
}

/// Outcome of one allocation run.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    pub catalog: CatalogSummary,
    pub objectives: Vec<ObjectiveResult>,
    /// Selected structures in catalog order; pairwise vertex-disjoint.
    pub selected: Vec<CycleChain>,
    pub model_stats: ModelStats,
    pub timings: PhaseTimings,
    pub recovery: Option<RecoveryReport>,
    /// Every objective reached a proven value.
    pub optimal: bool,
}

impl Allocation {
    pub fn total_score(&self) -> i64 {
        Objective::new(ObjectiveKind::Score).evaluate(&self.selected)
    }

    pub fn total_transplants(&self) -> usize {
        Objective::new(ObjectiveKind::TotalTransplants).evaluate(&self.selected) as usize
    }
}
