use std::fmt;

use kidex_domain::CycleChain;

use crate::oracle::Sense;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectiveKind {
    /// Patients transplanted: a cycle counts every member, a chain every
    /// member but its donor.
    TotalTransplants,
    /// Number of selected structures with exactly this many members.
    MinimizeSize(usize),
    BackArcs,
    Score,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub sense: Sense,
}

impl Objective {
    pub fn new(kind: ObjectiveKind) -> Self {
        let sense = match kind {
            ObjectiveKind::MinimizeSize(_) => Sense::Minimize,
            ObjectiveKind::TotalTransplants | ObjectiveKind::BackArcs | ObjectiveKind::Score => {
                Sense::Maximize
            }
        };
        Self { kind, sense }
    }

    pub fn name(&self) -> String {
        match self.kind {
            ObjectiveKind::TotalTransplants => "Total transplants".to_string(),
            ObjectiveKind::MinimizeSize(size) => format!("Structures of size {size}"),
            ObjectiveKind::BackArcs => "Back arcs".to_string(),
            ObjectiveKind::Score => "Total score".to_string(),
        }
    }

    /// Contribution of one selected structure to this objective.
    pub fn coefficient(&self, structure: &CycleChain) -> f64 {
        match self.kind {
            ObjectiveKind::TotalTransplants => structure.transplants() as f64,
            ObjectiveKind::MinimizeSize(size) => {
                if structure.size() == size {
                    1.0
                } else {
                    0.0
                }
            }
            ObjectiveKind::BackArcs => f64::from(structure.back_arcs),
            ObjectiveKind::Score => structure.score as f64,
        }
    }

    /// Exact integer value of this objective over a selection.
    pub fn evaluate<'a>(&self, selection: impl IntoIterator<Item = &'a CycleChain>) -> i64 {
        selection
            .into_iter()
            .map(|structure| self.coefficient(structure) as i64)
            .sum()
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Ordered objectives, most important first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectivePlan {
    objectives: Vec<Objective>,
}

impl ObjectivePlan {
    /// Transplants, then one size-penalty per size from the largest allowed
    /// structure down to 3, then back arcs, then score.
    pub fn for_lengths(max_cycle_length: usize, max_chain_length: usize) -> Self {
        let largest = max_cycle_length.max(max_chain_length);
        let mut objectives = vec![Objective::new(ObjectiveKind::TotalTransplants)];
        objectives.extend(
            (3..=largest)
                .rev()
                .map(|size| Objective::new(ObjectiveKind::MinimizeSize(size))),
        );
        objectives.push(Objective::new(ObjectiveKind::BackArcs));
        objectives.push(Objective::new(ObjectiveKind::Score));
        Self { objectives }
    }

    pub fn standard() -> Self {
        Self::for_lengths(3, 4)
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kidex_domain::{StructureKind, VertexId};
    use rstest::rstest;

    fn structure(kind: StructureKind, members: &[u32], score: i64, back_arcs: u32) -> CycleChain {
        CycleChain {
            id: 0,
            kind,
            members: members.iter().copied().map(VertexId).collect(),
            score,
            back_arcs,
        }
    }

    #[test]
    fn standard_plan_has_five_objectives() {
        let kinds: Vec<ObjectiveKind> = ObjectivePlan::standard()
            .objectives()
            .iter()
            .map(|objective| objective.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ObjectiveKind::TotalTransplants,
                ObjectiveKind::MinimizeSize(4),
                ObjectiveKind::MinimizeSize(3),
                ObjectiveKind::BackArcs,
                ObjectiveKind::Score,
            ]
        );
    }

    #[rstest]
    #[case::pairs_only(2, 0, 3)]
    #[case::three_cycles(3, 0, 4)]
    #[case::long_chains(3, 6, 7)]
    fn plan_length_follows_largest_structure(
        #[case] cycles: usize,
        #[case] chains: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(ObjectivePlan::for_lengths(cycles, chains).len(), expected);
    }

    #[test]
    fn only_size_objectives_minimise() {
        for objective in ObjectivePlan::for_lengths(5, 5).objectives() {
            let minimises = matches!(objective.kind, ObjectiveKind::MinimizeSize(_));
            assert_eq!(objective.sense == Sense::Minimize, minimises, "{objective}");
        }
    }

    #[test]
    fn coefficients_per_kind() {
        let cycle = structure(StructureKind::Cycle, &[0, 1, 2], 9, 1);
        let chain = structure(StructureKind::Chain, &[7, 0, 1], 4, 2);

        let transplants = Objective::new(ObjectiveKind::TotalTransplants);
        assert_eq!(transplants.coefficient(&cycle), 3.0);
        assert_eq!(transplants.coefficient(&chain), 2.0);

        let size_three = Objective::new(ObjectiveKind::MinimizeSize(3));
        assert_eq!(size_three.coefficient(&cycle), 1.0);
        assert_eq!(Objective::new(ObjectiveKind::MinimizeSize(4)).coefficient(&chain), 0.0);

        assert_eq!(Objective::new(ObjectiveKind::BackArcs).coefficient(&chain), 2.0);
        assert_eq!(Objective::new(ObjectiveKind::Score).evaluate([&cycle, &chain]), 13);
    }
}
