use kidex_domain::{CycleChain, StructureKind};

/// Whether a catalog entry takes part in the next solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Activation {
    Active,
    /// Left out of the current pass only.
    Suspended,
    /// Left out for the rest of the run.
    Excluded,
}

/// Enumerated structures plus their activation state.
#[derive(Clone, Debug)]
pub struct Catalog {
    entries: Vec<CycleChain>,
    activation: Vec<Activation>,
}

impl Catalog {
    pub fn new(entries: Vec<CycleChain>) -> Self {
        let activation = vec![Activation::Active; entries.len()];
        Self {
            entries,
            activation,
        }
    }

    pub fn entries(&self) -> &[CycleChain] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&CycleChain> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn activation(&self, idx: usize) -> Activation {
        self.activation[idx]
    }

    pub fn set(&mut self, idx: usize, state: Activation) {
        self.activation[idx] = state;
    }

    pub fn restore_suspended(&mut self) {
        self.replace(Activation::Suspended, Activation::Active);
    }

    pub fn exclude_suspended(&mut self) {
        self.replace(Activation::Suspended, Activation::Excluded);
    }

    fn replace(&mut self, from: Activation, to: Activation) {
        for state in &mut self.activation {
            if *state == from {
                *state = to;
            }
        }
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.activation
            .iter()
            .enumerate()
            .filter(|(_, state)| **state == Activation::Active)
            .map(|(idx, _)| idx)
    }

    pub fn count(&self, state: Activation) -> usize {
        self.activation.iter().filter(|&&s| s == state).count()
    }

    pub fn count_kind(&self, kind: StructureKind) -> usize {
        self.entries
            .iter()
            .filter(|structure| structure.kind == kind)
            .count()
    }
}
