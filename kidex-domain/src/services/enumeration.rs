use crate::model::{CycleChain, GraphModel, StructureKind, VertexId};

/// Size bounds for enumerated structures, counted in vertices.
///
/// A chain's size includes its non-directed donor, so a chain of size 4
/// transplants three patients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumerationLimits {
    pub max_cycle_length: usize,
    pub max_chain_length: usize,
}

impl EnumerationLimits {
    pub fn new(max_cycle_length: usize, max_chain_length: usize) -> Self {
        Self {
            max_cycle_length,
            max_chain_length,
        }
    }

    /// Largest structure of either kind.
    pub fn max_length(&self) -> usize {
        self.max_cycle_length.max(self.max_chain_length)
    }
}

impl Default for EnumerationLimits {
    fn default() -> Self {
        Self::new(3, 4)
    }
}

/// Lists every admissible cycle and chain of a compatibility graph.
pub struct CycleChainEnumerator<'a> {
    graph: &'a GraphModel,
    limits: EnumerationLimits,
}

impl<'a> CycleChainEnumerator<'a> {
    pub fn new(graph: &'a GraphModel, limits: EnumerationLimits) -> Self {
        Self { graph, limits }
    }

    /// Cycles first, then chains. Each structure's `id` is its index in the
    /// returned vector.
    pub fn enumerate(&self) -> Vec<CycleChain> {
        let mut catalog = Vec::new();
        self.collect_cycles(&mut catalog);
        let cycle_count = catalog.len();
        self.collect_chains(&mut catalog);

        tracing::info!(
            cycles = cycle_count,
            chains = catalog.len() - cycle_count,
            max_cycle_length = self.limits.max_cycle_length,
            max_chain_length = self.limits.max_chain_length,
            "enumerated exchange structures"
        );
        catalog
    }

    fn collect_cycles(&self, catalog: &mut Vec<CycleChain>) {
        if self.limits.max_cycle_length < 2 {
            return;
        }

        let mut visited = vec![false; self.graph.id_space()];
        let mut path = Vec::with_capacity(self.limits.max_cycle_length);
        for start in self.graph.pairs() {
            path.push(start.id);
            visited[start.id.index()] = true;
            self.extend_cycle(start.id, &mut path, &mut visited, catalog);
            visited[start.id.index()] = false;
            path.clear();
        }
    }

    // Only vertices above `start` may join, so every cycle is found once,
    // from its smallest member.
    fn extend_cycle(
        &self,
        start: VertexId,
        path: &mut Vec<VertexId>,
        visited: &mut [bool],
        catalog: &mut Vec<CycleChain>,
    ) {
        let Some(&current) = path.last() else {
            return;
        };

        for edge in self.graph.out_edges(current) {
            let next = edge.target;
            if next == start {
                if path.len() >= 2 {
                    catalog.push(self.build(StructureKind::Cycle, path, catalog.len()));
                }
                continue;
            }
            if next < start
                || visited[next.index()]
                || path.len() >= self.limits.max_cycle_length
                || !self.graph.is_pair(next)
            {
                continue;
            }

            visited[next.index()] = true;
            path.push(next);
            self.extend_cycle(start, path, visited, catalog);
            path.pop();
            visited[next.index()] = false;
        }
    }

    fn collect_chains(&self, catalog: &mut Vec<CycleChain>) {
        if self.limits.max_chain_length == 0 {
            return;
        }

        let mut visited = vec![false; self.graph.id_space()];
        let mut path = Vec::with_capacity(self.limits.max_chain_length);
        for donor in self.graph.ndds() {
            path.push(donor.id);
            visited[donor.id.index()] = true;
            catalog.push(self.build(StructureKind::Chain, &path, catalog.len()));
            self.extend_chain(&mut path, &mut visited, catalog);
            visited[donor.id.index()] = false;
            path.clear();
        }
    }

    fn extend_chain(
        &self,
        path: &mut Vec<VertexId>,
        visited: &mut [bool],
        catalog: &mut Vec<CycleChain>,
    ) {
        if path.len() >= self.limits.max_chain_length {
            return;
        }
        let Some(&current) = path.last() else {
            return;
        };

        for edge in self.graph.out_edges(current) {
            let next = edge.target;
            if visited[next.index()] || !self.graph.is_pair(next) {
                continue;
            }

            visited[next.index()] = true;
            path.push(next);
            catalog.push(self.build(StructureKind::Chain, path, catalog.len()));
            self.extend_chain(path, visited, catalog);
            path.pop();
            visited[next.index()] = false;
        }
    }

    fn build(&self, kind: StructureKind, members: &[VertexId], id: usize) -> CycleChain {
        let mut structure = CycleChain {
            id,
            kind,
            members: members.to_vec(),
            score: 0,
            back_arcs: 0,
        };

        let defining: Vec<(VertexId, VertexId)> = structure.arcs().collect();
        structure.score = defining
            .iter()
            .filter_map(|&(from, to)| self.graph.weight(from, to))
            .sum();

        let mut back_arcs = 0;
        for &from in members {
            for &to in members {
                if from != to
                    && self.graph.has_edge(from, to)
                    && !defining.contains(&(from, to))
                {
                    back_arcs += 1;
                }
            }
        }
        structure.back_arcs = back_arcs;
        structure
    }
}
