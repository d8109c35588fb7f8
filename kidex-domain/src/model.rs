use std::fmt;

use fxhash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

impl VertexId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BloodType {
    A,
    B,
    AB,
    O,
}

impl TryFrom<u8> for BloodType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::A),
            1 => Ok(Self::B),
            2 => Ok(Self::AB),
            3 => Ok(Self::O),
            other => Err(other),
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::A => "A",
            Self::B => "B",
            Self::AB => "AB",
            Self::O => "O",
        };
        f.write_str(label)
    }
}

/// Sensitization bucket of a patient's virtual panel reactive antibody score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VpraCategory {
    /// Below 0.5
    Low,
    /// Between 0.5 and 0.85
    Medium,
    /// Above 0.85
    High,
}

impl TryFrom<u8> for VpraCategory {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            other => Err(other),
        }
    }
}

/// One vertex line of an instance, as read from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexRecord {
    pub id: VertexId,
    pub is_ndd: bool,
    pub donor_blood_type: BloodType,
    pub patient_blood_type: BloodType,
    pub patient_vpra: VpraCategory,
}

/// A donor of `donor` is compatible with the patient of `patient`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArcRecord {
    pub donor: VertexId,
    pub patient: VertexId,
    pub weight: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instance {
    pub num_pairs: usize,
    pub num_ndds: usize,
    pub num_arcs: usize,
    pub vertices: Vec<VertexRecord>,
    pub arcs: Vec<ArcRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexKind {
    Pair {
        donor_blood: BloodType,
        patient_blood: BloodType,
        vpra: VpraCategory,
    },
    NonDirectedDonor {
        donor_blood: BloodType,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vertex {
    pub id: VertexId,
    pub kind: VertexKind,
}

impl Vertex {
    pub fn is_ndd(&self) -> bool {
        matches!(self.kind, VertexKind::NonDirectedDonor { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub target: VertexId,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphBuildError {
    #[error("Vertex {0} is declared more than once")]
    DuplicateVertex(VertexId),
    #[error("Arc ({donor},{patient}) references unknown vertex {missing}")]
    UnknownVertex {
        donor: VertexId,
        patient: VertexId,
        missing: VertexId,
    },
    #[error("Arc ({donor},{patient}) targets non-directed donor {patient}")]
    ArcIntoNdd { donor: VertexId, patient: VertexId },
    #[error("Arc ({0},{0}) is a self-loop")]
    SelfLoop(VertexId),
    #[error("Arc ({donor},{patient}) has negative weight {weight}")]
    NegativeWeight {
        donor: VertexId,
        patient: VertexId,
        weight: i64,
    },
    #[error("Arc ({donor},{patient}) is declared more than once")]
    DuplicateArc { donor: VertexId, patient: VertexId },
}

/// Directed compatibility graph over pairs and non-directed donors.
///
/// Vertices are indexed by id; ids missing from the instance leave a hole.
/// Out-edges keep the order in which arcs were declared.
#[derive(Clone, Debug)]
pub struct GraphModel {
    vertices: Vec<Option<Vertex>>,
    out_edges: Vec<Vec<Edge>>,
    weights: FxHashMap<(VertexId, VertexId), i64>,
}

impl GraphModel {
    pub fn from_instance(instance: &Instance) -> Result<Self, GraphBuildError> {
        let max_id = instance
            .vertices
            .iter()
            .map(|record| record.id.index())
            .max()
            .map_or(0, |max| max + 1);

        let mut vertices: Vec<Option<Vertex>> = vec![None; max_id];
        for record in &instance.vertices {
            let slot = &mut vertices[record.id.index()];
            if slot.is_some() {
                return Err(GraphBuildError::DuplicateVertex(record.id));
            }
            let kind = if record.is_ndd {
                VertexKind::NonDirectedDonor {
                    donor_blood: record.donor_blood_type,
                }
            } else {
                VertexKind::Pair {
                    donor_blood: record.donor_blood_type,
                    patient_blood: record.patient_blood_type,
                    vpra: record.patient_vpra,
                }
            };
            *slot = Some(Vertex {
                id: record.id,
                kind,
            });
        }

        let mut out_edges: Vec<Vec<Edge>> = vec![Vec::new(); vertices.len()];
        let mut weights =
            FxHashMap::with_capacity_and_hasher(instance.arcs.len(), Default::default());
        for arc in &instance.arcs {
            let ArcRecord {
                donor,
                patient,
                weight,
            } = *arc;
            for endpoint in [donor, patient] {
                if vertex_at(&vertices, endpoint).is_none() {
                    return Err(GraphBuildError::UnknownVertex {
                        donor,
                        patient,
                        missing: endpoint,
                    });
                }
            }
            if donor == patient {
                return Err(GraphBuildError::SelfLoop(donor));
            }
            if vertex_at(&vertices, patient).is_some_and(Vertex::is_ndd) {
                return Err(GraphBuildError::ArcIntoNdd { donor, patient });
            }
            if weight < 0 {
                return Err(GraphBuildError::NegativeWeight {
                    donor,
                    patient,
                    weight,
                });
            }
            if weights.insert((donor, patient), weight).is_some() {
                return Err(GraphBuildError::DuplicateArc { donor, patient });
            }
            out_edges[donor.index()].push(Edge {
                target: patient,
                weight,
            });
        }

        let graph = Self {
            vertices,
            out_edges,
            weights,
        };

        let pair_count = graph.pairs().count();
        let ndd_count = graph.ndds().count();
        if pair_count != instance.num_pairs
            || ndd_count != instance.num_ndds
            || instance.arcs.len() != instance.num_arcs
        {
            tracing::warn!(
                declared_pairs = instance.num_pairs,
                declared_ndds = instance.num_ndds,
                declared_arcs = instance.num_arcs,
                pairs = pair_count,
                ndds = ndd_count,
                arcs = instance.arcs.len(),
                "instance header counts do not match its records"
            );
        }

        Ok(graph)
    }

    /// Largest vertex id that can occur, or `None` for an empty graph.
    pub fn max_id(&self) -> Option<VertexId> {
        self.vertices
            .len()
            .checked_sub(1)
            .map(|max| VertexId(max as u32))
    }

    /// Number of id slots, i.e. `max_id + 1`.
    pub fn id_space(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        vertex_at(&self.vertices, id)
    }

    pub fn is_ndd(&self, id: VertexId) -> bool {
        self.vertex(id).is_some_and(Vertex::is_ndd)
    }

    pub fn is_pair(&self, id: VertexId) -> bool {
        self.vertex(id).is_some_and(|vertex| !vertex.is_ndd())
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices.iter().flatten()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices().filter(|vertex| !vertex.is_ndd())
    }

    pub fn ndds(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices().filter(|vertex| vertex.is_ndd())
    }

    pub fn out_edges(&self, id: VertexId) -> &[Edge] {
        self.out_edges
            .get(id.index())
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn weight(&self, from: VertexId, to: VertexId) -> Option<i64> {
        self.weights.get(&(from, to)).copied()
    }

    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.weights.contains_key(&(from, to))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().count()
    }

    pub fn arc_count(&self) -> usize {
        self.weights.len()
    }
}

fn vertex_at(vertices: &[Option<Vertex>], id: VertexId) -> Option<&Vertex> {
    vertices.get(id.index()).and_then(Option::as_ref)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Cycle,
    Chain,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle => f.write_str("Cycle"),
            Self::Chain => f.write_str("Chain"),
        }
    }
}

/// An exchange structure: a cycle of pairs, or a chain rooted at an NDD.
///
/// `id` is the position of the structure in its enumeration catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleChain {
    pub id: usize,
    pub kind: StructureKind,
    pub members: Vec<VertexId>,
    pub score: i64,
    pub back_arcs: u32,
}

impl CycleChain {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_chain(&self) -> bool {
        self.kind == StructureKind::Chain
    }

    /// Patients receiving a kidney. The NDD heading a chain receives nothing.
    pub fn transplants(&self) -> usize {
        match self.kind {
            StructureKind::Cycle => self.members.len(),
            StructureKind::Chain => self.members.len().saturating_sub(1),
        }
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.members.contains(&id)
    }

    /// Defining arcs in donation order, wrapping around for cycles.
    pub fn arcs(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        let len = self.members.len();
        let count = match self.kind {
            StructureKind::Cycle if len >= 2 => len,
            StructureKind::Cycle => 0,
            StructureKind::Chain => len.saturating_sub(1),
        };
        (0..count).map(move |idx| (self.members[idx], self.members[(idx + 1) % len]))
    }

    pub fn shares_vertex_with(&self, other: &CycleChain) -> bool {
        let members: FxHashSet<VertexId> = self.members.iter().copied().collect();
        other.members.iter().any(|id| members.contains(id))
    }
}

impl fmt::Display for CycleChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.kind)?;
        for (idx, member) in self.members.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{member}")?;
        }
        f.write_str("]")
    }
}
