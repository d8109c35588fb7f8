#![warn(clippy::uninlined_format_args)]

pub mod model;
pub mod services;

pub use model::{
    ArcRecord, BloodType, CycleChain, Edge, GraphBuildError, GraphModel, Instance, StructureKind,
    Vertex, VertexId, VertexKind, VertexRecord, VpraCategory,
};
pub use services::{CycleChainEnumerator, EnumerationLimits};
