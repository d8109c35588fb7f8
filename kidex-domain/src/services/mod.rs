pub mod enumeration;

pub use enumeration::{CycleChainEnumerator, EnumerationLimits};
