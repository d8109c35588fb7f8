//! Reduced-cost pruning between the LP relaxation and the integer solves
//! of one pass.
//!
//! For an entry sitting at zero in the relaxation, forcing it to one moves
//! the LP objective by at most its reduced cost. When even that optimistic
//! bound misses the integer target, the entry cannot appear in a solution
//! reaching the target and is suspended for the pass.

use crate::catalog::{Activation, Catalog};
use crate::oracle::Sense;

/// LP relaxation value plus reduced costs indexed by catalog entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LpBound {
    pub value: f64,
    pub reduced_costs: Vec<f64>,
}

impl LpBound {
    /// `columns` yields `(catalog index, LP value, reduced cost)` for every
    /// entry present in the relaxation. Entries that are absent or not at
    /// zero get a zero reduced cost, and reduced costs are clamped to the
    /// sign a variable at its lower bound can have.
    pub fn from_relaxation(
        value: f64,
        catalog_len: usize,
        columns: impl IntoIterator<Item = (usize, f64, f64)>,
        sense: Sense,
        epsilon: f64,
    ) -> Self {
        let mut reduced_costs = vec![0.0; catalog_len];
        for (idx, lp_value, reduced_cost) in columns {
            if lp_value >= epsilon {
                continue;
            }
            reduced_costs[idx] = match sense {
                Sense::Maximize => reduced_cost.min(0.0),
                Sense::Minimize => reduced_cost.max(0.0),
            };
        }
        Self {
            value,
            reduced_costs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeactivationFilter {
    epsilon: f64,
}

impl DeactivationFilter {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Best integer value the relaxation leaves room for.
    pub fn initial_target(&self, lp_value: f64, sense: Sense) -> i64 {
        match sense {
            Sense::Maximize => (lp_value + self.epsilon).floor() as i64,
            Sense::Minimize => (lp_value - self.epsilon).ceil() as i64,
        }
    }

    /// Next, less ambitious, target.
    pub fn tighten(target: i64, sense: Sense) -> i64 {
        match sense {
            Sense::Maximize => target - 1,
            Sense::Minimize => target + 1,
        }
    }

    /// Re-evaluates every entry that is not excluded and returns how many
    /// ended up suspended.
    pub fn apply(
        &self,
        catalog: &mut Catalog,
        bound: &LpBound,
        target: i64,
        sense: Sense,
    ) -> usize {
        let target = target as f64;
        let mut suspended = 0;
        for idx in 0..catalog.len() {
            if catalog.activation(idx) == Activation::Excluded {
                continue;
            }
            let reduced_cost = bound.reduced_costs.get(idx).copied().unwrap_or(0.0);
            let optimistic = bound.value + reduced_cost;
            let hopeless = match sense {
                Sense::Maximize => optimistic + self.epsilon < target,
                Sense::Minimize => optimistic - self.epsilon > target,
            };
            if hopeless {
                catalog.set(idx, Activation::Suspended);
                suspended += 1;
            } else {
                catalog.set(idx, Activation::Active);
            }
        }
        suspended
    }
}
