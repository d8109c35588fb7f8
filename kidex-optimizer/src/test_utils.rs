use kidex_domain::{
    ArcRecord, BloodType, GraphModel, Instance, VertexId, VertexRecord, VpraCategory,
};

use crate::oracle::{LinearModel, OracleError, Sense, SolveOutcome, SolveStatus};

pub fn graph(pairs: &[u32], ndds: &[u32], arcs: &[(u32, u32, i64)]) -> GraphModel {
    let record = |id: u32, is_ndd: bool| VertexRecord {
        id: VertexId(id),
        is_ndd,
        donor_blood_type: BloodType::O,
        patient_blood_type: BloodType::A,
        patient_vpra: VpraCategory::Low,
    };
    let vertices: Vec<VertexRecord> = pairs
        .iter()
        .map(|&id| record(id, false))
        .chain(ndds.iter().map(|&id| record(id, true)))
        .collect();
    let arcs: Vec<ArcRecord> = arcs
        .iter()
        .map(|&(donor, patient, weight)| ArcRecord {
            donor: VertexId(donor),
            patient: VertexId(patient),
            weight,
        })
        .collect();
    GraphModel::from_instance(&Instance {
        num_pairs: pairs.len(),
        num_ndds: ndds.len(),
        num_arcs: arcs.len(),
        vertices,
        arcs,
    })
    .expect("valid test graph")
}

/// Exhaustive 0/1 oracle for tiny models. Relaxations are answered with
/// the integer optimum and zero reduced costs.
pub fn brute_force(model: &LinearModel) -> Result<SolveOutcome, OracleError> {
    let n = model.num_variables();
    assert!(n <= 16, "brute force oracle only handles tiny models");

    let mut best: Option<(f64, Vec<f64>)> = None;
    for mask in 0u32..(1 << n) {
        let values: Vec<f64> = (0..n).map(|bit| f64::from((mask >> bit) & 1)).collect();
        let feasible = model
            .constraints()
            .all(|row| row.is_satisfied_by(row.expr.evaluate(&values), 1e-9));
        if !feasible {
            continue;
        }
        let value = model.objective().evaluate(&values);
        let better = match (&best, model.sense()) {
            (None, _) => true,
            (Some((incumbent, _)), Sense::Maximize) => value > *incumbent,
            (Some((incumbent, _)), Sense::Minimize) => value < *incumbent,
        };
        if better {
            best = Some((value, values));
        }
    }

    Ok(match best {
        None => SolveOutcome::infeasible(),
        Some((objective_value, values)) => SolveOutcome {
            status: SolveStatus::Optimal,
            objective_value,
            objective_bound: Some(objective_value),
            values,
            reduced_costs: model.is_relaxation().then(|| vec![0.0; n]),
        },
    })
}
