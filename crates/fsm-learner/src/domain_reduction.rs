use fsm_core::StateId;

use crate::distinguish::{are_convergent_nodes_distinguished, are_nodes_different_under};
use crate::tree::{CnId, NodeId, ObservationTree};

/// What happened to a node during the upward domain-reduction walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionOutcome {
    /// Domain shrank but is still more than one candidate; nothing to do.
    Unchanged,
    /// Domain shrank to exactly one candidate: ready to merge into that
    /// state's reference CN.
    Identified,
    /// Domain emptied: a new-state candidate.
    NewStateCandidate,
    /// The node's previously assigned `state` fell out of its own domain.
    Inconsistent,
    /// The node's CN emptied under full CN-level distinguishability while
    /// the node's own per-node domain had not yet emptied (spec.md §4.6
    /// Case B).
    CnEmptied,
}

/// Walks from the freshly observed `leaf` up to the root, reducing each
/// ancestor's candidate domain (spec.md §4.3). For each ancestor and each
/// candidate state still in its domain, removes the candidate if the
/// ancestor is now provably different (under the suffix length reached so
/// far) from that state's reference node. Keeps the CN-level domain in
/// sync. Returns the outcome for every node whose domain changed, in
/// bottom-up order, so the caller can feed `identifiedNodes`/
/// `inconsistentNodes`.
pub fn reduce_domain_from_leaf(ot: &mut ObservationTree, leaf: NodeId) -> Vec<(NodeId, ReductionOutcome)> {
    let mut results = Vec::new();
    let mut node = leaf;
    let mut suffix_len: i64 = 0;
    loop {
        suffix_len += 1;
        let outcome = reduce_domain_one(ot, node, suffix_len);
        if let Some(outcome) = outcome {
            results.push((node, outcome));
        }
        let cn = ot.cn_of(node);
        if recheck_cn_domain(ot, cn) {
            results.push((node, ReductionOutcome::CnEmptied));
        }
        match ot.node(node).parent {
            Some(p) => {
                let pm = ot.node_mut(p);
                pm.max_suffix_len = pm.max_suffix_len.max(suffix_len);
                node = p;
            }
            None => break,
        }
    }
    results
}

/// Reduces a single node's domain against all reference states, returning
/// `None` if the domain did not actually change membership.
fn reduce_domain_one(ot: &mut ObservationTree, node: NodeId, suffix_len: i64) -> Option<ReductionOutcome> {
    let candidates: Vec<StateId> = ot.node(node).domain.iter().map(|s| s as StateId).collect();
    let mut removed = false;
    for s in candidates {
        let rep = ot.cn(ot.rn[s as usize]).representative();
        if rep == node {
            continue;
        }
        if are_nodes_different_under(ot, node, rep, suffix_len) {
            ot.node_mut(node).domain.remove(s as usize);
            let cn = ot.cn_of(node);
            let rn_cn = ot.rn[s as usize];
            ot.unlink_domain(cn, rn_cn);
            removed = true;
        }
    }
    if !removed {
        return None;
    }

    let assigned = ot.node(node).state;
    let still_assigned = assigned != fsm_core::WRONG_STATE
        && assigned != fsm_core::NULL_STATE
        && ot.node(node).domain.contains(assigned as usize);
    if assigned != fsm_core::WRONG_STATE && assigned != fsm_core::NULL_STATE && !still_assigned {
        return Some(ReductionOutcome::Inconsistent);
    }

    match ot.node(node).domain.len() {
        0 => Some(ReductionOutcome::NewStateCandidate),
        1 => Some(ReductionOutcome::Identified),
        _ => Some(ReductionOutcome::Unchanged),
    }
}

/// The single remaining candidate state for a node/CN whose domain has
/// shrunk to one, used by the merge step (spec.md §4.4).
pub fn sole_candidate(ot: &ObservationTree, node: NodeId) -> Option<StateId> {
    let mut it = ot.node(node).domain.iter();
    let only = it.next()?;
    if it.next().is_some() {
        None
    } else {
        Some(only as StateId)
    }
}

/// The CN the given candidate state's reference node belongs to.
pub fn reference_cn(ot: &ObservationTree, state: StateId) -> CnId {
    ot.rn[state as usize]
}

/// Re-derives a non-reference CN's domain against full CN-level
/// distinguishability (spec.md §3 Invariant 4: "a CN's domain is the
/// intersection of its members' domains, filtered by CN-level child
/// compatibility"). Drops any reference CN that [`are_convergent_nodes_distinguished`]
/// now proves incompatible even though the bounded per-node walk hasn't
/// caught it yet. Returns `true` exactly when this emptied the CN's domain
/// while at least one member node's own domain is still non-empty — the
/// Case B shape from spec.md §4.6.
pub fn recheck_cn_domain(ot: &mut ObservationTree, cn: CnId) -> bool {
    if ot.cn(cn).is_rn {
        return false;
    }
    let candidates: Vec<CnId> = ot.cn(cn).domain.iter().map(|b| CnId(b as u32)).collect();
    for r in candidates {
        if are_convergent_nodes_distinguished(ot, cn, r) {
            ot.unlink_domain(cn, r);
        }
    }
    if !ot.cn(cn).domain.is_empty() {
        return false;
    }
    ot.cn(cn).convergent.clone().iter().any(|&m| !ot.node(m).domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::query;
    use crate::teacher::{SimulationTeacher, Teacher};
    use fsm_core::{MachineType, DEFAULT_OUTPUT as D};
    use fsm_model::Conjecture;

    fn toggle() -> Conjecture {
        let mut c = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = c.add_state(D);
        c.set_transition(0, 0, 1, b);
        c.set_transition(0, 1, 0, 0);
        c.set_transition(b, 0, 1, 0);
        c.set_transition(b, 1, 1, b);
        c
    }

    #[test]
    fn new_state_candidate_detected_when_output_never_matches() {
        let mut ot = ObservationTree::new(2, 1);
        let mut teacher = SimulationTeacher::new(toggle());
        let mut hyp = Conjecture::new(MachineType::Mealy, 2, 2);
        let _ = teacher.number_of_inputs();
        let leaf = query(&mut ot, &mut teacher, &mut hyp, ot.root(), 0);
        let results = reduce_domain_from_leaf(&mut ot, leaf);
        // single-state hypothesis: the leaf's domain over {0} is untouched
        // by reduction against the root (itself state 0's own reference).
        assert!(results.is_empty() || matches!(results[0].1, ReductionOutcome::Unchanged));
    }
}
