use fsm_core::math::full_domain;
use fsm_core::{Input, MachineType, DEFAULT_OUTPUT, STOUT, WRONG_STATE};
use fsm_model::Conjecture;
use tracing::{trace, warn};

use crate::teacher::Teacher;
use crate::tree::{NodeId, ObservationTree};

/// Repositions the black box at `node` by resetting and replaying its
/// access sequence, unless it is already there (`ObservationTree::bb_node`,
/// mirroring `TeacherBB`'s `_bbState` caching — spec.md's Supplemented
/// notes on `TeacherBB`).
fn position_bb(ot: &mut ObservationTree, teacher: &mut dyn Teacher, node: NodeId) {
    if ot.bb_node == node {
        return;
    }
    teacher.reset_black_box();
    for i in ot.node(node).access_sequence.iter() {
        teacher.output_query(i);
    }
    ot.bb_node = node;
}

/// Installs the initial candidate-state domain for a freshly observed leaf:
/// every state whose state-output matches the observation, or every state
/// for machine types without a state output (spec.md §4.1).
fn initial_domain(conjecture: &Conjecture, mt: MachineType, state_output: u32) -> fsm_core::math::Domain {
    if mt.is_output_state() {
        let mut d = fsm_core::math::Domain::with_capacity(conjecture.num_states());
        for s in 0..conjecture.num_states() as u32 {
            if conjecture.state_output(s) == state_output {
                d.insert(s as usize);
            }
        }
        d
    } else {
        full_domain(conjecture.num_states())
    }
}

/// The primitive query operation (spec.md §4.1): observes the black box's
/// reaction to `input` applied after reaching `node`. Creates `node.next[input]`
/// if it doesn't exist yet, or re-observes it if it does (the `ES > 0`
/// verification path). Returns the resulting child node id; the caller
/// inspects `OTreeNode::is_wrong_state` to detect a discrepancy and feed it
/// to the inconsistency queue.
pub fn query(
    ot: &mut ObservationTree,
    teacher: &mut dyn Teacher,
    conjecture: &mut Conjecture,
    node: NodeId,
    input: Input,
) -> NodeId {
    let visible_inputs = teacher.number_of_inputs();
    if visible_inputs > ot.num_inputs {
        trace!(from = ot.num_inputs, to = visible_inputs, "teacher revealed a larger alphabet");
        ot.grow_inputs(visible_inputs);
        conjecture.grow_inputs(visible_inputs);
    }

    let mt = teacher.black_box_model_type();
    position_bb(ot, teacher, node);

    let observed = teacher.output_query(input);
    let (incoming_output, state_output) = match mt {
        MachineType::Mealy => (observed, DEFAULT_OUTPUT),
        MachineType::Dfsm => {
            let so = teacher.output_query(STOUT);
            (observed, so)
        }
        MachineType::Moore | MachineType::Dfa => (DEFAULT_OUTPUT, observed),
    };
    if let Some(existing) = ot.node(node).next[input as usize] {
        ot.bb_node = existing;
        let child = ot.node(existing);
        let agrees = child.incoming_output == incoming_output
            && (!mt.is_output_state() || child.state_output == state_output);
        if !agrees {
            warn!(node = existing.0, input, "re-observed edge disagrees with prior observation");
            let n = ot.node_mut(existing);
            n.state = WRONG_STATE;
        }
        return existing;
    }

    let leaf = ot.push_node(node, input, incoming_output);
    ot.bb_node = leaf;
    let domain = initial_domain(conjecture, mt, state_output);
    {
        let n = ot.node_mut(leaf);
        n.state_output = state_output;
        n.domain = domain;
    }
    let cn = ot.push_cn_for_node(leaf);
    {
        let cn_domain = {
            let d = &ot.node(leaf).domain;
            let mut rn_bits = fsm_core::math::Domain::with_capacity(ot.rn.len());
            for s in d.iter() {
                rn_bits.insert(ot.rn[s].0 as usize);
            }
            rn_bits
        };
        ot.cn_mut(cn).domain = cn_domain;
    }
    {
        let parent = ot.node_mut(node);
        parent.next[input as usize] = Some(leaf);
        parent.last_queried_input = Some(input);
        parent.max_suffix_len = 1;
    }
    let parent_cn = ot.cn_of(node);
    ot.cn_mut(parent_cn).next[input as usize] = Some(cn);
    leaf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teacher::SimulationTeacher;
    use fsm_core::DEFAULT_OUTPUT as D;

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
    fn first_query_creates_a_child_and_records_output() {
        let mut ot = ObservationTree::new(2, 1);
        let mut teacher = SimulationTeacher::new(toggle());
        let mut conjecture = Conjecture::new(MachineType::Mealy, 2, 2);
        let leaf = query(&mut ot, &mut teacher, &mut conjecture, ot.root(), 0);
        assert_eq!(ot.node(leaf).incoming_output, 1);
        assert_eq!(ot.node(ot.root()).next[0], Some(leaf));
    }
}
