use fsm_core::{Input, Output, StateId};
use fsm_model::Conjecture;

/// A node of a [`SplittingTree`]. Leaves hold a single state; internal
/// nodes hold the input that separates their states into the groups
/// listed in `children`, keyed by the `(output, target)` pair observed
/// under that input.
#[derive(Debug, Clone)]
pub struct SplitNode {
    pub states: Vec<StateId>,
    pub probe: Option<Input>,
    pub children: Vec<((Output, StateId), usize)>,
}

/// A tree whose leaves are conjecture states and whose internal nodes are
/// inputs separating them (spec.md §6, §4.7/GLOSSARY). Built once per
/// extra-state bump from a minimized conjecture and handed to the
/// [`crate::SMethod`] as an opaque artifact.
#[derive(Debug, Clone)]
pub struct SplittingTree {
    nodes: Vec<SplitNode>,
}

impl SplittingTree {
    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, idx: usize) -> &SplitNode {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The sequence of probes from the root down to the leaf holding
    /// `state` — a valid identifying sequence for `state` (the H-method
    /// style "own identifying sequence" per leaf, see SPEC_FULL.md).
    pub fn identifying_sequence(&self, state: StateId) -> Vec<Input> {
        let mut path = Vec::new();
        self.collect_path(self.root(), state, &mut path);
        path
    }

    fn collect_path(&self, idx: usize, state: StateId, path: &mut Vec<Input>) -> bool {
        let node = &self.nodes[idx];
        if node.states.len() == 1 {
            return node.states[0] == state;
        }
        let Some(probe) = node.probe else { return false };
        for (_, child_idx) in &node.children {
            if self.collect_path(*child_idx, state, path) {
                path.insert(0, probe);
                return true;
            }
        }
        false
    }

    /// Builds a splitting tree for a conjecture whose states are all
    /// pairwise distinguishable (i.e. minimal, as every conjecture the
    /// learner produces between promotions is by construction).
    pub fn build(conjecture: &Conjecture) -> SplittingTree {
        let mut nodes = Vec::new();
        let all_states: Vec<StateId> = (0..conjecture.num_states() as StateId).collect();
        build_node(conjecture, all_states, &mut nodes);
        SplittingTree { nodes }
    }
}

/// Recursively splits `states` by the first input whose `(output, target)`
/// signature is not identical across all of them. Terminates because a
/// minimal conjecture guarantees every pair of distinct states disagrees
/// on some input's signature (otherwise they'd have been merged already).
fn build_node(conjecture: &Conjecture, states: Vec<StateId>, nodes: &mut Vec<SplitNode>) -> usize {
    if states.len() <= 1 {
        nodes.push(SplitNode {
            states,
            probe: None,
            children: vec![],
        });
        return nodes.len() - 1;
    }

    for input in 0..conjecture.num_inputs() {
        let mut groups: Vec<((Output, StateId), Vec<StateId>)> = Vec::new();
        for &s in &states {
            let sig = conjecture
                .transition(s, input)
                .expect("conjecture must be complete before building a splitting tree");
            match groups.iter_mut().find(|(key, _)| *key == sig) {
                Some((_, members)) => members.push(s),
                None => groups.push((sig, vec![s])),
            }
        }
        if groups.len() > 1 {
            let idx = nodes.len();
            nodes.push(SplitNode {
                states: states.clone(),
                probe: Some(input),
                children: vec![],
            });
            let mut children = Vec::with_capacity(groups.len());
            for (key, members) in groups {
                let child_idx = build_node(conjecture, members, nodes);
                children.push((key, child_idx));
            }
            nodes[idx].children = children;
            return idx;
        }
    }
    unreachable!("minimal conjecture must have a separating input for any group of >1 states")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineType;

    #[test]
    fn toggle_machine_splits_into_two_leaves() {
        let mut c = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = c.add_state(fsm_core::DEFAULT_OUTPUT);
        c.set_transition(0, 0, 1, b);
        c.set_transition(0, 1, 0, 0);
        c.set_transition(b, 0, 1, 0);
        c.set_transition(b, 1, 1, b);

        let tree = SplittingTree::build(&c);
        assert!(!tree.identifying_sequence(0).is_empty());
        assert!(!tree.identifying_sequence(1).is_empty());
    }
}
