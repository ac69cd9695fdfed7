use std::collections::VecDeque;

use fsm_core::{math::Set, Sequence, StateId};
use fsm_model::Conjecture;
use itertools::Itertools;

use crate::splitting_tree::SplittingTree;

/// The external collaborator pinned by spec.md §6: given a conjecture, the
/// current `es` extra-state assumption and a splitting tree built from the
/// (minimized) conjecture, produce a set of input sequences sufficient to
/// certify every transition of the conjecture up to `es` extra states.
pub trait SMethod {
    /// `already_queried` lets the method omit sequences whose outcome the
    /// learner's observation tree already recorded.
    fn generate(
        &self,
        conjecture: &Conjecture,
        extra_states: u32,
        tree: &SplittingTree,
        already_queried: &dyn Fn(&Sequence) -> bool,
    ) -> Set<Sequence>;
}

/// Shortest access sequence (from state 0) to every reachable state, found
/// via BFS — the "state cover" half of any W/Wp/H-style method.
fn state_cover(conjecture: &Conjecture) -> Vec<Sequence> {
    let n = conjecture.num_states();
    let mut cover = vec![None; n];
    cover[0] = Some(Sequence::empty());
    let mut queue = VecDeque::from([0u32]);
    while let Some(s) = queue.pop_front() {
        for i in 0..conjecture.num_inputs() {
            if let Some((_, t)) = conjecture.transition(s, i) {
                if cover[t as usize].is_none() {
                    let seq = cover[s as usize].as_ref().unwrap().appended(i);
                    cover[t as usize] = Some(seq);
                    queue.push_back(t);
                }
            }
        }
    }
    cover
        .into_iter()
        .map(|c| c.unwrap_or_else(Sequence::empty))
        .collect()
}

/// All input sequences of length `0..=max_len` over `0..num_inputs`.
fn middle_sequences(num_inputs: u32, max_len: u32) -> Vec<Sequence> {
    let mut out = vec![Sequence::empty()];
    let mut frontier = vec![Sequence::empty()];
    for _ in 0..max_len {
        let mut next = Vec::new();
        for seq in &frontier {
            for i in 0..num_inputs {
                next.push(seq.appended(i));
            }
        }
        out.extend(next.iter().cloned());
        frontier = next;
    }
    out
}

/// A reference S-method in the style of the Vasilevskii-Chow/Wp family:
/// state cover × transition × middle sequences of length `0..=es` ×
/// per-state identifying sequences taken from the splitting tree.
///
/// This is intentionally the one conformance-testing method this
/// workspace implements — the general W/Wp/HSI/H/SPY/SPYH suite is out of
/// scope (spec.md §1).
#[derive(Debug, Default, Clone, Copy)]
pub struct WSetMethod;

impl SMethod for WSetMethod {
    fn generate(
        &self,
        conjecture: &Conjecture,
        extra_states: u32,
        tree: &SplittingTree,
        already_queried: &dyn Fn(&Sequence) -> bool,
    ) -> Set<Sequence> {
        let covers = state_cover(conjecture);
        let middles = middle_sequences(conjecture.num_inputs(), extra_states);
        let idents: Vec<Sequence> = (0..conjecture.num_states() as StateId)
            .map(|s| Sequence::from_vec(tree.identifying_sequence(s)))
            .collect();

        let mut out = Set::default();
        for (s, access) in covers.iter().enumerate() {
            for input in 0..conjecture.num_inputs() {
                if conjecture.transition(s as StateId, input).is_none() {
                    continue;
                }
                let base = access.appended(input);
                for (mid, ident) in middles.iter().cartesian_product(idents.iter()) {
                    let full = base.concat(mid).concat(ident);
                    if !already_queried(&full) {
                        out.insert(full);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineType;

    #[test]
    fn generates_nonempty_cover_for_small_machine() {
        let mut c = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = c.add_state(0);
        c.set_transition(0, 0, 1, b);
        c.set_transition(0, 1, 0, 0);
        c.set_transition(b, 0, 1, 0);
        c.set_transition(b, 1, 1, b);
        let tree = SplittingTree::build(&c);
        let seqs = WSetMethod.generate(&c, 1, &tree, &|_| false);
        assert!(!seqs.is_empty());
    }
}
