use fsm_core::{Sequence, StateId};
use fsm_model::Conjecture;

use crate::distinguish::are_node_and_convergent_different;
use crate::domain_reduction::{reduce_domain_from_leaf, ReductionOutcome};
use crate::query::query;
use crate::teacher::Teacher;
use crate::tree::{NodeId, ObservationTree};

/// The three inconsistency shapes `processInconsistent` dispatches on
/// (spec.md §4.6).
pub enum Inconsistency {
    /// Case A: `node`'s assigned state fell out of its own domain.
    WrongAssignedState { node: NodeId },
    /// Case B: `node`'s CN emptied before it could be promoted.
    EmptiedCn { node: NodeId },
    /// Case C: a merge proved `n1`/`n2` (under `fn1`/`fn2`) contradictory
    /// along `distinguishing`.
    MergeConflict {
        n1: NodeId,
        n2: NodeId,
        distinguishing: Sequence,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Progress,
    NoProgress,
}

/// Replays `suffix` from `start`, returning the resulting leaf. Used to
/// force a distinguishing sequence into the observation tree so the
/// contradiction it certifies becomes directly observable, rather than
/// merely asserted.
fn drive_queries(
    ot: &mut ObservationTree,
    teacher: &mut dyn Teacher,
    conjecture: &mut Conjecture,
    start: NodeId,
    suffix: &Sequence,
) -> NodeId {
    let mut cur = start;
    for i in suffix.iter() {
        cur = query(ot, teacher, conjecture, cur, i);
    }
    cur
}

/// Resolves one pending inconsistency, producing fresh observations that
/// feed back into domain reduction. Returns [`ProcessOutcome::NoProgress`]
/// only when a bug upstream left nothing to observe — the caller should
/// treat that as fatal (spec.md §4.8, step 1).
pub fn process_inconsistent(
    ot: &mut ObservationTree,
    teacher: &mut dyn Teacher,
    conjecture: &mut Conjecture,
    item: Inconsistency,
) -> (ProcessOutcome, Vec<(NodeId, ReductionOutcome)>) {
    match item {
        Inconsistency::WrongAssignedState { node } => {
            let ancestor = ot.nearest_reference_ancestor(node);
            if ancestor == node {
                return (ProcessOutcome::NoProgress, Vec::new());
            }
            let transfer = node_suffix(ot, ancestor, node);
            let leaf = drive_queries(ot, teacher, conjecture, ancestor, &transfer);
            let touched = reduce_domain_from_leaf(ot, leaf);
            let outcome = if touched.is_empty() {
                ProcessOutcome::NoProgress
            } else {
                ProcessOutcome::Progress
            };
            (outcome, touched)
        }
        Inconsistency::EmptiedCn { node } => {
            let ancestor = ot.nearest_reference_ancestor(node);
            let transfer = node_suffix(ot, ancestor, node);
            let leaf = drive_queries(ot, teacher, conjecture, ancestor, &transfer);

            // The CN emptied under full CN-level distinguishability
            // (spec.md §4.6 Case B) but `leaf`'s own per-node domain may
            // not reflect that yet — the bounded per-node walk only drops
            // a candidate once it personally proves the difference. Force
            // it now with the unbounded node-vs-CN check.
            let remaining: Vec<StateId> = ot.node(leaf).domain.iter().map(|s| s as StateId).collect();
            for s in remaining {
                let rn_cn = ot.rn[s as usize];
                if are_node_and_convergent_different(ot, leaf, rn_cn) {
                    ot.node_mut(leaf).domain.remove(s as usize);
                    let leaf_cn = ot.cn_of(leaf);
                    ot.unlink_domain(leaf_cn, rn_cn);
                }
            }

            let mut touched = Vec::new();
            match ot.node(leaf).domain.len() {
                0 => touched.push((leaf, ReductionOutcome::NewStateCandidate)),
                1 => touched.push((leaf, ReductionOutcome::Identified)),
                _ => {}
            }
            touched.extend(reduce_domain_from_leaf(ot, leaf));

            let outcome = if touched.is_empty() {
                ProcessOutcome::NoProgress
            } else {
                ProcessOutcome::Progress
            };
            (outcome, touched)
        }
        Inconsistency::MergeConflict { n1, n2, distinguishing } => {
            let leaf1 = drive_queries(ot, teacher, conjecture, n1, &distinguishing);
            let leaf2 = drive_queries(ot, teacher, conjecture, n2, &distinguishing);
            let mut touched = reduce_domain_from_leaf(ot, leaf1);
            touched.extend(reduce_domain_from_leaf(ot, leaf2));
            let outcome = if touched.is_empty() {
                ProcessOutcome::NoProgress
            } else {
                ProcessOutcome::Progress
            };
            (outcome, touched)
        }
    }
}

/// The input sequence from `ancestor` down to `descendant`, i.e. the suffix
/// of `descendant`'s access sequence beyond `ancestor`'s (`getAccessSequence`).
fn node_suffix(ot: &ObservationTree, ancestor: NodeId, descendant: NodeId) -> Sequence {
    let prefix_len = ot.node(ancestor).access_sequence.len();
    ot.node(descendant).access_sequence.suffix_after(prefix_len)
}
