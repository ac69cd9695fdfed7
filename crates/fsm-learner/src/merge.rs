use std::collections::HashSet;

use fsm_core::{Input, LearnerError, Sequence, StateId};
use fsm_model::Conjecture;

use crate::distinguish::find_separating_sequence;
use crate::tree::{CnId, NodeId, ObservationTree};

/// Result of [`merge_convergent`].
#[derive(Debug)]
pub enum MergeOutcome {
    /// The merge completed.
    Merged,
    /// `source`'s domain did not contain `target` (a reference CN):
    /// distinguishing witness attached.
    Inconsistent { distinguishing: Sequence },
    /// Two reference CNs were forced equal by the merge — two states
    /// previously assumed distinct are in fact the same (spec.md §4.4).
    HardInconsistency { distinguishing: Sequence },
}

fn separating_sequence_hint(ot: &ObservationTree, a: CnId, b: CnId) -> Option<Sequence> {
    let ra = ot.cn(a).representative();
    let rb = ot.cn(b).representative();
    find_separating_sequence(ot, ra, rb)
}

/// Rewrites every CN's `next` entries that still point at `from` to point
/// at `to` instead. `from` is dead after a merge but other CNs elsewhere in
/// the overlay may still hold a stale pointer to it.
fn redirect(ot: &mut ObservationTree, from: CnId, to: CnId) {
    for cn in &mut ot.cns {
        for slot in &mut cn.next {
            if *slot == Some(from) {
                *slot = Some(to);
            }
        }
    }
}

/// Merges `source`'s convergence class into `target`'s (spec.md §4.4).
/// `target` is always authoritative: its `is_rn`/`state` survive, `source`'s
/// members are repointed and its domain absorbed. Recurses through every
/// input's child CN pair. Detects the two hard-inconsistency shapes: a
/// source whose domain excludes a reference target, and two reference CNs
/// forced to merge.
pub fn merge_convergent(
    ot: &mut ObservationTree,
    _conjecture: &mut Conjecture,
    source: CnId,
    target: CnId,
) -> Result<MergeOutcome, LearnerError> {
    let mut stack = vec![(source, target)];
    let mut seen = HashSet::new();

    while let Some((src, tgt)) = stack.pop() {
        if src == tgt {
            continue;
        }
        let key = (src, tgt);
        if !seen.insert(key) {
            continue;
        }
        let src_is_rn = ot.cn(src).is_rn;
        let tgt_is_rn = ot.cn(tgt).is_rn;

        if src_is_rn && tgt_is_rn {
            let distinguishing =
                separating_sequence_hint(ot, src, tgt).ok_or(LearnerError::NoSeparatingSequence)?;
            return Ok(MergeOutcome::HardInconsistency { distinguishing });
        }
        if tgt_is_rn && !ot.cn(src).domain.contains(tgt.0 as usize) {
            let distinguishing =
                separating_sequence_hint(ot, src, tgt).ok_or(LearnerError::NoSeparatingSequence)?;
            return Ok(MergeOutcome::Inconsistent { distinguishing });
        }

        // `src` is retiring (its members/identity are absorbed into `tgt`);
        // drop its own domain links symmetrically first so no reference CN
        // is left pointing at a CN id that no longer independently exists
        // (spec.md §3 Invariant 5).
        let src_domain_bits: Vec<usize> = ot.cn(src).domain.iter().collect();
        for bit in &src_domain_bits {
            ot.cn_mut(CnId(*bit as u32)).domain.remove(src.0 as usize);
        }

        if !tgt_is_rn {
            // Both sides live in the same index space here (sets of
            // candidate reference-CN ids): the merged CN's domain is their
            // intersection, with the symmetric link dropped for every
            // reference CN `tgt` no longer claims compatibility with.
            let tgt_domain_before: Vec<usize> = ot.cn(tgt).domain.iter().collect();
            let mut merged = ot.cn(tgt).domain.clone();
            merged.intersect_with(&ot.cn(src).domain);
            ot.cn_mut(tgt).domain = merged;
            for bit in tgt_domain_before {
                if !ot.cn(tgt).domain.contains(bit) {
                    ot.cn_mut(CnId(bit as u32)).domain.remove(tgt.0 as usize);
                }
            }
        }
        // If `tgt` is a reference CN, its domain lives in the other index
        // space (non-reference-CN ids); `src`'s own id was already dropped
        // from it above via the symmetric-unlink loop, and nothing else
        // about `tgt`'s domain changes from this merge.

        let src_members = std::mem::take(&mut ot.cn_mut(src).convergent);
        for &m in &src_members {
            ot.node_mut(m).convergent_node = tgt;
        }
        ot.cn_mut(tgt).convergent.extend(src_members);
        let mut with_len: Vec<(NodeId, usize)> = ot
            .cn(tgt)
            .convergent
            .iter()
            .map(|&n| (n, ot.node(n).access_sequence.len()))
            .collect();
        with_len.sort_by_key(|&(_, l)| l);
        ot.cn_mut(tgt).convergent = with_len.into_iter().map(|(n, _)| n).collect();

        for i in 0..ot.num_inputs {
            let sc = ot.cn(src).next[i as usize];
            let tc = ot.cn(tgt).next[i as usize];
            match (sc, tc) {
                (Some(s), Some(t)) => stack.push((s, t)),
                (Some(s), None) => ot.cn_mut(tgt).next[i as usize] = Some(s),
                _ => {}
            }
        }

        ot.cn_mut(src).domain = fsm_core::math::Domain::new();
        redirect(ot, src, tgt);
    }

    Ok(MergeOutcome::Merged)
}

/// Scans every reference CN's `next` row for edges that now point to
/// another reference CN but are not yet written into the conjecture
/// (spec.md §4.4: "each newly-confirmed transition is recorded"). A single
/// merge's `redirect` can retarget a CN pointer belonging to a reference CN
/// unrelated to that merge's own `source`/`target` pair — e.g. the merged
/// node's own parent — so this is swept globally after each batch of
/// merges/promotions rather than threaded through `merge_convergent` itself.
pub fn sync_confirmed_transitions(ot: &ObservationTree, conjecture: &mut Conjecture) -> Vec<(StateId, Input)> {
    let mut confirmed = Vec::new();
    for state in 0..ot.rn.len() as StateId {
        let cn_id = ot.rn[state as usize];
        for i in 0..ot.num_inputs {
            if conjecture.transition(state, i).is_some() {
                continue;
            }
            let Some(child_cn) = ot.cn(cn_id).next[i as usize] else {
                continue;
            };
            if !ot.cn(child_cn).is_rn {
                continue;
            }
            let Some(child_state) = ot.cn(child_cn).state else {
                continue;
            };
            let output = ot
                .cn(cn_id)
                .convergent
                .iter()
                .find_map(|&m| ot.node(m).next[i as usize].map(|c| ot.node(c).incoming_output));
            let Some(output) = output else {
                continue;
            };
            conjecture.set_transition(state, i, output, child_state);
            confirmed.push((state, i));
        }
    }
    confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineType;

    #[test]
    fn merging_a_cn_into_itself_is_a_no_op() {
        let mut ot = ObservationTree::new(1, 1);
        let mut conjecture = Conjecture::new(MachineType::Mealy, 1, 1);
        let root_cn = ot.cn_of(ot.root());
        match merge_convergent(&mut ot, &mut conjecture, root_cn, root_cn) {
            Ok(MergeOutcome::Merged) => {}
            other => panic!("expected Ok(Merged), got {other:?}"),
        }
    }
}
