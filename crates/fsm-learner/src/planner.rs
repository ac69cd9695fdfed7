use fsm_core::{Input, LearnerError, StateId};
use fsm_model::Conjecture;

use crate::distinguish::find_separating_sequence;
use crate::domain_reduction::{reduce_domain_from_leaf, reference_cn, ReductionOutcome};
use crate::query::query;
use crate::teacher::Teacher;
use crate::tree::{CnId, NodeId, ObservationTree};

/// `tryExtendQueriedPath`: picks the unconfirmed `(state, input)` pair whose
/// state has the shortest access sequence, so the walk from the nearest
/// reference node stays cheap (spec.md §4.7).
pub fn choose_unconfirmed(
    ot: &ObservationTree,
    unconfirmed: &[(StateId, Input)],
) -> Option<(NodeId, StateId, Input)> {
    unconfirmed
        .iter()
        .min_by_key(|(s, _)| {
            let cn = ot.rn[*s as usize];
            ot.node(ot.cn(cn).representative()).access_sequence.len()
        })
        .map(|&(s, i)| {
            let cn = ot.rn[s as usize];
            (ot.cn(cn).representative(), s, i)
        })
}

/// The candidate states a CN's domain still contains, recovered by scanning
/// `ObservationTree::rn` (domains over non-reference CNs are kept in
/// reference-CN-id space, spec.md §3).
fn candidate_states(ot: &ObservationTree, cn: CnId) -> Vec<StateId> {
    ot.cn(cn)
        .domain
        .iter()
        .filter_map(|bit| ot.rn.iter().position(|&rn_cn| rn_cn.0 as usize == bit).map(|s| s as StateId))
        .collect()
}

/// `identifyNextState`: applies `input` from `from`, then repeatedly
/// disambiguates the resulting leaf's remaining candidate states on the
/// fly — pick any two surviving reference states, find an already-queried
/// suffix that separates their reference nodes, drive it into the leaf, and
/// let domain reduction drop whichever candidate the leaf's real output
/// just ruled out (spec.md §4.7). Repeats until at most one candidate
/// remains. Returns the final leaf together with every `(node, outcome)`
/// domain-reduction produced along the way, for the caller to fold into
/// `handle_touched` directly.
pub fn identify_next_state(
    ot: &mut ObservationTree,
    teacher: &mut dyn Teacher,
    conjecture: &mut Conjecture,
    from: NodeId,
    input: Input,
) -> Result<(NodeId, Vec<(NodeId, ReductionOutcome)>), LearnerError> {
    let mut leaf = query(ot, teacher, conjecture, from, input);
    let mut touched = reduce_domain_from_leaf(ot, leaf);

    loop {
        let cn = ot.cn_of(leaf);
        let candidates = candidate_states(ot, cn);
        if candidates.len() <= 1 {
            return Ok((leaf, touched));
        }

        let r1 = reference_cn(ot, candidates[0]);
        let r2 = reference_cn(ot, candidates[1]);
        let n1 = ot.cn(r1).representative();
        let n2 = ot.cn(r2).representative();
        let separating =
            find_separating_sequence(ot, n1, n2).ok_or(LearnerError::NoSeparatingSequence)?;

        let mut cur = leaf;
        for i in separating.iter() {
            cur = query(ot, teacher, conjecture, cur, i);
        }
        leaf = cur;
        touched.extend(reduce_domain_from_leaf(ot, leaf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn identify_next_state_returns_a_leaf() {
        let mut ot = ObservationTree::new(2, 1);
        let mut teacher = SimulationTeacher::new(toggle());
        let mut hyp = Conjecture::new(MachineType::Mealy, 2, 2);
        let (leaf, _touched) =
            identify_next_state(&mut ot, &mut teacher, &mut hyp, ot.root(), 0).expect("no hard inconsistency");
        assert_eq!(ot.node(leaf).incoming_output, 1);
    }
}
