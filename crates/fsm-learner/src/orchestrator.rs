use std::collections::{BTreeSet, BinaryHeap, VecDeque};

use fsm_core::{Input, LearnerError, Sequence, StateId, DEFAULT_OUTPUT, STOUT};
use fsm_model::Conjecture;
use fsm_smethod::{SMethod, SplittingTree};
use tracing::{debug, info, warn};

use crate::domain_reduction::{reduce_domain_from_leaf, reference_cn, sole_candidate, ReductionOutcome};
use crate::inconsistency::{process_inconsistent, Inconsistency, ProcessOutcome};
use crate::merge::{merge_convergent, sync_confirmed_transitions, MergeOutcome};
use crate::planner::{choose_unconfirmed, identify_next_state};
use crate::promote::promote_to_new_state;
use crate::query::query;
use crate::teacher::Teacher;
use crate::tree::{NodeId, ObservationTree};

/// Constructor-level configuration for [`slearner`], taking the place of
/// the original's global mutable state (spec.md §7, Design Notes).
pub struct LearnerConfig {
    /// Upper bound on the extra-state assumption before the learner either
    /// asks for an equivalence query or gives up.
    pub max_extra_states: u32,
    /// Whether `Teacher::equivalence_query` may be called at all.
    pub is_eq_allowed: bool,
    /// Reserved for callers that want the in-progress conjecture even if
    /// learning is later aborted; `slearner` always returns its best
    /// conjecture on every exit path regardless, so this only affects
    /// whether partial progress is logged at `info` level.
    pub provide_tentative_model: bool,
    /// Optional sink for human-readable progress/error messages, in place
    /// of the original's process-wide error callback.
    pub on_message: Option<Box<dyn FnMut(&str)>>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            max_extra_states: 3,
            is_eq_allowed: true,
            provide_tentative_model: false,
            on_message: None,
        }
    }
}

impl LearnerConfig {
    fn notify(&mut self, message: &str) {
        if let Some(cb) = self.on_message.as_mut() {
            cb(message);
        }
    }
}

/// Applies the consequences of a batch of [`ReductionOutcome`]s: identified
/// nodes get merged into their target state's reference CN, emptied domains
/// get promoted to a new state, and nodes whose own assignment no longer
/// holds are queued as inconsistencies. Newly confirmed transitions are
/// dropped from `unconfirmed`; newly promoted states gain a fresh entry.
fn handle_touched(
    ot: &mut ObservationTree,
    conjecture: &mut Conjecture,
    touched: Vec<(NodeId, ReductionOutcome)>,
    unconfirmed: &mut Vec<BTreeSet<Input>>,
    inconsistent: &mut VecDeque<Inconsistency>,
) -> Result<(), LearnerError> {
    for (node, outcome) in touched {
        match outcome {
            ReductionOutcome::Unchanged => {}
            ReductionOutcome::Identified => {
                let Some(state) = sole_candidate(ot, node) else {
                    continue;
                };
                let target = reference_cn(ot, state);
                let source = ot.cn_of(node);
                if source == target {
                    continue;
                }
                match merge_convergent(ot, conjecture, source, target)? {
                    MergeOutcome::Merged => {}
                    MergeOutcome::Inconsistent { distinguishing } => {
                        let rep = ot.cn(target).representative();
                        inconsistent.push_back(Inconsistency::MergeConflict {
                            n1: node,
                            n2: rep,
                            distinguishing,
                        });
                    }
                    MergeOutcome::HardInconsistency { distinguishing } => {
                        return Err(LearnerError::ReferenceStatesProvedEqual(distinguishing));
                    }
                }
            }
            ReductionOutcome::NewStateCandidate => {
                let new_state = promote_to_new_state(ot, conjecture, node);
                if new_state as usize >= unconfirmed.len() {
                    unconfirmed.resize(new_state as usize + 1, BTreeSet::new());
                }
                unconfirmed[new_state as usize] = (0..ot.num_inputs).collect();
                debug!(state = new_state, "promoted observation tree node to a new state");
            }
            ReductionOutcome::Inconsistent => {
                inconsistent.push_back(Inconsistency::WrongAssignedState { node });
            }
            ReductionOutcome::CnEmptied => {
                inconsistent.push_back(Inconsistency::EmptiedCn { node });
            }
        }
    }
    for (state, input) in sync_confirmed_transitions(ot, conjecture) {
        unconfirmed[state as usize].remove(&input);
    }
    Ok(())
}

/// The S-learner orchestrator entry point (spec.md §4.8). Drives `teacher`
/// with output and (optionally) equivalence queries until it converges on a
/// conjecture the teacher accepts, or the extra-state/equivalence budget is
/// exhausted.
pub fn slearner(
    teacher: &mut dyn Teacher,
    method: &dyn SMethod,
    config: &mut LearnerConfig,
) -> Result<Conjecture, LearnerError> {
    if !teacher.is_black_box_resettable() {
        return Err(LearnerError::NotResettable);
    }

    let mt = teacher.black_box_model_type();
    let num_inputs = teacher.number_of_inputs();
    let num_outputs = teacher.number_of_outputs();

    teacher.reset_black_box();
    let state0_output = if mt.is_output_state() {
        teacher.output_query(STOUT)
    } else {
        DEFAULT_OUTPUT
    };

    let mut ot = ObservationTree::new(num_inputs, 4);
    ot.node_mut(ot.root()).state_output = state0_output;
    let mut conjecture = Conjecture::new(mt, num_inputs, num_outputs);
    conjecture.set_state_output(0, state0_output);

    let mut unconfirmed: Vec<BTreeSet<Input>> = vec![(0..num_inputs).collect()];
    let mut inconsistent: VecDeque<Inconsistency> = VecDeque::new();
    let mut requested: BinaryHeap<Sequence> = BinaryHeap::new();
    let mut splitting_tree: Option<SplittingTree> = None;
    let mut es: u32 = 0;
    let mut number_of_extra_states: u32 = 0;
    let mut known_inputs = num_inputs;

    loop {
        // A `query` call anywhere below may have grown `ot.num_inputs` (the
        // teacher revealing a larger alphabet, spec.md §4.1). Existing
        // states never got a chance to have the new inputs added to their
        // `unconfirmed` set at the time, so backfill it here before picking
        // the next thing to do.
        if ot.num_inputs > known_inputs {
            for set in unconfirmed.iter_mut() {
                set.extend(known_inputs..ot.num_inputs);
            }
            debug!(from = known_inputs, to = ot.num_inputs, "grew unconfirmed transitions for revealed inputs");
            known_inputs = ot.num_inputs;
        }

        if let Some(item) = inconsistent.pop_front() {
            let (outcome, touched) = process_inconsistent(&mut ot, teacher, &mut conjecture, item);
            if outcome == ProcessOutcome::NoProgress {
                return Err(LearnerError::NoProgressResolvingInconsistency);
            }
            handle_touched(&mut ot, &mut conjecture, touched, &mut unconfirmed, &mut inconsistent)?;
            continue;
        }

        if unconfirmed.iter().any(|s| !s.is_empty()) {
            let pairs: Vec<(StateId, Input)> = unconfirmed
                .iter()
                .enumerate()
                .flat_map(|(s, inputs)| inputs.iter().map(move |&i| (s as StateId, i)))
                .collect();
            let Some((from, _state, input)) = choose_unconfirmed(&ot, &pairs) else {
                return Err(LearnerError::Invariant(
                    "unconfirmed transitions present but none selectable".into(),
                ));
            };
            let (_leaf, touched) = identify_next_state(&mut ot, teacher, &mut conjecture, from, input)?;
            handle_touched(&mut ot, &mut conjecture, touched, &mut unconfirmed, &mut inconsistent)?;
            continue;
        }

        if let Some(seq) = requested.pop() {
            let mut cur = ot.root();
            for i in seq.iter() {
                cur = query(&mut ot, teacher, &mut conjecture, cur, i);
            }
            let touched = reduce_domain_from_leaf(&mut ot, cur);
            handle_touched(&mut ot, &mut conjecture, touched, &mut unconfirmed, &mut inconsistent)?;
            continue;
        }

        if splitting_tree.is_none() {
            if !conjecture.is_complete() {
                return Err(LearnerError::Invariant(
                    "raising the extra-state assumption before every confirmed transition is set".into(),
                ));
            }
            es = 1;
            number_of_extra_states = 1;
            let (minimized, mapping) = conjecture.minimize();
            let identity: Vec<StateId> = (0..conjecture.num_states() as StateId).collect();
            if mapping != identity {
                return Err(LearnerError::MinimizationNotIdentity);
            }
            splitting_tree = Some(SplittingTree::build(&minimized));
            config.notify("raised extra-state assumption to 1, built splitting tree");
        } else {
            number_of_extra_states += 1;
            es = number_of_extra_states;
        }

        if number_of_extra_states > config.max_extra_states {
            if config.is_eq_allowed {
                if let Some(counterexample) = teacher.equivalence_query(&conjecture) {
                    warn!(?counterexample, "equivalence query returned a counterexample");
                    number_of_extra_states -= 1;
                    es = 0;
                    requested.push(counterexample);
                    continue;
                }
            }
            info!(states = conjecture.num_states(), "learning converged");
            return Ok(conjecture);
        }

        let fresh = method.generate(&conjecture, es, splitting_tree.as_ref().unwrap(), &|_| false);
        if fresh.is_empty() {
            info!(states = conjecture.num_states(), "S-method produced nothing new; converged");
            return Ok(conjecture);
        }
        requested.extend(fresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineType;
    use fsm_model::are_isomorphic;
    use fsm_smethod::WSetMethod;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    use crate::teacher::SimulationTeacher;

    fn learn(mut teacher: SimulationTeacher, max_extra_states: u32) -> Conjecture {
        let mut config = LearnerConfig {
            max_extra_states,
            is_eq_allowed: true,
            provide_tentative_model: false,
            on_message: None,
        };
        slearner(&mut teacher, &WSetMethod, &mut config).expect("learning must succeed")
    }

    /// spec.md §8 scenario 1: trivial one-state DFA, self-loop output 0.
    #[test]
    fn trivial_one_state_dfa() {
        let mut hidden = Conjecture::new(MachineType::Dfa, 2, 2);
        hidden.set_state_output(0, 0);
        hidden.set_transition(0, 0, DEFAULT_OUTPUT, 0);
        hidden.set_transition(0, 1, DEFAULT_OUTPUT, 0);

        let learned = learn(SimulationTeacher::new(hidden.clone()), 2);
        assert_eq!(learned.num_states(), 1);
        assert!(are_isomorphic(&learned, &hidden));
    }

    /// spec.md §8 scenario 2: two-state Mealy toggle.
    #[test]
    fn two_state_mealy_toggle() {
        let mut hidden = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = hidden.add_state(DEFAULT_OUTPUT);
        hidden.set_transition(0, 0, 1, b);
        hidden.set_transition(0, 1, 0, 0);
        hidden.set_transition(b, 0, 1, 0);
        hidden.set_transition(b, 1, 1, b);

        let learned = learn(SimulationTeacher::new(hidden.clone()), 2);
        assert_eq!(learned.num_states(), 2);
        assert!(are_isomorphic(&learned, &hidden));
    }

    /// spec.md §8 scenario 3: Moore three-state cycle A->B->C->A on input 0,
    /// self-loops on input 1, state outputs a=0,b=1,c=2.
    #[test]
    fn moore_three_state_cycle() {
        let mut hidden = Conjecture::new(MachineType::Moore, 2, 3);
        hidden.set_state_output(0, 0);
        let b = hidden.add_state(1);
        let c = hidden.add_state(2);
        hidden.set_transition(0, 0, DEFAULT_OUTPUT, b);
        hidden.set_transition(0, 1, DEFAULT_OUTPUT, 0);
        hidden.set_transition(b, 0, DEFAULT_OUTPUT, c);
        hidden.set_transition(b, 1, DEFAULT_OUTPUT, b);
        hidden.set_transition(c, 0, DEFAULT_OUTPUT, 0);
        hidden.set_transition(c, 1, DEFAULT_OUTPUT, c);

        let learned = learn(SimulationTeacher::new(hidden.clone()), 2);
        assert_eq!(learned.num_states(), 3);
        assert!(are_isomorphic(&learned, &hidden));
    }

    /// spec.md §8 scenario 4: a 4-state DFSM (both transition and state
    /// output), a mod-4 counter on input 0 (wrapping 3->0 emits transition
    /// output 1, otherwise 0) with a reset on input 1, and state output
    /// equal to the state id mod 2 — requiring two Moore-refinement rounds
    /// to tell all four states apart, which pushes the learner past
    /// `extraStates == 0` at least once.
    #[test]
    fn dfsm_four_state_with_extra_state_verification() {
        let mut hidden = Conjecture::new(MachineType::Dfsm, 2, 2);
        hidden.set_state_output(0, 0);
        let s1 = hidden.add_state(1);
        let s2 = hidden.add_state(0);
        let s3 = hidden.add_state(1);
        hidden.set_transition(0, 0, 0, s1);
        hidden.set_transition(0, 1, 0, 0);
        hidden.set_transition(s1, 0, 0, s2);
        hidden.set_transition(s1, 1, 0, 0);
        hidden.set_transition(s2, 0, 0, s3);
        hidden.set_transition(s2, 1, 0, 0);
        hidden.set_transition(s3, 0, 1, 0);
        hidden.set_transition(s3, 1, 0, 0);

        let learned = learn(SimulationTeacher::new(hidden.clone()), 3);
        assert_eq!(learned.num_states(), 4);
        assert!(are_isomorphic(&learned, &hidden));
    }

    /// spec.md §8 scenario 5: with `max_extra_states = 0` the learner
    /// reaches for an equivalence query as soon as every currently-known
    /// transition is confirmed rather than ever raising `extraStates`; any
    /// state the S-method's verification sequences would otherwise have
    /// surfaced must instead come back as an equivalence-query
    /// counterexample and get folded in before the learner converges.
    #[test]
    fn counterexample_feedback_drives_missing_state_discovery() {
        let mut hidden = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = hidden.add_state(DEFAULT_OUTPUT);
        let c = hidden.add_state(DEFAULT_OUTPUT);
        hidden.set_transition(0, 0, 1, b);
        hidden.set_transition(0, 1, 0, 0);
        hidden.set_transition(b, 0, 0, c);
        hidden.set_transition(b, 1, 1, 0);
        hidden.set_transition(c, 0, 1, c);
        hidden.set_transition(c, 1, 0, b);

        let learned = learn(SimulationTeacher::new(hidden.clone()), 0);
        assert_eq!(learned.num_states(), 3);
        assert!(are_isomorphic(&learned, &hidden));
    }

    /// spec.md §8 scenario 6: the teacher initially reports 2 inputs, and
    /// reveals a 3rd after a handful of queries. The learner must grow the
    /// conjecture without losing any prior observation.
    #[test]
    fn alphabet_growth_mid_learning() {
        let mut hidden = Conjecture::new(MachineType::Mealy, 3, 2);
        let b = hidden.add_state(DEFAULT_OUTPUT);
        hidden.set_transition(0, 0, 1, b);
        hidden.set_transition(0, 1, 0, 0);
        hidden.set_transition(0, 2, 1, 0);
        hidden.set_transition(b, 0, 1, 0);
        hidden.set_transition(b, 1, 1, b);
        hidden.set_transition(b, 2, 0, b);

        let teacher = SimulationTeacher::new(hidden.clone()).reveal_inputs_after(1, 4);
        let learned = learn(teacher, 2);
        assert_eq!(learned.num_states(), 2);
        assert!(are_isomorphic(&learned, &hidden));
    }

    /// A minimal (by construction: each state's output and the `(output,
    /// target)` row it produces is distinct from every state before it)
    /// random Mealy machine, for the termination/isomorphism property test
    /// (spec.md §8, property 1). Built with a small linear-congruential
    /// generator driven off `rand` rather than proptest/quickcheck, matching
    /// the ambient test tooling described in SPEC_FULL.md.
    fn random_minimal_mealy(rng: &mut StdRng, num_states: u32, num_inputs: u32, num_outputs: u32) -> Conjecture {
        loop {
            let mut c = Conjecture::new(MachineType::Mealy, num_inputs, num_outputs);
            for _ in 1..num_states {
                c.add_state(DEFAULT_OUTPUT);
            }
            for s in 0..num_states {
                for i in 0..num_inputs {
                    let target = rng.gen_range(0..num_states);
                    let output = rng.gen_range(0..num_outputs);
                    c.set_transition(s, i, output, target);
                }
            }
            let (minimized, _) = c.minimize();
            if minimized.num_states() as u32 == num_states {
                return c;
            }
        }
    }

    #[test]
    fn random_machines_are_learned_exactly() {
        for seed in 0..6u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let num_states = rng.gen_range(3..=6);
            let hidden = random_minimal_mealy(&mut rng, num_states, 2, 2);
            let learned = learn(SimulationTeacher::new(hidden.clone()), 2);
            assert_eq!(learned.num_states(), hidden.num_states(), "seed {seed}");
            assert!(are_isomorphic(&learned, &hidden), "seed {seed}");
        }
    }
}
