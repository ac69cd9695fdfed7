use fsm_core::{is_stout, MachineType, Output, Sequence, WRONG_OUTPUT};
use fsm_model::Conjecture;

/// A minimally adequate teacher for the S-learner: answers membership
/// queries about an unknown black box and, optionally, equivalence queries
/// against a conjecture (spec.md §6). Every method operates relative to
/// the black box's *current* position; callers are expected to reset
/// explicitly when they need to.
pub trait Teacher {
    fn number_of_inputs(&self) -> u32;
    fn number_of_outputs(&self) -> u32;
    fn black_box_model_type(&self) -> MachineType;

    fn reset_black_box(&mut self);

    /// Applies a single input from the current position and returns the
    /// observed output (transition output if the machine type has one,
    /// state output if `input` is the [`fsm_core::STOUT`] sentinel).
    fn output_query(&mut self, input: u32) -> Output;

    /// Applies a whole sequence from the current position, returning one
    /// output per element.
    fn output_query_sequence(&mut self, sequence: &Sequence) -> Vec<Output> {
        sequence.iter().map(|i| self.output_query(i)).collect()
    }

    /// Resets, replays `prefix`, then applies `suffix` and returns only the
    /// suffix's outputs. Must be supported unconditionally (spec.md §6).
    fn reset_and_output_query_on_suffix(&mut self, prefix: &Sequence, suffix: &Sequence) -> Vec<Output> {
        self.reset_black_box();
        for i in prefix.iter() {
            self.output_query(i);
        }
        self.output_query_sequence(suffix)
    }

    /// Monotonically increasing count of output queries issued, for
    /// logging/telemetry only.
    fn output_query_count(&self) -> u64;

    /// Hard prerequisite: the learner aborts immediately if this is `false`.
    fn is_black_box_resettable(&self) -> bool;

    /// `true` if the teacher can only answer plain membership queries, in
    /// which case the learner must avoid compound `[input, STOUT]` queries
    /// even for machine types that would otherwise use them.
    fn is_provided_only_mq(&self) -> bool {
        false
    }

    /// Returns `None` if `hypothesis` is equivalent to the black box, or
    /// `Some(counterexample)` otherwise. Teachers that cannot answer
    /// equivalence queries simply never get asked (`is_eq_allowed = false`
    /// on the learner).
    fn equivalence_query(&mut self, hypothesis: &Conjecture) -> Option<Sequence>;
}

/// An in-memory reference [`Teacher`] that treats a known [`Conjecture`] as
/// the hidden black box. Grounded on `TeacherBB`/the `oracle.rs` family of
/// oracles: it tracks the black box's current position so that
/// `output_query` never needs an implicit reset, mirroring `TeacherBB`'s
/// `_bbState` bookkeeping.
pub struct SimulationTeacher {
    target: Conjecture,
    current: u32,
    query_count: u64,
    /// Number of `target`'s trailing inputs hidden until `reveal_after`
    /// output queries have been issued.
    hidden_inputs: u32,
    reveal_after: u64,
}

impl SimulationTeacher {
    pub fn new(target: Conjecture) -> Self {
        SimulationTeacher {
            target,
            current: 0,
            query_count: 0,
            hidden_inputs: 0,
            reveal_after: 0,
        }
    }

    /// Makes the teacher hide `extra` of `target`'s trailing inputs until
    /// `after_queries` output queries have been issued, at which point
    /// `number_of_inputs` grows — used to exercise the alphabet-growth
    /// scenario from spec.md §8.
    pub fn reveal_inputs_after(mut self, extra: u32, after_queries: u64) -> Self {
        self.hidden_inputs = extra;
        self.reveal_after = after_queries;
        self
    }

    fn visible_inputs(&self) -> u32 {
        if self.query_count >= self.reveal_after {
            self.target.num_inputs()
        } else {
            self.target.num_inputs() - self.hidden_inputs
        }
    }
}

impl Teacher for SimulationTeacher {
    fn number_of_inputs(&self) -> u32 {
        self.visible_inputs()
    }

    fn number_of_outputs(&self) -> u32 {
        self.target.num_outputs()
    }

    fn black_box_model_type(&self) -> MachineType {
        self.target.machine_type()
    }

    fn reset_black_box(&mut self) {
        self.current = 0;
    }

    fn output_query(&mut self, input: u32) -> Output {
        self.query_count += 1;
        if is_stout(input) {
            return self.target.state_output(self.current);
        }
        match self.target.transition(self.current, input) {
            Some((output, target)) => {
                self.current = target;
                if self.black_box_model_type().is_output_transition() {
                    output
                } else {
                    self.target.state_output(target)
                }
            }
            None => WRONG_OUTPUT,
        }
    }

    fn output_query_count(&self) -> u64 {
        self.query_count
    }

    fn is_black_box_resettable(&self) -> bool {
        true
    }

    fn equivalence_query(&mut self, hypothesis: &Conjecture) -> Option<Sequence> {
        // Breadth-first walk of the product of target × hypothesis,
        // mirroring `DFAOracle`/`MealyOracle::equivalence` in oracle.rs:
        // any reachable pair disagreeing on an output is a counterexample.
        use std::collections::VecDeque;
        let mt = self.black_box_model_type();
        let mut visited = vec![false; self.target.num_states() * hypothesis.num_states().max(1)];
        let key = |a: u32, b: u32| a as usize * hypothesis.num_states() + b as usize;
        let mut queue = VecDeque::new();
        queue.push_back((0u32, 0u32, Sequence::empty()));
        visited[key(0, 0)] = true;
        while let Some((ts, hs, path)) = queue.pop_front() {
            if mt.is_output_state() && self.target.state_output(ts) != hypothesis.state_output(hs) {
                return Some(path);
            }
            for i in 0..self.number_of_inputs() {
                let t_trans = self.target.transition(ts, i);
                let h_trans = hypothesis.transition(hs, i);
                let (to, tt, ho, ht) = match (t_trans, h_trans) {
                    (Some((to, tt)), Some((ho, ht))) => (to, tt, ho, ht),
                    (None, None) => continue,
                    // One side has a transition on `i` and the other doesn't:
                    // that disagreement is itself a counterexample.
                    _ => return Some(path.appended(i)),
                };
                if mt.is_output_transition() && to != ho {
                    return Some(path.appended(i));
                }
                let k = key(tt, ht);
                if !visited[k] {
                    visited[k] = true;
                    queue.push_back((tt, ht, path.appended(i)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::DEFAULT_OUTPUT;

    #[test]
    fn simulation_teacher_tracks_position() {
        let mut c = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = c.add_state(DEFAULT_OUTPUT);
        c.set_transition(0, 0, 1, b);
        c.set_transition(0, 1, 0, 0);
        c.set_transition(b, 0, 1, 0);
        c.set_transition(b, 1, 1, b);
        let mut t = SimulationTeacher::new(c);
        assert_eq!(t.output_query(0), 1);
        assert_eq!(t.output_query(1), 0);
        t.reset_black_box();
        assert_eq!(t.output_query(0), 1);
    }
}
