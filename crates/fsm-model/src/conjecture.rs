use std::collections::VecDeque;

use fsm_core::{MachineType, Output, StateId, DEFAULT_OUTPUT};
use tracing::trace;

/// An incrementally mutable minimal-FSM container — the "conjecture
/// builder" of spec.md §2. States and transitions are added one at a time
/// as the learner discovers them; nothing here assumes the machine is
/// complete until [`Conjecture::is_complete`] says so.
#[derive(Debug, Clone)]
pub struct Conjecture {
    machine_type: MachineType,
    num_inputs: u32,
    num_outputs: u32,
    /// `transitions[state][input] = Some((output, target))` once confirmed.
    /// `output` is `DEFAULT_OUTPUT` for machine types without transition
    /// output.
    transitions: Vec<Vec<Option<(Output, StateId)>>>,
    /// `DEFAULT_OUTPUT` for machine types without state output.
    state_outputs: Vec<Output>,
}

impl Conjecture {
    /// Creates a conjecture with a single state (state 0, the initial
    /// state) and the given alphabet sizes.
    pub fn new(machine_type: MachineType, num_inputs: u32, num_outputs: u32) -> Self {
        Conjecture {
            machine_type,
            num_inputs,
            num_outputs,
            transitions: vec![vec![None; num_inputs as usize]],
            state_outputs: vec![DEFAULT_OUTPUT],
        }
    }

    pub fn machine_type(&self) -> MachineType {
        self.machine_type
    }

    pub fn num_states(&self) -> usize {
        self.transitions.len()
    }

    pub fn num_inputs(&self) -> u32 {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> u32 {
        self.num_outputs
    }

    /// Adds a fresh state, returning its id. Every existing transition row
    /// grows to accommodate the current input alphabet.
    pub fn add_state(&mut self, state_output: Output) -> StateId {
        let id = self.transitions.len() as StateId;
        self.transitions.push(vec![None; self.num_inputs as usize]);
        self.state_outputs.push(state_output);
        trace!(state = id, "conjecture gained a state");
        id
    }

    pub fn set_transition(&mut self, state: StateId, input: u32, output: Output, target: StateId) {
        self.transitions[state as usize][input as usize] = Some((output, target));
    }

    pub fn set_state_output(&mut self, state: StateId, output: Output) {
        self.state_outputs[state as usize] = output;
    }

    pub fn transition(&self, state: StateId, input: u32) -> Option<(Output, StateId)> {
        self.transitions
            .get(state as usize)
            .and_then(|row| row.get(input as usize))
            .copied()
            .flatten()
    }

    pub fn state_output(&self, state: StateId) -> Output {
        self.state_outputs[state as usize]
    }

    /// Grows the input alphabet to `new_size`, padding every state's
    /// transition row. Per spec.md §7, alphabet growth is always silently
    /// adapted; it is never an error.
    pub fn grow_inputs(&mut self, new_size: u32) {
        if new_size <= self.num_inputs {
            return;
        }
        for row in &mut self.transitions {
            row.resize(new_size as usize, None);
        }
        self.num_inputs = new_size;
    }

    pub fn grow_outputs(&mut self, new_size: u32) {
        self.num_outputs = self.num_outputs.max(new_size);
    }

    /// `true` iff every state has a transition for every input (and, for
    /// output-state machines, a non-default state output).
    pub fn is_complete(&self) -> bool {
        self.transitions.iter().all(|row| row.iter().all(Option::is_some))
            && (!self.machine_type.is_output_state()
                || self.state_outputs.iter().all(|o| *o != DEFAULT_OUTPUT))
    }

    /// Computes a Moore-style partition refinement and returns a minimized
    /// copy together with the mapping from old to new state ids. If `self`
    /// is already minimal (every state already pairwise distinguishable)
    /// the returned mapping is the identity `0..num_states`.
    pub fn minimize(&self) -> (Conjecture, Vec<StateId>) {
        let n = self.num_states();
        // initial partition: by state output (if present), else all-in-one
        let mut class_of: Vec<usize> = if self.machine_type.is_output_state() {
            let mut seen = Vec::new();
            (0..n)
                .map(|s| {
                    let o = self.state_outputs[s];
                    if let Some(pos) = seen.iter().position(|x| *x == o) {
                        pos
                    } else {
                        seen.push(o);
                        seen.len() - 1
                    }
                })
                .collect()
        } else {
            vec![0; n]
        };

        loop {
            let mut signatures: Vec<(usize, Vec<(u32, Output, Option<usize>)>)> = Vec::with_capacity(n);
            for s in 0..n {
                let mut sig = Vec::with_capacity(self.num_inputs as usize);
                for i in 0..self.num_inputs {
                    match self.transition(s as StateId, i) {
                        Some((out, target)) => sig.push((i, out, Some(class_of[target as usize]))),
                        None => sig.push((i, DEFAULT_OUTPUT, None)),
                    }
                }
                signatures.push((class_of[s], sig));
            }
            let mut new_classes: Vec<(usize, Vec<(u32, Output, Option<usize>)>)> = Vec::new();
            let mut next_class_of = vec![0usize; n];
            for s in 0..n {
                let key = &signatures[s];
                let pos = new_classes.iter().position(|c| c == key);
                let idx = match pos {
                    Some(i) => i,
                    None => {
                        new_classes.push(key.clone());
                        new_classes.len() - 1
                    }
                };
                next_class_of[s] = idx;
            }
            let refined = new_classes.len() != class_of.iter().collect::<std::collections::HashSet<_>>().len();
            class_of = next_class_of;
            if !refined {
                break;
            }
        }

        // renumber classes in BFS order from state 0 so the initial state keeps id 0
        let mut order: Vec<usize> = Vec::new();
        let mut seen = vec![false; class_of.iter().max().map(|m| m + 1).unwrap_or(0)];
        let mut queue = VecDeque::new();
        queue.push_back(class_of[0]);
        seen[class_of[0]] = true;
        while let Some(c) = queue.pop_front() {
            order.push(c);
            // find a representative state in class c to enumerate its successors
            if let Some(rep) = (0..n).find(|s| class_of[*s] == c) {
                for i in 0..self.num_inputs {
                    if let Some((_, target)) = self.transition(rep as StateId, i) {
                        let tc = class_of[target as usize];
                        if !seen[tc] {
                            seen[tc] = true;
                            queue.push_back(tc);
                        }
                    }
                }
            }
        }
        let renumber: Vec<usize> = {
            let mut r = vec![usize::MAX; order.len()];
            for (new_id, old_class) in order.iter().enumerate() {
                r[*old_class] = new_id;
            }
            r
        };

        let mapping: Vec<StateId> = (0..n).map(|s| renumber[class_of[s]] as StateId).collect();
        let num_classes = order.len();

        let mut out = Conjecture {
            machine_type: self.machine_type,
            num_inputs: self.num_inputs,
            num_outputs: self.num_outputs,
            transitions: vec![vec![None; self.num_inputs as usize]; num_classes],
            state_outputs: vec![DEFAULT_OUTPUT; num_classes],
        };
        for s in 0..n {
            let new_s = mapping[s];
            out.state_outputs[new_s as usize] = self.state_outputs[s];
            for i in 0..self.num_inputs {
                if let Some((o, t)) = self.transition(s as StateId, i) {
                    out.transitions[new_s as usize][i as usize] = Some((o, mapping[t as usize]));
                }
            }
        }

        (out, mapping)
    }
}

/// `true` iff `a` and `b` describe the same machine up to state renaming:
/// transition-output-sensitive for [`MachineType::Mealy`]/[`MachineType::Dfsm`],
/// state-output-sensitive for [`MachineType::Moore`]/[`MachineType::Dfa`]/[`MachineType::Dfsm`].
pub fn are_isomorphic(a: &Conjecture, b: &Conjecture) -> bool {
    if a.machine_type() != b.machine_type() || a.num_states() != b.num_states() {
        return false;
    }
    let n = a.num_states();
    let mut map_a_to_b = vec![None; n];
    let mut map_b_to_a = vec![None; n];
    map_a_to_b[0] = Some(0u32);
    map_b_to_a[0] = Some(0u32);
    let mut queue = VecDeque::new();
    queue.push_back((0u32, 0u32));

    let mt = a.machine_type();
    while let Some((sa, sb)) = queue.pop_front() {
        if mt.is_output_state() && a.state_output(sa) != b.state_output(sb) {
            return false;
        }
        for i in 0..a.num_inputs() {
            let ta = a.transition(sa, i);
            let tb = b.transition(sb, i);
            match (ta, tb) {
                (None, None) => continue,
                (Some((oa, qa)), Some((ob, qb))) => {
                    if mt.is_output_transition() && oa != ob {
                        return false;
                    }
                    match (map_a_to_b[qa as usize], map_b_to_a[qb as usize]) {
                        (Some(expect_b), Some(expect_a)) => {
                            if expect_b != qb || expect_a != qa {
                                return false;
                            }
                        }
                        (None, None) => {
                            map_a_to_b[qa as usize] = Some(qb);
                            map_b_to_a[qb as usize] = Some(qa);
                            queue.push_back((qa, qb));
                        }
                        _ => return false,
                    }
                }
                _ => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineType;

    /// A genuinely 2-state Mealy machine (asymmetric on input 1, unlike the
    /// textbook "symmetric toggle" which is actually 1-state in disguise).
    fn toggle_mealy() -> Conjecture {
        let mut c = Conjecture::new(MachineType::Mealy, 2, 2);
        let b = c.add_state(DEFAULT_OUTPUT);
        c.set_transition(0, 0, 1, b);
        c.set_transition(0, 1, 0, 0);
        c.set_transition(b, 0, 1, 0);
        c.set_transition(b, 1, 1, b);
        c
    }

    #[test]
    fn minimal_machine_is_isomorphic_to_itself() {
        let c = toggle_mealy();
        let (min, mapping) = c.minimize();
        assert_eq!(mapping, vec![0, 1]);
        assert!(are_isomorphic(&c, &min));
    }

    #[test]
    fn distinguishable_states_stay_separate() {
        let c = toggle_mealy();
        assert_eq!(c.num_states(), 2);
        let (min, _) = c.minimize();
        assert_eq!(min.num_states(), 2);
    }

    #[test]
    fn redundant_state_gets_merged() {
        let mut c = Conjecture::new(MachineType::Mealy, 1, 1);
        let b = c.add_state(DEFAULT_OUTPUT);
        c.set_transition(0, 0, 0, b);
        c.set_transition(b, 0, 0, b);
        let (min, mapping) = c.minimize();
        assert_eq!(min.num_states(), 1);
        assert_eq!(mapping[0], mapping[1]);
    }
}
