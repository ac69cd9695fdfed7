/// The four machine shapes the learner can construct, distinguished (per
/// the Design Notes) by whether transition output and/or state output are
/// present rather than by a deeper class hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    /// Both transition output and state output.
    Dfsm,
    /// Transition output only.
    Mealy,
    /// State output only.
    Moore,
    /// State output only, over a boolean output alphabet by convention.
    Dfa,
}

impl MachineType {
    /// `true` iff transitions carry an observable output.
    pub fn is_output_transition(self) -> bool {
        matches!(self, MachineType::Dfsm | MachineType::Mealy)
    }

    /// `true` iff states carry an observable output.
    pub fn is_output_state(self) -> bool {
        matches!(self, MachineType::Dfsm | MachineType::Moore | MachineType::Dfa)
    }

    /// `true` iff a single query should probe both outputs at once, i.e. the
    /// learner issues a compound `[input, STOUT]` query rather than two
    /// separate ones.
    pub fn uses_compound_query(self) -> bool {
        matches!(self, MachineType::Dfsm)
    }
}
