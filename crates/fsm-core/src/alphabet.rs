//! Numeric alphabets and the handful of sentinel values the learner and its
//! collaborators agree on.

/// An input symbol. Inputs are dense, zero-based codes; the alphabet size is
/// `Teacher::number_of_inputs`.
pub type Input = u32;

/// An output symbol. Like [`Input`], dense and zero-based.
pub type Output = u32;

/// A conjecture state id.
pub type StateId = u32;

/// Sentinel input used to probe a state's own output ("state-output" query),
/// meaningful only for [`crate::MachineType`] values with `is_output_state()`.
pub const STOUT: Input = Input::MAX;

/// Placeholder output meaning "not yet observed".
pub const DEFAULT_OUTPUT: Output = Output::MAX;

/// Sentinel output used to mark a contradicted observation.
pub const WRONG_OUTPUT: Output = Output::MAX - 1;

/// Placeholder state id meaning "not yet assigned".
pub const NULL_STATE: StateId = StateId::MAX;

/// Sentinel state id marking a node whose observation contradicted its
/// previous assignment.
pub const WRONG_STATE: StateId = StateId::MAX - 1;

/// `true` iff `input` is the [`STOUT`] sentinel rather than a real alphabet symbol.
pub fn is_stout(input: Input) -> bool {
    input == STOUT
}
