//! Foundational types shared across the `fsm-learn` workspace: numeric
//! alphabets and their sentinels, the [`Sequence`] type, the [`MachineType`]
//! tag, shared set/map aliases, and the crate-wide error type.

pub mod alphabet;
pub mod error;
pub mod machine;
pub mod math;
pub mod sequence;

pub use alphabet::{is_stout, Input, Output, StateId, DEFAULT_OUTPUT, NULL_STATE, STOUT, WRONG_OUTPUT, WRONG_STATE};
pub use error::LearnerError;
pub use machine::MachineType;
pub use sequence::Sequence;
