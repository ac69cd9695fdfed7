use thiserror::Error;

use crate::sequence::Sequence;

/// Errors the learner surfaces. Per spec.md §7, an observation
/// inconsistency (a re-observed edge disagreeing with a prior one under
/// `ES > 0` verification) is *not* an error here — it is recorded as a
/// `WRONG_STATE` node and routed through the inconsistency queue instead.
///
/// Everything in this enum corresponds to a bare `throw;` in the original
/// source: a branch the author considered unreachable. We promote each to a
/// named, non-recoverable variant rather than silently guessing a recovery.
#[derive(Debug, Error)]
pub enum LearnerError {
    /// `Teacher::is_black_box_resettable` returned `false`. Hard
    /// precondition: the learner cannot proceed at all.
    #[error("black box is not resettable; Slearner cannot run")]
    NotResettable,

    /// The consistency engine drained `inconsistentNodes` without making
    /// any progress (no new reference states, no new observations). This
    /// can only happen if an invariant documented in spec.md §3 was
    /// violated earlier.
    #[error("consistency engine made no progress resolving a pending inconsistency")]
    NoProgressResolvingInconsistency,

    /// `minimize()` was asked to minimize a conjecture the learner already
    /// believes is minimal (one reference node per state) and returned a
    /// non-identity state mapping.
    #[error("minimization of an already-minimal conjecture returned a non-identity mapping")]
    MinimizationNotIdentity,

    /// A separating sequence between two states/nodes was requested, but
    /// none could be found even though the caller believed the two were
    /// distinguishable.
    #[error("no separating sequence exists between the requested states")]
    NoSeparatingSequence,

    /// A merge discovered that two states already believed distinct are in
    /// fact forced equal — a hard inconsistency with no available
    /// resolution (spec.md §4.4).
    #[error("merge proved two reference states equal that were assumed distinct, along {0}")]
    ReferenceStatesProvedEqual(Sequence),

    /// The teacher returned a differently-sized alphabet than previously
    /// observed in a position where growth is not the expected response
    /// (guards defensive code; alphabet growth itself is handled silently
    /// elsewhere per spec.md §7).
    #[error("invariant violation: {0}")]
    Invariant(String),
}
