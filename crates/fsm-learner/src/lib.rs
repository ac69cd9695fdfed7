//! The S-learner: active learning of a minimal deterministic FSM through a
//! black-box [`Teacher`] oracle (spec.md §1-§9). Builds an observation tree
//! with a convergent-node equivalence overlay, resolves inconsistencies as
//! they arise, and verifies convergence via an S-method supplied by
//! `fsm-smethod` before accepting a conjecture.

mod distinguish;
mod domain_reduction;
mod inconsistency;
mod merge;
mod orchestrator;
mod planner;
mod promote;
mod query;
mod teacher;
mod tree;

pub use orchestrator::{slearner, LearnerConfig};
pub use teacher::{SimulationTeacher, Teacher};
pub use tree::{AssumedState, CnId, ConvergentNode, NodeId, OTreeNode, ObservationTree};

pub use distinguish::{
    are_convergent_nodes_distinguished, are_node_and_convergent_different, are_nodes_different,
    are_nodes_different_under, find_separating_sequence,
};
pub use domain_reduction::{reduce_domain_from_leaf, recheck_cn_domain, reference_cn, sole_candidate, ReductionOutcome};
pub use inconsistency::{process_inconsistent, Inconsistency, ProcessOutcome};
pub use merge::{merge_convergent, sync_confirmed_transitions, MergeOutcome};
pub use planner::{choose_unconfirmed, identify_next_state};
pub use promote::promote_to_new_state;
pub use query::query;
