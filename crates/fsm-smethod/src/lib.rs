//! The two external collaborators pinned by spec.md §6: a splitting-tree
//! builder and one concrete S-method verification-sequence generator.

mod smethod;
mod splitting_tree;

pub use smethod::{SMethod, WSetMethod};
pub use splitting_tree::{SplitNode, SplittingTree};
