//! Analyses, rewrites and register allocation over minuet graphs.
//!
//! Analyses cache their results on the [`Graph`](minuet_ir::Graph) itself
//! and track validity through [`Analysis`](minuet_ir::Analysis) bits;
//! rewrites declare what they preserve and the [`pass::PassManager`]
//! invalidates the rest.

pub mod domtree;
pub mod domtree_slow;
pub mod linear_order;
pub mod liveness;
pub mod loop_analysis;
pub mod optim;
pub mod pass;
pub mod regalloc;
pub mod rpo;

pub use pass::{Pass, PassManager};
pub use regalloc::RegAlloc;
