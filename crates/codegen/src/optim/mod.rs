//! Graph rewrites.

pub mod check_elim;
pub mod const_folding;
pub mod dce;
pub mod inliner;
pub mod peephole;
