//! Minuet intermediate representation.
//!
//! Function bodies are [`Graph`]s of basic blocks holding SSA instructions.
//! Instructions and blocks live in arenas keyed by [`InstId`] and
//! [`BlockId`]; program order is a separate [`layout::Layout`] so rewrites
//! can relink cheaply. Graphs are constructed through the deferred-binding
//! [`builder::GraphBuilder`] and grouped into a [`Module`].

pub mod builder;
pub mod graph;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod live_interval;
pub mod loops;
pub mod marker;
pub mod module;
pub mod opcode;

pub use builder::{BuildError, GraphBuilder};
pub use graph::{Absorbed, Analysis, BlockData, BlockId, Graph};
pub use inst::{Inst, InstData, InstId};
pub use live_interval::{LiveInterval, LiveRange, Location};
pub use loops::{LoopData, LoopId};
pub use marker::{Marker, MarkerManager, MarkerWords};
pub use module::{GraphRef, Module};
pub use opcode::{InstKind, Opcode};
