use cranelift_entity::entity_impl;
use cranelift_entity::packed_option::PackedOption;
use smallvec::SmallVec;

use crate::graph::BlockId;

/// A reference to a loop in a graph's loop forest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub u32);
entity_impl!(LoopId, "loop");

/// One natural loop, or the headerless root that collects everything
/// outside any loop.
#[derive(Debug, Clone, Default)]
pub struct LoopData {
    pub header: PackedOption<BlockId>,
    pub back_edge_source: PackedOption<BlockId>,
    pub pre_header: PackedOption<BlockId>,
    pub outer: PackedOption<LoopId>,
    pub inner: SmallVec<[LoopId; 4]>,
    /// Member blocks. For a real loop the back-edge source comes first and
    /// the header last; the root holds its members in layout order.
    pub blocks: Vec<BlockId>,
    pub reducible: bool,
}

impl LoopData {
    pub fn root() -> Self {
        Self { reducible: true, ..Default::default() }
    }

    pub fn new(header: BlockId, back_edge_source: BlockId) -> Self {
        Self {
            header: header.into(),
            back_edge_source: back_edge_source.into(),
            reducible: true,
            ..Default::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.header.is_none()
    }

    pub fn is_header(&self, block: BlockId) -> bool {
        self.header.expand() == Some(block)
    }
}
