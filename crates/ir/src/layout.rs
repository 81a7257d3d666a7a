//! Ordering of blocks in a graph and of instructions in a block, kept as
//! intrusive doubly linked lists over secondary maps so that insertion and
//! removal never move other entities.

use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::SecondaryMap;

use crate::graph::BlockId;
use crate::inst::InstId;

#[derive(Debug, Clone, Default)]
struct BlockNode {
    prev: PackedOption<BlockId>,
    next: PackedOption<BlockId>,
    first_inst: PackedOption<InstId>,
    last_inst: PackedOption<InstId>,
    inst_count: u32,
}

#[derive(Debug, Clone, Default)]
struct InstNode {
    block: PackedOption<BlockId>,
    prev: PackedOption<InstId>,
    next: PackedOption<InstId>,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    blocks: SecondaryMap<BlockId, BlockNode>,
    insts: SecondaryMap<InstId, InstNode>,
    first_block: PackedOption<BlockId>,
    last_block: PackedOption<BlockId>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.first_block.expand()
    }

    pub fn last_block(&self) -> Option<BlockId> {
        self.last_block.expand()
    }

    pub fn prev_block_of(&self, block: BlockId) -> Option<BlockId> {
        self.blocks[block].prev.expand()
    }

    pub fn next_block_of(&self, block: BlockId) -> Option<BlockId> {
        self.blocks[block].next.expand()
    }

    pub fn is_block_inserted(&self, block: BlockId) -> bool {
        Some(block) == self.first_block.expand() || self.blocks[block].prev.is_some()
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block].first_inst.expand()
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block].last_inst.expand()
    }

    pub fn inst_count_of(&self, block: BlockId) -> usize {
        self.blocks[block].inst_count as usize
    }

    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.first_inst_of(block).is_none()
    }

    pub fn inst_block(&self, inst: InstId) -> BlockId {
        debug_assert!(self.is_inst_inserted(inst), "inst is not linked into a block");
        self.insts[inst].block.unwrap()
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.insts[inst].block.is_some()
    }

    pub fn prev_inst_of(&self, inst: InstId) -> Option<InstId> {
        self.insts[inst].prev.expand()
    }

    pub fn next_inst_of(&self, inst: InstId) -> Option<InstId> {
        self.insts[inst].next.expand()
    }

    pub fn append_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_block_inserted(block), "block is already linked");
        let mut node = BlockNode::default();
        if let Some(last) = self.last_block.expand() {
            node.prev = last.into();
            self.blocks[last].next = block.into();
        } else {
            self.first_block = block.into();
        }
        self.blocks[block] = node;
        self.last_block = block.into();
    }

    pub fn remove_block(&mut self, block: BlockId) {
        debug_assert!(self.is_block_inserted(block), "block is not linked");
        debug_assert!(self.is_block_empty(block), "block to remove still holds insts");
        let node = std::mem::take(&mut self.blocks[block]);
        match node.prev.expand() {
            Some(prev) => self.blocks[prev].next = node.next,
            None => self.first_block = node.next,
        }
        match node.next.expand() {
            Some(next) => self.blocks[next].prev = node.prev,
            None => self.last_block = node.prev,
        }
    }

    pub fn append_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.is_inst_inserted(inst), "inst is already linked");
        let mut node = InstNode { block: block.into(), ..InstNode::default() };
        if let Some(last) = self.blocks[block].last_inst.expand() {
            node.prev = last.into();
            self.insts[last].next = inst.into();
        } else {
            self.blocks[block].first_inst = inst.into();
        }
        self.insts[inst] = node;
        self.blocks[block].last_inst = inst.into();
        self.blocks[block].inst_count += 1;
    }

    pub fn prepend_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(!self.is_inst_inserted(inst), "inst is already linked");
        let mut node = InstNode { block: block.into(), ..InstNode::default() };
        if let Some(first) = self.blocks[block].first_inst.expand() {
            node.next = first.into();
            self.insts[first].prev = inst.into();
        } else {
            self.blocks[block].last_inst = inst.into();
        }
        self.insts[inst] = node;
        self.blocks[block].first_inst = inst.into();
        self.blocks[block].inst_count += 1;
    }

    pub fn insert_inst_before(&mut self, inst: InstId, before: InstId) {
        debug_assert!(!self.is_inst_inserted(inst), "inst is already linked");
        debug_assert!(self.is_inst_inserted(before), "anchor inst is not linked");
        let block = self.insts[before].block.unwrap();
        match self.insts[before].prev.expand() {
            Some(prev) => {
                self.insts[inst].prev = prev.into();
                self.insts[prev].next = inst.into();
            }
            None => self.blocks[block].first_inst = inst.into(),
        }
        self.insts[inst].next = before.into();
        self.insts[inst].block = block.into();
        self.insts[before].prev = inst.into();
        self.blocks[block].inst_count += 1;
    }

    pub fn insert_inst_after(&mut self, inst: InstId, after: InstId) {
        debug_assert!(!self.is_inst_inserted(inst), "inst is already linked");
        debug_assert!(self.is_inst_inserted(after), "anchor inst is not linked");
        let block = self.insts[after].block.unwrap();
        match self.insts[after].next.expand() {
            Some(next) => {
                self.insts[inst].next = next.into();
                self.insts[next].prev = inst.into();
            }
            None => self.blocks[block].last_inst = inst.into(),
        }
        self.insts[inst].prev = after.into();
        self.insts[inst].block = block.into();
        self.insts[after].next = inst.into();
        self.blocks[block].inst_count += 1;
    }

    /// Unlinks `inst` from its block, fixing both neighbours.
    pub fn remove_inst(&mut self, inst: InstId) {
        debug_assert!(self.is_inst_inserted(inst), "inst is not linked");
        let node = std::mem::take(&mut self.insts[inst]);
        let block = node.block.unwrap();
        match node.prev.expand() {
            Some(prev) => self.insts[prev].next = node.next,
            None => self.blocks[block].first_inst = node.next,
        }
        match node.next.expand() {
            Some(next) => self.insts[next].prev = node.prev,
            None => self.blocks[block].last_inst = node.prev,
        }
        self.blocks[block].inst_count -= 1;
    }

    pub fn block_iter(&self) -> BlockIter<'_> {
        BlockIter { layout: self, next: self.first_block.expand() }
    }

    pub fn inst_iter(&self, block: BlockId) -> InstIter<'_> {
        InstIter { layout: self, next: self.blocks[block].first_inst.expand() }
    }
}

pub struct BlockIter<'a> {
    layout: &'a Layout,
    next: Option<BlockId>,
}

impl Iterator for BlockIter<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let block = self.next?;
        self.next = self.layout.next_block_of(block);
        Some(block)
    }
}

pub struct InstIter<'a> {
    layout: &'a Layout,
    next: Option<InstId>,
}

impl Iterator for InstIter<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let inst = self.next?;
        self.next = self.layout.next_inst_of(inst);
        Some(inst)
    }
}
