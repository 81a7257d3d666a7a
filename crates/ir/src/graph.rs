use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::inst::{Inst, InstData, InstId};
use crate::layout::Layout;
use crate::live_interval::{LiveInterval, LiveRange};
use crate::loops::{LoopData, LoopId};
use crate::marker::{Marker, MarkerManager, MarkerWords};
use crate::opcode::{InstKind, Opcode};

/// An opaque reference to a basic block in a [`Graph`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A basic block: declared id plus its CFG edges. The instruction list lives
/// in the graph's [`Layout`].
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub id: u32,
    pub preds: SmallVec<[BlockId; 2]>,
    pub succs: SmallVec<[BlockId; 2]>,
    /// Temporarily detached from the CFG. Traversals skip unbound blocks.
    pub unbound: bool,
}

/// Cached analyses over a graph. Rewrites name the analyses they preserve;
/// everything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    Rpo,
    DomTreeSlow,
    DomTreeFast,
    Loops,
    LinearOrder,
    Liveness,
}

impl Analysis {
    pub const ALL: [Analysis; 6] = [
        Analysis::Rpo,
        Analysis::DomTreeSlow,
        Analysis::DomTreeFast,
        Analysis::Loops,
        Analysis::LinearOrder,
        Analysis::Liveness,
    ];

    fn bit(self) -> u8 {
        match self {
            Analysis::Rpo => 1 << 0,
            Analysis::DomTreeSlow => 1 << 1,
            Analysis::DomTreeFast => 1 << 2,
            Analysis::Loops => 1 << 3,
            Analysis::LinearOrder => 1 << 4,
            Analysis::Liveness => 1 << 5,
        }
    }
}

/// Blocks absorbed from another graph, in their original layout order.
/// The callee entry is the first element.
#[derive(Debug, Clone)]
pub struct Absorbed {
    pub blocks: Vec<BlockId>,
}

impl Absorbed {
    pub fn entry(&self) -> BlockId {
        self.blocks[0]
    }
}

/// A single function body in SSA form: instruction and block arenas, the
/// layout linking them, def-use edges and cached analysis results.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    insts: PrimaryMap<InstId, Inst>,
    blocks: PrimaryMap<BlockId, BlockData>,
    pub layout: Layout,

    users: SecondaryMap<InstId, Vec<InstId>>,
    orphaned: SecondaryMap<InstId, bool>,

    inst_by_id: FxHashMap<u32, InstId>,
    block_by_id: FxHashMap<u32, BlockId>,
    next_inst_id: u32,
    next_block_id: u32,

    markers: MarkerManager,
    inst_marks: SecondaryMap<InstId, MarkerWords>,
    block_marks: SecondaryMap<BlockId, MarkerWords>,

    valid: u8,
    pub rpo: Vec<BlockId>,
    pub linear_order: Vec<BlockId>,
    pub idom: SecondaryMap<BlockId, PackedOption<BlockId>>,
    pub dominators: SecondaryMap<BlockId, Vec<BlockId>>,
    pub loops: PrimaryMap<LoopId, LoopData>,
    pub root_loop: PackedOption<LoopId>,
    pub block_loop: SecondaryMap<BlockId, PackedOption<LoopId>>,
    pub live_numbers: SecondaryMap<InstId, u32>,
    pub linear_numbers: SecondaryMap<InstId, u32>,
    pub block_ranges: SecondaryMap<BlockId, LiveRange>,
    pub live_intervals: FxHashMap<InstId, LiveInterval>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- construction ----

    /// Creates a block with the given declared id and appends it to the
    /// layout. Returns `None` if the id is already taken.
    pub fn make_block(&mut self, id: u32) -> Option<BlockId> {
        if self.block_by_id.contains_key(&id) {
            return None;
        }
        let block = self.blocks.push(BlockData { id, ..BlockData::default() });
        self.block_by_id.insert(id, block);
        self.next_block_id = self.next_block_id.max(id + 1);
        self.layout.append_block(block);
        Some(block)
    }

    /// Creates a block with a fresh declared id past every existing one.
    pub fn fresh_block(&mut self) -> BlockId {
        let id = self.next_block_id;
        self.make_block(id).unwrap_or_else(|| panic!("fresh block id {id} collides"))
    }

    /// Creates an instruction with the given declared id, without linking it
    /// into any block. Returns `None` if the id is already taken.
    pub fn make_inst(&mut self, id: u32, opcode: Opcode, data: InstData) -> Option<InstId> {
        if self.inst_by_id.contains_key(&id) {
            return None;
        }
        let inst = self.insts.push(Inst::new(id, opcode, data));
        self.inst_by_id.insert(id, inst);
        self.next_inst_id = self.next_inst_id.max(id + 1);
        Some(inst)
    }

    /// Creates an instruction with a fresh declared id past every existing one.
    pub fn fresh_inst(&mut self, opcode: Opcode, data: InstData) -> InstId {
        let id = self.next_inst_id;
        self.make_inst(id, opcode, data)
            .unwrap_or_else(|| panic!("fresh inst id {id} collides"))
    }

    // ---- accessors ----

    pub fn inst(&self, inst: InstId) -> &Inst {
        &self.insts[inst]
    }

    pub fn inst_mut(&mut self, inst: InstId) -> &mut Inst {
        &mut self.insts[inst]
    }

    pub fn block(&self, block: BlockId) -> &BlockData {
        &self.blocks[block]
    }

    pub fn block_mut(&mut self, block: BlockId) -> &mut BlockData {
        &mut self.blocks[block]
    }

    /// Looks an instruction up by its declared id.
    pub fn inst_by_id(&self, id: u32) -> Option<InstId> {
        self.inst_by_id.get(&id).copied()
    }

    /// Looks a block up by its declared id.
    pub fn block_by_id(&self, id: u32) -> Option<BlockId> {
        self.block_by_id.get(&id).copied()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.entry_block()
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        &self.blocks[block].preds
    }

    pub fn succs(&self, block: BlockId) -> &[BlockId] {
        &self.blocks[block].succs
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.keys()
    }

    pub fn inst_ids(&self) -> impl Iterator<Item = InstId> + '_ {
        self.insts.keys()
    }

    // ---- def-use edges ----

    /// Users of `value`, one entry per use. An instruction using `value`
    /// twice appears twice.
    pub fn users(&self, value: InstId) -> &[InstId] {
        &self.users[value]
    }

    pub fn add_user(&mut self, value: InstId, user: InstId) {
        self.users[value].push(user);
    }

    /// Drops every user entry of `user` from `value`'s list.
    pub fn remove_user(&mut self, value: InstId, user: InstId) {
        self.users[value].retain(|u| *u != user);
    }

    /// Moves all users of `from` onto `to`, rewriting each user's inputs.
    pub fn rewire_users(&mut self, from: InstId, to: InstId) {
        let moved = std::mem::take(&mut self.users[from]);
        for &user in &moved {
            self.insts[user].substitute_input(from, to);
        }
        self.users[to].extend(moved);
    }

    // ---- CFG edges ----

    pub fn add_edge(&mut self, pred: BlockId, succ: BlockId) {
        self.blocks[pred].succs.push(succ);
        self.blocks[succ].preds.push(pred);
    }

    /// Moves every outgoing edge of `from` onto `to`, fixing the pred entry
    /// in each successor in place.
    pub fn transfer_succs(&mut self, from: BlockId, to: BlockId) {
        let succs = std::mem::take(&mut self.blocks[from].succs);
        for &succ in &succs {
            for pred in self.blocks[succ].preds.iter_mut() {
                if *pred == from {
                    *pred = to;
                }
            }
        }
        self.blocks[to].succs = succs;
    }

    /// Swaps the true and false successors of a two-way branch block and
    /// re-points the branch's target at the new true edge.
    pub fn swap_cond_succs(&mut self, block: BlockId) {
        debug_assert_eq!(self.blocks[block].succs.len(), 2);
        self.blocks[block].succs.swap(0, 1);
        let new_true = self.blocks[block].succs[0];
        if let Some(last) = self.layout.last_inst_of(block) {
            if let InstData::Jump { target } = &mut self.insts[last].data {
                *target = new_true.into();
            }
        }
    }

    /// Rewrites phi predecessor references in `block` from `old` to `new`.
    pub fn rewrite_phi_pred(&mut self, block: BlockId, old: BlockId, new: BlockId) {
        let phis: SmallVec<[InstId; 4]> = self
            .layout
            .inst_iter(block)
            .take_while(|&i| self.insts[i].opcode == Opcode::Phi)
            .collect();
        for phi in phis {
            if let InstData::Phi { args } = &mut self.insts[phi].data {
                for (_, b) in args.iter_mut() {
                    if *b == old {
                        *b = new;
                    }
                }
            }
        }
    }

    // ---- instruction surgery ----

    /// Flags an instruction as dead while leaving it linked in its block.
    /// Dead-code elimination later sweeps orphaned instructions.
    pub fn orphan_inst(&mut self, inst: InstId) {
        self.orphaned[inst] = true;
    }

    pub fn is_orphaned(&self, inst: InstId) -> bool {
        self.orphaned[inst]
    }

    /// Fully removes an instruction: unlinks it from its block, forgets its
    /// declared id and clears its user list. Input user edges are the
    /// caller's responsibility.
    pub fn remove_inst(&mut self, inst: InstId) {
        if self.layout.is_inst_inserted(inst) {
            self.layout.remove_inst(inst);
        }
        self.inst_by_id.remove(&self.insts[inst].id);
        self.users[inst].clear();
        self.orphaned[inst] = false;
    }

    // ---- dominance queries (require a valid fast dominator tree) ----

    pub fn dominates_block(&self, a: BlockId, b: BlockId) -> bool {
        debug_assert!(self.is_valid(Analysis::DomTreeFast));
        if a == b {
            return true;
        }
        let mut cur = self.idom[b].expand();
        while let Some(dom) = cur {
            if dom == a {
                return true;
            }
            cur = self.idom[dom].expand();
        }
        false
    }

    /// Whether `a` is executed before `b` on every path reaching `b`.
    /// Within one block this is plain program order.
    pub fn dominates_inst(&self, a: InstId, b: InstId) -> bool {
        let block_a = self.layout.inst_block(a);
        let block_b = self.layout.inst_block(b);
        if block_a == block_b {
            let mut cur = self.layout.next_inst_of(a);
            while let Some(i) = cur {
                if i == b {
                    return true;
                }
                cur = self.layout.next_inst_of(i);
            }
            return false;
        }
        self.dominates_block(block_a, block_b)
    }

    // ---- markers ----

    pub fn acquire_marker(&mut self) -> Marker {
        self.markers.acquire()
    }

    pub fn release_marker(&mut self, marker: Marker) {
        self.markers.release(marker);
    }

    pub fn mark_block(&mut self, block: BlockId, marker: Marker) {
        self.block_marks[block].mark(marker);
    }

    pub fn unmark_block(&mut self, block: BlockId, marker: Marker) {
        self.block_marks[block].unmark(marker);
    }

    pub fn is_block_marked(&self, block: BlockId, marker: Marker) -> bool {
        self.block_marks[block].is_marked(marker)
    }

    pub fn mark_inst(&mut self, inst: InstId, marker: Marker) {
        self.inst_marks[inst].mark(marker);
    }

    pub fn is_inst_marked(&self, inst: InstId, marker: Marker) -> bool {
        self.inst_marks[inst].is_marked(marker)
    }

    // ---- analysis cache ----

    pub fn is_valid(&self, analysis: Analysis) -> bool {
        self.valid & analysis.bit() != 0
    }

    pub fn set_valid(&mut self, analysis: Analysis) {
        self.valid |= analysis.bit();
    }

    pub fn invalidate(&mut self, analysis: Analysis) {
        self.valid &= !analysis.bit();
    }

    pub fn invalidate_all(&mut self) {
        self.valid = 0;
    }

    // ---- graph absorption ----

    /// Moves every block and instruction of `other` into this graph,
    /// re-keying arena references while keeping declared ids. The absorbed
    /// blocks are appended after the existing layout in their original
    /// order. Declared ids of the two graphs must be disjoint.
    pub fn absorb(&mut self, other: Graph) -> Absorbed {
        let mut block_map: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        let mut inst_map: FxHashMap<InstId, InstId> = FxHashMap::default();

        let old_blocks: Vec<BlockId> = other.layout.block_iter().collect();
        let mut new_blocks = Vec::with_capacity(old_blocks.len());

        for &ob in &old_blocks {
            let data = &other.blocks[ob];
            let nb = self.blocks.push(BlockData {
                id: data.id,
                preds: SmallVec::new(),
                succs: SmallVec::new(),
                unbound: data.unbound,
            });
            let prev = self.block_by_id.insert(data.id, nb);
            debug_assert!(prev.is_none(), "absorbed block id {} collides", data.id);
            self.layout.append_block(nb);
            block_map.insert(ob, nb);
            new_blocks.push(nb);
        }

        // First pass clones the instructions so every arena key exists,
        // second pass remaps operands through the two key maps.
        for &ob in &old_blocks {
            for oi in other.layout.inst_iter(ob) {
                let inst = other.insts[oi].clone();
                let prev = self.inst_by_id.get(&inst.id).copied();
                debug_assert!(prev.is_none(), "absorbed inst id {} collides", inst.id);
                let ni = self.insts.push(inst);
                self.inst_by_id.insert(self.insts[ni].id, ni);
                inst_map.insert(oi, ni);
                self.orphaned[ni] = other.orphaned[oi];
            }
        }

        for (&ob, &nb) in old_blocks.iter().zip(&new_blocks) {
            self.blocks[nb].preds =
                other.blocks[ob].preds.iter().map(|p| block_map[p]).collect();
            self.blocks[nb].succs =
                other.blocks[ob].succs.iter().map(|s| block_map[s]).collect();

            for oi in other.layout.inst_iter(ob) {
                let ni = inst_map[&oi];
                self.layout.append_inst(ni, nb);
                match &mut self.insts[ni].data {
                    InstData::TwoInput { args } => {
                        for a in args.iter_mut() {
                            *a = inst_map[a];
                        }
                    }
                    InstData::OneInput { arg } => *arg = inst_map[arg],
                    InstData::Jump { target } => {
                        if let Some(t) = target.expand() {
                            *target = block_map[&t].into();
                        }
                    }
                    InstData::Phi { args } => {
                        for (v, b) in args.iter_mut() {
                            *v = inst_map[v];
                            *b = block_map[b];
                        }
                    }
                    InstData::Call { args, .. } => {
                        for a in args.iter_mut() {
                            *a = inst_map[a];
                        }
                    }
                    _ => {}
                }
                self.users[ni] =
                    other.users[oi].iter().map(|u| inst_map[u]).collect();
            }
        }

        self.next_inst_id = self.next_inst_id.max(other.next_inst_id);
        self.next_block_id = self.next_block_id.max(other.next_block_id);
        self.invalidate_all();

        Absorbed { blocks: new_blocks }
    }

    // ---- misc queries ----

    pub fn is_block_unbound(&self, block: BlockId) -> bool {
        self.blocks[block].unbound
    }

    pub fn set_block_unbound(&mut self, block: BlockId, unbound: bool) {
        self.blocks[block].unbound = unbound;
    }

    /// Last instruction of `block` if it is a branch.
    pub fn branch_of(&self, block: BlockId) -> Option<InstId> {
        let last = self.layout.last_inst_of(block)?;
        (self.insts[last].kind() == InstKind::Jump).then_some(last)
    }
}
