//! Declarative graph construction.
//!
//! A [`GraphBuilder`] records block and instruction declarations that may
//! reference ids declared later, then resolves everything at once in
//! [`GraphBuilder::build`]. Successor edges, jump targets, phi inputs and
//! plain operands are all bound in this final step, so declaration order is
//! free apart from the first block becoming the entry.

use smallvec::SmallVec;

use crate::graph::Graph;
use crate::inst::{InstData, InstId};
use crate::module::{GraphRef, Module};
use crate::opcode::{InstKind, Opcode};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("block {0} is declared twice")]
    DuplicateBlock(u32),
    #[error("inst {0} is declared twice")]
    DuplicateInst(u32),
    #[error("block {0} is referenced but never declared")]
    UnknownBlock(u32),
    #[error("inst {0} is referenced but never declared")]
    UnknownInst(u32),
    #[error("inst {inst} (`{opcode}`) takes {expected} operands, got {got}")]
    OperandCount {
        inst: u32,
        opcode: Opcode,
        expected: usize,
        got: usize,
    },
    #[error("inst {0} is declared before any block")]
    NoOpenBlock(u32),
}

#[derive(Debug, Clone)]
enum InstDecl {
    Plain {
        id: u32,
        opcode: Opcode,
        operands: Vec<i32>,
    },
    Call {
        id: u32,
        callee: GraphRef,
        args: Vec<u32>,
    },
}

impl InstDecl {
    fn id(&self) -> u32 {
        match self {
            InstDecl::Plain { id, .. } | InstDecl::Call { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone)]
struct BlockDecl {
    id: u32,
    succs: Vec<u32>,
    insts: Vec<InstDecl>,
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    blocks: Vec<BlockDecl>,
    pending: Vec<InstDecl>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a block; subsequent [`inst`](Self::inst) calls append to it.
    /// `succs` lists successor block ids, true edge first.
    pub fn block(&mut self, id: u32, succs: &[u32]) -> &mut Self {
        self.blocks.push(BlockDecl { id, succs: succs.to_vec(), insts: Vec::new() });
        self
    }

    /// Appends an instruction to the open block. Operand meaning depends on
    /// the opcode kind: input inst ids for plain instructions, the immediate
    /// for a constant, an optional target block id for a jump, and
    /// `(inst, block)` pairs for a phi.
    pub fn inst(&mut self, id: u32, opcode: Opcode, operands: &[i32]) -> &mut Self {
        let decl = InstDecl::Plain { id, opcode, operands: operands.to_vec() };
        match self.blocks.last_mut() {
            Some(block) => block.insts.push(decl),
            None => self.pending.push(decl),
        }
        self
    }

    /// Appends a static call to the open block.
    pub fn call(&mut self, id: u32, callee: GraphRef, args: &[u32]) -> &mut Self {
        let decl = InstDecl::Call { id, callee, args: args.to_vec() };
        match self.blocks.last_mut() {
            Some(block) => block.insts.push(decl),
            None => self.pending.push(decl),
        }
        self
    }

    /// Resolves every recorded declaration into a fresh graph owned by
    /// `module`. The first declared block becomes the entry.
    pub fn build(&mut self, module: &mut Module) -> Result<GraphRef, BuildError> {
        if let Some(decl) = self.pending.first() {
            return Err(BuildError::NoOpenBlock(decl.id()));
        }

        let mut graph = Graph::new();

        for decl in &self.blocks {
            graph
                .make_block(decl.id)
                .ok_or(BuildError::DuplicateBlock(decl.id))?;
        }

        // Instructions are created before operand resolution so forward
        // references bind.
        for decl in &self.blocks {
            let block = graph.block_by_id(decl.id).ok_or(BuildError::UnknownBlock(decl.id))?;
            for inst_decl in &decl.insts {
                let (id, opcode) = match inst_decl {
                    InstDecl::Plain { id, opcode, .. } => (*id, *opcode),
                    InstDecl::Call { id, .. } => (*id, Opcode::CallStatic),
                };
                let data = placeholder_data(opcode);
                let inst = graph
                    .make_inst(id, opcode, data)
                    .ok_or(BuildError::DuplicateInst(id))?;
                graph.layout.append_inst(inst, block);
            }
        }

        for decl in &self.blocks {
            let pred = graph.block_by_id(decl.id).ok_or(BuildError::UnknownBlock(decl.id))?;
            for &succ_id in &decl.succs {
                let succ = graph
                    .block_by_id(succ_id)
                    .ok_or(BuildError::UnknownBlock(succ_id))?;
                graph.add_edge(pred, succ);
            }
        }

        for decl in &self.blocks {
            for inst_decl in &decl.insts {
                resolve_operands(&mut graph, inst_decl)?;
            }
        }

        Ok(module.add_graph(graph))
    }
}

fn placeholder_data(opcode: Opcode) -> InstData {
    match opcode.kind() {
        InstKind::TwoInput => InstData::TwoInput { args: [InstId(0); 2] },
        InstKind::OneInput => InstData::OneInput { arg: InstId(0) },
        InstKind::Jump => InstData::Jump { target: None.into() },
        InstKind::Phi => InstData::Phi { args: SmallVec::new() },
        InstKind::Parameter => InstData::Parameter,
        InstKind::Constant => InstData::Constant { value: 0 },
        InstKind::Call => InstData::Call { callee: GraphRef(0), args: SmallVec::new() },
        InstKind::NoInput => InstData::NoInput,
    }
}

fn lookup_inst(graph: &Graph, id: i32) -> Result<InstId, BuildError> {
    graph
        .inst_by_id(id as u32)
        .ok_or(BuildError::UnknownInst(id as u32))
}

fn operand_count(
    id: u32,
    opcode: Opcode,
    expected: usize,
    got: usize,
) -> Result<(), BuildError> {
    if expected != got {
        return Err(BuildError::OperandCount { inst: id, opcode, expected, got });
    }
    Ok(())
}

fn resolve_operands(graph: &mut Graph, decl: &InstDecl) -> Result<(), BuildError> {
    match decl {
        InstDecl::Call { id, callee, args } => {
            let inst = graph
                .inst_by_id(*id)
                .ok_or(BuildError::UnknownInst(*id))?;
            let mut resolved = SmallVec::new();
            for &arg in args {
                let value = lookup_inst(graph, arg as i32)?;
                resolved.push(value);
                graph.add_user(value, inst);
            }
            graph.inst_mut(inst).data = InstData::Call { callee: *callee, args: resolved };
            Ok(())
        }
        InstDecl::Plain { id, opcode, operands } => {
            let inst = graph
                .inst_by_id(*id)
                .ok_or(BuildError::UnknownInst(*id))?;
            match opcode.kind() {
                InstKind::TwoInput => {
                    operand_count(*id, *opcode, 2, operands.len())?;
                    let a = lookup_inst(graph, operands[0])?;
                    let b = lookup_inst(graph, operands[1])?;
                    graph.add_user(a, inst);
                    graph.add_user(b, inst);
                    graph.inst_mut(inst).data = InstData::TwoInput { args: [a, b] };
                }
                InstKind::OneInput => {
                    operand_count(*id, *opcode, 1, operands.len())?;
                    let a = lookup_inst(graph, operands[0])?;
                    graph.add_user(a, inst);
                    graph.inst_mut(inst).data = InstData::OneInput { arg: a };
                }
                InstKind::Jump => {
                    if operands.len() > 1 {
                        return Err(BuildError::OperandCount {
                            inst: *id,
                            opcode: *opcode,
                            expected: 1,
                            got: operands.len(),
                        });
                    }
                    let target = match operands.first() {
                        Some(&b) => Some(
                            graph
                                .block_by_id(b as u32)
                                .ok_or(BuildError::UnknownBlock(b as u32))?,
                        ),
                        None => None,
                    };
                    graph.inst_mut(inst).data = InstData::Jump { target: target.into() };
                }
                InstKind::Phi => {
                    if operands.len() % 2 != 0 {
                        return Err(BuildError::OperandCount {
                            inst: *id,
                            opcode: *opcode,
                            expected: operands.len() + 1,
                            got: operands.len(),
                        });
                    }
                    let mut args = SmallVec::new();
                    for pair in operands.chunks_exact(2) {
                        let value = lookup_inst(graph, pair[0])?;
                        let block = graph
                            .block_by_id(pair[1] as u32)
                            .ok_or(BuildError::UnknownBlock(pair[1] as u32))?;
                        graph.add_user(value, inst);
                        args.push((value, block));
                    }
                    graph.inst_mut(inst).data = InstData::Phi { args };
                }
                InstKind::Constant => {
                    operand_count(*id, *opcode, 1, operands.len())?;
                    graph.inst_mut(inst).data = InstData::Constant { value: operands[0] };
                }
                InstKind::Parameter | InstKind::NoInput => {
                    operand_count(*id, *opcode, 0, operands.len())?;
                }
                InstKind::Call => unreachable!("calls are declared via `call`"),
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_loop_with_forward_references() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        // the phi in the entry references inst 4 declared in block 1
        b.block(0, &[1]);
        b.inst(0, Opcode::Constant, &[10]);
        b.inst(1, Opcode::Jmp, &[1]);
        b.block(1, &[1, 2]);
        b.inst(2, Opcode::Phi, &[0, 0, 4, 1]);
        b.inst(3, Opcode::Constant, &[1]);
        b.inst(4, Opcode::Sub, &[2, 3]);
        b.inst(5, Opcode::Ja, &[1]);
        b.block(2, &[]);
        b.inst(6, Opcode::RetVoid, &[]);
        let gref = b.build(&mut module).unwrap();

        let g = module.graph(gref);
        let b1 = g.block_by_id(1).unwrap();
        assert_eq!(g.preds(b1), &[g.block_by_id(0).unwrap(), b1]);
        assert_eq!(g.succs(b1), &[b1, g.block_by_id(2).unwrap()]);

        let phi = g.inst_by_id(2).unwrap();
        let sub = g.inst_by_id(4).unwrap();
        assert_eq!(
            g.inst(phi).phi_args(),
            &[(g.inst_by_id(0).unwrap(), g.block_by_id(0).unwrap()), (sub, b1)]
        );
        assert_eq!(g.users(phi), &[sub]);
        assert_eq!(g.users(sub), &[phi]);

        assert_eq!(g.entry_block(), Some(g.block_by_id(0).unwrap()));
    }

    #[test]
    fn ids_need_not_be_contiguous() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        b.block(7, &[]);
        b.inst(40, Opcode::Constant, &[-3]);
        b.inst(50, Opcode::Ret, &[40]);
        let gref = b.build(&mut module).unwrap();
        let g = module.graph(gref);
        assert_eq!(g.block(g.entry_block().unwrap()).id, 7);
        assert_eq!(g.inst(g.inst_by_id(50).unwrap()).input1(), g.inst_by_id(40).unwrap());
    }

    #[test]
    fn errors() {
        let mut module = Module::new();

        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.block(0, &[]);
        assert_eq!(b.build(&mut module), Err(BuildError::DuplicateBlock(0)));

        let mut b = GraphBuilder::new();
        b.block(0, &[1]);
        assert_eq!(b.build(&mut module), Err(BuildError::UnknownBlock(1)));

        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.inst(0, Opcode::Ret, &[9]);
        assert_eq!(b.build(&mut module), Err(BuildError::UnknownInst(9)));

        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.inst(0, Opcode::Add, &[0]);
        assert_eq!(
            b.build(&mut module),
            Err(BuildError::OperandCount { inst: 0, opcode: Opcode::Add, expected: 2, got: 1 })
        );

        let mut b = GraphBuilder::new();
        b.inst(3, Opcode::RetVoid, &[]);
        assert_eq!(b.build(&mut module), Err(BuildError::NoOpenBlock(3)));
    }
}
