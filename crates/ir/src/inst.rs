use cranelift_entity::entity_impl;
use cranelift_entity::packed_option::PackedOption;
use smallvec::SmallVec;

use crate::graph::BlockId;
use crate::module::GraphRef;
use crate::opcode::{InstKind, Opcode};

/// An opaque reference to an instruction in a [`Graph`](crate::Graph) arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);
entity_impl!(InstId, "inst");

/// Payload of an instruction, shaped by its opcode's [`InstKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstData {
    TwoInput {
        args: [InstId; 2],
    },
    OneInput {
        arg: InstId,
    },
    Jump {
        target: PackedOption<BlockId>,
    },
    /// Incoming values paired with the predecessor block they flow in from.
    Phi {
        args: SmallVec<[(InstId, BlockId); 2]>,
    },
    Parameter,
    Constant {
        value: i32,
    },
    Call {
        callee: GraphRef,
        args: SmallVec<[InstId; 4]>,
    },
    NoInput,
}

impl InstData {
    pub fn kind(&self) -> InstKind {
        match self {
            InstData::TwoInput { .. } => InstKind::TwoInput,
            InstData::OneInput { .. } => InstKind::OneInput,
            InstData::Jump { .. } => InstKind::Jump,
            InstData::Phi { .. } => InstKind::Phi,
            InstData::Parameter => InstKind::Parameter,
            InstData::Constant { .. } => InstKind::Constant,
            InstData::Call { .. } => InstKind::Call,
            InstData::NoInput => InstKind::NoInput,
        }
    }
}

/// One instruction. The `id` is the number it was declared with and is stable
/// across graph surgery, unlike the arena key.
#[derive(Debug, Clone)]
pub struct Inst {
    pub id: u32,
    pub opcode: Opcode,
    pub data: InstData,
}

impl Inst {
    pub fn new(id: u32, opcode: Opcode, data: InstData) -> Self {
        debug_assert_eq!(opcode.kind(), data.kind());
        Self { id, opcode, data }
    }

    pub fn kind(&self) -> InstKind {
        self.data.kind()
    }

    pub fn input1(&self) -> InstId {
        match &self.data {
            InstData::TwoInput { args } => args[0],
            InstData::OneInput { arg } => *arg,
            _ => panic!("`{}` has no first input", self.opcode),
        }
    }

    pub fn input2(&self) -> InstId {
        match &self.data {
            InstData::TwoInput { args } => args[1],
            _ => panic!("`{}` has no second input", self.opcode),
        }
    }

    pub fn constant_value(&self) -> i32 {
        match &self.data {
            InstData::Constant { value } => *value,
            _ => panic!("`{}` is not a constant", self.opcode),
        }
    }

    pub fn jump_target(&self) -> Option<BlockId> {
        match &self.data {
            InstData::Jump { target } => target.expand(),
            _ => None,
        }
    }

    pub fn phi_args(&self) -> &[(InstId, BlockId)] {
        match &self.data {
            InstData::Phi { args } => args,
            _ => &[],
        }
    }

    pub fn call_args(&self) -> &[InstId] {
        match &self.data {
            InstData::Call { args, .. } => args,
            _ => &[],
        }
    }

    pub fn callee(&self) -> Option<GraphRef> {
        match &self.data {
            InstData::Call { callee, .. } => Some(*callee),
            _ => None,
        }
    }

    /// Iterates over the value operands of this instruction, phi incoming
    /// values included.
    pub fn inputs(&self) -> impl Iterator<Item = InstId> + '_ {
        let fixed: SmallVec<[InstId; 2]> = match &self.data {
            InstData::TwoInput { args } => SmallVec::from_slice(args),
            InstData::OneInput { arg } => SmallVec::from_slice(&[*arg]),
            _ => SmallVec::new(),
        };
        let rest: &[InstId] = match &self.data {
            InstData::Call { args, .. } => args,
            _ => &[],
        };
        let phi: &[(InstId, BlockId)] = match &self.data {
            InstData::Phi { args } => args,
            _ => &[],
        };
        fixed
            .into_iter()
            .chain(rest.iter().copied())
            .chain(phi.iter().map(|(v, _)| *v))
    }

    /// Replaces every occurrence of `from` among the inputs with `to`.
    /// For phis only the value half of each pair is touched.
    pub fn substitute_input(&mut self, from: InstId, to: InstId) {
        match &mut self.data {
            InstData::TwoInput { args } => {
                for arg in args.iter_mut() {
                    if *arg == from {
                        *arg = to;
                    }
                }
            }
            InstData::OneInput { arg } => {
                if *arg == from {
                    *arg = to;
                }
            }
            InstData::Call { args, .. } => {
                for arg in args.iter_mut() {
                    if *arg == from {
                        *arg = to;
                    }
                }
            }
            InstData::Phi { args } => {
                for (v, _) in args.iter_mut() {
                    if *v == from {
                        *v = to;
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn substitute_hits_every_occurrence() {
        let a = InstId(1);
        let b = InstId(2);
        let mut inst = Inst::new(10, Opcode::Add, InstData::TwoInput { args: [a, a] });
        inst.substitute_input(a, b);
        assert_eq!(inst.input1(), b);
        assert_eq!(inst.input2(), b);
    }

    #[test]
    fn substitute_keeps_phi_blocks() {
        let a = InstId(1);
        let b = InstId(2);
        let bb = BlockId(7);
        let mut phi = Inst::new(11, Opcode::Phi, InstData::Phi { args: smallvec![(a, bb)] });
        phi.substitute_input(a, b);
        assert_eq!(phi.phi_args(), &[(b, bb)]);
    }

    #[test]
    fn inputs_cover_all_kinds() {
        let a = InstId(1);
        let b = InstId(2);
        let two = Inst::new(0, Opcode::Xor, InstData::TwoInput { args: [a, b] });
        assert_eq!(two.inputs().collect::<Vec<_>>(), vec![a, b]);

        let ret = Inst::new(1, Opcode::Ret, InstData::OneInput { arg: a });
        assert_eq!(ret.inputs().collect::<Vec<_>>(), vec![a]);

        let none = Inst::new(2, Opcode::RetVoid, InstData::NoInput);
        assert_eq!(none.inputs().count(), 0);
    }
}
