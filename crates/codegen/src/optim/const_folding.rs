//! Constant folding for `sub`, `shr` and `xor`.
//!
//! A foldable instruction with two constant inputs becomes a fresh constant
//! at the front of its block; users move over and the original operands are
//! orphaned once nothing else reads them. Folding one instruction can turn
//! the next one foldable, which the forward walk picks up in the same run.

use minuet_ir::{Graph, InstData, Opcode};

use crate::optim::dce;
use crate::rpo;

pub fn run(graph: &mut Graph) {
    rpo::ensure(graph);
    for &block in graph.rpo.clone().iter() {
        let mut cursor = graph.layout.first_inst_of(block);
        while let Some(inst) = cursor {
            cursor = graph.layout.next_inst_of(inst);
            let opcode = graph.inst(inst).opcode;
            if !matches!(opcode, Opcode::Sub | Opcode::Shr | Opcode::Xor) {
                continue;
            }
            let a = graph.inst(inst).input1();
            let b = graph.inst(inst).input2();
            if graph.inst(a).opcode != Opcode::Constant || graph.inst(b).opcode != Opcode::Constant
            {
                continue;
            }
            let va = graph.inst(a).constant_value();
            let vb = graph.inst(b).constant_value();
            let folded = match opcode {
                Opcode::Sub => va.wrapping_sub(vb),
                Opcode::Shr => va.wrapping_shr(vb as u32),
                Opcode::Xor => va ^ vb,
                _ => unreachable!(),
            };

            let konst = graph.fresh_inst(Opcode::Constant, InstData::Constant { value: folded });
            graph.layout.prepend_inst(konst, block);
            graph.rewire_users(inst, konst);

            graph.remove_user(a, inst);
            if graph.users(a).is_empty() {
                graph.orphan_inst(a);
            }
            if a != b {
                graph.remove_user(b, inst);
                if graph.users(b).is_empty() {
                    graph.orphan_inst(b);
                }
            }
            graph.orphan_inst(inst);
        }
    }
    dce::run(graph);
}
