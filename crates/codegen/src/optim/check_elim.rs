//! Redundant check elimination.
//!
//! A `check_eq_zero` or `check_eq` is removed when another check of the same
//! shape over the same values dominates it, since the first one already
//! trapped on any violating path.

use minuet_ir::{Graph, InstId, Opcode};

use crate::domtree;

pub fn run(graph: &mut Graph) {
    domtree::ensure(graph);
    for block in graph.layout.block_iter().collect::<Vec<_>>() {
        let mut cursor = graph.layout.first_inst_of(block);
        while let Some(inst) = cursor {
            cursor = graph.layout.next_inst_of(inst);
            match graph.inst(inst).opcode {
                Opcode::CheckEqZero => eliminate_zero_check(graph, inst),
                Opcode::CheckEq => eliminate_eq_check(graph, inst),
                _ => {}
            }
        }
    }
}

fn eliminate_zero_check(graph: &mut Graph, inst: InstId) {
    let value = graph.inst(inst).input1();
    for user in graph.users(value).to_vec() {
        if user != inst
            && graph.inst(user).opcode == Opcode::CheckEqZero
            && graph.dominates_inst(user, inst)
        {
            graph.remove_user(value, inst);
            graph.remove_inst(inst);
            return;
        }
    }
}

fn eliminate_eq_check(graph: &mut Graph, inst: InstId) {
    let a = graph.inst(inst).input1();
    let b = graph.inst(inst).input2();
    for user in graph.users(a).to_vec() {
        if user == inst || graph.inst(user).opcode != Opcode::CheckEq {
            continue;
        }
        let ua = graph.inst(user).input1();
        let ub = graph.inst(user).input2();
        let same_pair = (ua == a && ub == b) || (ua == b && ub == a);
        if same_pair && graph.dominates_inst(user, inst) {
            graph.remove_user(a, inst);
            graph.remove_user(b, inst);
            graph.remove_inst(inst);
            return;
        }
    }
}
