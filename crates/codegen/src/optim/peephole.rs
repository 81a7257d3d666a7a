//! Local strength reductions on `sub`, `shr` and `xor` chains, followed by a
//! dead-code sweep for whatever the rewrites detached.

use minuet_ir::{Graph, InstData, InstId, Opcode};

use crate::optim::dce;
use crate::rpo;

pub fn run(graph: &mut Graph) {
    rpo::ensure(graph);
    for &block in graph.rpo.clone().iter() {
        let mut cursor = graph.layout.first_inst_of(block);
        while let Some(inst) = cursor {
            cursor = graph.layout.next_inst_of(inst);
            match graph.inst(inst).opcode {
                Opcode::Sub => visit_sub(graph, inst),
                Opcode::Shr => visit_shr(graph, inst),
                Opcode::Xor => visit_xor(graph, inst),
                _ => {}
            }
        }
    }
    dce::run(graph);
}

fn is_const(graph: &Graph, inst: InstId, value: i32) -> bool {
    graph.inst(inst).opcode == Opcode::Constant && graph.inst(inst).constant_value() == value
}

fn drop_use(graph: &mut Graph, value: InstId, user: InstId) {
    graph.remove_user(value, user);
    if graph.users(value).is_empty() {
        graph.orphan_inst(value);
    }
}

/// Replaces `inst` with the existing value `result`.
fn replace_with(graph: &mut Graph, inst: InstId, result: InstId) {
    let a = graph.inst(inst).input1();
    let b = graph.inst(inst).input2();
    graph.rewire_users(inst, result);
    drop_use(graph, a, inst);
    if a != b {
        drop_use(graph, b, inst);
    }
    graph.orphan_inst(inst);
}

/// Replaces `inst` with a fresh zero constant at the block front.
fn replace_with_zero(graph: &mut Graph, inst: InstId) {
    let block = graph.layout.inst_block(inst);
    let zero = graph.fresh_inst(Opcode::Constant, InstData::Constant { value: 0 });
    graph.layout.prepend_inst(zero, block);
    let a = graph.inst(inst).input1();
    graph.rewire_users(inst, zero);
    drop_use(graph, a, inst);
    graph.orphan_inst(inst);
}

/// Rewrites `inst` into `op(base, c1 + c2)` with a fresh combined constant.
fn coalesce_consts(graph: &mut Graph, inst: InstId, base: InstId, c1: i32, c2: i32) {
    let block = graph.layout.inst_block(inst);
    let a = graph.inst(inst).input1();
    let b = graph.inst(inst).input2();
    let konst = graph.fresh_inst(
        Opcode::Constant,
        InstData::Constant { value: c1.wrapping_add(c2) },
    );
    graph.layout.prepend_inst(konst, block);
    graph.add_user(konst, inst);
    drop_use(graph, a, inst);
    drop_use(graph, b, inst);
    graph.add_user(base, inst);
    graph.inst_mut(inst).data = InstData::TwoInput { args: [base, konst] };
}

fn visit_sub(graph: &mut Graph, inst: InstId) {
    let v1 = graph.inst(inst).input1();
    let v2 = graph.inst(inst).input2();

    // x - 0 => x
    if is_const(graph, v2, 0) {
        replace_with(graph, inst, v1);
        return;
    }
    // x - x => 0
    if v1 == v2 {
        replace_with_zero(graph, inst);
        return;
    }
    // (a + b) - b => a
    if graph.inst(v1).opcode == Opcode::Add && graph.inst(v1).input2() == v2 {
        let a = graph.inst(v1).input1();
        replace_with(graph, inst, a);
        return;
    }
    // a - (a - b) => b
    if graph.inst(v2).opcode == Opcode::Sub && graph.inst(v2).input1() == v1 {
        let b = graph.inst(v2).input2();
        replace_with(graph, inst, b);
        return;
    }
    // (x - c1) - c2 => x - (c1 + c2)
    if graph.inst(v1).opcode == Opcode::Sub
        && graph.inst(graph.inst(v1).input2()).opcode == Opcode::Constant
        && graph.inst(v2).opcode == Opcode::Constant
    {
        let base = graph.inst(v1).input1();
        let c1 = graph.inst(graph.inst(v1).input2()).constant_value();
        let c2 = graph.inst(v2).constant_value();
        coalesce_consts(graph, inst, base, c1, c2);
    }
}

fn visit_shr(graph: &mut Graph, inst: InstId) {
    let v1 = graph.inst(inst).input1();
    let v2 = graph.inst(inst).input2();

    // x >> 0 => x
    if is_const(graph, v2, 0) {
        replace_with(graph, inst, v1);
        return;
    }
    // (x << n) >> n => x
    if graph.inst(v1).opcode == Opcode::Shl && graph.inst(v1).input2() == v2 {
        let x = graph.inst(v1).input1();
        replace_with(graph, inst, x);
        return;
    }
    // (x >> c1) >> c2 => x >> (c1 + c2)
    if graph.inst(v1).opcode == Opcode::Shr
        && graph.inst(graph.inst(v1).input2()).opcode == Opcode::Constant
        && graph.inst(v2).opcode == Opcode::Constant
    {
        let base = graph.inst(v1).input1();
        let c1 = graph.inst(graph.inst(v1).input2()).constant_value();
        let c2 = graph.inst(v2).constant_value();
        coalesce_consts(graph, inst, base, c1, c2);
    }
}

fn visit_xor(graph: &mut Graph, inst: InstId) {
    let v1 = graph.inst(inst).input1();
    let v2 = graph.inst(inst).input2();

    // x ^ 0 => x
    if is_const(graph, v2, 0) {
        replace_with(graph, inst, v1);
        return;
    }
    // x ^ x => 0
    if v1 == v2 {
        replace_with_zero(graph, inst);
        return;
    }
    // x ^ -1 => not x
    if is_const(graph, v2, -1) {
        let not = graph.fresh_inst(Opcode::Not, InstData::OneInput { arg: v1 });
        graph.layout.insert_inst_before(not, inst);
        graph.remove_user(v1, inst);
        graph.add_user(v1, not);
        drop_use(graph, v2, inst);
        graph.rewire_users(inst, not);
        graph.orphan_inst(inst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minuet_ir::{GraphBuilder, Module};

    fn build(f: impl FnOnce(&mut GraphBuilder)) -> (Module, minuet_ir::GraphRef) {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        f(&mut b);
        let gref = b.build(&mut module).unwrap();
        run(module.graph_mut(gref));
        (module, gref)
    }

    fn remaining_ops(graph: &Graph, block_id: u32) -> Vec<Opcode> {
        let block = graph.block_by_id(block_id).unwrap();
        graph
            .layout
            .inst_iter(block)
            .map(|i| graph.inst(i).opcode)
            .collect()
    }

    #[test]
    fn sub_zero_forwards_the_operand() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Constant, &[0]);
            b.inst(2, Opcode::Sub, &[0, 1]);
            b.inst(3, Opcode::Ret, &[2]);
        });
        let g = module.graph(gref);
        assert_eq!(
            remaining_ops(g, 0),
            vec![Opcode::Parameter, Opcode::Ret]
        );
        let ret = g.inst_by_id(3).unwrap();
        let param = g.inst_by_id(0).unwrap();
        assert_eq!(g.inst(ret).input1(), param);
        assert_eq!(g.users(param), &[ret]);
    }

    #[test]
    fn sub_self_becomes_zero() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(2, Opcode::Sub, &[0, 0]);
            b.inst(3, Opcode::Ret, &[2]);
        });
        let g = module.graph(gref);
        // the parameter loses its last use and is swept along with the sub
        let ops = remaining_ops(g, 0);
        assert_eq!(ops, vec![Opcode::Constant, Opcode::Ret]);
        let ret = g.inst_by_id(3).unwrap();
        let zero = g.inst(g.inst(ret).input1());
        assert_eq!(zero.constant_value(), 0);
    }

    #[test]
    fn sub_of_matching_add_cancels() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Parameter, &[]);
            b.inst(2, Opcode::Add, &[0, 1]);
            b.inst(3, Opcode::Sub, &[2, 1]);
            b.inst(4, Opcode::Ret, &[3]);
        });
        let g = module.graph(gref);
        // (p0 + p1) - p1 => p0; the add dies with the sub, and losing the
        // add leaves p1 unused so the sweep takes it too
        assert_eq!(remaining_ops(g, 0), vec![Opcode::Parameter, Opcode::Ret]);
        let ret = g.inst_by_id(4).unwrap();
        assert_eq!(g.inst(ret).input1(), g.inst_by_id(0).unwrap());
        assert!(g.inst_by_id(1).is_none());
    }

    #[test]
    fn sub_of_sub_cancels_to_subtrahend() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Parameter, &[]);
            b.inst(2, Opcode::Sub, &[0, 1]);
            b.inst(3, Opcode::Sub, &[0, 2]);
            b.inst(4, Opcode::Ret, &[3]);
        });
        let g = module.graph(gref);
        // p0 - (p0 - p1) => p1; p0 goes dead once the inner sub dies
        assert_eq!(remaining_ops(g, 0), vec![Opcode::Parameter, Opcode::Ret]);
        let ret = g.inst_by_id(4).unwrap();
        assert_eq!(g.inst(ret).input1(), g.inst_by_id(1).unwrap());
        assert!(g.inst_by_id(0).is_none());
    }

    #[test]
    fn sub_constants_coalesce() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Constant, &[3]);
            b.inst(2, Opcode::Sub, &[0, 1]);
            b.inst(3, Opcode::Constant, &[4]);
            b.inst(4, Opcode::Sub, &[2, 3]);
            b.inst(5, Opcode::Ret, &[4]);
        });
        let g = module.graph(gref);
        // (p - 3) - 4 => p - 7
        let outer = g.inst_by_id(4).unwrap();
        assert_eq!(g.inst(outer).input1(), g.inst_by_id(0).unwrap());
        let konst = g.inst(g.inst(outer).input2());
        assert_eq!(konst.opcode, Opcode::Constant);
        assert_eq!(konst.constant_value(), 7);
        assert_eq!(
            remaining_ops(g, 0),
            vec![Opcode::Constant, Opcode::Parameter, Opcode::Sub, Opcode::Ret]
        );
    }

    #[test]
    fn shr_of_shl_cancels() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Constant, &[2]);
            b.inst(2, Opcode::Shl, &[0, 1]);
            b.inst(3, Opcode::Shr, &[2, 1]);
            b.inst(4, Opcode::Ret, &[3]);
        });
        let g = module.graph(gref);
        assert_eq!(remaining_ops(g, 0), vec![Opcode::Parameter, Opcode::Ret]);
        let ret = g.inst_by_id(4).unwrap();
        assert_eq!(g.inst(ret).input1(), g.inst_by_id(0).unwrap());
    }

    #[test]
    fn shr_constants_coalesce() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Constant, &[1]);
            b.inst(2, Opcode::Shr, &[0, 1]);
            b.inst(3, Opcode::Constant, &[2]);
            b.inst(4, Opcode::Shr, &[2, 3]);
            b.inst(5, Opcode::Ret, &[4]);
        });
        let g = module.graph(gref);
        let outer = g.inst_by_id(4).unwrap();
        assert_eq!(g.inst(outer).opcode, Opcode::Shr);
        assert_eq!(g.inst(outer).input1(), g.inst_by_id(0).unwrap());
        assert_eq!(g.inst(g.inst(outer).input2()).constant_value(), 3);
    }

    #[test]
    fn xor_all_ones_becomes_not() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(1, Opcode::Constant, &[-1]);
            b.inst(2, Opcode::Xor, &[0, 1]);
            b.inst(3, Opcode::Ret, &[2]);
        });
        let g = module.graph(gref);
        assert_eq!(remaining_ops(g, 0), vec![Opcode::Parameter, Opcode::Not, Opcode::Ret]);
        let ret = g.inst_by_id(3).unwrap();
        let not = g.inst(ret).input1();
        assert_eq!(g.inst(not).opcode, Opcode::Not);
        assert_eq!(g.inst(not).input1(), g.inst_by_id(0).unwrap());
        assert_eq!(g.users(g.inst_by_id(0).unwrap()), &[not]);
    }

    #[test]
    fn xor_self_becomes_zero() {
        let (module, gref) = build(|b| {
            b.block(0, &[]);
            b.inst(0, Opcode::Parameter, &[]);
            b.inst(2, Opcode::Xor, &[0, 0]);
            b.inst(3, Opcode::Ret, &[2]);
        });
        let g = module.graph(gref);
        let ret = g.inst_by_id(3).unwrap();
        assert_eq!(g.inst(g.inst(ret).input1()).constant_value(), 0);
    }
}
