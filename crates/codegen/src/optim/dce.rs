//! Dead-code sweep.
//!
//! Instructions flagged as orphaned seed a mark phase that also follows
//! two-input chains: when removing a dead instruction leaves one of its
//! inputs without users, that input dies too, constants included. The sweep
//! then unlinks every marked instruction.

use minuet_ir::marker::Marker;
use minuet_ir::{Graph, InstId, InstKind};

pub fn run(graph: &mut Graph) {
    let marker = graph.acquire_marker();
    let blocks: Vec<_> = graph.layout.block_iter().collect();

    for &block in &blocks {
        for inst in graph.layout.inst_iter(block).collect::<Vec<_>>() {
            if graph.is_orphaned(inst) && !graph.is_inst_marked(inst, marker) {
                mark_dead(graph, inst, marker);
            }
        }
    }

    for &block in &blocks {
        let dead: Vec<_> = graph
            .layout
            .inst_iter(block)
            .filter(|&inst| graph.is_inst_marked(inst, marker))
            .collect();
        for inst in dead {
            graph.remove_inst(inst);
        }
    }
    graph.release_marker(marker);
}

fn mark_dead(graph: &mut Graph, seed: InstId, marker: Marker) {
    let mut work = vec![seed];
    while let Some(inst) = work.pop() {
        if graph.is_inst_marked(inst, marker) {
            continue;
        }
        graph.mark_inst(inst, marker);
        if graph.inst(inst).kind() != InstKind::TwoInput {
            continue;
        }
        let a = graph.inst(inst).input1();
        let b = graph.inst(inst).input2();
        graph.remove_user(a, inst);
        if graph.users(a).is_empty() {
            work.push(a);
        }
        if a == b {
            continue;
        }
        graph.remove_user(b, inst);
        if graph.users(b).is_empty() {
            work.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minuet_ir::{GraphBuilder, Module, Opcode};

    #[test]
    fn orphan_cascades_through_inputs() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.inst(0, Opcode::Constant, &[1]);
        b.inst(1, Opcode::Constant, &[2]);
        b.inst(2, Opcode::Add, &[0, 1]);
        b.inst(3, Opcode::Constant, &[7]);
        b.inst(4, Opcode::Ret, &[3]);
        let gref = b.build(&mut module).unwrap();
        let g = module.graph_mut(gref);

        let add = g.inst_by_id(2).unwrap();
        g.orphan_inst(add);
        run(g);

        // the add and both now-unused constants are gone
        let b0 = g.block_by_id(0).unwrap();
        let left: Vec<u32> = g.layout.inst_iter(b0).map(|i| g.inst(i).id).collect();
        assert_eq!(left, vec![3, 4]);
        assert!(g.inst_by_id(0).is_none());
        assert!(g.inst_by_id(1).is_none());
        assert!(g.inst_by_id(2).is_none());
    }

    #[test]
    fn shared_inputs_survive() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.inst(0, Opcode::Constant, &[1]);
        b.inst(1, Opcode::Constant, &[2]);
        b.inst(2, Opcode::Add, &[0, 1]);
        b.inst(3, Opcode::Sub, &[0, 1]);
        b.inst(4, Opcode::Ret, &[3]);
        let gref = b.build(&mut module).unwrap();
        let g = module.graph_mut(gref);

        g.orphan_inst(g.inst_by_id(2).unwrap());
        run(g);

        // the constants still feed the sub
        let b0 = g.block_by_id(0).unwrap();
        let left: Vec<u32> = g.layout.inst_iter(b0).map(|i| g.inst(i).id).collect();
        assert_eq!(left, vec![0, 1, 3, 4]);
        let sub = g.inst_by_id(3).unwrap();
        assert_eq!(g.users(g.inst_by_id(0).unwrap()), &[sub]);
    }

    #[test]
    fn untouched_graph_is_a_no_op() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.inst(0, Opcode::Constant, &[5]);
        b.inst(1, Opcode::Ret, &[0]);
        let gref = b.build(&mut module).unwrap();
        let g = module.graph_mut(gref);
        run(g);
        let b0 = g.block_by_id(0).unwrap();
        assert_eq!(g.layout.inst_count_of(b0), 2);
    }
}
