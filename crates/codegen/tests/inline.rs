//! End-to-end inlining scenarios: parameter binding, return merging,
//! constant hoisting and block splitting.

use minuet_codegen::optim::inliner;
use minuet_ir::{BlockId, Graph, GraphBuilder, Module, Opcode};

fn block_insts(graph: &Graph, block: BlockId) -> Vec<u32> {
    graph.layout.inst_iter(block).map(|i| graph.inst(i).id).collect()
}

fn sorted_users(graph: &Graph, id: u32) -> Vec<u32> {
    let inst = graph.inst_by_id(id).unwrap();
    let mut users: Vec<u32> = graph.users(inst).iter().map(|&u| graph.inst(u).id).collect();
    users.sort_unstable();
    users
}

fn succ_ids(graph: &Graph, block: BlockId) -> Vec<u32> {
    graph.succs(block).iter().map(|&b| graph.block(b).id).collect()
}

fn pred_ids(graph: &Graph, block: BlockId) -> Vec<u32> {
    graph.preds(block).iter().map(|&b| graph.block(b).id).collect()
}

#[test]
fn single_return_with_branchy_callee() {
    let mut module = Module::new();

    // callee(a, b, c): returns phi of a+b and a-b picked on c == 42
    let mut b = GraphBuilder::new();
    b.block(1, &[2, 3]);
    b.inst(1, Opcode::Parameter, &[]);
    b.inst(2, Opcode::Parameter, &[]);
    b.inst(3, Opcode::Parameter, &[]);
    b.inst(4, Opcode::Constant, &[42]);
    b.inst(5, Opcode::Cmp, &[3, 4]);
    b.inst(6, Opcode::JmpEq, &[2]);
    b.block(2, &[4]);
    b.inst(7, Opcode::Add, &[1, 2]);
    b.inst(8, Opcode::Jmp, &[4]);
    b.block(3, &[4]);
    b.inst(9, Opcode::Sub, &[1, 2]);
    b.inst(10, Opcode::Jmp, &[4]);
    b.block(4, &[]);
    b.inst(11, Opcode::Phi, &[7, 2, 9, 3]);
    b.inst(12, Opcode::Ret, &[11]);
    let callee = b.build(&mut module).unwrap();

    let mut b = GraphBuilder::new();
    b.block(0, &[]);
    b.inst(20, Opcode::Constant, &[314]);
    b.inst(21, Opcode::Constant, &[271]);
    b.inst(22, Opcode::Constant, &[50]);
    b.call(23, callee, &[20, 21, 22]);
    b.inst(24, Opcode::Ret, &[23]);
    let caller = b.build(&mut module).unwrap();

    inliner::run(&mut module, caller);
    let g = module.graph(caller);

    // caller entry, callee body, then the continuation with a fresh id
    let blocks: Vec<u32> = g.layout.block_iter().map(|bb| g.block(bb).id).collect();
    assert_eq!(blocks, vec![0, 1, 2, 3, 4, 5]);

    // parameters are gone, args feed the callee body directly
    assert!(g.inst_by_id(1).is_none());
    assert_eq!(sorted_users(g, 20), vec![7, 9]);
    assert_eq!(sorted_users(g, 21), vec![7, 9]);
    assert_eq!(sorted_users(g, 22), vec![5]);

    // the hoisted 42 lands in front of the caller's own constants
    let entry = g.entry_block().unwrap();
    assert_eq!(block_insts(g, entry), vec![4, 20, 21, 22]);

    // call and callee ret are gone; the caller ret now reads the phi
    assert!(g.inst_by_id(23).is_none());
    assert!(g.inst_by_id(12).is_none());
    let cont = g.block_by_id(5).unwrap();
    assert_eq!(block_insts(g, cont), vec![24]);
    let ret = g.inst_by_id(24).unwrap();
    let phi = g.inst_by_id(11).unwrap();
    assert_eq!(g.inst(ret).input1(), phi);
    assert_eq!(sorted_users(g, 11), vec![24]);

    // edges: entry into callee entry, callee exit into the continuation
    assert_eq!(succ_ids(g, entry), vec![1]);
    let exit = g.block_by_id(4).unwrap();
    assert_eq!(block_insts(g, exit), vec![11]);
    assert_eq!(succ_ids(g, exit), vec![5]);
    assert_eq!(pred_ids(g, cont), vec![4]);
}

#[test]
fn two_returns_synthesize_a_phi() {
    let mut module = Module::new();

    let mut b = GraphBuilder::new();
    b.block(1, &[2, 3]);
    b.inst(1, Opcode::Parameter, &[]);
    b.inst(3, Opcode::JmpEq, &[2]);
    b.block(2, &[]);
    b.inst(4, Opcode::Add, &[1, 1]);
    b.inst(5, Opcode::Ret, &[4]);
    b.block(3, &[]);
    b.inst(6, Opcode::Sub, &[1, 1]);
    b.inst(7, Opcode::Ret, &[6]);
    let callee = b.build(&mut module).unwrap();

    let mut b = GraphBuilder::new();
    b.block(0, &[]);
    b.inst(20, Opcode::Constant, &[9]);
    b.call(21, callee, &[20]);
    b.inst(22, Opcode::Ret, &[21]);
    let caller = b.build(&mut module).unwrap();

    inliner::run(&mut module, caller);
    let g = module.graph(caller);

    // the phi takes a fresh id past both graphs and moves into the
    // continuation with the rest of the tail
    let cont = g.block_by_id(4).unwrap();
    let cont_insts = block_insts(g, cont);
    assert_eq!(cont_insts, vec![23, 22]);
    let phi = g.inst_by_id(23).unwrap();
    assert_eq!(g.inst(phi).opcode, Opcode::Phi);
    let args: Vec<(u32, u32)> = g
        .inst(phi)
        .phi_args()
        .iter()
        .map(|&(v, bb)| (g.inst(v).id, g.block(bb).id))
        .collect();
    assert_eq!(args, vec![(4, 2), (6, 3)]);

    let ret = g.inst_by_id(22).unwrap();
    assert_eq!(g.inst(ret).input1(), phi);
    assert_eq!(sorted_users(g, 4), vec![23]);
    assert_eq!(sorted_users(g, 6), vec![23]);

    // both returning blocks feed the continuation
    assert_eq!(pred_ids(g, cont), vec![2, 3]);
    assert!(g.inst_by_id(5).is_none());
    assert!(g.inst_by_id(7).is_none());
}

#[test]
fn throwing_exit_joins_without_a_value() {
    let mut module = Module::new();

    let mut b = GraphBuilder::new();
    b.block(1, &[2, 3]);
    b.inst(1, Opcode::Parameter, &[]);
    b.inst(2, Opcode::JmpEq, &[2]);
    b.block(2, &[]);
    b.inst(3, Opcode::Add, &[1, 1]);
    b.inst(4, Opcode::Ret, &[3]);
    b.block(3, &[]);
    b.inst(5, Opcode::Sub, &[1, 1]);
    b.inst(6, Opcode::Throw, &[]);
    let callee = b.build(&mut module).unwrap();

    let mut b = GraphBuilder::new();
    b.block(0, &[]);
    b.inst(20, Opcode::Constant, &[5]);
    b.call(21, callee, &[20]);
    b.inst(22, Opcode::Ret, &[21]);
    let caller = b.build(&mut module).unwrap();

    inliner::run(&mut module, caller);
    let g = module.graph(caller);

    // one value-returning path, so no phi: the ret reads the add
    let ret = g.inst_by_id(22).unwrap();
    let add = g.inst_by_id(3).unwrap();
    assert_eq!(g.inst(ret).input1(), add);
    assert_eq!(sorted_users(g, 3), vec![22]);

    // the throw stays in place but its block still reaches the continuation
    let throw_block = g.block_by_id(3).unwrap();
    assert_eq!(block_insts(g, throw_block), vec![5, 6]);
    let cont = g.block_by_id(4).unwrap();
    assert_eq!(pred_ids(g, cont), vec![2, 3]);
    assert_eq!(block_insts(g, cont), vec![22]);
}

#[test]
fn void_callee_with_loop_hoists_constants_and_keeps_back_edge() {
    let mut module = Module::new();

    let mut b = GraphBuilder::new();
    b.block(1, &[2]);
    b.inst(1, Opcode::Parameter, &[]);
    b.inst(2, Opcode::Constant, &[1]);
    b.inst(3, Opcode::Constant, &[777]);
    b.inst(4, Opcode::Add, &[1, 2]);
    b.block(2, &[1]);
    b.inst(5, Opcode::Cmp, &[4, 3]);
    b.inst(6, Opcode::Ja, &[1]);
    b.inst(7, Opcode::RetVoid, &[]);
    let callee = b.build(&mut module).unwrap();

    let mut b = GraphBuilder::new();
    b.block(0, &[]);
    b.inst(20, Opcode::Constant, &[555]);
    b.call(21, callee, &[20]);
    b.inst(22, Opcode::RetVoid, &[]);
    let caller = b.build(&mut module).unwrap();

    inliner::run(&mut module, caller);
    let g = module.graph(caller);

    // constants hoist one at a time, so they arrive in reverse
    let entry = g.entry_block().unwrap();
    assert_eq!(block_insts(g, entry), vec![3, 2, 20]);
    let values: Vec<i32> = g
        .layout
        .inst_iter(entry)
        .map(|i| g.inst(i).constant_value())
        .collect();
    assert_eq!(values, vec![777, 1, 555]);

    // the argument replaced the parameter inside the loop body
    assert_eq!(sorted_users(g, 20), vec![4]);
    let add = g.inst_by_id(4).unwrap();
    assert_eq!(g.inst(add).input1(), g.inst_by_id(20).unwrap());

    // ret_void is stripped; the loop block keeps its back edge and gains
    // the continuation edge
    assert!(g.inst_by_id(7).is_none());
    let loop_block = g.block_by_id(2).unwrap();
    assert_eq!(block_insts(g, loop_block), vec![5, 6]);
    assert_eq!(succ_ids(g, loop_block), vec![1, 3]);
    let header = g.block_by_id(1).unwrap();
    assert_eq!(pred_ids(g, header), vec![2, 0]);
    let cont = g.block_by_id(3).unwrap();
    assert_eq!(block_insts(g, cont), vec![22]);
}
