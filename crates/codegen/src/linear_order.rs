//! Code layout order.
//!
//! Blocks are emitted in reverse postorder, except that reaching a loop
//! header emits the whole loop body contiguously before anything after the
//! loop. While a loop body is laid out, a conditional branch whose false
//! successor cannot fall through any more gets inverted so that the false
//! edge again points at the next block in the order.

use minuet_ir::marker::Marker;
use minuet_ir::{Analysis, BlockId, Graph, LoopId};

use crate::{loop_analysis, rpo};

pub fn ensure(graph: &mut Graph) {
    if !graph.is_valid(Analysis::LinearOrder) {
        compute(graph);
    }
}

pub fn compute(graph: &mut Graph) {
    rpo::ensure(graph);
    loop_analysis::ensure(graph);

    graph.linear_order.clear();
    let marker = graph.acquire_marker();
    for &block in graph.rpo.clone().iter() {
        if graph.is_block_marked(block, marker) {
            continue;
        }
        let lp = graph.block_loop[block].expand().unwrap_or_else(|| {
            panic!("block {} has no loop assignment", graph.block(block).id)
        });
        if graph.loops[lp].is_header(block) {
            process_loop(graph, lp, marker);
        } else {
            emit(graph, block, marker);
        }
    }
    graph.release_marker(marker);
    graph.set_valid(Analysis::LinearOrder);
}

/// Emits the members of `lp` in reverse member order (header first), and
/// recurses into inner loops at their headers.
fn process_loop(graph: &mut Graph, lp: LoopId, marker: Marker) {
    let mut stack = vec![(lp, 0usize)];
    while let Some(&mut (cur, ref mut idx)) = stack.last_mut() {
        let len = graph.loops[cur].blocks.len();
        if *idx >= len {
            stack.pop();
            continue;
        }
        let member = graph.loops[cur].blocks[len - 1 - *idx];
        *idx += 1;
        let member_loop = graph.block_loop[member].expand().unwrap_or_else(|| {
            panic!("block {} has no loop assignment", graph.block(member).id)
        });
        if member_loop != cur && graph.loops[member_loop].is_header(member) {
            stack.push((member_loop, 0));
        } else if member_loop == cur && !graph.is_block_marked(member, marker) {
            fix_false_branch_order(graph, member);
            emit(graph, member, marker);
        }
    }
}

fn emit(graph: &mut Graph, block: BlockId, marker: Marker) {
    graph.linear_order.push(block);
    graph.mark_block(block, marker);
}

/// If `block` is the true successor of the most recently emitted block,
/// invert that block's branch and swap its successors so `block` becomes
/// the fallthrough edge.
fn fix_false_branch_order(graph: &mut Graph, block: BlockId) {
    for pred in graph.preds(block).to_vec() {
        if graph.succs(pred).len() != 2 || graph.layout.is_block_empty(pred) {
            continue;
        }
        if graph.succs(pred)[0] == block && graph.linear_order.last() == Some(&pred) {
            let branch = graph
                .branch_of(pred)
                .unwrap_or_else(|| panic!("block {} ends without a branch", graph.block(pred).id));
            let inverted = graph.inst(branch).opcode.inverted();
            graph.inst_mut(branch).opcode = inverted;
            graph.swap_cond_succs(pred);
        }
    }
}
