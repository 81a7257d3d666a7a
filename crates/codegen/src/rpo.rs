//! Reverse postorder over the CFG.

use minuet_ir::marker::Marker;
use minuet_ir::{Analysis, BlockId, Graph};

pub fn ensure(graph: &mut Graph) {
    if !graph.is_valid(Analysis::Rpo) {
        compute(graph);
    }
}

pub fn compute(graph: &mut Graph) {
    graph.rpo = collect(graph);
    graph.set_valid(Analysis::Rpo);
}

/// Collects the reverse postorder without touching the cached copy.
/// Unbound blocks are treated as absent, which the slow dominator tree
/// exploits to probe reachability.
pub fn collect(graph: &mut Graph) -> Vec<BlockId> {
    let mut post = Vec::new();
    let Some(entry) = graph.entry_block() else {
        return post;
    };
    let marker = graph.acquire_marker();
    graph.mark_block(entry, marker);
    for idx in 0.. {
        let Some(&succ) = graph.succs(entry).get(idx) else {
            break;
        };
        postorder_from(graph, succ, marker, &mut post);
    }
    post.push(entry);
    graph.release_marker(marker);
    post.reverse();
    post
}

fn postorder_from(graph: &mut Graph, root: BlockId, marker: Marker, out: &mut Vec<BlockId>) {
    if graph.is_block_marked(root, marker) || graph.is_block_unbound(root) {
        return;
    }
    graph.mark_block(root, marker);
    let mut stack = vec![(root, 0usize)];
    while let Some(&mut (block, ref mut idx)) = stack.last_mut() {
        match graph.succs(block).get(*idx) {
            Some(&succ) => {
                *idx += 1;
                if !graph.is_block_marked(succ, marker) && !graph.is_block_unbound(succ) {
                    graph.mark_block(succ, marker);
                    stack.push((succ, 0));
                }
            }
            None => {
                out.push(block);
                stack.pop();
            }
        }
    }
}
