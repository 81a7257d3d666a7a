//! Natural loop discovery and the loop forest.
//!
//! Back edges are found with a gray/black depth-first walk. An edge into a
//! block still on the walk stack is a back edge; the loop is reducible when
//! its header dominates the back-edge source. Irreducible back edges are
//! recorded but get no member blocks and stay out of the forest, so their
//! blocks fall through to the root.

use minuet_ir::marker::Marker;
use minuet_ir::{Analysis, BlockId, Graph, LoopData, LoopId};

use crate::{domtree, rpo};

pub fn ensure(graph: &mut Graph) {
    if !graph.is_valid(Analysis::Loops) {
        LoopAnalyzer::default().run(graph);
    }
}

#[derive(Debug, Default)]
pub struct LoopAnalyzer {
    /// Also allocate an (edgeless) pre-header block per reducible loop.
    pub with_pre_headers: bool,
}

impl LoopAnalyzer {
    pub fn with_pre_headers() -> Self {
        Self { with_pre_headers: true }
    }

    pub fn run(&self, graph: &mut Graph) {
        domtree::ensure(graph);
        graph.loops.clear();
        graph.root_loop = None.into();
        for block in graph.block_ids().collect::<Vec<_>>() {
            graph.block_loop[block] = None.into();
        }

        for (header, source) in collect_back_edges(graph) {
            if graph.dominates_block(header, source) {
                let lp = graph.loops.push(LoopData::new(header, source));
                graph.block_loop[header] = lp.into();
                graph.block_loop[source] = lp.into();
            } else {
                let mut data = LoopData::new(header, source);
                data.reducible = false;
                graph.loops.push(data);
            }
        }

        populate_loops(graph);
        build_loop_tree(graph);

        if self.with_pre_headers {
            for lp in graph.loops.keys().collect::<Vec<_>>() {
                if graph.loops[lp].reducible && !graph.loops[lp].is_root() {
                    let pre = graph.fresh_block();
                    graph.loops[lp].pre_header = pre.into();
                }
            }
        }
        graph.set_valid(Analysis::Loops);
    }
}

/// `(header, source)` pairs in discovery order.
fn collect_back_edges(graph: &mut Graph) -> Vec<(BlockId, BlockId)> {
    let mut edges = Vec::new();
    let Some(entry) = graph.entry_block() else {
        return edges;
    };
    let gray = graph.acquire_marker();
    let black = graph.acquire_marker();
    graph.mark_block(entry, gray);
    graph.mark_block(entry, black);
    let mut stack = vec![(entry, 0usize)];
    while let Some(&mut (block, ref mut idx)) = stack.last_mut() {
        match graph.succs(block).get(*idx) {
            Some(&succ) => {
                *idx += 1;
                if graph.is_block_marked(succ, gray) {
                    edges.push((succ, block));
                } else if !graph.is_block_marked(succ, black) {
                    graph.mark_block(succ, gray);
                    graph.mark_block(succ, black);
                    stack.push((succ, 0));
                }
            }
            None => {
                graph.unmark_block(block, gray);
                stack.pop();
            }
        }
    }
    graph.release_marker(gray);
    graph.release_marker(black);
    edges
}

/// Fills loop member lists by walking predecessors from the back-edge
/// source up to the header. The source comes first and the header last;
/// inner loops are nested under the first enclosing loop that reaches them.
fn populate_loops(graph: &mut Graph) {
    rpo::ensure(graph);
    for &header in graph.rpo.clone().iter().rev() {
        let Some(lp) = graph.block_loop[header].expand() else {
            continue;
        };
        if !graph.loops[lp].is_header(header) {
            continue;
        }
        let marker = graph.acquire_marker();
        graph.mark_block(header, marker);
        let source = graph.loops[lp].back_edge_source.expand();
        if let Some(source) = source {
            if !graph.is_block_marked(source, marker) {
                graph.mark_block(source, marker);
                graph.loops[lp].blocks.push(source);
                loop_search(graph, lp, source, marker);
            }
        }
        graph.loops[lp].blocks.push(header);
        graph.release_marker(marker);
    }
}

fn loop_search(graph: &mut Graph, lp: LoopId, start: BlockId, marker: Marker) {
    let mut stack = vec![(start, 0usize)];
    while let Some(&mut (block, ref mut idx)) = stack.last_mut() {
        match graph.preds(block).get(*idx) {
            Some(&pred) => {
                *idx += 1;
                if !graph.is_block_marked(pred, marker) {
                    graph.mark_block(pred, marker);
                    graph.loops[lp].blocks.push(pred);
                    match graph.block_loop[pred].expand() {
                        None => graph.block_loop[pred] = lp.into(),
                        Some(inner) if inner != lp && graph.loops[inner].outer.is_none() => {
                            graph.loops[inner].outer = lp.into();
                            graph.loops[lp].inner.push(inner);
                        }
                        _ => {}
                    }
                    stack.push((pred, 0));
                }
            }
            None => {
                stack.pop();
            }
        }
    }
}

fn build_loop_tree(graph: &mut Graph) {
    let root = graph.loops.push(LoopData::root());
    graph.root_loop = root.into();
    for block in graph.layout.block_iter().collect::<Vec<_>>() {
        match graph.block_loop[block].expand() {
            None => {
                graph.block_loop[block] = root.into();
                graph.loops[root].blocks.push(block);
            }
            Some(lp) if lp != root && graph.loops[lp].outer.is_none() => {
                graph.loops[lp].outer = root.into();
                graph.loops[root].inner.push(lp);
            }
            _ => {}
        }
    }
}
