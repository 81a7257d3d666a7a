//! Immediate dominators via the simple Lengauer-Tarjan construction with
//! path compression. Results land in `graph.idom`, keyed by block; the entry
//! and unreachable blocks get none.

use rustc_hash::FxHashMap;

use minuet_ir::{Analysis, BlockId, Graph};

pub fn ensure(graph: &mut Graph) {
    if !graph.is_valid(Analysis::DomTreeFast) {
        compute(graph);
    }
}

struct Node {
    block: BlockId,
    parent: usize,
    sdom: usize,
    ancestor: Option<usize>,
    label: usize,
    dom: usize,
}

pub fn compute(graph: &mut Graph) {
    for block in graph.block_ids().collect::<Vec<_>>() {
        graph.idom[block] = None.into();
    }
    let Some(entry) = graph.entry_block() else {
        graph.set_valid(Analysis::DomTreeFast);
        return;
    };

    let (nodes_blocks, parents, dfs_num) = preorder(graph, entry);
    let n = nodes_blocks.len();
    let mut nodes: Vec<Node> = (0..n)
        .map(|i| Node {
            block: nodes_blocks[i],
            parent: parents[i],
            sdom: i,
            ancestor: None,
            label: i,
            dom: 0,
        })
        .collect();
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n];

    for w in (1..n).rev() {
        for pred in graph.preds(nodes[w].block).to_vec() {
            let Some(&v) = dfs_num.get(&pred) else {
                // unreachable predecessor
                continue;
            };
            let u = eval(&mut nodes, v);
            if nodes[u].sdom < nodes[w].sdom {
                nodes[w].sdom = nodes[u].sdom;
            }
        }
        let sdom = nodes[w].sdom;
        buckets[sdom].push(w);
        let parent = nodes[w].parent;
        nodes[w].ancestor = Some(parent);
        for v in std::mem::take(&mut buckets[parent]) {
            let u = eval(&mut nodes, v);
            nodes[v].dom = if nodes[u].sdom < nodes[v].sdom { u } else { parent };
        }
    }
    for w in 1..n {
        if nodes[w].dom != nodes[w].sdom {
            nodes[w].dom = nodes[nodes[w].dom].dom;
        }
    }
    for w in 1..n {
        graph.idom[nodes[w].block] = nodes[nodes[w].dom].block.into();
    }
    graph.set_valid(Analysis::DomTreeFast);
}

/// Depth-first preorder with tree parents, recursion kept on an explicit
/// frame stack so the shape matches a recursive walk exactly.
fn preorder(
    graph: &mut Graph,
    entry: BlockId,
) -> (Vec<BlockId>, Vec<usize>, FxHashMap<BlockId, usize>) {
    let mut blocks = vec![entry];
    let mut parents = vec![0usize];
    let mut dfs_num = FxHashMap::default();
    dfs_num.insert(entry, 0usize);

    let marker = graph.acquire_marker();
    graph.mark_block(entry, marker);
    let mut stack = vec![(entry, 0usize, 0usize)];
    while let Some(&mut (block, ref mut idx, me)) = stack.last_mut() {
        match graph.succs(block).get(*idx) {
            Some(&succ) => {
                *idx += 1;
                if !graph.is_block_marked(succ, marker) && !graph.is_block_unbound(succ) {
                    graph.mark_block(succ, marker);
                    let child = blocks.len();
                    blocks.push(succ);
                    parents.push(me);
                    dfs_num.insert(succ, child);
                    stack.push((succ, 0, child));
                }
            }
            None => {
                stack.pop();
            }
        }
    }
    graph.release_marker(marker);
    (blocks, parents, dfs_num)
}

fn eval(nodes: &mut [Node], v: usize) -> usize {
    if nodes[v].ancestor.is_none() {
        return v;
    }
    compress(nodes, v);
    nodes[v].label
}

fn compress(nodes: &mut [Node], v: usize) {
    let mut chain = Vec::new();
    let mut x = v;
    loop {
        let a = match nodes[x].ancestor {
            Some(a) => a,
            None => break,
        };
        if nodes[a].ancestor.is_none() {
            break;
        }
        chain.push(x);
        x = a;
    }
    while let Some(x) = chain.pop() {
        let a = nodes[x].ancestor.unwrap();
        if nodes[nodes[a].label].sdom < nodes[nodes[x].label].sdom {
            nodes[x].label = nodes[a].label;
        }
        nodes[x].ancestor = nodes[a].ancestor;
    }
}
