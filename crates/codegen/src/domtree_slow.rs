//! Reachability-based dominator sets.
//!
//! A block `d` dominates `b` iff detaching `d` from the CFG makes `b`
//! unreachable. This is quadratic and exists as the oracle the fast
//! Lengauer-Tarjan construction is checked against.

use rustc_hash::FxHashSet;

use minuet_ir::{Analysis, Graph};

use crate::rpo;

pub fn ensure(graph: &mut Graph) {
    if !graph.is_valid(Analysis::DomTreeSlow) {
        compute(graph);
    }
}

pub fn compute(graph: &mut Graph) {
    let baseline = rpo::collect(graph);
    for block in graph.block_ids().collect::<Vec<_>>() {
        graph.dominators[block].clear();
    }
    let Some(&entry) = baseline.first() else {
        graph.set_valid(Analysis::DomTreeSlow);
        return;
    };

    // the entry dominates everything reachable
    for &block in &baseline {
        graph.dominators[block].push(entry);
    }

    for &probed in &baseline {
        if probed == entry {
            continue;
        }
        graph.set_block_unbound(probed, true);
        let reach: FxHashSet<_> = rpo::collect(graph).into_iter().collect();
        graph.set_block_unbound(probed, false);
        // `probed` itself drops out of `reach`, giving self-domination
        for &block in &baseline {
            if !reach.contains(&block) {
                graph.dominators[block].push(probed);
            }
        }
    }
    graph.set_valid(Analysis::DomTreeSlow);
}
