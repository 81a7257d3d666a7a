//! The pass pipeline.
//!
//! Passes declare the analyses they read and the ones they preserve. The
//! manager recomputes stale requirements before each pass and drops exactly
//! the analyses a rewrite does not keep intact, so nothing downstream ever
//! consumes stale results and nothing valid is recomputed needlessly.

use minuet_ir::{Analysis, Graph, GraphRef, Module};

use crate::optim::{check_elim, const_folding, dce, inliner, peephole};
use crate::{domtree, domtree_slow, linear_order, liveness, loop_analysis, regalloc, rpo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Rpo,
    DomTreeSlow,
    DomTreeFast,
    Loops,
    LinearOrder,
    Liveness,
    RegAlloc { regs: u16 },
    ConstFolding,
    Peephole,
    Dce,
    CheckElimination,
    Inlining,
}

impl Pass {
    /// Analyses this pass reads; stale ones are recomputed before it runs.
    pub fn requires(self) -> &'static [Analysis] {
        match self {
            Pass::Rpo | Pass::DomTreeSlow | Pass::DomTreeFast | Pass::Dce | Pass::Inlining => &[],
            Pass::Loops => &[Analysis::DomTreeFast, Analysis::Rpo],
            Pass::LinearOrder => &[Analysis::Rpo, Analysis::Loops],
            Pass::Liveness => &[Analysis::LinearOrder],
            Pass::RegAlloc { .. } => &[Analysis::Liveness],
            Pass::ConstFolding | Pass::Peephole => &[Analysis::Rpo],
            Pass::CheckElimination => &[Analysis::DomTreeFast],
        }
    }

    /// Analyses still valid after this pass ran. Instruction-level rewrites
    /// keep the CFG-shaped results; inlining keeps nothing.
    pub fn preserves(self) -> &'static [Analysis] {
        match self {
            Pass::Rpo
            | Pass::DomTreeSlow
            | Pass::DomTreeFast
            | Pass::Loops
            | Pass::LinearOrder
            | Pass::Liveness
            | Pass::RegAlloc { .. } => &Analysis::ALL,
            Pass::ConstFolding | Pass::Peephole | Pass::Dce | Pass::CheckElimination => &[
                Analysis::Rpo,
                Analysis::DomTreeSlow,
                Analysis::DomTreeFast,
                Analysis::Loops,
                Analysis::LinearOrder,
            ],
            Pass::Inlining => &[],
        }
    }
}

fn ensure(graph: &mut Graph, analysis: Analysis) {
    match analysis {
        Analysis::Rpo => rpo::ensure(graph),
        Analysis::DomTreeSlow => domtree_slow::ensure(graph),
        Analysis::DomTreeFast => domtree::ensure(graph),
        Analysis::Loops => loop_analysis::ensure(graph),
        Analysis::LinearOrder => linear_order::ensure(graph),
        Analysis::Liveness => liveness::ensure(graph),
    }
}

#[derive(Debug, Default)]
pub struct PassManager {
    pipeline: Vec<Pass>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pass: Pass) -> &mut Self {
        self.pipeline.push(pass);
        self
    }

    pub fn run(&self, module: &mut Module, gref: GraphRef) {
        for &pass in &self.pipeline {
            for &analysis in pass.requires() {
                ensure(module.graph_mut(gref), analysis);
            }
            match pass {
                Pass::Rpo => rpo::ensure(module.graph_mut(gref)),
                Pass::DomTreeSlow => domtree_slow::ensure(module.graph_mut(gref)),
                Pass::DomTreeFast => domtree::ensure(module.graph_mut(gref)),
                Pass::Loops => loop_analysis::ensure(module.graph_mut(gref)),
                Pass::LinearOrder => linear_order::ensure(module.graph_mut(gref)),
                Pass::Liveness => liveness::ensure(module.graph_mut(gref)),
                Pass::RegAlloc { regs } => regalloc::RegAlloc::new(regs).run(module.graph_mut(gref)),
                Pass::ConstFolding => const_folding::run(module.graph_mut(gref)),
                Pass::Peephole => peephole::run(module.graph_mut(gref)),
                Pass::Dce => dce::run(module.graph_mut(gref)),
                Pass::CheckElimination => check_elim::run(module.graph_mut(gref)),
                Pass::Inlining => inliner::run(module, gref),
            }
            let graph = module.graph_mut(gref);
            let kept = pass.preserves();
            for analysis in Analysis::ALL {
                if !kept.contains(&analysis) {
                    graph.invalidate(analysis);
                }
            }
        }
    }
}
