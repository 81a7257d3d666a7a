//! Human-readable dumps of graphs and modules, mostly for debugging and
//! test diagnostics.

use std::fmt;

use crate::graph::{BlockId, Graph};
use crate::inst::{InstData, InstId};
use crate::module::Module;

pub struct GraphWriter<'a> {
    graph: &'a Graph,
}

impl<'a> GraphWriter<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, block: BlockId) -> fmt::Result {
        let g = self.graph;
        write!(f, "    block{}:", g.block(block).id)?;
        if !g.preds(block).is_empty() {
            write!(f, "    ; preds:")?;
            for &pred in g.preds(block) {
                write!(f, " block{}", g.block(pred).id)?;
            }
        }
        writeln!(f)?;
        for inst in g.layout.inst_iter(block) {
            self.write_inst(f, inst)?;
        }
        Ok(())
    }

    fn write_inst(&self, f: &mut fmt::Formatter<'_>, inst: InstId) -> fmt::Result {
        let g = self.graph;
        let data = g.inst(inst);
        write!(f, "        {}.{}", data.id, data.opcode)?;
        match &data.data {
            InstData::TwoInput { args } => {
                write!(f, " v{} v{}", g.inst(args[0]).id, g.inst(args[1]).id)?;
            }
            InstData::OneInput { arg } => write!(f, " v{}", g.inst(*arg).id)?,
            InstData::Jump { target } => {
                if let Some(t) = target.expand() {
                    write!(f, " -> block{}", g.block(t).id)?;
                }
            }
            InstData::Phi { args } => {
                for (v, b) in args {
                    write!(f, " (v{}, block{})", g.inst(*v).id, g.block(*b).id)?;
                }
            }
            InstData::Constant { value } => write!(f, " {value}")?,
            InstData::Call { callee, args } => {
                write!(f, " {callee}")?;
                for a in args {
                    write!(f, " v{}", g.inst(*a).id)?;
                }
            }
            InstData::Parameter | InstData::NoInput => {}
        }
        writeln!(f)
    }
}

impl fmt::Display for GraphWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.graph.layout.block_iter() {
            self.write_block(f, block)?;
        }
        Ok(())
    }
}

pub struct ModuleWriter<'a> {
    module: &'a Module,
}

impl<'a> ModuleWriter<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self { module }
    }
}

impl fmt::Display for ModuleWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for gref in self.module.graph_refs() {
            writeln!(f, "{gref}:")?;
            write!(f, "{}", GraphWriter::new(self.module.graph(gref)))?;
        }
        Ok(())
    }
}
