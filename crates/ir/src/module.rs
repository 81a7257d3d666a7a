use cranelift_entity::{entity_impl, PrimaryMap};

use crate::graph::Graph;

/// A reference to a graph owned by a [`Module`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphRef(pub u32);
entity_impl!(GraphRef, "graph");

/// A compilation unit: the set of function graphs that may call each other.
#[derive(Debug, Default)]
pub struct Module {
    graphs: PrimaryMap<GraphRef, Graph>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_graph(&mut self, graph: Graph) -> GraphRef {
        self.graphs.push(graph)
    }

    pub fn graph(&self, gref: GraphRef) -> &Graph {
        &self.graphs[gref]
    }

    pub fn graph_mut(&mut self, gref: GraphRef) -> &mut Graph {
        &mut self.graphs[gref]
    }

    /// Takes a graph out of the module, leaving an empty one behind. Used
    /// when a graph's body is spliced into another, as inlining does.
    pub fn take_graph(&mut self, gref: GraphRef) -> Graph {
        std::mem::take(&mut self.graphs[gref])
    }

    pub fn graph_refs(&self) -> impl Iterator<Item = GraphRef> + '_ {
        self.graphs.keys()
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
