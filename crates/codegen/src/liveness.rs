//! Live numbering and live intervals.
//!
//! Blocks are numbered in linear order. Each non-phi instruction gets an even
//! live number two past its predecessor; phis share their block's start.
//! Intervals are then built in one backward sweep per block, seeded from the
//! successors' live-in sets, with loop headers stretching whatever is still
//! live across the whole loop body.

use cranelift_entity::SecondaryMap;
use indexmap::IndexSet;

use minuet_ir::{Analysis, BlockId, Graph, InstId, InstKind, LiveInterval, LiveRange, Opcode};

use crate::linear_order;

pub fn ensure(graph: &mut Graph) {
    if !graph.is_valid(Analysis::Liveness) {
        compute(graph);
    }
}

pub fn compute(graph: &mut Graph) {
    linear_order::ensure(graph);
    number(graph);
    build_intervals(graph);
    graph.set_valid(Analysis::Liveness);
}

fn number(graph: &mut Graph) {
    graph.live_numbers = SecondaryMap::new();
    graph.linear_numbers = SecondaryMap::new();
    graph.block_ranges = SecondaryMap::new();

    let mut live = 0u32;
    let mut linear = 0u32;
    for &block in graph.linear_order.clone().iter() {
        let start = live;
        for inst in graph.layout.inst_iter(block).collect::<Vec<_>>() {
            graph.linear_numbers[inst] = linear;
            linear += 1;
            if graph.inst(inst).opcode == Opcode::Phi {
                graph.live_numbers[inst] = start;
            } else {
                live += 2;
                graph.live_numbers[inst] = live;
            }
        }
        live += 2;
        graph.block_ranges[block] = LiveRange { start, end: live };
    }
}

fn leading_phis(graph: &Graph, block: BlockId) -> Vec<InstId> {
    graph
        .layout
        .inst_iter(block)
        .take_while(|&i| graph.inst(i).opcode == Opcode::Phi)
        .collect()
}

fn extend(graph: &mut Graph, value: InstId, start: u32, end: u32) {
    graph
        .live_intervals
        .entry(value)
        .or_insert_with(|| LiveInterval::new(start, end))
        .extend(start, end);
}

fn build_intervals(graph: &mut Graph) {
    graph.live_intervals.clear();
    let mut live_in: SecondaryMap<BlockId, Vec<InstId>> = SecondaryMap::new();

    for &block in graph.linear_order.clone().iter().rev() {
        let mut live: IndexSet<InstId> = IndexSet::new();
        for succ in graph.succs(block).to_vec() {
            live.extend(live_in[succ].iter().copied());
            // phi inputs flowing in over this edge are live out of `block`
            for phi in leading_phis(graph, succ) {
                for &(value, from) in graph.inst(phi).phi_args() {
                    if from == block {
                        live.insert(value);
                    }
                }
            }
        }

        let range = graph.block_ranges[block];
        for &value in &live {
            extend(graph, value, range.start, range.end);
        }

        for inst in graph
            .layout
            .inst_iter(block)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
        {
            if graph.inst(inst).opcode == Opcode::Phi {
                continue;
            }
            live.swap_remove(&inst);
            let def = graph.live_numbers[inst];
            match graph.live_intervals.get_mut(&inst) {
                Some(interval) => interval.set_start(def),
                None => {
                    graph.live_intervals.insert(inst, LiveInterval::new(def, def + 2));
                }
            }
            for input in graph.inst(inst).inputs().collect::<Vec<_>>() {
                live.insert(input);
                extend(graph, input, range.start, def);
            }
        }

        for phi in leading_phis(graph, block) {
            live.swap_remove(&phi);
        }

        // everything live into a loop header survives the whole loop
        if let Some(lp) = graph.block_loop[block].expand() {
            if graph.loops[lp].is_header(block) && graph.loops[lp].reducible {
                if let Some(source) = graph.loops[lp].back_edge_source.expand() {
                    let end = graph.block_ranges[source].end;
                    for &value in &live {
                        extend(graph, value, range.start, end);
                    }
                }
            }
        }

        live_in[block] = live.into_iter().collect();
    }

    // control instructions and bare comparisons produce no allocatable value
    for block in graph.layout.block_iter().collect::<Vec<_>>() {
        for inst in graph.layout.inst_iter(block).collect::<Vec<_>>() {
            let data = graph.inst(inst);
            if data.kind() == InstKind::Jump
                || data.opcode == Opcode::RetVoid
                || data.opcode == Opcode::Cmp
            {
                graph.live_intervals.insert(inst, LiveInterval::new(0, 0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minuet_ir::{GraphBuilder, Module};

    fn interval(graph: &Graph, id: u32) -> (u32, u32) {
        let inst = graph.inst_by_id(id).unwrap();
        let iv = graph.live_intervals[&inst];
        (iv.start, iv.end)
    }

    #[test]
    fn straight_line_numbers_and_intervals() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        b.block(0, &[]);
        b.inst(0, Opcode::Constant, &[1]);
        b.inst(1, Opcode::Constant, &[2]);
        b.inst(2, Opcode::Add, &[0, 1]);
        b.inst(3, Opcode::Ret, &[2]);
        let gref = b.build(&mut module).unwrap();
        let g = module.graph_mut(gref);
        compute(g);

        let b0 = g.block_by_id(0).unwrap();
        assert_eq!(g.block_ranges[b0], LiveRange { start: 0, end: 10 });
        assert_eq!(g.live_numbers[g.inst_by_id(0).unwrap()], 2);
        assert_eq!(g.live_numbers[g.inst_by_id(3).unwrap()], 8);
        assert_eq!(g.linear_numbers[g.inst_by_id(2).unwrap()], 2);

        assert_eq!(interval(g, 0), (2, 6));
        assert_eq!(interval(g, 1), (4, 6));
        assert_eq!(interval(g, 2), (6, 8));
        assert_eq!(interval(g, 3), (8, 10));
    }

    #[test]
    fn loop_keeps_header_live_ins_alive() {
        let mut module = Module::new();
        let mut b = GraphBuilder::new();
        b.block(0, &[1]);
        b.inst(0, Opcode::Constant, &[10]);
        b.inst(1, Opcode::Constant, &[1]);
        b.inst(2, Opcode::Jmp, &[1]);
        b.block(1, &[1, 2]);
        b.inst(3, Opcode::Phi, &[0, 0, 4, 1]);
        b.inst(4, Opcode::Sub, &[3, 1]);
        b.inst(5, Opcode::Ja, &[1]);
        b.block(2, &[]);
        b.inst(6, Opcode::Ret, &[4]);
        let gref = b.build(&mut module).unwrap();
        let g = module.graph_mut(gref);
        compute(g);

        // linear order 0, 1, 2; block ranges 0..8, 8..14, 14..18
        let b1 = g.block_by_id(1).unwrap();
        assert_eq!(g.block_ranges[b1], LiveRange { start: 8, end: 14 });

        // the phi lives from the header start to its single use
        assert_eq!(interval(g, 3), (8, 10));
        // the loop-carried sub starts at its definition and flows both over
        // the back edge and into block 2
        assert_eq!(interval(g, 4), (10, 16));
        // constant 1 is used inside the loop each iteration
        assert_eq!(interval(g, 1), (4, 14));
        // constant 10 only feeds the phi over the entry edge
        assert_eq!(interval(g, 0), (2, 8));
        // control flow gets empty intervals
        assert_eq!(interval(g, 2), (0, 0));
        assert_eq!(interval(g, 5), (0, 0));
    }
}
