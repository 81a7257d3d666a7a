//! Static call inlining.
//!
//! The callee graph is absorbed into the caller, its parameters are bound to
//! the call arguments, its returns are merged (through a phi when several
//! paths return a value) and the call block is split so the code after the
//! call becomes a continuation block fed by every callee exit. The callee's
//! leading entry constants are hoisted into the caller entry. Only calls
//! present when the pass starts are inlined; calls exposed by the inlining
//! itself are left for a later run.

use smallvec::SmallVec;

use minuet_ir::{BlockId, Graph, GraphRef, InstData, InstId, Module, Opcode};

pub fn run(module: &mut Module, caller: GraphRef) {
    let calls: Vec<InstId> = {
        let graph = module.graph(caller);
        graph
            .layout
            .block_iter()
            .flat_map(|block| graph.layout.inst_iter(block))
            .filter(|&inst| graph.inst(inst).opcode == Opcode::CallStatic)
            .collect()
    };
    for call in calls {
        inline_call(module, caller, call);
    }
    module.graph_mut(caller).invalidate_all();
}

fn inline_call(module: &mut Module, caller: GraphRef, call: InstId) {
    let Some(callee_ref) = module.graph(caller).inst(call).callee() else {
        return;
    };
    // direct recursion cannot be spliced into itself
    if callee_ref == caller {
        return;
    }
    let callee = module.take_graph(callee_ref);
    if callee.entry_block().is_none() {
        return;
    }
    let graph = module.graph_mut(caller);

    let call_block = graph.layout.inst_block(call);
    let args: SmallVec<[InstId; 4]> = SmallVec::from_slice(graph.inst(call).call_args());
    let absorbed = graph.absorb(callee);
    let entry = absorbed.entry();

    bind_parameters(graph, entry, call, &args);
    let exits = process_returns(graph, &absorbed.blocks, call, call_block);
    hoist_entry_constants(graph, entry);
    split_and_connect(graph, call, call_block, entry, &exits);
}

/// Pops one leading parameter of the callee entry per argument and rewires
/// its users onto that argument.
fn bind_parameters(graph: &mut Graph, entry: BlockId, call: InstId, args: &[InstId]) {
    for &arg in args {
        let Some(param) = graph.layout.first_inst_of(entry) else {
            break;
        };
        debug_assert_eq!(graph.inst(param).opcode, Opcode::Parameter);
        graph.remove_user(arg, call);
        graph.rewire_users(param, arg);
        graph.remove_inst(param);
    }
}

/// Strips the callee's returns and rewires the call's users onto the
/// returned value, synthesizing a phi when several blocks return one.
/// Returns every exit block that must flow into the continuation.
fn process_returns(
    graph: &mut Graph,
    callee_blocks: &[BlockId],
    call: InstId,
    call_block: BlockId,
) -> Vec<BlockId> {
    let mut exits = Vec::new();
    let mut returns = Vec::new();
    for &block in callee_blocks {
        let Some(last) = graph.layout.last_inst_of(block) else {
            continue;
        };
        match graph.inst(last).opcode {
            Opcode::Ret | Opcode::RetVoid => {
                exits.push(block);
                returns.push(last);
            }
            Opcode::Throw => exits.push(block),
            _ => {}
        }
    }

    let value_returns: Vec<InstId> = returns
        .iter()
        .copied()
        .filter(|&r| graph.inst(r).opcode == Opcode::Ret)
        .collect();

    let result = match value_returns.len() {
        0 => None,
        1 => Some(graph.inst(value_returns[0]).input1()),
        _ => {
            let inputs: SmallVec<[(InstId, BlockId); 2]> = value_returns
                .iter()
                .map(|&r| {
                    let value = graph.inst(r).input1();
                    (value, graph.layout.inst_block(value))
                })
                .collect();
            let phi = graph.fresh_inst(Opcode::Phi, InstData::Phi { args: inputs.clone() });
            for &(value, _) in &inputs {
                graph.add_user(value, phi);
            }
            if graph.layout.next_inst_of(call).is_some() {
                graph.layout.insert_inst_after(phi, call);
            } else {
                graph.layout.append_inst(phi, call_block);
            }
            Some(phi)
        }
    };
    if let Some(result) = result {
        graph.rewire_users(call, result);
    }

    for ret in returns {
        if graph.inst(ret).opcode == Opcode::Ret {
            let value = graph.inst(ret).input1();
            graph.remove_user(value, ret);
        }
        graph.remove_inst(ret);
    }
    exits
}

/// Moves the callee entry's leading constants to the front of the caller
/// entry, one at a time, so they dominate every absorbed block.
fn hoist_entry_constants(graph: &mut Graph, callee_entry: BlockId) {
    let Some(caller_entry) = graph.entry_block() else {
        return;
    };
    loop {
        let Some(first) = graph.layout.first_inst_of(callee_entry) else {
            break;
        };
        if graph.inst(first).opcode != Opcode::Constant {
            break;
        }
        graph.layout.remove_inst(first);
        graph.layout.prepend_inst(first, caller_entry);
    }
}

fn split_and_connect(
    graph: &mut Graph,
    call: InstId,
    call_block: BlockId,
    entry: BlockId,
    exits: &[BlockId],
) {
    let cont = graph.fresh_block();
    let mut tail = Vec::new();
    let mut cursor = graph.layout.next_inst_of(call);
    while let Some(inst) = cursor {
        cursor = graph.layout.next_inst_of(inst);
        tail.push(inst);
    }
    for inst in tail {
        graph.layout.remove_inst(inst);
        graph.layout.append_inst(inst, cont);
    }

    graph.transfer_succs(call_block, cont);
    for succ in graph.succs(cont).to_vec() {
        graph.rewrite_phi_pred(succ, call_block, cont);
    }
    graph.add_edge(call_block, entry);
    for &exit in exits {
        graph.add_edge(exit, cont);
    }
    graph.remove_inst(call);
}
