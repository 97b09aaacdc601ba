//! Constant pruning and gate coalescing.
//!
//! Three cooperating passes over the normalized graph:
//!
//! - [`propagate_constants`] absorbs house-event constants and already
//!   constant-folded subgates, structurally (a shared non-constant subtree
//!   is never cached as a value).
//! - [`process_const_gates`] folds null/unity gate states into parents.
//! - [`join_gates`] merges same-type parent/child pairs and splices out
//!   single-child gates.
//!
//! [`simplify`] drives the latter two to a fixpoint; each iteration strictly
//! reduces the gate count plus total child count, so termination is
//! guaranteed. Running it on an already simplified graph changes nothing.

use std::collections::HashSet;

use log::debug;

use crate::error::{Error, Result};
use crate::graph::{IndexedGraph, State};
use crate::model::GateType;
use crate::reference::NodeRef;

/// Structurally absorbs house-event constants, starting from the top.
///
/// | parent | child = false | child = true |
/// |--------|---------------|--------------|
/// | OR     | erase child   | parent unity |
/// | AND    | parent null   | erase child  |
///
/// NOT/NULL parents may still exist at this stage and fold accordingly.
pub fn propagate_constants(graph: &mut IndexedGraph) {
    if graph.true_house().is_empty() && graph.false_house().is_empty() {
        return;
    }
    debug!("propagating constants");
    let mut processed = HashSet::new();
    propagate(graph, graph.top_index(), &mut processed);
    debug!("constant propagation is done");
}

fn propagate(graph: &mut IndexedGraph, index: u32, processed: &mut HashSet<u32>) {
    if !processed.insert(index) {
        return;
    }
    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    let mut to_erase = Vec::new();
    for c in children {
        let state;
        if graph.is_gate(c.index()) {
            propagate(graph, c.index(), processed);
            match graph.gate(c.index()).state() {
                State::Normal => continue,
                State::Null => state = false,
                State::Unity => state = true,
            }
        } else if graph.is_house(c.index()) {
            state = graph.true_house().contains(&c.index());
        } else {
            continue; // Basic events are not constants.
        }
        let state = state ^ c.is_negated();
        if process_constant_child(graph, index, c, state, &mut to_erase) {
            return; // The gate became constant.
        }
    }
    remove_children(graph, index, &to_erase);
}

/// Applies the absorption table for one constant child. Returns `true` when
/// the parent itself became constant.
fn process_constant_child(
    graph: &mut IndexedGraph,
    index: u32,
    child: NodeRef,
    state: bool,
    to_erase: &mut Vec<NodeRef>,
) -> bool {
    let kind = graph.gate(index).kind();
    if !state {
        match kind {
            GateType::Or => {
                to_erase.push(child);
                return false;
            }
            GateType::And | GateType::Null => graph.gate_mut(index).nullify(),
            GateType::Not => graph.gate_mut(index).make_unity(),
            other => unreachable!("constant child under {other:?} gate {index}"),
        }
    } else {
        match kind {
            GateType::Or => graph.gate_mut(index).make_unity(),
            GateType::And | GateType::Null => {
                to_erase.push(child);
                return false;
            }
            GateType::Not => graph.gate_mut(index).nullify(),
            other => unreachable!("constant child under {other:?} gate {index}"),
        }
    }
    true
}

/// Erases marked children; a gate left childless becomes the neutral
/// constant of its type.
fn remove_children(graph: &mut IndexedGraph, index: u32, to_erase: &[NodeRef]) {
    for &c in to_erase {
        graph.gate_mut(index).erase_child(c);
    }
    let gate = graph.gate(index);
    if gate.state() == State::Normal && gate.children().is_empty() {
        match gate.kind() {
            GateType::Or => graph.gate_mut(index).nullify(),
            GateType::And => graph.gate_mut(index).make_unity(),
            // A unary gate emptied out because its sole child was true.
            GateType::Null => graph.gate_mut(index).make_unity(),
            GateType::Not => graph.gate_mut(index).nullify(),
            other => unreachable!("childless {other:?} gate {index}"),
        }
    }
}

/// Folds null/unity child-gate states into their parents. Returns whether
/// anything changed.
pub fn process_const_gates(graph: &mut IndexedGraph, index: u32, processed: &mut HashSet<u32>) -> bool {
    if !processed.insert(index) {
        return false;
    }
    if graph.gate(index).state() != State::Normal {
        return false;
    }
    let mut changed = false;
    let mut to_erase = Vec::new();
    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    for c in children {
        if !graph.is_gate(c.index()) {
            continue;
        }
        debug_assert!(!c.is_negated(), "negative gate reference after normalization");
        let ret = process_const_gates(graph, c.index(), processed);
        changed = changed || ret;
        let state = match graph.gate(c.index()).state() {
            State::Normal => continue,
            State::Null => false,
            State::Unity => true,
        };
        if process_constant_child(graph, index, c, state ^ c.is_negated(), &mut to_erase) {
            return true;
        }
    }
    if !to_erase.is_empty() {
        changed = true;
    }
    remove_children(graph, index, &to_erase);
    changed
}

/// Coalesces same-type parent/child gate pairs and splices out single-child
/// gates. Returns whether anything changed.
pub fn join_gates(graph: &mut IndexedGraph, index: u32, processed: &mut HashSet<u32>) -> bool {
    if !processed.insert(index) {
        return false;
    }
    let parent_kind = graph.gate(index).kind();
    debug_assert!(
        parent_kind == GateType::And || parent_kind == GateType::Or,
        "unnormalized gate {index} in coalescing"
    );
    let mut changed = false;
    'restart: loop {
        let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
        for c in children {
            if !graph.is_gate(c.index()) {
                continue;
            }
            debug_assert!(!c.is_negated(), "negative gate reference after normalization");
            let child_gate = graph.gate(c.index());
            if child_gate.state() != State::Normal {
                continue; // Left for the constant pass.
            }
            let child_kind = child_gate.kind();
            if child_kind == parent_kind {
                changed = true;
                if !graph.merge_gate(index, c) {
                    break 'restart; // The parent constant-folded.
                }
                continue 'restart;
            }
            if child_gate.children().len() == 1 {
                // A reduced gate left over from constant propagation.
                changed = true;
                let sole = *graph.gate(c.index()).children().iter().next().expect("single child");
                if !graph.gate_mut(index).swap_child(c, sole) {
                    break 'restart;
                }
                continue 'restart;
            }
            let ret = join_gates(graph, c.index(), processed);
            changed = changed || ret;
        }
        break;
    }
    changed
}

/// Runs constant-gate cleanup and coalescing to a fixpoint.
///
/// Returns whether the graph changed at all; a second invocation on the
/// result always returns `false`.
pub fn simplify(graph: &mut IndexedGraph) -> bool {
    debug!("simplifying the graph");
    let top = graph.top_index();
    let mut changed = {
        let mut processed = HashSet::new();
        process_const_gates(graph, top, &mut processed)
    };
    loop {
        let mut processed = HashSet::new();
        if !join_gates(graph, top, &mut processed) {
            break;
        }
        changed = true;
        let mut processed = HashSet::new();
        if !process_const_gates(graph, top, &mut processed) {
            break;
        }
    }
    debug!("finished simplifying: {} gates", graph.num_gates());
    changed
}

/// Checks the simplified-form invariant on the reachable graph: every gate
/// is a normal AND/OR, interior gates have at least two children, and no
/// parent/child pair shares a type.
pub fn verify_simplified(graph: &IndexedGraph) -> Result<()> {
    let top = graph.top_index();
    if graph.gate(top).state() != State::Normal {
        return Ok(()); // The whole tree folded to a constant.
    }
    let mut stack = vec![top];
    let mut seen = HashSet::new();
    while let Some(index) = stack.pop() {
        if !seen.insert(index) {
            continue;
        }
        let gate = graph.gate(index);
        if gate.state() != State::Normal {
            return Err(Error::Logic {
                pass: "simplify",
                index,
                msg: "constant gate state survived simplification".to_string(),
            });
        }
        if index != top && gate.children().len() < 2 {
            return Err(Error::Logic {
                pass: "simplify",
                index,
                msg: format!("interior gate with {} children", gate.children().len()),
            });
        }
        for &c in gate.children() {
            if graph.is_gate(c.index()) {
                if graph.gate(c.index()).kind() == gate.kind() {
                    return Err(Error::Logic {
                        pass: "simplify",
                        index,
                        msg: format!("child gate {} shares type {:?}", c.index(), gate.kind()),
                    });
                }
                stack.push(c.index());
            }
        }
    }
    Ok(())
}
