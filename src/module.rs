//! Independent-subtree (module) detection.
//!
//! A module is a gate whose reachable basic-event leaves are reachable from
//! nowhere else in the graph, so it can be analyzed independently and its
//! result substituted as a single pseudo-event.
//!
//! Detection uses a depth-first timestamping scheme: every gate records its
//! entry and exit times, every basic event the minimum and maximum time it
//! is encountered anywhere. A gate whose children's combined interval fits
//! strictly inside its own visit interval shares nothing with the rest of
//! the graph. Non-shared children of a partial module are extracted into a
//! freshly synthesized gate of the same type.
//!
//! Detection is correctness-only here: exploiting modules for divide and
//! conquer is a next-layer optimization over the same marks.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::graph::{IndexedGate, IndexedGraph, State};
use crate::model::GateType;
use crate::reference::NodeRef;

/// Finds and marks all modules of the simplified graph, extracting
/// non-shared child groups into new module gates. Returns the indices of
/// all module gates.
pub fn detect_modules(graph: &mut IndexedGraph) -> BTreeSet<u32> {
    let top = graph.top_index();
    if graph.gate(top).state() != State::Normal || graph.gate(top).children().is_empty() {
        return BTreeSet::new();
    }
    debug!("detecting modules");

    for index in graph.gate_indices() {
        graph.gate_mut(index).clear_visits();
    }

    // First and last visit times of basic events, indexed 1..=B.
    let num_basic = graph.num_basic_events() as usize;
    let mut visit_basics = vec![(0u32, 0u32); num_basic + 1];

    let mut time = 0;
    assign_timing(graph, &mut time, top, &mut visit_basics);

    let mut visited_gates = BTreeMap::new();
    let mut modules = BTreeSet::new();
    find_modules(graph, top, &visit_basics, &mut visited_gates, &mut modules);

    debug_assert!(modules.contains(&graph.top_index()));
    for &index in &modules {
        graph.gate_mut(index).mark_module();
    }
    debug!("detected {} modules", modules.len());
    modules
}

fn assign_timing(graph: &mut IndexedGraph, time: &mut u32, index: u32, visit_basics: &mut [(u32, u32)]) {
    *time += 1;
    if graph.gate_mut(index).visit(*time) {
        return; // Revisited gate.
    }
    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    for c in children {
        let i = c.index();
        if graph.is_basic(i) {
            *time += 1;
            let slot = &mut visit_basics[i as usize];
            if slot.0 == 0 {
                slot.0 = *time;
            }
            slot.1 = *time;
        } else {
            assign_timing(graph, time, i, visit_basics);
        }
    }
    *time += 1;
    let revisited = graph.gate_mut(index).visit(*time);
    debug_assert!(!revisited, "cyclic visit of gate {index}");
}

fn find_modules(
    graph: &mut IndexedGraph,
    index: u32,
    visit_basics: &[(u32, u32)],
    visited_gates: &mut BTreeMap<u32, (u32, u32)>,
    modules: &mut BTreeSet<u32>,
) {
    if visited_gates.contains_key(&index) {
        return;
    }
    let enter_time = graph.gate(index).enter_time();
    let exit_time = graph.gate(index).exit_time();
    let mut min_time = enter_time;
    let mut max_time = exit_time;

    let mut non_shared_children = Vec::new();
    let mut modular_children = Vec::new();
    let mut non_modular_children = Vec::new();

    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    for c in children {
        let i = c.index();
        let (min, max);
        if graph.is_basic(i) {
            let (lo, hi) = visit_basics[i as usize];
            if lo == hi {
                debug_assert!(lo > enter_time && hi < exit_time);
                non_shared_children.push(c);
                continue;
            }
            min = lo;
            max = hi;
        } else {
            debug_assert!(!c.is_negated());
            find_modules(graph, i, visit_basics, visited_gates, modules);
            let &(lo, hi) = visited_gates.get(&i).expect("post-order visit");
            if modules.contains(&i) && !graph.gate(i).revisited() {
                non_shared_children.push(c);
                continue;
            }
            min = lo;
            max = hi;
        }
        debug_assert!(min != 0 && max != 0);
        if min > enter_time && max < exit_time {
            modular_children.push(c);
        } else {
            non_modular_children.push(c);
        }
        min_time = min_time.min(min);
        max_time = max_time.max(max);
    }

    // The gate itself is a module iff nothing it reaches leaks outside its
    // own visit interval.
    if min_time == enter_time && max_time == exit_time {
        debug!("found module: {index}");
        modules.insert(index);
    }
    if non_shared_children.len() > 1 {
        create_module(graph, index, &non_shared_children, modules);
    }
    // Modular candidates may chain through shared events of non-modular
    // siblings; demote any candidate whose interval overlaps one of theirs.
    filter_modular_children(
        graph,
        visit_basics,
        visited_gates,
        &mut modular_children,
        &mut non_modular_children,
    );
    if !modular_children.is_empty() {
        debug_assert!(modular_children.len() != 1, "a single modular child is non-shared");
        if modular_children.len() > 1 {
            create_module(graph, index, &modular_children, modules);
        }
    }

    let max_time = max_time.max(graph.gate(index).last_visit());
    visited_gates.insert(index, (min_time, max_time));
}

/// Pulls a group of children out of the gate into a new same-type gate
/// marked as a module. A group covering all children marks the gate itself.
fn create_module(graph: &mut IndexedGraph, index: u32, children: &[NodeRef], modules: &mut BTreeSet<u32>) {
    debug_assert!(children.len() > 1);
    debug_assert!(children.len() <= graph.gate(index).children().len());
    if children.len() == graph.gate(index).children().len() {
        modules.insert(index);
        return;
    }
    let kind = graph.gate(index).kind();
    debug_assert!(kind == GateType::And || kind == GateType::Or);

    let module_index = graph.new_index();
    let mut module_gate = IndexedGate::new(module_index, kind);
    for &c in children {
        graph.gate_mut(index).erase_child(c);
        module_gate.add_child(c);
    }
    debug_assert!(!graph.gate(index).children().is_empty());
    graph.insert_gate(module_gate);
    modules.insert(module_index);
    graph.gate_mut(index).add_child(NodeRef::positive(module_index));
    debug!("new module {module_index} extracted from gate {index}");
}

fn filter_modular_children(
    graph: &IndexedGraph,
    visit_basics: &[(u32, u32)],
    visited_gates: &BTreeMap<u32, (u32, u32)>,
    modular_children: &mut Vec<NodeRef>,
    non_modular_children: &mut Vec<NodeRef>,
) {
    if modular_children.is_empty() || non_modular_children.is_empty() {
        return;
    }
    let bounds = |c: NodeRef| -> (u32, u32) {
        let i = c.index();
        if graph.is_basic(i) {
            visit_basics[i as usize]
        } else {
            visited_gates[&i]
        }
    };
    let mut still_modular = Vec::new();
    let mut new_non_modular = Vec::new();
    for &c in modular_children.iter() {
        let (min, max) = bounds(c);
        let overlaps = non_modular_children.iter().any(|&n| {
            let (lower, upper) = bounds(n);
            min.max(lower) <= max.min(upper)
        });
        if overlaps {
            new_non_modular.push(c);
        } else {
            still_modular.push(c);
        }
    }
    filter_modular_children(graph, visit_basics, visited_gates, &mut still_modular, &mut new_non_modular);
    *modular_children = still_modular;
    non_modular_children.extend(new_non_modular);
}
