//! Rewriting to canonical positive form.
//!
//! [`normalize`] rewrites the indexed graph until only AND and OR gate
//! types remain: the top event folds its own polarity into the graph's top
//! sign, NOR/NAND gates push their negation into their parents' child
//! references, and XOR/ATLEAST gates expand structurally. Residual negative
//! gate references are then eliminated by [`propagate_complements`], which
//! materializes De Morgan duals through a complement cache so each original
//! gate is duplicated at most once.
//!
//! After both passes every non-leaf reference is positive and complements
//! survive only on basic-event literals.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::error::{Error, Result};
use crate::graph::{IndexedGate, IndexedGraph, State};
use crate::model::GateType;
use crate::reference::NodeRef;

/// Rewrites all gates to AND/OR form. Reaches for the top event first, then
/// absorbs negative gate types into parent references, then expands XOR and
/// ATLEAST.
pub fn normalize(graph: &mut IndexedGraph) -> Result<()> {
    debug!("normalizing gates");
    normalize_top(graph);
    gather_parents(graph);
    absorb_negative_gates(graph);
    for index in graph.gate_indices() {
        normalize_gate(graph, index);
    }
    debug!("finished normalizing gates");
    Ok(())
}

/// Folds the top gate's own polarity into the graph's top sign.
///
/// NOT-of-NOT chains collapse through recursion. A NOT/NULL top whose only
/// child is a leaf cannot be redirected; it becomes a one-literal OR with
/// the negation carried by the top sign.
fn normalize_top(graph: &mut IndexedGraph) {
    let top = graph.top_index();
    let kind = graph.gate(top).kind();
    match kind {
        GateType::Or | GateType::Nor => {
            if kind == GateType::Nor {
                graph.negate_top_sign();
            }
            graph.gate_mut(top).set_kind(GateType::Or);
        }
        GateType::And | GateType::Nand => {
            if kind == GateType::Nand {
                graph.negate_top_sign();
            }
            graph.gate_mut(top).set_kind(GateType::And);
        }
        GateType::Not | GateType::Null => {
            let child = *graph.gate(top).children().iter().next().expect("unary gate");
            if kind == GateType::Not {
                graph.negate_top_sign();
            }
            if child.is_negated() {
                graph.negate_top_sign();
            }
            if graph.is_gate(child.index()) {
                graph.remove_gate(top);
                graph.set_top_index(child.index());
                normalize_top(graph);
            } else {
                let gate = graph.gate_mut(top);
                gate.set_kind(GateType::Or);
                gate.erase_all_children();
                gate.add_child(NodeRef::positive(child.index()));
            }
        }
        GateType::Xor | GateType::AtLeast => {} // Positive; the structural rewrite handles them.
    }
}

/// Populates every reachable gate's parent set with a single traversal.
fn gather_parents(graph: &mut IndexedGraph) {
    for index in graph.gate_indices() {
        graph.gate_mut(index).clear_parents();
    }
    let mut processed = HashSet::new();
    gather(graph, graph.top_index(), &mut processed);
}

fn gather(graph: &mut IndexedGraph, index: u32, processed: &mut HashSet<u32>) {
    if !processed.insert(index) {
        return;
    }
    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    for c in children {
        if graph.is_gate(c.index()) {
            graph.gate_mut(c.index()).add_parent(index);
            gather(graph, c.index(), processed);
        }
    }
}

/// Rewrites every non-top NOR/NAND reference: the negation moves one level
/// up by flipping the sign of the child reference in each parent.
fn absorb_negative_gates(graph: &mut IndexedGraph) {
    for index in graph.gate_indices() {
        if index == graph.top_index() {
            continue;
        }
        let kind = graph.gate(index).kind();
        if kind != GateType::Nor && kind != GateType::Nand {
            continue;
        }
        let parents: Vec<u32> = graph.gate(index).parents().iter().copied().collect();
        for parent in parents {
            let swapped = graph
                .gate_mut(parent)
                .swap_child(NodeRef::positive(index), NodeRef::negative(index));
            debug_assert!(swapped, "negative-gate absorption collapsed gate {parent}");
        }
    }
}

fn normalize_gate(graph: &mut IndexedGraph, index: u32) {
    let kind = graph.gate(index).kind();
    match kind {
        GateType::Or | GateType::Nor => graph.gate_mut(index).set_kind(GateType::Or),
        GateType::And | GateType::Nand => graph.gate_mut(index).set_kind(GateType::And),
        GateType::Xor => normalize_xor(graph, index),
        GateType::AtLeast => normalize_atleast(graph, index),
        // Left for top-event handling and complement propagation.
        GateType::Not | GateType::Null => {}
    }
}

/// XOR(a, b) becomes OR(AND(a, ~b), AND(~a, b)).
fn normalize_xor(graph: &mut IndexedGraph, index: u32) {
    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    debug_assert_eq!(children.len(), 2, "XOR gate {index} is not binary");
    let (a, b) = (children[0], children[1]);

    let one_index = graph.new_index();
    let mut gate_one = IndexedGate::new(one_index, GateType::And);
    gate_one.add_child(a);
    gate_one.add_child(-b);

    let two_index = graph.new_index();
    let mut gate_two = IndexedGate::new(two_index, GateType::And);
    gate_two.add_child(-a);
    gate_two.add_child(b);

    graph.insert_gate(gate_one);
    graph.insert_gate(gate_two);

    let gate = graph.gate_mut(index);
    gate.set_kind(GateType::Or);
    gate.erase_all_children();
    gate.add_child(NodeRef::positive(one_index));
    gate.add_child(NodeRef::positive(two_index));
}

/// ATLEAST(k; c1..cn) becomes an OR over AND gates of all k-subsets.
///
/// k = 1 collapses to OR and k = n to AND before any subset enumeration.
/// Subsets are enumerated in lexicographic order over the sorted children.
fn normalize_atleast(graph: &mut IndexedGraph, index: u32) {
    let k = graph.gate(index).vote_number().expect("validated at freeze");
    let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
    let n = children.len();
    debug_assert!(k >= 1 && k <= n, "vote number out of range: {k} of {n}");

    if k == 1 {
        graph.gate_mut(index).set_kind(GateType::Or);
        return;
    }
    if k >= n {
        graph.gate_mut(index).set_kind(GateType::And);
        return;
    }

    let mut subset_gates = Vec::new();
    for subset in combinations(&children, k) {
        let and_index = graph.new_index();
        let mut and_gate = IndexedGate::new(and_index, GateType::And);
        for c in subset {
            and_gate.add_child(c);
        }
        graph.insert_gate(and_gate);
        subset_gates.push(and_index);
    }

    let gate = graph.gate_mut(index);
    gate.set_kind(GateType::Or);
    gate.erase_all_children();
    for and_index in subset_gates {
        gate.add_child(NodeRef::positive(and_index));
    }
}

/// All k-subsets of `items` in lexicographic order.
fn combinations(items: &[NodeRef], k: usize) -> Vec<Vec<NodeRef>> {
    fn recurse(items: &[NodeRef], k: usize, start: usize, current: &mut Vec<NodeRef>, out: &mut Vec<Vec<NodeRef>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        let needed = k - current.len();
        for i in start..=items.len() - needed {
            current.push(items[i]);
            recurse(items, k, i + 1, current, out);
            current.pop();
        }
    }
    let mut out = Vec::new();
    recurse(items, k, 0, &mut Vec::with_capacity(k), &mut out);
    out
}

/// Folds a negative top sign into the (already normalized) top gate.
pub fn fold_top_sign(graph: &mut IndexedGraph) {
    if graph.top_sign() >= 0 {
        return;
    }
    let top = graph.top_index();
    match graph.gate(top).state() {
        State::Null => {
            graph.gate_mut(top).make_unity();
            graph.set_top_sign(1);
            return;
        }
        State::Unity => {
            graph.gate_mut(top).nullify();
            graph.set_top_sign(1);
            return;
        }
        State::Normal => {}
    }
    let kind = graph.gate(top).kind();
    debug_assert!(
        kind == GateType::And || kind == GateType::Or,
        "top gate {top} is not normalized"
    );
    let gate = graph.gate_mut(top);
    gate.set_kind(if kind == GateType::Or { GateType::And } else { GateType::Or });
    gate.invert_children();
    graph.set_top_sign(1);
    debug!("folded negative top sign into gate {top}");
}

/// Pushes residual negative gate references down to basic-event leaves.
///
/// NOT/NULL child gates are spliced out with their sign folded into the
/// reference. A negative reference to an AND/OR gate is replaced by a
/// positive reference to its De Morgan dual, built once per original gate
/// through the complement cache.
pub fn propagate_complements(graph: &mut IndexedGraph) {
    debug!("propagating complements");
    let mut complements = HashMap::new();
    let mut processed = HashSet::new();
    propagate(graph, graph.top_index(), &mut complements, &mut processed);
}

fn propagate(
    graph: &mut IndexedGraph,
    index: u32,
    complements: &mut HashMap<u32, u32>,
    processed: &mut HashSet<u32>,
) {
    'restart: loop {
        let children: Vec<NodeRef> = graph.gate(index).children().iter().copied().collect();
        for c in children {
            if !graph.is_gate(c.index()) {
                continue;
            }
            let child_kind = graph.gate(c.index()).kind();
            if child_kind == GateType::Not || child_kind == GateType::Null {
                let sole = *graph.gate(c.index()).children().iter().next().expect("unary gate");
                let mut replacement = sole;
                if child_kind == GateType::Not {
                    replacement = -replacement;
                }
                if c.is_negated() {
                    replacement = -replacement;
                }
                if !graph.gate_mut(index).swap_child(c, replacement) {
                    return; // The gate constant-folded.
                }
                continue 'restart;
            }
            if c.is_negated() {
                let comp = match complements.get(&c.index()) {
                    Some(&existing) => existing,
                    None => {
                        let dual = match child_kind {
                            GateType::And => GateType::Or,
                            GateType::Or => GateType::And,
                            other => unreachable!("negative reference to {other:?} gate {}", c.index()),
                        };
                        let comp_index = graph.new_index();
                        let grand: Vec<NodeRef> =
                            graph.gate(c.index()).children().iter().copied().collect();
                        let mut comp_gate = IndexedGate::new(comp_index, dual);
                        for gc in grand {
                            comp_gate.add_child(-gc);
                        }
                        graph.insert_gate(comp_gate);
                        complements.insert(c.index(), comp_index);
                        processed.insert(comp_index);
                        propagate(graph, comp_index, complements, processed);
                        comp_index
                    }
                };
                if !graph.gate_mut(index).swap_child(c, NodeRef::positive(comp)) {
                    return;
                }
                continue 'restart;
            }
            if processed.insert(c.index()) {
                propagate(graph, c.index(), complements, processed);
            }
        }
        break;
    }
}

/// Checks the normalized-form invariant on the reachable graph: every gate
/// is AND/OR and every gate reference is positive.
pub fn verify_normalized(graph: &IndexedGraph) -> Result<()> {
    let mut stack = vec![graph.top_index()];
    let mut seen = HashSet::new();
    while let Some(index) = stack.pop() {
        if !seen.insert(index) {
            continue;
        }
        let gate = graph.gate(index);
        if gate.kind() != GateType::And && gate.kind() != GateType::Or {
            return Err(Error::Logic {
                pass: "normalize",
                index,
                msg: format!("gate type {:?} survived normalization", gate.kind()),
            });
        }
        for &c in gate.children() {
            if graph.is_gate(c.index()) {
                if c.is_negated() {
                    return Err(Error::Logic {
                        pass: "normalize",
                        index,
                        msg: format!("negative gate reference {c}"),
                    });
                }
                stack.push(c.index());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expression, Formula, Model};
    use crate::settings::Settings;

    use test_log::test;

    fn indexed(model: Model) -> IndexedGraph {
        let model = model.freeze().unwrap();
        IndexedGraph::new(&model, &Settings::new()).unwrap()
    }

    #[test]
    fn test_combinations_lexicographic() {
        let items = [NodeRef::positive(1), NodeRef::positive(2), NodeRef::positive(3)];
        let subsets = combinations(&items, 2);
        assert_eq!(
            subsets,
            vec![
                vec![NodeRef::positive(1), NodeRef::positive(2)],
                vec![NodeRef::positive(1), NodeRef::positive(3)],
                vec![NodeRef::positive(2), NodeRef::positive(3)],
            ]
        );
    }

    #[test]
    fn test_nor_top_folds_sign() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        model.add_basic_event("b", Expression::Constant(0.1)).unwrap();
        model
            .add_gate("top", Formula::new(crate::model::GateType::Nor).event("a").event("b"))
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();
        assert_eq!(graph.gate(graph.top_index()).kind(), GateType::Or);
        assert_eq!(graph.top_sign(), -1);
    }

    #[test]
    fn test_not_of_not_collapses() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        model.add_basic_event("b", Expression::Constant(0.1)).unwrap();
        model
            .add_gate("top", Formula::new(GateType::Not).event("inner"))
            .unwrap();
        model
            .add_gate("inner", Formula::new(GateType::Not).event("base"))
            .unwrap();
        model
            .add_gate("base", Formula::new(GateType::And).event("a").event("b"))
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();
        // Both NOTs fold; the sign cancels.
        assert_eq!(graph.top_sign(), 1);
        assert_eq!(graph.gate(graph.top_index()).kind(), GateType::And);
    }

    #[test]
    fn test_xor_expansion() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        model.add_basic_event("b", Expression::Constant(0.1)).unwrap();
        model
            .add_gate("top", Formula::new(GateType::Xor).event("a").event("b"))
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();

        let top = graph.gate(graph.top_index());
        assert_eq!(top.kind(), GateType::Or);
        assert_eq!(top.children().len(), 2);
        for &c in top.children() {
            let and = graph.gate(c.index());
            assert_eq!(and.kind(), GateType::And);
            assert_eq!(and.children().len(), 2);
            // One literal positive, one negative.
            assert_eq!(and.children().iter().filter(|r| r.is_negated()).count(), 1);
        }
    }

    #[test]
    fn test_atleast_expansion() {
        let mut model = Model::new("top");
        for id in ["a", "b", "c"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::new(GateType::AtLeast).vote(2).event("a").event("b").event("c"),
            )
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();

        let top = graph.gate(graph.top_index());
        assert_eq!(top.kind(), GateType::Or);
        assert_eq!(top.children().len(), 3); // C(3, 2) subsets
        for &c in top.children() {
            assert_eq!(graph.gate(c.index()).kind(), GateType::And);
            assert_eq!(graph.gate(c.index()).children().len(), 2);
        }
    }

    #[test]
    fn test_atleast_collapses_at_bounds() {
        let mut model = Model::new("top");
        for id in ["a", "b"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::new(GateType::AtLeast).vote(2).event("a").event("b"),
            )
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();
        assert_eq!(graph.gate(graph.top_index()).kind(), GateType::And);
    }

    #[test]
    fn test_complement_propagation_reaches_leaves() {
        // top = AND(a, NOT(OR(b, c))) -- the NOT splices onto the OR, whose
        // complement becomes AND(~b, ~c).
        let mut model = Model::new("top");
        for id in ["a", "b", "c"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::new(GateType::And)
                    .event("a")
                    .formula(Formula::new(GateType::Not).formula(Formula::new(GateType::Or).event("b").event("c"))),
            )
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();
        propagate_complements(&mut graph);
        verify_normalized(&graph).unwrap();

        let top = graph.gate(graph.top_index());
        let gate_child = top
            .children()
            .iter()
            .find(|c| graph.is_gate(c.index()))
            .copied()
            .unwrap();
        assert!(!gate_child.is_negated());
        let dual = graph.gate(gate_child.index());
        assert_eq!(dual.kind(), GateType::And);
        assert!(dual.children().iter().all(|c| c.is_negated()));
    }

    #[test]
    fn test_normalize_is_noop_on_positive_and_or() {
        let mut model = Model::new("top");
        for id in ["a", "b", "c"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::new(GateType::And)
                    .event("a")
                    .formula(Formula::new(GateType::Or).event("b").event("c")),
            )
            .unwrap();
        let mut graph = indexed(model);
        normalize(&mut graph).unwrap();
        let kinds_before: Vec<_> = graph.gate_indices().iter().map(|&i| graph.gate(i).kind()).collect();
        let count_before = graph.num_gates();
        normalize(&mut graph).unwrap();
        propagate_complements(&mut graph);
        let kinds_after: Vec<_> = graph.gate_indices().iter().map(|&i| graph.gate(i).kind()).collect();
        assert_eq!(kinds_before, kinds_after);
        assert_eq!(count_before, graph.num_gates());
    }
}
