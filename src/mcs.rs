//! Minimal cut set enumeration.
//!
//! Bottom-up product expansion over the simplified AND/OR graph, bounded by
//! an order limit. A cut set is a sorted set of signed basic-event
//! references; a negative literal means the event must *not* fail
//! (non-coherent analysis).
//!
//! - a leaf `±i` yields the family `{{±i}}`;
//! - an AND gate crosses its children's families, discarding products that
//!   exceed the order limit or contain both `+i` and `-i`;
//! - an OR gate unions its children's families and minimizes immediately —
//!   deferring minimization to the top would blow the family up
//!   exponentially.
//!
//! Families are memoized per gate, so shared subtrees expand once. The
//! total family size is guarded by a product cap; exceeding it aborts the
//! analysis without a partial result.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::error::{Error, Result};
use crate::graph::{IndexedGraph, State};
use crate::model::GateType;
use crate::reference::NodeRef;

/// A cut set: signed basic-event references, sorted for determinism.
pub type CutSet = BTreeSet<NodeRef>;

/// Enumerates the minimal cut sets of the simplified graph.
///
/// The result is sorted by (size, lexicographic literal order) so repeated
/// runs produce bitwise-identical output. A top gate that folded to
/// constant false yields the empty family; constant true yields the family
/// of the empty set.
pub fn enumerate(graph: &IndexedGraph, limit_order: usize, cap: usize) -> Result<Vec<CutSet>> {
    debug!("enumerating minimal cut sets with order limit {limit_order}");
    let mut memo = HashMap::new();
    let family = gate_family(graph, graph.top_index(), limit_order, cap, &mut memo)?;
    let mut family = minimize(family);
    sort_family(&mut family);
    debug!("found {} minimal cut sets", family.len());
    Ok(family)
}

fn gate_family(
    graph: &IndexedGraph,
    index: u32,
    limit_order: usize,
    cap: usize,
    memo: &mut HashMap<u32, Vec<CutSet>>,
) -> Result<Vec<CutSet>> {
    if let Some(family) = memo.get(&index) {
        return Ok(family.clone());
    }
    let gate = graph.gate(index);
    let family = match gate.state() {
        State::Null => Vec::new(),
        State::Unity => vec![CutSet::new()],
        State::Normal => match gate.kind() {
            GateType::Or => {
                let mut family = Vec::new();
                for &c in gate.children() {
                    family.extend(child_family(graph, c, limit_order, cap, memo)?);
                }
                let family = minimize(family);
                if family.len() > cap {
                    return Err(Error::LimitExceeded { cap, size: family.len() });
                }
                family
            }
            GateType::And => {
                let mut products = vec![CutSet::new()];
                for &c in gate.children() {
                    let child = child_family(graph, c, limit_order, cap, memo)?;
                    let mut next = Vec::new();
                    for product in &products {
                        for cut_set in &child {
                            if let Some(union) = union_product(product, cut_set, limit_order) {
                                next.push(union);
                            }
                        }
                        if next.len() > cap {
                            return Err(Error::LimitExceeded { cap, size: next.len() });
                        }
                    }
                    next.sort();
                    next.dedup();
                    products = next;
                }
                products
            }
            other => {
                return Err(Error::Logic {
                    pass: "mcs",
                    index,
                    msg: format!("gate type {other:?} reached enumeration"),
                })
            }
        },
    };
    memo.insert(index, family.clone());
    Ok(family)
}

fn child_family(
    graph: &IndexedGraph,
    child: NodeRef,
    limit_order: usize,
    cap: usize,
    memo: &mut HashMap<u32, Vec<CutSet>>,
) -> Result<Vec<CutSet>> {
    if graph.is_gate(child.index()) {
        if child.is_negated() {
            return Err(Error::Logic {
                pass: "mcs",
                index: child.index(),
                msg: "negative gate reference reached enumeration".to_string(),
            });
        }
        gate_family(graph, child.index(), limit_order, cap, memo)
    } else {
        Ok(vec![CutSet::from([child])])
    }
}

/// Unions two cut sets, rejecting contradictions (`+i` with `-i`) and
/// products over the order limit.
fn union_product(a: &CutSet, b: &CutSet, limit_order: usize) -> Option<CutSet> {
    let mut union = a.clone();
    for &literal in b {
        if union.contains(&-literal) {
            return None;
        }
        union.insert(literal);
    }
    if union.len() > limit_order {
        return None;
    }
    Some(union)
}

/// Removes every cut set that is a strict superset of another in the family.
pub fn minimize(mut family: Vec<CutSet>) -> Vec<CutSet> {
    family.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    family.dedup();
    let mut minimal: Vec<CutSet> = Vec::new();
    'next: for cut_set in family {
        for kept in &minimal {
            if kept.is_subset(&cut_set) {
                continue 'next;
            }
        }
        minimal.push(cut_set);
    }
    minimal
}

fn sort_family(family: &mut [CutSet]) {
    family.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::IndexedGraph;
    use crate::model::{Expression, Formula, Model};
    use crate::normalize::{fold_top_sign, normalize, propagate_complements};
    use crate::settings::Settings;
    use crate::simplify::{propagate_constants, simplify};

    use test_log::test;

    fn cut_sets(model: Model, limit_order: usize) -> Vec<CutSet> {
        let model = model.freeze().unwrap();
        let mut graph = IndexedGraph::new(&model, &Settings::new()).unwrap();
        normalize(&mut graph).unwrap();
        propagate_constants(&mut graph);
        fold_top_sign(&mut graph);
        propagate_complements(&mut graph);
        simplify(&mut graph);
        enumerate(&graph, limit_order, 1_000_000).unwrap()
    }

    fn set(literals: &[i32]) -> CutSet {
        literals.iter().map(|&l| NodeRef::new(l)).collect()
    }

    #[test]
    fn test_minimize_removes_supersets() {
        let family = vec![set(&[1, 2]), set(&[1]), set(&[2, 3]), set(&[1, 2, 3])];
        let minimal = minimize(family);
        assert_eq!(minimal, vec![set(&[1]), set(&[2, 3])]);
    }

    #[test]
    fn test_and_of_or_expands() {
        // top = AND(a, OR(b, c)) => {{a, b}, {a, c}}
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
        let mcs = cut_sets(model, 20);
        assert_eq!(mcs, vec![set(&[1, 2]), set(&[1, 3])]);
    }

    #[test]
    fn test_order_limit_drops_large_products() {
        // top = AND(a, b, c) with limit 2 has no admissible product.
        let mut model = Model::new("top");
        for id in ["a", "b", "c"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate("top", Formula::new(GateType::And).event("a").event("b").event("c"))
            .unwrap();
        let mcs = cut_sets(model, 2);
        assert!(mcs.is_empty());
    }

    #[test]
    fn test_contradictory_products_dropped() {
        // top = AND(a, XOR(a, b)) => only {a, ~b} survives; {a, ~a, b} is
        // contradictory.
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.5)).unwrap();
        model.add_basic_event("b", Expression::Constant(0.5)).unwrap();
        model
            .add_gate(
                "top",
                Formula::new(GateType::And)
                    .event("a")
                    .formula(Formula::new(GateType::Xor).event("a").event("b")),
            )
            .unwrap();
        let mcs = cut_sets(model, 20);
        assert_eq!(mcs, vec![set(&[1, -2])]);
    }

    #[test]
    fn test_shared_subtree_memoized_consistently() {
        // Both branches reference the same OR gate.
        let mut model = Model::new("top");
        for id in ["a", "b", "c", "d"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model.add_gate("shared", Formula::new(GateType::Or).event("a").event("b")).unwrap();
        model
            .add_gate("left", Formula::new(GateType::And).event("c").event("shared"))
            .unwrap();
        model
            .add_gate("right", Formula::new(GateType::And).event("d").event("shared"))
            .unwrap();
        model
            .add_gate("top", Formula::new(GateType::Or).event("left").event("right"))
            .unwrap();
        let mcs = cut_sets(model, 20);
        assert_eq!(mcs, vec![set(&[1, 3]), set(&[1, 4]), set(&[2, 3]), set(&[2, 4])]);
    }

    #[test]
    fn test_cap_aborts() {
        let mut model = Model::new("top");
        for id in ["a", "b", "c", "d"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::new(GateType::And)
                    .formula(Formula::new(GateType::Or).event("a").event("b"))
                    .formula(Formula::new(GateType::Or).event("c").event("d")),
            )
            .unwrap();
        let model = model.freeze().unwrap();
        let mut graph = IndexedGraph::new(&model, &Settings::new()).unwrap();
        normalize(&mut graph).unwrap();
        propagate_complements(&mut graph);
        simplify(&mut graph);
        let err = enumerate(&graph, 20, 2).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { cap: 2, .. }));
    }
}
