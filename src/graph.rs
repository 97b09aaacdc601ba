//! The indexed fault-tree graph.
//!
//! This is the only structure the rewriting passes mutate: a compact
//! integer-indexed mirror of the frozen [`Model`]. Node identity is a
//! positive index and polarity is the sign of a [`NodeRef`], so the DAG is
//! an arena of gates cross-referenced by index — no pointer cycles are
//! possible by construction.
//!
//! # Index space
//!
//! - `1..=B` — basic events (model insertion order)
//! - `B+1..=B+H` — house events (pruned structurally before any pass that
//!   distinguishes leaves)
//! - `B+H+1..=B+H+G` — model gates
//! - `> B+H+G` — synthetic gates allocated by the passes via [`IndexedGraph::new_index`]
//!
//! # Invariants
//!
//! - A gate's child set never holds both `+i` and `-i`: the mutators
//!   constant-fold the gate instead (`AND` becomes null, `OR` becomes unity).
//! - The graph is acyclic at all times; the passes may only splice and merge
//!   downward references.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{Error, Result};
use crate::model::{Formula, GateType, Model};
use crate::reference::NodeRef;
use crate::settings::Settings;

/// Constant state a gate can collapse into during rewriting.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    Normal,
    /// The gate is constant false.
    Null,
    /// The gate is constant true.
    Unity,
}

/// A gate of the indexed graph.
///
/// Children are kept in a sorted set of signed references, which makes
/// iteration deterministic and set semantics (no duplicate references)
/// automatic.
#[derive(Debug, Clone)]
pub struct IndexedGate {
    index: u32,
    kind: GateType,
    vote_number: Option<usize>,
    children: BTreeSet<NodeRef>,
    state: State,
    parents: BTreeSet<u32>,
    visits: [u32; 3],
    module: bool,
}

impl IndexedGate {
    pub fn new(index: u32, kind: GateType) -> Self {
        Self {
            index,
            kind,
            vote_number: None,
            children: BTreeSet::new(),
            state: State::Normal,
            parents: BTreeSet::new(),
            visits: [0; 3],
            module: false,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
    pub fn kind(&self) -> GateType {
        self.kind
    }
    pub fn set_kind(&mut self, kind: GateType) {
        self.kind = kind;
    }
    pub fn vote_number(&self) -> Option<usize> {
        self.vote_number
    }
    pub fn set_vote_number(&mut self, k: usize) {
        self.vote_number = Some(k);
    }
    pub fn children(&self) -> &BTreeSet<NodeRef> {
        &self.children
    }
    pub fn state(&self) -> State {
        self.state
    }
    pub fn is_module(&self) -> bool {
        self.module
    }
    pub fn mark_module(&mut self) {
        self.module = true;
    }

    /// Adds a signed child reference.
    ///
    /// Returns `false` if the complement of the reference is already a child:
    /// the gate then constant-folds (`AND` to null, `OR` to unity) and the
    /// caller must stop treating it as a normal gate.
    pub fn add_child(&mut self, child: NodeRef) -> bool {
        if self.children.contains(&-child) {
            if self.kind == GateType::And {
                self.nullify();
            } else {
                self.make_unity();
            }
            return false;
        }
        self.children.insert(child);
        true
    }

    pub fn erase_child(&mut self, child: NodeRef) {
        self.children.remove(&child);
    }

    pub fn erase_all_children(&mut self) {
        self.children.clear();
    }

    /// Replaces `old` with `new`, preserving set semantics.
    ///
    /// A swap onto an already-present reference merges silently; a swap onto
    /// the complement of a present reference constant-folds the gate and
    /// returns `false`.
    pub fn swap_child(&mut self, old: NodeRef, new: NodeRef) -> bool {
        debug_assert!(self.children.contains(&old), "swap of absent child {old}");
        self.children.remove(&old);
        self.add_child(new)
    }

    /// Flips the sign of every child reference.
    pub fn invert_children(&mut self) {
        self.children = self.children.iter().map(|&c| -c).collect();
    }

    pub fn nullify(&mut self) {
        self.state = State::Null;
        self.children.clear();
    }

    pub fn make_unity(&mut self) {
        self.state = State::Unity;
        self.children.clear();
    }

    pub fn parents(&self) -> &BTreeSet<u32> {
        &self.parents
    }
    pub fn add_parent(&mut self, parent: u32) {
        self.parents.insert(parent);
    }
    pub fn clear_parents(&mut self) {
        self.parents.clear();
    }

    /// Records a visit timestamp for module detection.
    ///
    /// The first call records the entry time, the second the exit time.
    /// Further calls record the last revisit and return `true`.
    pub fn visit(&mut self, time: u32) -> bool {
        if self.visits[0] == 0 {
            self.visits[0] = time;
            false
        } else if self.visits[1] == 0 {
            self.visits[1] = time;
            false
        } else {
            self.visits[2] = time;
            true
        }
    }

    pub fn enter_time(&self) -> u32 {
        self.visits[0]
    }
    pub fn exit_time(&self) -> u32 {
        self.visits[1]
    }
    /// The latest timestamp this gate was seen at.
    pub fn last_visit(&self) -> u32 {
        if self.visits[2] != 0 {
            self.visits[2]
        } else {
            self.visits[1]
        }
    }
    pub fn revisited(&self) -> bool {
        self.visits[2] != 0
    }
    pub fn clear_visits(&mut self) {
        self.visits = [0; 3];
    }
}

/// The indexed graph: an arena of [`IndexedGate`]s plus the house-event
/// constant sets and the distinguished top event.
pub struct IndexedGraph {
    gates: BTreeMap<u32, IndexedGate>,
    num_basic: u32,
    first_gate_index: u32,
    next_index: u32,
    top_index: u32,
    top_sign: i8,
    true_house: BTreeSet<u32>,
    false_house: BTreeSet<u32>,
}

impl IndexedGraph {
    /// Builds the indexed mirror of a frozen model.
    ///
    /// Nested sub-formulas become synthetic gates. When CCF analysis is
    /// requested, basic events with a registered substitution resolve to
    /// their expansion gates instead.
    pub fn new(model: &Model, settings: &Settings) -> Result<Self> {
        if !model.is_frozen() {
            return Err(Error::Model("analysis requires a frozen model".to_string()));
        }
        let num_basic = model.num_basic_events();
        let first_gate_index = model.first_gate_index();
        let top_index = model.index_of(model.top_event()).expect("validated at freeze");

        let mut graph = Self {
            gates: BTreeMap::new(),
            num_basic,
            first_gate_index,
            next_index: first_gate_index + model.gates().len() as u32 - 1,
            top_index,
            top_sign: 1,
            true_house: BTreeSet::new(),
            false_house: BTreeSet::new(),
        };

        for (i, house) in model.house_events().iter().enumerate() {
            let index = num_basic + 1 + i as u32;
            if house.state() {
                graph.true_house.insert(index);
            } else {
                graph.false_house.insert(index);
            }
        }

        let apply_ccf = settings.ccf_analysis();
        for (i, gate) in model.gates().iter().enumerate() {
            let index = first_gate_index + i as u32;
            graph.process_formula(index, gate.formula(), model, apply_ccf);
        }
        debug!(
            "indexed graph: {} basic events, {} gates, top {}",
            num_basic,
            graph.gates.len(),
            top_index
        );
        Ok(graph)
    }

    fn process_formula(&mut self, index: u32, formula: &Formula, model: &Model, apply_ccf: bool) {
        let mut gate = IndexedGate::new(index, formula.gate_type());
        if let Some(k) = formula.vote_number() {
            gate.set_vote_number(k);
        }
        for id in formula.event_args() {
            let resolved = if apply_ccf {
                model.ccf_substitution(id).unwrap_or(id)
            } else {
                id
            };
            let child = model.index_of(resolved).expect("validated at freeze");
            let added = gate.add_child(NodeRef::positive(child));
            debug_assert!(added);
        }
        for sub in formula.formula_args() {
            let child_index = self.new_index();
            self.process_formula(child_index, sub, model, apply_ccf);
            let added = gate.add_child(NodeRef::positive(child_index));
            debug_assert!(added);
        }
        self.gates.insert(index, gate);
    }

    /// Reserves the next synthetic gate index.
    pub fn new_index(&mut self) -> u32 {
        self.next_index += 1;
        self.next_index
    }

    pub fn num_basic_events(&self) -> u32 {
        self.num_basic
    }

    pub fn is_basic(&self, index: u32) -> bool {
        (1..=self.num_basic).contains(&index)
    }
    pub fn is_house(&self, index: u32) -> bool {
        index > self.num_basic && index < self.first_gate_index
    }
    pub fn is_gate(&self, index: u32) -> bool {
        index >= self.first_gate_index
    }

    pub fn gate(&self, index: u32) -> &IndexedGate {
        self.gates
            .get(&index)
            .unwrap_or_else(|| panic!("no gate at index {index}"))
    }

    pub fn gate_mut(&mut self, index: u32) -> &mut IndexedGate {
        self.gates
            .get_mut(&index)
            .unwrap_or_else(|| panic!("no gate at index {index}"))
    }

    pub fn insert_gate(&mut self, gate: IndexedGate) {
        let index = gate.index();
        debug_assert!(self.is_gate(index));
        self.gates.insert(index, gate);
    }

    pub fn remove_gate(&mut self, index: u32) {
        self.gates.remove(&index);
    }

    /// Gate indices in ascending order, snapshotted for mutation loops.
    pub fn gate_indices(&self) -> Vec<u32> {
        self.gates.keys().copied().collect()
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    pub fn top_index(&self) -> u32 {
        self.top_index
    }
    pub fn set_top_index(&mut self, index: u32) {
        debug_assert!(self.is_gate(index));
        self.top_index = index;
    }
    pub fn top_sign(&self) -> i8 {
        self.top_sign
    }
    pub fn set_top_sign(&mut self, sign: i8) {
        debug_assert!(sign == 1 || sign == -1);
        self.top_sign = sign;
    }
    pub fn negate_top_sign(&mut self) {
        self.top_sign = -self.top_sign;
    }

    pub fn true_house(&self) -> &BTreeSet<u32> {
        &self.true_house
    }
    pub fn false_house(&self) -> &BTreeSet<u32> {
        &self.false_house
    }

    /// Inlines a child gate's children directly into the parent.
    ///
    /// Returns `false` if an inlined reference annihilated with an existing
    /// one and the parent constant-folded.
    pub fn merge_gate(&mut self, parent: u32, child_ref: NodeRef) -> bool {
        debug_assert!(!child_ref.is_negated(), "merge of a negative gate reference");
        let grand: Vec<NodeRef> = self.gate(child_ref.index()).children().iter().copied().collect();
        let parent_gate = self.gate_mut(parent);
        parent_gate.erase_child(child_ref);
        for c in grand {
            if !parent_gate.add_child(c) {
                return false;
            }
        }
        true
    }
}
