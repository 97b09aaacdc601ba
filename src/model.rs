//! The input fault-tree model.
//!
//! A [`Model`] is the frozen product of an external parser: basic events
//! with probability expressions, house events with constant states, and
//! gates whose formulas connect them under a distinguished top event.
//!
//! The model is built once with the `add_*` methods and then sealed with
//! [`Model::freeze`], which validates the structure (defined references,
//! acyclicity, vote-number ranges, probability ranges) and assigns the
//! contiguous index space used by the analysis passes: basic events take
//! `1..=B`, house events `B+1..=B+H`, and gates `B+H+1..=B+H+G`, all in
//! insertion order. Analyses refuse unfrozen models.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

/// Logical connective of a gate formula.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GateType {
    And,
    Or,
    /// Identity of a single argument.
    Null,
    Not,
    Xor,
    Nand,
    Nor,
    /// True iff at least `k` of the arguments are true.
    AtLeast,
}

/// A failure-probability expression, evaluated once at analysis start.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Expression {
    /// A fixed probability in [0, 1].
    Constant(f64),
    /// `1 - exp(-lambda * mission_time)` for a constant failure rate.
    Exponential { lambda: f64 },
}

impl Expression {
    /// Evaluates the expression at the given mission time.
    pub fn value(&self, mission_time: f64) -> f64 {
        match *self {
            Expression::Constant(p) => p,
            Expression::Exponential { lambda } => 1.0 - (-lambda * mission_time).exp(),
        }
    }

    fn validate(&self, id: &str) -> Result<()> {
        match *self {
            Expression::Constant(p) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(Error::Model(format!(
                        "probability of basic event '{id}' is outside [0, 1]: {p}"
                    )));
                }
            }
            Expression::Exponential { lambda } => {
                if !(lambda >= 0.0) || !lambda.is_finite() {
                    return Err(Error::Model(format!(
                        "failure rate of basic event '{id}' must be non-negative: {lambda}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An atomic failure with a probability expression.
#[derive(Debug, Clone)]
pub struct BasicEvent {
    id: String,
    expression: Expression,
}

impl BasicEvent {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Failure probability at the given mission time.
    pub fn p(&self, mission_time: f64) -> f64 {
        self.expression.value(mission_time)
    }
}

/// A boolean constant used for structural configuration.
#[derive(Debug, Clone)]
pub struct HouseEvent {
    id: String,
    state: bool,
}

impl HouseEvent {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn state(&self) -> bool {
        self.state
    }
}

/// A boolean formula over named events and nested sub-formulas.
///
/// Nested formulas become synthetic gates when the model is indexed.
#[derive(Debug, Clone)]
pub struct Formula {
    gate_type: GateType,
    vote_number: Option<usize>,
    event_args: Vec<String>,
    formula_args: Vec<Formula>,
}

impl Formula {
    pub fn new(gate_type: GateType) -> Self {
        Self {
            gate_type,
            vote_number: None,
            event_args: Vec::new(),
            formula_args: Vec::new(),
        }
    }

    /// Sets the vote number `k` for an ATLEAST formula.
    pub fn vote(mut self, k: usize) -> Self {
        self.vote_number = Some(k);
        self
    }

    /// Appends a named event argument (basic event, house event, or gate).
    pub fn event(mut self, id: impl Into<String>) -> Self {
        self.event_args.push(id.into());
        self
    }

    /// Appends a nested sub-formula argument.
    pub fn formula(mut self, formula: Formula) -> Self {
        self.formula_args.push(formula);
        self
    }

    pub fn gate_type(&self) -> GateType {
        self.gate_type
    }
    pub fn vote_number(&self) -> Option<usize> {
        self.vote_number
    }
    pub fn event_args(&self) -> &[String] {
        &self.event_args
    }
    pub fn formula_args(&self) -> &[Formula] {
        &self.formula_args
    }

    fn num_args(&self) -> usize {
        self.event_args.len() + self.formula_args.len()
    }

    /// All gate ids referenced anywhere in this formula tree.
    fn gate_refs<'a>(&'a self, gates: &HashSet<&str>, out: &mut Vec<&'a str>) {
        for id in &self.event_args {
            if gates.contains(id.as_str()) {
                out.push(id);
            }
        }
        for sub in &self.formula_args {
            sub.gate_refs(gates, out);
        }
    }

    fn validate(&self, id: &str) -> Result<()> {
        let n = self.num_args();
        match self.gate_type {
            GateType::Not | GateType::Null => {
                if n != 1 {
                    return Err(Error::Model(format!(
                        "{:?} formula of gate '{id}' must have exactly one argument, got {n}",
                        self.gate_type
                    )));
                }
            }
            GateType::Xor => {
                if n != 2 {
                    return Err(Error::Model(format!(
                        "XOR formula of gate '{id}' must have exactly two arguments, got {n}"
                    )));
                }
            }
            GateType::AtLeast => {
                let k = self.vote_number.ok_or_else(|| {
                    Error::Model(format!("ATLEAST formula of gate '{id}' has no vote number"))
                })?;
                if n < 2 {
                    return Err(Error::Model(format!(
                        "ATLEAST formula of gate '{id}' must have at least two arguments, got {n}"
                    )));
                }
                if k == 0 || k > n {
                    return Err(Error::Model(format!(
                        "vote number of gate '{id}' is out of range: {k} of {n}"
                    )));
                }
            }
            GateType::And | GateType::Or | GateType::Nand | GateType::Nor => {
                if n == 0 {
                    return Err(Error::Model(format!(
                        "{:?} formula of gate '{id}' has no arguments",
                        self.gate_type
                    )));
                }
            }
        }
        let mut seen = HashSet::new();
        for arg in &self.event_args {
            if !seen.insert(arg.as_str()) {
                return Err(Error::Model(format!(
                    "repeated argument '{arg}' in formula of gate '{id}'"
                )));
            }
        }
        for sub in &self.formula_args {
            sub.validate(id)?;
        }
        Ok(())
    }
}

/// An interior logical connective of the fault tree.
#[derive(Debug, Clone)]
pub struct Gate {
    id: String,
    formula: Formula,
}

impl Gate {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

/// The in-memory fault-tree model.
pub struct Model {
    basic_events: Vec<BasicEvent>,
    house_events: Vec<HouseEvent>,
    gates: Vec<Gate>,
    top_event: String,
    ccf_substitutions: HashMap<String, String>,
    ids: HashSet<String>,
    index_of: HashMap<String, u32>,
    frozen: bool,
}

impl Model {
    /// Creates an empty model rooted at the named top-event gate.
    pub fn new(top_event: impl Into<String>) -> Self {
        Self {
            basic_events: Vec::new(),
            house_events: Vec::new(),
            gates: Vec::new(),
            top_event: top_event.into(),
            ccf_substitutions: HashMap::new(),
            ids: HashSet::new(),
            index_of: HashMap::new(),
            frozen: false,
        }
    }

    fn check_duplicate(&self, id: &str) -> Result<()> {
        if self.frozen {
            return Err(Error::Model("model is frozen".to_string()));
        }
        if self.ids.contains(id) {
            return Err(Error::Model(format!("duplicate event id '{id}'")));
        }
        Ok(())
    }

    pub fn add_basic_event(&mut self, id: impl Into<String>, expression: Expression) -> Result<()> {
        let id = id.into();
        self.check_duplicate(&id)?;
        expression.validate(&id)?;
        self.ids.insert(id.clone());
        self.basic_events.push(BasicEvent { id, expression });
        Ok(())
    }

    pub fn add_house_event(&mut self, id: impl Into<String>, state: bool) -> Result<()> {
        let id = id.into();
        self.check_duplicate(&id)?;
        self.ids.insert(id.clone());
        self.house_events.push(HouseEvent { id, state });
        Ok(())
    }

    pub fn add_gate(&mut self, id: impl Into<String>, formula: Formula) -> Result<()> {
        let id = id.into();
        self.check_duplicate(&id)?;
        self.ids.insert(id.clone());
        self.gates.push(Gate { id, formula });
        Ok(())
    }

    /// Registers a common-cause substitution: references to the basic event
    /// resolve to the given (externally expanded) gate when CCF analysis is
    /// requested.
    pub fn add_ccf_substitution(
        &mut self,
        basic_id: impl Into<String>,
        gate_id: impl Into<String>,
    ) -> Result<()> {
        if self.frozen {
            return Err(Error::Model("model is frozen".to_string()));
        }
        self.ccf_substitutions.insert(basic_id.into(), gate_id.into());
        Ok(())
    }

    /// Validates the model and assigns the analysis index space.
    ///
    /// After freezing no further mutation is accepted and every analysis
    /// entry point becomes available.
    pub fn freeze(mut self) -> Result<Self> {
        let gate_ids: HashSet<&str> = self.gates.iter().map(|g| g.id.as_str()).collect();

        if !gate_ids.contains(self.top_event.as_str()) {
            return Err(Error::Model(format!(
                "top event '{}' is not a defined gate",
                self.top_event
            )));
        }

        for gate in &self.gates {
            gate.formula.validate(&gate.id)?;
            self.check_defined(&gate.formula, &gate.id)?;
        }

        for (basic_id, sub_gate) in &self.ccf_substitutions {
            if !self.basic_events.iter().any(|b| &b.id == basic_id) {
                return Err(Error::Model(format!(
                    "CCF substitution source '{basic_id}' is not a basic event"
                )));
            }
            if !gate_ids.contains(sub_gate.as_str()) {
                return Err(Error::Model(format!(
                    "CCF substitution target '{sub_gate}' is not a defined gate"
                )));
            }
        }

        self.check_acyclic(&gate_ids)?;

        let mut index = 0u32;
        for event in &self.basic_events {
            index += 1;
            self.index_of.insert(event.id.clone(), index);
        }
        for event in &self.house_events {
            index += 1;
            self.index_of.insert(event.id.clone(), index);
        }
        for gate in &self.gates {
            index += 1;
            self.index_of.insert(gate.id.clone(), index);
        }

        self.frozen = true;
        Ok(self)
    }

    fn check_defined(&self, formula: &Formula, gate_id: &str) -> Result<()> {
        for arg in formula.event_args() {
            if !self.ids.contains(arg) {
                return Err(Error::Model(format!(
                    "undefined event '{arg}' in formula of gate '{gate_id}'"
                )));
            }
        }
        for sub in formula.formula_args() {
            self.check_defined(sub, gate_id)?;
        }
        Ok(())
    }

    fn check_acyclic(&self, gate_ids: &HashSet<&str>) -> Result<()> {
        // Three-color DFS over gate-to-gate references.
        #[derive(Copy, Clone, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let by_id: HashMap<&str, &Gate> = self.gates.iter().map(|g| (g.id.as_str(), g)).collect();
        let mut colors: HashMap<&str, Color> =
            self.gates.iter().map(|g| (g.id.as_str(), Color::White)).collect();

        fn visit<'a>(
            id: &'a str,
            by_id: &HashMap<&'a str, &'a Gate>,
            gate_ids: &HashSet<&'a str>,
            colors: &mut HashMap<&'a str, Color>,
        ) -> Result<()> {
            match colors[id] {
                Color::Black => return Ok(()),
                Color::Gray => {
                    return Err(Error::Model(format!("cyclic gate definition through '{id}'")))
                }
                Color::White => {}
            }
            colors.insert(id, Color::Gray);
            let mut refs = Vec::new();
            by_id[id].formula.gate_refs(gate_ids, &mut refs);
            for child in refs {
                visit(child, by_id, gate_ids, colors)?;
            }
            colors.insert(id, Color::Black);
            Ok(())
        }

        for gate in &self.gates {
            visit(gate.id.as_str(), &by_id, gate_ids, &mut colors)?;
        }
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn basic_events(&self) -> &[BasicEvent] {
        &self.basic_events
    }
    pub fn house_events(&self) -> &[HouseEvent] {
        &self.house_events
    }
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }
    pub fn top_event(&self) -> &str {
        &self.top_event
    }

    pub fn num_basic_events(&self) -> u32 {
        self.basic_events.len() as u32
    }
    pub fn num_house_events(&self) -> u32 {
        self.house_events.len() as u32
    }

    /// First index of the model-gate range `B+H+1..`.
    pub fn first_gate_index(&self) -> u32 {
        self.num_basic_events() + self.num_house_events() + 1
    }

    /// The frozen index of a named event, if defined.
    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.index_of.get(id).copied()
    }

    /// The basic event at a frozen index in `1..=B`.
    pub fn basic_event(&self, index: u32) -> &BasicEvent {
        &self.basic_events[(index - 1) as usize]
    }

    pub fn ccf_substitution(&self, basic_id: &str) -> Option<&str> {
        self.ccf_substitutions.get(basic_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_event_model() -> Model {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        model.add_basic_event("b", Expression::Constant(0.2)).unwrap();
        model
            .add_gate("top", Formula::new(GateType::Or).event("a").event("b"))
            .unwrap();
        model
    }

    #[test]
    fn test_freeze_assigns_indices() {
        let model = two_event_model().freeze().unwrap();
        assert!(model.is_frozen());
        assert_eq!(model.index_of("a"), Some(1));
        assert_eq!(model.index_of("b"), Some(2));
        assert_eq!(model.index_of("top"), Some(3));
        assert_eq!(model.first_gate_index(), 3);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        assert!(model.add_house_event("a", true).is_err());
    }

    #[test]
    fn test_undefined_reference_rejected() {
        let mut model = Model::new("top");
        model
            .add_gate("top", Formula::new(GateType::Or).event("ghost").event("ghost2"))
            .unwrap();
        assert!(model.freeze().is_err());
    }

    #[test]
    fn test_probability_out_of_range_rejected() {
        let mut model = Model::new("top");
        assert!(model.add_basic_event("a", Expression::Constant(1.5)).is_err());
    }

    #[test]
    fn test_vote_number_out_of_range_rejected() {
        let mut model = Model::new("top");
        for id in ["a", "b", "c"] {
            model.add_basic_event(id, Expression::Constant(0.1)).unwrap();
        }
        model
            .add_gate(
                "top",
                Formula::new(GateType::AtLeast).vote(4).event("a").event("b").event("c"),
            )
            .unwrap();
        assert!(model.freeze().is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        model
            .add_gate("top", Formula::new(GateType::Or).event("g").event("a"))
            .unwrap();
        model
            .add_gate("g", Formula::new(GateType::And).event("top").event("a"))
            .unwrap();
        assert!(model.freeze().is_err());
    }

    #[test]
    fn test_exponential_expression() {
        let expr = Expression::Exponential { lambda: 1e-4 };
        let p = expr.value(100.0);
        assert!(p > 0.0 && p < 1.0);
        assert!((p - (1.0 - (-0.01f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_top_must_be_gate() {
        let mut model = Model::new("a");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        assert!(model.freeze().is_err());
    }
}
