//! # moira: Probabilistic Fault-Tree Analysis in Rust
//!
//! **`moira`** is the analytical core of a probabilistic risk-assessment
//! engine for coherent and non-coherent fault trees. It reduces a gate DAG
//! to canonical AND/OR form, enumerates minimal cut sets, and quantifies
//! the top event with rare-event, MCUB, and BDD-exact probabilities plus
//! per-event importance factors.
//!
//! ## What is a fault tree?
//!
//! A fault tree is a directed acyclic graph of logic gates rooted at a top
//! event. Leaves are **basic events** (atomic failures with probabilities)
//! or **house events** (boolean constants for structural configuration).
//! A **minimal cut set** is a smallest set of basic events whose joint
//! occurrence entails the top event.
//!
//! ## Key Features
//!
//! - **Multi-pass rewriting**: normalization to positive AND/OR form,
//!   complement propagation, constant pruning, gate coalescing, and
//!   independent-subtree (module) detection over a typed gate graph with
//!   strong invariants between passes.
//! - **Arena + signed indices**: node identity is an integer, polarity a
//!   sign bit; no pointer cycles are possible by construction.
//! - **MCS enumeration**: successive product expansion with dominance
//!   pruning, bounded by an order limit.
//! - **Exact probability**: a Reduced Ordered BDD with complement edges,
//!   hash consing, and an ITE computed table.
//! - **Importance factors**: MIF, CIF, DIF, RAW, RRW per basic event.
//!
//! ## Quick Start
//!
//! ```rust
//! use moira::{Approximation, Expression, FaultTreeAnalysis, Formula, GateType, Model, Settings};
//!
//! // Backup power fails if the mains fail together with the generator
//! // or the transfer relay.
//! let mut model = Model::new("blackout");
//! model.add_basic_event("mains_fail", Expression::Constant(0.03)).unwrap();
//! model.add_basic_event("gen_fail", Expression::Constant(0.02)).unwrap();
//! model.add_basic_event("relay_fail", Expression::Constant(0.05)).unwrap();
//! model
//!     .add_gate(
//!         "blackout",
//!         Formula::new(GateType::And)
//!             .event("mains_fail")
//!             .formula(Formula::new(GateType::Or).event("gen_fail").event("relay_fail")),
//!     )
//!     .unwrap();
//! let model = model.freeze().unwrap();
//!
//! let settings = Settings::new()
//!     .with_probability_analysis(true)
//!     .with_approximation(Approximation::Exact);
//! let mut analysis = FaultTreeAnalysis::new(&model, settings).unwrap();
//! analysis.analyze().unwrap();
//!
//! assert_eq!(analysis.min_cut_sets().len(), 2);
//! assert!((analysis.p_total() - 0.00207).abs() < 1e-9);
//! ```
//!
//! ## Core Components
//!
//! - [`model`]: the frozen input model built by an external parser.
//! - [`graph`]: the indexed gate arena all rewriting passes mutate.
//! - [`normalize`], [`simplify`], [`module`]: the rewriting passes.
//! - [`mcs`]: minimal cut set enumeration.
//! - [`bdd`]: the BDD engine for exact probability.
//! - [`prob`]: probability approximations and importance factors.
//! - [`analysis`]: the façade that runs the pipeline end to end.

pub mod analysis;
pub mod bdd;
pub mod error;
pub mod graph;
pub mod mcs;
pub mod model;
pub mod module;
pub mod normalize;
pub mod prob;
pub mod reference;
pub mod settings;
pub mod simplify;

pub use analysis::FaultTreeAnalysis;
pub use error::{Error, Result};
pub use model::{BasicEvent, Expression, Formula, Gate, GateType, HouseEvent, Model};
pub use prob::ImportanceFactors;
pub use reference::NodeRef;
pub use settings::{Approximation, Settings};
