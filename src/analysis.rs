//! The analysis façade.
//!
//! [`FaultTreeAnalysis`] runs the whole pipeline over one frozen model and
//! one settings bundle, start to finish, in a single flow of control:
//!
//! ```text
//! Model -> IndexedGraph -> normalize -> constants -> complements
//!       -> simplify -> modules -> MCS -> (probability -> importance)
//! ```
//!
//! The indexed graph is exclusively owned by the run and dropped when it
//! completes; only reporter-facing results (string cut sets, scalars,
//! importance maps, warnings, timings) are retained.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use log::debug;

use crate::bdd::Bdd;
use crate::error::{Error, Result};
use crate::graph::IndexedGraph;
use crate::mcs::{self, CutSet};
use crate::model::Model;
use crate::module::detect_modules;
use crate::normalize::{fold_top_sign, normalize, propagate_complements, verify_normalized};
use crate::prob::{ImportanceFactors, ProbabilityAnalysis};
use crate::settings::{Approximation, Settings};
use crate::simplify::{propagate_constants, simplify, verify_simplified};

/// One analysis of one fault tree.
///
/// Construct with a frozen [`Model`], call [`analyze`](Self::analyze) once,
/// then read the results through the accessors.
pub struct FaultTreeAnalysis<'a> {
    model: &'a Model,
    settings: Settings,
    min_cut_sets: Vec<CutSet>,
    mcs_ids: BTreeSet<BTreeSet<String>>,
    mcs_probability: BTreeMap<BTreeSet<String>, f64>,
    importance: BTreeMap<String, ImportanceFactors>,
    modules: BTreeSet<u32>,
    p_total: f64,
    p_rare: f64,
    warnings: Vec<String>,
    analysis_time: Duration,
    p_time: Duration,
    imp_time: Duration,
    analyzed: bool,
}

impl<'a> FaultTreeAnalysis<'a> {
    pub fn new(model: &'a Model, settings: Settings) -> Result<Self> {
        if !model.is_frozen() {
            return Err(Error::Model("analysis requires a frozen model".to_string()));
        }
        Ok(Self {
            model,
            settings,
            min_cut_sets: Vec::new(),
            mcs_ids: BTreeSet::new(),
            mcs_probability: BTreeMap::new(),
            importance: BTreeMap::new(),
            modules: BTreeSet::new(),
            p_total: 0.0,
            p_rare: 0.0,
            warnings: Vec::new(),
            analysis_time: Duration::ZERO,
            p_time: Duration::ZERO,
            imp_time: Duration::ZERO,
            analyzed: false,
        })
    }

    /// Runs the full pipeline. Call once per analysis.
    pub fn analyze(&mut self) -> Result<()> {
        debug_assert!(!self.analyzed, "analysis runs once");
        let start = Instant::now();
        debug!("analyzing fault tree rooted at '{}'", self.model.top_event());

        let mut graph = IndexedGraph::new(self.model, &self.settings)?;
        normalize(&mut graph)?;
        propagate_constants(&mut graph);
        fold_top_sign(&mut graph);
        propagate_complements(&mut graph);
        simplify(&mut graph);
        verify_normalized(&graph)?;
        verify_simplified(&graph)?;
        self.modules = detect_modules(&mut graph);

        self.min_cut_sets =
            mcs::enumerate(&graph, self.settings.limit_order(), self.settings.cut_set_cap())?;
        self.mcs_ids = self.min_cut_sets.iter().map(|cs| self.cut_set_ids(cs)).collect();
        self.analysis_time = start.elapsed();

        if self.settings.probability_analysis() {
            self.quantify(&graph);
        }

        self.analyzed = true;
        debug!(
            "analysis done: {} minimal cut sets, {} modules",
            self.min_cut_sets.len(),
            self.modules.len()
        );
        Ok(())
    }

    fn quantify(&mut self, graph: &IndexedGraph) {
        let mission_time = self.settings.mission_time();
        let mut var_probs = vec![0.0; (self.model.num_basic_events() + 1) as usize];
        for (i, event) in self.model.basic_events().iter().enumerate() {
            var_probs[i + 1] = event.p(mission_time);
        }

        let need_bdd = self.settings.approximation() == Approximation::Exact
            || self.settings.importance_analysis();
        let built = if need_bdd { Some(Bdd::from_graph(graph)) } else { None };
        let bdd = built.as_ref().map(|(bdd, root)| (bdd, *root));

        let mut analysis =
            ProbabilityAnalysis::new(&var_probs, &self.min_cut_sets, &self.settings, bdd);
        if self.settings.importance_analysis() {
            analysis.analyze_importance(&var_probs, &self.min_cut_sets, bdd);
        }

        self.p_total = analysis.p_total();
        self.p_rare = analysis.p_rare();
        self.mcs_probability = self
            .min_cut_sets
            .iter()
            .zip(analysis.prob_of_min_sets())
            .map(|(cs, &p)| (self.cut_set_ids(cs), p))
            .collect();
        self.importance = analysis
            .importance()
            .iter()
            .map(|(&index, &factors)| (self.model.basic_event(index).id().to_string(), factors))
            .collect();
        self.warnings.extend(analysis.warnings().iter().cloned());
        self.p_time = analysis.prob_analysis_time();
        self.imp_time = analysis.imp_analysis_time();
    }

    fn cut_set_ids(&self, cut_set: &CutSet) -> BTreeSet<String> {
        cut_set
            .iter()
            .map(|lit| {
                let id = self.model.basic_event(lit.index()).id();
                if lit.is_negated() {
                    format!("not {id}")
                } else {
                    id.to_string()
                }
            })
            .collect()
    }

    /// Minimal cut sets as sets of event ids; complements carry a
    /// `"not "` prefix.
    pub fn min_cut_sets(&self) -> &BTreeSet<BTreeSet<String>> {
        &self.mcs_ids
    }

    /// Total probability selected by the configured approximation.
    pub fn p_total(&self) -> f64 {
        self.p_total
    }

    /// Total probability with the rare-event approximation.
    pub fn p_rare(&self) -> f64 {
        self.p_rare
    }

    /// Probability of each minimal cut set.
    pub fn mcs_probability(&self) -> &BTreeMap<BTreeSet<String>, f64> {
        &self.mcs_probability
    }

    /// The five importance factors for each basic event in a cut set.
    pub fn importance(&self) -> &BTreeMap<String, ImportanceFactors> {
        &self.importance
    }

    /// Human-readable analysis notes.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of independent modules detected in the tree.
    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn analysis_time(&self) -> Duration {
        self.analysis_time
    }
    pub fn prob_analysis_time(&self) -> Duration {
        self.p_time
    }
    pub fn imp_analysis_time(&self) -> Duration {
        self.imp_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expression, Formula, GateType};

    use test_log::test;

    #[test]
    fn test_unfrozen_model_rejected() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.1)).unwrap();
        model
            .add_gate("top", Formula::new(GateType::Or).event("a").event("a2"))
            .unwrap();
        model.add_basic_event("a2", Expression::Constant(0.1)).unwrap();
        assert!(FaultTreeAnalysis::new(&model, Settings::new()).is_err());
    }

    #[test]
    fn test_single_event_top() {
        let mut model = Model::new("top");
        model.add_basic_event("a", Expression::Constant(0.3)).unwrap();
        model.add_gate("top", Formula::new(GateType::Null).event("a")).unwrap();
        let model = model.freeze().unwrap();

        let settings = Settings::new()
            .with_probability_analysis(true)
            .with_approximation(Approximation::Exact);
        let mut analysis = FaultTreeAnalysis::new(&model, settings).unwrap();
        analysis.analyze().unwrap();

        let expected: BTreeSet<BTreeSet<String>> =
            BTreeSet::from([BTreeSet::from(["a".to_string()])]);
        assert_eq!(analysis.min_cut_sets(), &expected);
        assert!((analysis.p_total() - 0.3).abs() < 1e-12);
    }
}
