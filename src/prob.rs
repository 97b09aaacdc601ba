//! Probability quantification and importance factors.
//!
//! Three probability paths over the same cut sets:
//!
//! - rare-event: `sum Pr(cs)` — always computed, valid only when small;
//! - MCUB: `1 - prod(1 - Pr(cs))` — assumes near-independent cut sets;
//! - exact: BDD evaluation — authoritative when requested.
//!
//! Importance factors are BDD-derived when the diagram is available (pin
//! the event's probability to 1 and 0, re-evaluate reusing the memo table
//! between the two fixings) and fall back to rare-event conditional sums
//! otherwise; the chosen path is recorded in the warnings so reports can
//! name it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use log::debug;

use crate::bdd::{Bdd, Ref};
use crate::mcs::CutSet;
use crate::settings::{Approximation, Settings};

/// Tolerance for a BDD probability escaping [0, 1] before it is worth a
/// warning rather than silent clamping.
const PROBABILITY_EPSILON: f64 = 1e-9;

/// The five standard importance factors of a basic event.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImportanceFactors {
    /// Birnbaum marginal importance: `Pr(top | e=1) - Pr(top | e=0)`.
    pub mif: f64,
    /// Critical importance: `mif * p / p_total`.
    pub cif: f64,
    /// Fussell-Vesely diagnosis importance.
    pub dif: f64,
    /// Risk achievement worth: `Pr(top | e=1) / p_total`.
    pub raw: f64,
    /// Risk reduction worth: `p_total / Pr(top | e=0)`.
    pub rrw: f64,
}

/// Quantitative analysis over enumerated minimal cut sets.
pub struct ProbabilityAnalysis {
    p_total: f64,
    p_rare: f64,
    prob_of_min_sets: Vec<f64>,
    importance: BTreeMap<u32, ImportanceFactors>,
    coherent: bool,
    warnings: Vec<String>,
    p_time: Duration,
    imp_time: Duration,
}

impl ProbabilityAnalysis {
    /// Computes the probabilities of each cut set and the total.
    ///
    /// `var_probs` is indexed by basic-event index (slot 0 unused). The BDD
    /// argument must be present when the settings request the exact
    /// approximation; without it the analysis degrades to MCUB with a
    /// warning.
    pub fn new(
        var_probs: &[f64],
        min_cut_sets: &[CutSet],
        settings: &Settings,
        bdd: Option<(&Bdd, Ref)>,
    ) -> Self {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let coherent = min_cut_sets.iter().all(|cs| cs.iter().all(|lit| !lit.is_negated()));
        let prob_of_min_sets: Vec<f64> =
            min_cut_sets.iter().map(|cs| prob_and(cs, var_probs)).collect();

        let p_rare: f64 = prob_of_min_sets.iter().sum();
        if p_rare > 1.0 {
            warnings.push(format!(
                "rare-event sum is {p_rare:.6}; the quantity is not a probability"
            ));
        } else if p_rare > 0.1 {
            warnings.push(
                "rare-event approximation exceeds 0.1; result may be unreliable".to_string(),
            );
        }

        let p_mcub = prob_mcub(&prob_of_min_sets);
        let p_total = match settings.approximation() {
            Approximation::RareEvent => p_rare.min(1.0),
            Approximation::Mcub => p_mcub,
            Approximation::Exact => match bdd {
                Some((bdd, root)) => {
                    let p = bdd.probability(root, var_probs);
                    if !(-PROBABILITY_EPSILON..=1.0 + PROBABILITY_EPSILON).contains(&p) {
                        warnings.push(format!(
                            "exact probability {p:.6e} escaped [0, 1]; clamped"
                        ));
                    }
                    p.clamp(0.0, 1.0)
                }
                None => {
                    warnings.push(
                        "exact approximation requested without a BDD; using MCUB".to_string(),
                    );
                    p_mcub
                }
            },
        };
        debug!("p_total = {p_total}, p_rare = {p_rare}, coherent = {coherent}");

        Self {
            p_total,
            p_rare,
            prob_of_min_sets,
            importance: BTreeMap::new(),
            coherent,
            warnings,
            p_time: start.elapsed(),
            imp_time: Duration::ZERO,
        }
    }

    /// Importance analysis for every basic event present in a cut set.
    pub fn analyze_importance(
        &mut self,
        var_probs: &[f64],
        min_cut_sets: &[CutSet],
        bdd: Option<(&Bdd, Ref)>,
    ) {
        let start = Instant::now();
        let events: BTreeSet<u32> = min_cut_sets
            .iter()
            .flat_map(|cs| cs.iter().map(|lit| lit.index()))
            .collect();
        debug!("importance analysis over {} basic events", events.len());
        self.warnings.push(match bdd {
            Some(_) => "importance factors computed from the BDD".to_string(),
            None => "importance factors computed with rare-event formulas".to_string(),
        });
        if self.p_total <= 0.0 && !events.is_empty() {
            self.warnings
                .push("total probability is zero; ratio importance factors default to zero".to_string());
        }

        let mut conditional = var_probs.to_vec();
        let mut cache = HashMap::new();
        for &event in &events {
            let p = var_probs[event as usize];
            let (p_one, p_zero) = match bdd {
                Some((bdd, root)) => {
                    let rank = bdd.rank_of_basic(event).expect("cut-set event is in the diagram");
                    cache.clear();
                    conditional[event as usize] = 1.0;
                    let p_one = bdd.probability_with_cache(root, &conditional, &mut cache);
                    // Entries ordered below the pinned variable survive the
                    // second fixing.
                    bdd.retain_independent(rank, &mut cache);
                    conditional[event as usize] = 0.0;
                    let p_zero = bdd.probability_with_cache(root, &conditional, &mut cache);
                    conditional[event as usize] = p;
                    (p_one, p_zero)
                }
                None => {
                    conditional[event as usize] = 1.0;
                    let p_one = prob_rare_event(min_cut_sets, &conditional);
                    conditional[event as usize] = 0.0;
                    let p_zero = prob_rare_event(min_cut_sets, &conditional);
                    conditional[event as usize] = p;
                    (p_one, p_zero)
                }
            };

            let mif = p_one - p_zero;
            let dif_numerator: f64 = min_cut_sets
                .iter()
                .zip(&self.prob_of_min_sets)
                .filter(|(cs, _)| cs.iter().any(|lit| lit.index() == event))
                .map(|(_, &p)| p)
                .sum();

            let factors = if self.p_total > 0.0 {
                ImportanceFactors {
                    mif,
                    cif: mif * p / self.p_total,
                    dif: dif_numerator / self.p_total,
                    raw: p_one / self.p_total,
                    rrw: if p_zero > 0.0 { self.p_total / p_zero } else { f64::INFINITY },
                }
            } else {
                ImportanceFactors { mif, cif: 0.0, dif: 0.0, raw: 0.0, rrw: 0.0 }
            };
            self.importance.insert(event, factors);
        }
        self.imp_time = start.elapsed();
    }

    pub fn p_total(&self) -> f64 {
        self.p_total
    }
    pub fn p_rare(&self) -> f64 {
        self.p_rare
    }
    /// Probabilities of the cut sets, parallel to the input family.
    pub fn prob_of_min_sets(&self) -> &[f64] {
        &self.prob_of_min_sets
    }
    pub fn importance(&self) -> &BTreeMap<u32, ImportanceFactors> {
        &self.importance
    }
    pub fn is_coherent(&self) -> bool {
        self.coherent
    }
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
    pub fn prob_analysis_time(&self) -> Duration {
        self.p_time
    }
    pub fn imp_analysis_time(&self) -> Duration {
        self.imp_time
    }
}

/// Probability of a cut set under member independence: positive literals
/// contribute `p`, complements `1 - p`.
pub fn prob_and(cut_set: &CutSet, var_probs: &[f64]) -> f64 {
    let mut product = 1.0;
    for &literal in cut_set {
        let p = var_probs[literal.index() as usize];
        product *= if literal.is_negated() { 1.0 - p } else { p };
    }
    product
}

/// Total probability with the rare-event approximation.
pub fn prob_rare_event(min_cut_sets: &[CutSet], var_probs: &[f64]) -> f64 {
    min_cut_sets.iter().map(|cs| prob_and(cs, var_probs)).sum()
}

/// Total probability with the minimal-cut-set upper bound.
pub fn prob_mcub(cut_set_probs: &[f64]) -> f64 {
    1.0 - cut_set_probs.iter().fold(1.0, |acc, &p| acc * (1.0 - p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::NodeRef;

    use test_log::test;

    const EPS: f64 = 1e-12;

    fn set(literals: &[i32]) -> CutSet {
        literals.iter().map(|&l| NodeRef::new(l)).collect()
    }

    #[test]
    fn test_prob_and_with_complement() {
        let probs = [0.0, 0.5, 0.5];
        assert!((prob_and(&set(&[1, -2]), &probs) - 0.25).abs() < EPS);
        assert!((prob_and(&set(&[]), &probs) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_mcub_vs_rare() {
        // Single OR of two events with p = 0.1.
        let mcs = [set(&[1]), set(&[2])];
        let probs = [0.0, 0.1, 0.1];
        let cut_probs: Vec<f64> = mcs.iter().map(|cs| prob_and(cs, &probs)).collect();
        assert!((prob_rare_event(&mcs, &probs) - 0.2).abs() < EPS);
        assert!((prob_mcub(&cut_probs) - 0.19).abs() < EPS);
    }

    #[test]
    fn test_rare_event_warning() {
        let mcs = [set(&[1]), set(&[2])];
        let probs = [0.0, 0.9, 0.9];
        let analysis =
            ProbabilityAnalysis::new(&probs, &mcs, &Settings::new().with_probability_analysis(true), None);
        assert!(analysis.warnings().iter().any(|w| w.contains("not a probability")));
    }

    #[test]
    fn test_importance_rare_event_fallback() {
        // top = AND(a, b): MIF(a) = p(b), RAW = 1 / p_total scaled.
        let mcs = [set(&[1, 2])];
        let probs = [0.0, 0.2, 0.4];
        let settings = Settings::new().with_importance_analysis(true);
        let mut analysis = ProbabilityAnalysis::new(&probs, &mcs, &settings, None);
        analysis.analyze_importance(&probs, &mcs, None);

        let a = analysis.importance()[&1];
        assert!((a.mif - 0.4).abs() < EPS);
        let p_total = analysis.p_total();
        assert!((a.cif - a.mif * 0.2 / p_total).abs() < EPS);
        assert!((a.dif - 1.0).abs() < EPS);
        assert!((a.raw - 0.4 / p_total).abs() < EPS);
        assert_eq!(a.rrw, f64::INFINITY);
    }
}
