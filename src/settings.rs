//! Analysis configuration.
//!
//! [`Settings`] bundles every knob an analysis recognizes. Values are
//! validated by the `with_*` setters, so a constructed `Settings` is always
//! usable. Options that belong to external collaborators (the uncertainty
//! sampler) are stored and forwarded only.

use crate::error::{Error, Result};

/// Source of the total probability `p_total`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Approximation {
    /// Sum of cut-set probabilities. Valid only when the sum is small.
    RareEvent,
    /// Minimal-cut-set upper bound: `1 - prod(1 - Pr(cs))`.
    #[default]
    Mcub,
    /// Exact probability from the binary decision diagram.
    Exact,
}

/// Configuration for one analysis run.
#[derive(Debug, Clone)]
pub struct Settings {
    limit_order: usize,
    cut_set_cap: usize,
    mission_time: f64,
    approximation: Approximation,
    probability_analysis: bool,
    importance_analysis: bool,
    uncertainty_analysis: bool,
    ccf_analysis: bool,
    num_trials: usize,
    seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limit_order: 20,
            cut_set_cap: 10_000_000,
            mission_time: 8760.0,
            approximation: Approximation::default(),
            probability_analysis: false,
            importance_analysis: false,
            uncertainty_analysis: false,
            ccf_analysis: false,
            num_trials: 1000,
            seed: None,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum cardinality of enumerated cut sets. Larger products are
    /// dropped during expansion.
    pub fn with_limit_order(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Settings("limit order must be positive".to_string()));
        }
        self.limit_order = limit;
        Ok(self)
    }

    /// Hard cap on the number of products held during cut-set expansion.
    /// Exceeding it aborts the analysis with [`Error::LimitExceeded`].
    pub fn with_cut_set_cap(mut self, cap: usize) -> Result<Self> {
        if cap == 0 {
            return Err(Error::Settings("cut set cap must be positive".to_string()));
        }
        self.cut_set_cap = cap;
        Ok(self)
    }

    /// Mission time handed to probability expressions.
    pub fn with_mission_time(mut self, time: f64) -> Result<Self> {
        if !(time > 0.0) || !time.is_finite() {
            return Err(Error::Settings(format!(
                "mission time must be a positive finite number, got {time}"
            )));
        }
        self.mission_time = time;
        Ok(self)
    }

    pub fn with_approximation(mut self, approximation: Approximation) -> Self {
        self.approximation = approximation;
        self
    }

    pub fn with_probability_analysis(mut self, flag: bool) -> Self {
        self.probability_analysis = flag;
        self
    }

    /// Importance analysis implies probability analysis.
    pub fn with_importance_analysis(mut self, flag: bool) -> Self {
        self.importance_analysis = flag;
        if flag {
            self.probability_analysis = true;
        }
        self
    }

    pub fn with_uncertainty_analysis(mut self, flag: bool) -> Self {
        self.uncertainty_analysis = flag;
        self
    }

    pub fn with_ccf_analysis(mut self, flag: bool) -> Self {
        self.ccf_analysis = flag;
        self
    }

    /// Trial count for the external uncertainty sampler.
    pub fn with_num_trials(mut self, trials: usize) -> Result<Self> {
        if trials == 0 {
            return Err(Error::Settings("number of trials must be positive".to_string()));
        }
        self.num_trials = trials;
        Ok(self)
    }

    /// Seed for the external uncertainty sampler.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn limit_order(&self) -> usize {
        self.limit_order
    }
    pub fn cut_set_cap(&self) -> usize {
        self.cut_set_cap
    }
    pub fn mission_time(&self) -> f64 {
        self.mission_time
    }
    pub fn approximation(&self) -> Approximation {
        self.approximation
    }
    pub fn probability_analysis(&self) -> bool {
        self.probability_analysis
    }
    pub fn importance_analysis(&self) -> bool {
        self.importance_analysis
    }
    pub fn uncertainty_analysis(&self) -> bool {
        self.uncertainty_analysis
    }
    pub fn ccf_analysis(&self) -> bool {
        self.ccf_analysis
    }
    pub fn num_trials(&self) -> usize {
        self.num_trials
    }
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.limit_order(), 20);
        assert_eq!(settings.approximation(), Approximation::Mcub);
        assert!(!settings.probability_analysis());
    }

    #[test]
    fn test_invalid_limit_order() {
        assert!(Settings::new().with_limit_order(0).is_err());
    }

    #[test]
    fn test_invalid_mission_time() {
        assert!(Settings::new().with_mission_time(0.0).is_err());
        assert!(Settings::new().with_mission_time(-1.0).is_err());
        assert!(Settings::new().with_mission_time(f64::NAN).is_err());
    }

    #[test]
    fn test_importance_implies_probability() {
        let settings = Settings::new().with_importance_analysis(true);
        assert!(settings.probability_analysis());
    }
}
