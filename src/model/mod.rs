//! # Model Module
//!
//! The hidden conjunctive Bayesian network model and its inference
//! routines.
//!
//! ## Core Algorithms
//! - `simulate`: Poset-constrained genotype simulator
//! - `sampler`: Per-observation importance sampling (forward / rejection)
//! - `likelihood`: Complete-data and observed log-likelihood kernels
//! - `mcem`: Monte-Carlo EM driver with windowed averaging

pub mod likelihood;
pub mod mcem;
pub mod sampler;
pub mod simulate;

use crate::data::matrix::GenotypeMatrix;
use crate::data::poset::Poset;
use crate::error::{HcbnError, Result};

/// Model state for H-CBN inference.
///
/// Owns the poset, its cached topological order, the per-event rates
/// `lambda`, the sampling-time rate `lambda_s`, and the observation error
/// rate `epsilon`. During the parallel E-step the model is shared read-only
/// across workers; the M-step mutates it behind an exclusive reference.
#[derive(Clone, Debug)]
pub struct Model {
    poset: Poset,
    topo_order: Vec<usize>,
    lambda: Vec<f64>,
    lambda_s: f64,
    epsilon: f64,
    llhood: f64,
}

impl Model {
    /// Create a model, verifying acyclicity and parameter ranges.
    ///
    /// The topological order is computed once here and reused on every
    /// simulated sample.
    pub fn new(poset: Poset, lambda: Vec<f64>, lambda_s: f64, epsilon: f64) -> Result<Self> {
        if lambda.len() != poset.size() {
            return Err(HcbnError::shape_mismatch(format!(
                "lambda has {} entries for a poset over {} events",
                lambda.len(),
                poset.size()
            )));
        }
        if let Some(&bad) = lambda.iter().find(|l| !(l.is_finite() && **l > 0.0)) {
            return Err(HcbnError::out_of_range(format!(
                "lambda entries must be positive and finite, got {bad}"
            )));
        }
        if !(lambda_s.is_finite() && lambda_s > 0.0) {
            return Err(HcbnError::out_of_range(format!(
                "lambda_s must be positive and finite, got {lambda_s}"
            )));
        }
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(HcbnError::out_of_range(format!(
                "epsilon must lie in [0, 1], got {epsilon}"
            )));
        }
        let topo_order = poset.topological_order()?;
        Ok(Model {
            poset,
            topo_order,
            lambda,
            lambda_s,
            epsilon,
            llhood: f64::NEG_INFINITY,
        })
    }

    /// Number of events
    pub fn size(&self) -> usize {
        self.poset.size()
    }

    /// The event poset
    pub fn poset(&self) -> &Poset {
        &self.poset
    }

    /// Cached topological order of the poset
    pub fn topo_order(&self) -> &[usize] {
        &self.topo_order
    }

    /// Per-event rates
    pub fn lambda(&self) -> &[f64] {
        &self.lambda
    }

    /// Rate of event `j`
    #[inline]
    pub fn lambda_at(&self, j: usize) -> f64 {
        self.lambda[j]
    }

    /// Sampling-time rate
    pub fn lambda_s(&self) -> f64 {
        self.lambda_s
    }

    /// Observation error rate
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Log-likelihood recorded by the last fit
    pub fn llhood(&self) -> f64 {
        self.llhood
    }

    pub(crate) fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    pub(crate) fn set_llhood(&mut self, llhood: f64) {
        self.llhood = llhood;
    }

    pub(crate) fn set_lambda(&mut self, lambda: Vec<f64>) {
        debug_assert_eq!(lambda.len(), self.size());
        self.lambda = lambda;
    }

    /// Replace the rates, clamping each entry into `(0, max_lambda]`.
    ///
    /// Non-finite entries are repaired to `max_lambda`.
    pub(crate) fn set_lambda_clamped(&mut self, raw: &[f64], max_lambda: f64) {
        debug_assert_eq!(raw.len(), self.size());
        self.lambda = raw
            .iter()
            .map(|&x| if x.is_finite() { x.min(max_lambda) } else { max_lambda })
            .collect();
    }

    /// Whether a genotype is compatible with the poset: every observed
    /// event has all of its parents observed.
    pub fn is_compatible(&self, genotype: &[bool]) -> bool {
        debug_assert_eq!(genotype.len(), self.size());
        (0..self.size()).all(|v| {
            !genotype[v] || self.poset.parents(v).iter().all(|&u| genotype[u])
        })
    }

    /// Number of observations compatible with the poset
    pub fn num_compatible_observations(&self, obs: &GenotypeMatrix) -> usize {
        (0..obs.n_rows())
            .filter(|&i| self.is_compatible(&obs.row(i)))
            .count()
    }

    /// Total number of events observed without all of their parents,
    /// across all observations
    pub fn num_incompatible_events(&self, obs: &GenotypeMatrix) -> usize {
        let mut count = 0;
        for i in 0..obs.n_rows() {
            for v in 0..self.size() {
                if obs.get(i, v) && !self.poset.parents(v).iter().all(|&u| obs.get(i, u)) {
                    count += 1;
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chain_model() -> Model {
        let poset = Poset::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
        Model::new(poset, vec![1.0, 1.0, 1.0], 1.0, 0.05).unwrap()
    }

    #[test]
    fn test_new_rejects_cycle() {
        let poset = Poset::from_edges(2, &[(0, 1), (1, 0)]).unwrap();
        assert!(matches!(
            Model::new(poset, vec![1.0, 1.0], 1.0, 0.0),
            Err(HcbnError::NotAcyclic)
        ));
    }

    #[test]
    fn test_new_rejects_bad_parameters() {
        let poset = Poset::new(2);
        assert!(Model::new(poset.clone(), vec![1.0], 1.0, 0.0).is_err());
        assert!(Model::new(poset.clone(), vec![1.0, 0.0], 1.0, 0.0).is_err());
        assert!(Model::new(poset.clone(), vec![1.0, 1.0], 0.0, 0.0).is_err());
        assert!(Model::new(poset.clone(), vec![1.0, 1.0], 1.0, 1.5).is_err());
        assert!(Model::new(poset, vec![1.0, 1.0], 1.0, -0.1).is_err());
    }

    #[test]
    fn test_lambda_clamp() {
        let mut model = make_chain_model();
        model.set_lambda_clamped(&[0.5, f64::INFINITY, f64::NAN], 100.0);
        assert_eq!(model.lambda(), &[0.5, 100.0, 100.0]);
        model.set_lambda_clamped(&[250.0, 1.0, 2.0], 100.0);
        assert_eq!(model.lambda(), &[100.0, 1.0, 2.0]);
    }

    #[test]
    fn test_compatibility() {
        let model = make_chain_model();
        assert!(model.is_compatible(&[false, false, false]));
        assert!(model.is_compatible(&[true, true, false]));
        assert!(!model.is_compatible(&[false, true, false]));
        assert!(!model.is_compatible(&[true, false, true]));

        let obs = GenotypeMatrix::from_rows(&[
            vec![true, true, true],
            vec![false, true, true],
            vec![true, false, false],
        ]);
        assert_eq!(model.num_compatible_observations(&obs), 2);
        // Row 1: event 1 lacks parent 0; event 2 has its direct parent
        assert_eq!(model.num_incompatible_events(&obs), 1);
    }
}
