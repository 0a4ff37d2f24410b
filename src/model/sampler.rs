//! # Importance Sampler
//!
//! Per-observation importance weights and expected sufficient statistics.
//!
//! Two proposal families are supported. The **forward** proposal draws
//! latent genotypes from the generative model and weighs them by the
//! error-process density of their distance to the observation. The
//! **rejection** proposal draws a larger candidate pool, resamples it by
//! those same densities, and carries the normalizing constant as a flat
//! importance correction.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;

use crate::data::matrix::RealMatrix;
use crate::error::{HcbnError, Result};
use crate::model::likelihood::log_bernoulli;
use crate::model::simulate::{sample_genotypes, SamplingTimes};
use crate::model::Model;
use crate::utils::hamming::hamming_rows;

/// Proposal distribution for the importance sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proposal {
    /// Draw latent genotypes directly from the generative model
    Forward,
    /// Resample a candidate pool of size `p * L` by error-process density
    Rejection,
    /// Reserved add/remove move family; not implemented
    AddRemove { version: u32 },
}

impl Proposal {
    /// Resolve a proposal by name.
    ///
    /// `version` selects among variants of the add/remove family and is
    /// ignored by the other proposals.
    pub fn from_name(name: &str, version: u32) -> Result<Self> {
        match name {
            "forward" => Ok(Proposal::Forward),
            "rejection" => Ok(Proposal::Rejection),
            "add-remove" => Ok(Proposal::AddRemove { version }),
            other => Err(HcbnError::not_implemented(format!(
                "unsupported proposal name {other:?}"
            ))),
        }
    }
}

/// Options shared by the sampling-based routines.
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    /// Number of importance samples per observation (L)
    pub n_samples: usize,
    /// Proposal distribution
    pub proposal: Proposal,
    /// Whether observation times are supplied rather than drawn
    pub times_available: bool,
}

impl SamplerOptions {
    /// Validate sampler options
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(HcbnError::out_of_range(
                "the number of importance samples L must be positive",
            ));
        }
        Ok(())
    }
}

/// Importance weights and sufficient statistics for one observation.
#[derive(Debug, Clone)]
pub struct ImportanceSample {
    /// Unnormalized importance weights, one per sample
    pub w: Vec<f64>,
    /// Hamming distance of each proposed genotype to the observation
    pub dist: Vec<u32>,
    /// Per-event waiting times of each proposed latent trajectory (L x p)
    pub tdiff: RealMatrix,
}

/// Density of the error process: probability of flipping exactly `d` of
/// `p` independent bits with flip probability `eps`.
#[inline]
fn bernoulli_weight(d: u32, eps: f64, p: usize) -> f64 {
    eps.powi(d as i32) * (1.0 - eps).powi((p - d as usize) as i32)
}

/// Compute importance weights and sufficient statistics for a single
/// observed genotype.
///
/// `time` is the observation's sampling time; it is used only when
/// `options.times_available` is set, otherwise sampling times are drawn
/// from the model.
pub fn importance_weight(
    genotype: &[bool],
    model: &Model,
    time: f64,
    options: &SamplerOptions,
    rng: &mut StdRng,
) -> Result<ImportanceSample> {
    options.validate()?;
    let p = model.size();
    if genotype.len() != p {
        return Err(HcbnError::shape_mismatch(format!(
            "genotype has {} entries for a model over {p} events",
            genotype.len()
        )));
    }

    let l = options.n_samples;
    let eps = model.epsilon();
    let times = if options.times_available {
        SamplingTimes::Constant(time)
    } else {
        SamplingTimes::Exponential
    };

    match options.proposal {
        Proposal::Forward => {
            // Samples of the true genotype: the generative draw ignores the
            // error process, which enters only through the weights.
            let samples = sample_genotypes(l, model, times, rng)?;
            let dist = hamming_rows(&samples.genotypes, genotype);
            let w = dist.iter().map(|&d| bernoulli_weight(d, eps, p)).collect();
            Ok(ImportanceSample {
                w,
                dist,
                tdiff: samples.tdiff,
            })
        }
        Proposal::Rejection => {
            let pool_size = p * l;
            let pool = sample_genotypes(pool_size, model, times, rng)?;
            let dist_pool = hamming_rows(&pool.genotypes, genotype);

            let mut q: Vec<f64> = dist_pool
                .iter()
                .map(|&d| bernoulli_weight(d, eps, p))
                .collect();

            // If every candidate has zero density, fall back to uniform
            // resampling and recompute weights from the guarded density.
            let mut random = false;
            if q.iter().sum::<f64>() == 0.0 {
                q.iter_mut().for_each(|x| *x = 1.0);
                random = true;
            }
            let q_sum: f64 = q.iter().sum();

            let chooser = WeightedIndex::new(&q)
                .map_err(|e| HcbnError::numerical(format!("degenerate pool weights: {e}")))?;

            let mut dist = Vec::with_capacity(l);
            let mut tdiff = RealMatrix::zeros(l, p);
            for row in 0..l {
                let idx = chooser.sample(rng);
                dist.push(dist_pool[idx]);
                tdiff.row_mut(row).copy_from_slice(pool.tdiff.row(idx));
            }

            let w = if random {
                dist.iter()
                    .map(|&d| log_bernoulli(d as f64, eps, p).exp())
                    .collect()
            } else {
                vec![q_sum / pool_size as f64; l]
            };

            Ok(ImportanceSample { w, dist, tdiff })
        }
        Proposal::AddRemove { .. } => Err(HcbnError::not_implemented(
            "the add-remove proposal is not implemented",
        )),
    }
}
