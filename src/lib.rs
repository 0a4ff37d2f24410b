//! # H-CBN Inference Library
//!
//! Monte-Carlo EM inference for hidden conjunctive Bayesian networks:
//! estimate per-event rates and an observation error rate from noisy
//! cross-sectional binary data constrained by a partial order of
//! precedence relations.
//!
//! ## Modules
//! - `config`: EM control parameters
//! - `data`: Observation matrices and the event poset
//! - `error`: Error types and result aliases
//! - `model`: Generative model, simulator, importance sampler, likelihood
//!   kernels and the MCEM driver
//! - `utils`: Random streams and Hamming kernels

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod utils;

// Re-export commonly used types
pub use config::ControlEm;
pub use data::{GenotypeMatrix, Poset, RealMatrix};
pub use error::{HcbnError, Result};
pub use model::likelihood::{complete_log_likelihood, log_bernoulli_process, obs_log_likelihood};
pub use model::mcem;
pub use model::sampler::{importance_weight, ImportanceSample, Proposal, SamplerOptions};
pub use model::simulate::{sample_genotypes, GenotypeSamples, SamplingTimes};
pub use model::Model;
pub use utils::Context;
