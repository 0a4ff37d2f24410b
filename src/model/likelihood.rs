//! # Log-Likelihood Kernels
//!
//! The complete-data log-likelihood of the latent process and the
//! importance-sampling estimate of the observed log-likelihood.

use log::debug;
use rayon::prelude::*;

use crate::data::matrix::{GenotypeMatrix, RealMatrix};
use crate::error::{HcbnError, Result};
use crate::model::sampler::{importance_weight, SamplerOptions};
use crate::model::Model;
use crate::utils::rng::Context;

/// Log-density of the error process: `d` flips among `p` independent bits
/// with flip probability `eps`.
///
/// When `eps == 0` an exact match has log-density zero, and mismatches are
/// guarded by substituting machine epsilon for the flip probability so that
/// no `-inf` propagates. Every caller shares this policy.
#[inline]
pub fn log_bernoulli(d: f64, eps: f64, p: usize) -> f64 {
    if eps == 0.0 {
        // Observations compatible with the poset can make eps collapse to
        // zero while some distances stay nonzero.
        if d == 0.0 {
            0.0
        } else {
            f64::EPSILON.ln() * d + (1.0 - f64::EPSILON).ln() * (p as f64 - d)
        }
    } else {
        eps.ln() * d + (1.0 - eps).ln() * (p as f64 - d)
    }
}

/// Vector form of [`log_bernoulli`] over integer distances.
pub fn log_bernoulli_process(dist: &[u32], eps: f64, p: usize) -> Vec<f64> {
    dist.iter().map(|&d| log_bernoulli(d as f64, eps, p)).collect()
}

/// Complete-data log-likelihood of rates and error rate given the latent
/// sufficient statistics.
///
/// `tdiff` holds per-observation expected waiting times (N x p), `dist`
/// the per-observation expected distances, and `w_total` the total
/// observation weight.
pub fn complete_log_likelihood(
    lambda: &[f64],
    eps: f64,
    tdiff: &RealMatrix,
    dist: &[f64],
    w_total: f64,
) -> Result<f64> {
    let p = lambda.len();
    if tdiff.n_cols() != p {
        return Err(HcbnError::shape_mismatch(format!(
            "Tdiff has {} columns for {p} rates",
            tdiff.n_cols()
        )));
    }
    if tdiff.n_rows() != dist.len() {
        return Err(HcbnError::shape_mismatch(format!(
            "Tdiff has {} rows for {} distances",
            tdiff.n_rows(),
            dist.len()
        )));
    }
    if !(0.0..=1.0).contains(&eps) {
        return Err(HcbnError::out_of_range(format!(
            "epsilon must lie in [0, 1], got {eps}"
        )));
    }

    let rate_terms: f64 = w_total * lambda.iter().map(|l| l.ln()).sum::<f64>();
    let mut exposure = 0.0;
    for i in 0..tdiff.n_rows() {
        let row = tdiff.row(i);
        for (j, &l) in lambda.iter().enumerate() {
            exposure += row[j] * l;
        }
    }
    let error_terms: f64 = dist.iter().map(|&d| log_bernoulli(d, eps, p)).sum();

    Ok(rate_terms - exposure + error_terms)
}

/// Importance-sampling estimate of the observed log-likelihood.
///
/// Runs the importance sampler on every observation in parallel and sums
/// `log(sum(w) / L)` across observations. Workers accumulate partial sums
/// over a static partition of the observations and the partials are
/// combined in worker order, so the result is reproducible for a fixed
/// `(seed, thrds, N)`.
pub fn obs_log_likelihood(
    obs: &GenotypeMatrix,
    times: &[f64],
    model: &Model,
    options: &SamplerOptions,
    thrds: usize,
    ctx: &mut Context,
) -> Result<f64> {
    options.validate()?;
    if thrds == 0 {
        return Err(HcbnError::out_of_range("thrds must be positive"));
    }
    if obs.n_cols() != model.size() {
        return Err(HcbnError::shape_mismatch(format!(
            "observations have {} columns for a model over {} events",
            obs.n_cols(),
            model.size()
        )));
    }
    if times.len() != obs.n_rows() {
        return Err(HcbnError::shape_mismatch(format!(
            "{} sampling times for {} observations",
            times.len(),
            obs.n_rows()
        )));
    }

    let n = obs.n_rows();
    let l = options.n_samples as f64;
    let rows: Vec<Vec<bool>> = obs.rows().collect();
    let chunk = n.div_ceil(thrds);
    let mut rngs = ctx.spawn(thrds);

    let partials: Vec<Result<f64>> = rngs
        .par_iter_mut()
        .enumerate()
        .map(|(t, rng)| {
            let lo = (t * chunk).min(n);
            let hi = ((t + 1) * chunk).min(n);
            let mut partial = 0.0;
            for i in lo..hi {
                let record = importance_weight(&rows[i], model, times[i], options, rng)?;
                let w_sum: f64 = record.w.iter().sum();
                partial += (w_sum / l).ln();
            }
            Ok(partial)
        })
        .collect();

    let mut llhood = 0.0;
    for partial in partials {
        llhood += partial?;
    }
    debug!("observed log-likelihood over {n} observations: {llhood:.6}");
    Ok(llhood)
}
