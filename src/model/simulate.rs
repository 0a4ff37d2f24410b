//! # Genotype Simulator
//!
//! Draws latent event trajectories that respect the poset and reads them
//! out at a sampling time.
//!
//! Each event `j` waits `Exp(lambda[j])` after all of its parents have
//! occurred; its occurrence time is the waiting time plus the latest parent
//! occurrence time. The observed genotype marks the events that occurred
//! before the sampling time.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp};

use crate::data::matrix::{GenotypeMatrix, RealMatrix};
use crate::error::{HcbnError, Result};
use crate::model::Model;

/// How sampling times are obtained for a batch of simulated genotypes.
#[derive(Debug, Clone, Copy)]
pub enum SamplingTimes<'a> {
    /// Draw each sampling time from `Exp(lambda_s)`
    Exponential,
    /// Use the same observation time for every sample
    Constant(f64),
    /// Use one supplied time per sample
    Given(&'a [f64]),
}

/// A batch of simulated genotypes with their latent statistics.
#[derive(Debug, Clone)]
pub struct GenotypeSamples {
    /// Simulated genotypes, one row per sample
    pub genotypes: GenotypeMatrix,
    /// Per-event waiting times since parent-ready, one row per sample
    pub tdiff: RealMatrix,
    /// Sampling time of each sample
    pub sampling_times: Vec<f64>,
}

/// Draw `n` exponential variates with the given rate.
fn draw_exponential(n: usize, rate: f64, rng: &mut StdRng) -> Result<Vec<f64>> {
    let dist = Exp::new(rate).map_err(|_| {
        HcbnError::out_of_range(format!("exponential rate must be positive, got {rate}"))
    })?;
    Ok((0..n).map(|_| dist.sample(rng)).collect())
}

/// Draw `n` independent samples `(genotype, tdiff, sampling_time)` from the
/// model.
///
/// Waiting times are drawn event by event, then occurrence times are
/// accumulated along the topological order: the occurrence time of `v` is
/// its waiting time plus the latest occurrence time among its parents.
/// An event is observed when its occurrence time does not exceed the
/// sample's sampling time.
pub fn sample_genotypes(
    n: usize,
    model: &Model,
    times: SamplingTimes<'_>,
    rng: &mut StdRng,
) -> Result<GenotypeSamples> {
    let p = model.size();

    // Waiting times T_events[i][j] ~ Exp(lambda[j]), drawn column-wise
    let mut tdiff = RealMatrix::zeros(n, p);
    for j in 0..p {
        let column = draw_exponential(n, model.lambda_at(j), rng)?;
        for (i, &t) in column.iter().enumerate() {
            tdiff.set(i, j, t);
        }
    }

    let sampling_times = match times {
        SamplingTimes::Exponential => draw_exponential(n, model.lambda_s(), rng)?,
        SamplingTimes::Constant(t) => {
            if !t.is_finite() {
                return Err(HcbnError::out_of_range(format!(
                    "sampling time must be finite, got {t}"
                )));
            }
            vec![t; n]
        }
        SamplingTimes::Given(supplied) => {
            if supplied.len() != n {
                return Err(HcbnError::shape_mismatch(format!(
                    "{} sampling times supplied for {n} samples",
                    supplied.len()
                )));
            }
            supplied.to_vec()
        }
    };

    // Occurrence times along the topological order; an event fires its
    // waiting time after the latest of its parents.
    let mut occurrence = RealMatrix::zeros(n, p);
    let mut genotypes = GenotypeMatrix::new(n, p);
    for &v in model.topo_order() {
        for i in 0..n {
            let mut parent_max = 0.0f64;
            for &u in model.poset().parents(v) {
                parent_max = parent_max.max(occurrence.get(i, u));
            }
            let t_v = tdiff.get(i, v) + parent_max;
            occurrence.set(i, v, t_v);
            if t_v <= sampling_times[i] {
                genotypes.set(i, v, true);
            }
        }
    }

    Ok(GenotypeSamples {
        genotypes,
        tdiff,
        sampling_times,
    })
}
