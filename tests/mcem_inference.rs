use hcbn::{
    mcem, obs_log_likelihood, sample_genotypes, Context, ControlEm, GenotypeMatrix, HcbnError,
    Model, Poset, Proposal, SamplerOptions, SamplingTimes,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Flip each bit of each genotype independently with probability `eps`.
fn add_observation_noise(clean: &GenotypeMatrix, eps: f64, seed: u64) -> GenotypeMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut noisy = clean.clone();
    for i in 0..clean.n_rows() {
        for j in 0..clean.n_cols() {
            if rng.random::<f64>() < eps {
                noisy.set(i, j, !clean.get(i, j));
            }
        }
    }
    noisy
}

fn forward_options(l: usize) -> SamplerOptions {
    SamplerOptions {
        n_samples: l,
        proposal: Proposal::Forward,
        times_available: true,
    }
}

/// Empty poset over two events, error-free observations: rates settle in a
/// plausible range and the error rate stays pinned at zero.
#[test]
fn test_independent_events_error_free() {
    let mut model = Model::new(Poset::new(2), vec![1.0, 1.0], 1.0, 0.0).unwrap();
    let obs = GenotypeMatrix::from_rows(&[vec![true, false], vec![false, true]]);
    let times = [1.0, 1.0];
    let weights = [1.0, 1.0];
    let control = ControlEm {
        max_iter: 200,
        update_step_size: 20,
        tol: 1e-3,
        ..Default::default()
    };
    let mut ctx = Context::new(2718, false);

    let llhood = mcem::fit(
        &mut model,
        &obs,
        &times,
        &weights,
        &forward_options(100),
        &control,
        1,
        &mut ctx,
    )
    .unwrap();

    assert!(llhood.is_finite());
    assert_eq!(model.epsilon(), 0.0, "exact matches keep the error rate at zero");
    for &l in model.lambda() {
        assert!(
            (0.5..=2.0).contains(&l),
            "rate {l} outside the plausible range for symmetric half-observed events"
        );
    }
}

/// Chain poset with noisy data generated from known parameters: the fit
/// recovers the error rate and the rates to reasonable accuracy.
#[test]
fn test_chain_parameter_recovery() {
    let true_lambda = vec![2.0, 2.0, 2.0];
    let true_eps = 0.05;
    let n = 500;

    let poset = Poset::from_edges(3, &[(0, 1), (1, 2)]).unwrap();
    let truth = Model::new(poset.clone(), true_lambda.clone(), 1.0, 0.0).unwrap();

    let mut sim_rng = StdRng::seed_from_u64(8191);
    let samples = sample_genotypes(n, &truth, SamplingTimes::Exponential, &mut sim_rng).unwrap();
    let noisy = add_observation_noise(&samples.genotypes, true_eps, 1009);

    let mut model = Model::new(poset, vec![1.0, 1.0, 1.0], 1.0, 0.1).unwrap();
    let control = ControlEm {
        max_iter: 100,
        update_step_size: 10,
        tol: 1e-3,
        ..Default::default()
    };
    let weights = vec![1.0; n];
    let mut ctx = Context::new(31337, false);

    mcem::fit(
        &mut model,
        &noisy,
        &samples.sampling_times,
        &weights,
        &forward_options(200),
        &control,
        2,
        &mut ctx,
    )
    .unwrap();

    assert!(
        (model.epsilon() - true_eps).abs() <= 0.02,
        "recovered epsilon {} too far from {true_eps}",
        model.epsilon()
    );
    for (j, (&fitted, &expected)) in model.lambda().iter().zip(true_lambda.iter()).enumerate() {
        let rel_err = (fitted - expected).abs() / expected;
        assert!(
            rel_err <= 0.3,
            "lambda[{j}] = {fitted} deviates {:.0}% from {expected}",
            rel_err * 100.0
        );
    }
}

/// A cyclic poset is rejected before any inference can start.
#[test]
fn test_cyclic_poset_rejected() {
    let poset = Poset::from_edges(2, &[(0, 1), (1, 0)]).unwrap();
    let result = Model::new(poset, vec![1.0, 1.0], 1.0, 0.1);
    assert!(matches!(result, Err(HcbnError::NotAcyclic)));
}

/// Two full pipeline runs with the same seed agree bit-for-bit, for one
/// worker and for several.
#[test]
fn test_end_to_end_determinism() {
    let poset = Poset::from_edges(3, &[(0, 2), (1, 2)]).unwrap();
    let truth = Model::new(poset.clone(), vec![1.5, 0.8, 2.0], 1.0, 0.0).unwrap();
    let mut sim_rng = StdRng::seed_from_u64(55);
    let samples = sample_genotypes(40, &truth, SamplingTimes::Exponential, &mut sim_rng).unwrap();
    let noisy = add_observation_noise(&samples.genotypes, 0.1, 56);
    let weights = vec![1.0; 40];
    let control = ControlEm {
        max_iter: 12,
        update_step_size: 4,
        ..Default::default()
    };

    for thrds in [1, 2] {
        let run = || {
            let mut model =
                Model::new(poset.clone(), vec![1.0, 1.0, 1.0], 1.0, 0.1).unwrap();
            let mut ctx = Context::new(90210, false);
            let llhood = mcem::fit(
                &mut model,
                &noisy,
                &samples.sampling_times,
                &weights,
                &forward_options(50),
                &control,
                thrds,
                &mut ctx,
            )
            .unwrap();
            (model.lambda().to_vec(), model.epsilon(), llhood)
        };
        assert_eq!(run(), run(), "run with thrds={thrds} not reproducible");
    }
}

/// The rejection proposal drives a full fit without degenerating.
#[test]
fn test_rejection_proposal_fit() {
    let poset = Poset::from_edges(2, &[(0, 1)]).unwrap();
    let truth = Model::new(poset.clone(), vec![1.0, 1.0], 1.0, 0.0).unwrap();
    let mut sim_rng = StdRng::seed_from_u64(7);
    let samples = sample_genotypes(60, &truth, SamplingTimes::Exponential, &mut sim_rng).unwrap();
    let noisy = add_observation_noise(&samples.genotypes, 0.1, 8);
    let weights = vec![1.0; 60];

    let mut model = Model::new(poset, vec![1.0, 1.0], 1.0, 0.2).unwrap();
    let control = ControlEm {
        max_iter: 20,
        update_step_size: 5,
        ..Default::default()
    };
    let options = SamplerOptions {
        n_samples: 50,
        proposal: Proposal::Rejection,
        times_available: true,
    };
    let mut ctx = Context::new(4242, false);

    let llhood = mcem::fit(
        &mut model,
        &noisy,
        &samples.sampling_times,
        &weights,
        &options,
        &control,
        2,
        &mut ctx,
    )
    .unwrap();

    assert!(llhood.is_finite());
    assert!((0.0..=1.0).contains(&model.epsilon()));
    assert!(model.lambda().iter().all(|&l| l > 0.0));
}

/// Observed log-likelihood of data under the generating model beats a
/// badly mis-specified alternative.
#[test]
fn test_obs_log_likelihood_ranks_models() {
    let poset = Poset::from_edges(2, &[(0, 1)]).unwrap();
    let truth = Model::new(poset.clone(), vec![1.0, 1.0], 1.0, 0.05).unwrap();
    let mut sim_rng = StdRng::seed_from_u64(12);
    let samples = sample_genotypes(80, &truth, SamplingTimes::Exponential, &mut sim_rng).unwrap();
    let noisy = add_observation_noise(&samples.genotypes, 0.05, 13);

    let wrong = Model::new(poset, vec![50.0, 50.0], 1.0, 0.05).unwrap();
    let options = forward_options(200);

    let mut ctx = Context::new(99, false);
    let ll_truth = obs_log_likelihood(
        &noisy,
        &samples.sampling_times,
        &truth,
        &options,
        2,
        &mut ctx,
    )
    .unwrap();
    let mut ctx = Context::new(99, false);
    let ll_wrong = obs_log_likelihood(
        &noisy,
        &samples.sampling_times,
        &wrong,
        &options,
        2,
        &mut ctx,
    )
    .unwrap();

    assert!(ll_truth.is_finite());
    assert!(
        ll_truth > ll_wrong,
        "generating model should fit its own data better ({ll_truth} vs {ll_wrong})"
    );
}
