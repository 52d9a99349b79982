//! End-to-end checks on simulated processes with known generators

use koopman_generator::{
    data::{load_trajectory, make_rng, simulate, Process, Trajectory},
    experiment::{run_control, GeneratorExperiment},
    features::Monomials,
    koopman::{
        diagnostics::relative_error, generator_to_transition, DriftDiffusion, GeneratorData,
        GeneratorEstimate, RegressionMethod, EDMD,
    },
    utils::{Config, DictionaryConfig, SimulationConfig},
};
use ndarray::{Array1, Array2};
use ndarray_npy::write_npy;
use rand::Rng;

fn ou_config(dims: usize, n_steps: usize, seed: u64) -> SimulationConfig {
    SimulationConfig {
        dims,
        n_steps,
        dt: 0.01,
        x0: 0.0,
        seed: Some(seed),
        process: Process::OrnsteinUhlenbeck {
            theta: 1.0,
            mu: 0.0,
            sigma: 1.0,
        },
    }
}

#[test]
fn brownian_drift_vanishes() {
    let config = SimulationConfig {
        dims: 1,
        n_steps: 5000,
        dt: 1.0,
        x0: 0.0,
        seed: Some(1),
        process: Process::Brownian { delta: 1.0 },
    };
    let trajectory = simulate(&config).unwrap();
    let dictionary = Monomials::new(2);
    let data = GeneratorData::build(&dictionary, trajectory.states(), trajectory.dt()).unwrap();
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 1.0).unwrap();
    let analysis =
        DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation).unwrap();

    let m = trajectory.len();
    let mean_drift: f64 = (0..m)
        .map(|l| analysis.drift(l).unwrap()[0].abs())
        .sum::<f64>()
        / m as f64;
    assert!(mean_drift < 0.2, "mean |b| = {}", mean_drift);
}

#[test]
fn brownian_diffusion_is_identity() {
    let config = SimulationConfig {
        dims: 2,
        n_steps: 10_000,
        dt: 1.0,
        x0: 0.0,
        seed: Some(6),
        process: Process::Brownian { delta: 1.0 },
    };
    let trajectory = simulate(&config).unwrap();
    let dictionary = Monomials::new(2);
    let data = GeneratorData::build(&dictionary, trajectory.states(), trajectory.dt()).unwrap();
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 1.0).unwrap();
    let analysis =
        DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation).unwrap();

    let a = analysis.mean_diffusion_matrix().unwrap();
    let error = relative_error(a.view(), Array2::<f64>::eye(2).view());
    assert!(error < 0.3, "mean diffusion {}", a);
}

#[test]
fn ou_second_eigenvalue_matches_rate() {
    let trajectory = simulate(&ou_config(1, 100_000, 2)).unwrap();
    let dictionary = Monomials::new(2);
    let data = GeneratorData::build(&dictionary, trajectory.states(), trajectory.dt()).unwrap();
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 1.0).unwrap();
    let analysis =
        DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation).unwrap();

    let eigenvalues = &analysis.spectral().eigenvalues;
    assert_eq!(eigenvalues.len(), 3);
    assert!(eigenvalues[0].norm() < 1e-6);
    assert!(
        (eigenvalues[1].re + 1.0).abs() < 0.25,
        "second eigenvalue {}",
        eigenvalues[1]
    );
}

#[test]
fn stationary_ou_diffusion_is_identity() {
    let trajectory = simulate(&ou_config(2, 50_000, 3)).unwrap();
    let dictionary = Monomials::new(2);
    let data = GeneratorData::build(&dictionary, trajectory.states(), trajectory.dt()).unwrap();
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 1.0).unwrap();
    let analysis =
        DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation).unwrap();

    let a = analysis.mean_diffusion_matrix().unwrap();
    let error = relative_error(a.view(), Array2::<f64>::eye(2).view());
    assert!(error < 0.3, "mean diffusion {}", a);
}

#[test]
fn generator_exponential_matches_edmd() {
    let trajectory = simulate(&ou_config(1, 50_000, 4)).unwrap();
    let dictionary = Monomials::new(2);
    let dt = trajectory.dt();

    let data = GeneratorData::build(&dictionary, trajectory.states(), dt).unwrap();
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 1.0).unwrap();
    let edmd = EDMD::from_trajectory(&dictionary, &trajectory).unwrap();

    let transition = generator_to_transition(estimate.generator.view(), dt).unwrap();
    let error = relative_error(transition.view(), edmd.koopman_matrix.view());
    assert!(error < 0.05, "relative error {}", error);
}

#[test]
fn experiment_runs_with_gaussian_dictionary() {
    let mut config = Config::default();
    config.simulation = ou_config(1, 10_000, 5);
    config.dictionary = DictionaryConfig::Gaussians {
        bounds: vec![(-2.0, 2.0)],
        boxes: vec![8],
        bandwidth: 0.5,
    };

    let trajectory = simulate(&config.simulation).unwrap();
    let report = GeneratorExperiment::new(&config).run(&trajectory).unwrap();

    assert_eq!(report.basis, 8);
    assert_eq!(report.eigenvalues.len(), 8);
    assert!(report.mean_drift_norm.is_none());
    assert!(report.sample_reports.is_empty());
    assert!(report.transition_error.is_some());
    assert!(report.recursive_error.is_some());
    assert!(report.km_mean_diffusion.is_some());
}

fn random_recording(samples: usize) -> Trajectory {
    let mut rng = make_rng(Some(9));
    let states = Array2::from_shape_fn((4, samples), |_| rng.gen_range(-0.2..0.2));
    let actions = Array1::from_shape_fn(samples, |_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 });
    Trajectory::new(states, 1.0, "random")
        .unwrap()
        .with_actions(actions)
        .unwrap()
}

#[test]
fn control_policy_is_normalised() {
    let config = Config::default();
    let trajectory = random_recording(400);
    let report = run_control(&config, &trajectory).unwrap();

    assert_eq!(report.basis, 21);
    assert_eq!(report.values.len(), 400);
    assert!(report.values.iter().all(|v| v.is_finite()));
    assert!(!report.policy_checks.is_empty());
    for (_, low, high, total) in &report.policy_checks {
        assert!(*low > 0.0 && *high > 0.0);
        assert!((total - 1.0).abs() < 1e-4, "policy integral {}", total);
    }
}

#[test]
fn recorded_npy_trajectory_loads() {
    let dir = tempfile::tempdir().unwrap();
    let states_path = dir.path().join("states.npy");
    let actions_path = dir.path().join("actions.npy");

    let states = Array2::from_shape_fn((30, 4), |(i, j)| (i * 4 + j) as f64);
    let actions = Array1::from_shape_fn(30, |i| (i % 2) as i64);
    write_npy(&states_path, &states).unwrap();
    write_npy(&actions_path, &actions).unwrap();

    let trajectory = load_trajectory(&states_path, Some(&actions_path), Some(20), 1.0).unwrap();
    assert_eq!(trajectory.dim(), 4);
    assert_eq!(trajectory.len(), 20);
    assert_eq!(trajectory.states()[[2, 5]], 22.0);
    assert_eq!(trajectory.extended_states().nrows(), 5);
    assert_eq!(trajectory.actions().unwrap()[3], 1.0);
}
