//! Example: Soft Value Iteration on CartPole
//!
//! This example fits a generator over `(state, action)` pairs of a CartPole
//! recording and runs soft value iteration with the survival reward.
//!
//! Recorded data is read from `random-cartpole-states.npy` and
//! `random-cartpole-actions.npy` when present. Otherwise a synthetic
//! recording with uniformly random push directions is used.
//!
//! Run with: cargo run --example cartpole_control

use anyhow::Result;
use koopman_generator::{
    data::{load_trajectory, make_rng, Trajectory},
    experiment::run_control,
    koopman::diagnostics::format_eigenvalues,
    utils::{setup_logging, Config},
};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::StandardNormal;
use std::path::Path;

/// Random-action recording: a noisy walk whose cart velocity is nudged by
/// the chosen push direction, restarted once it leaves the survival box
fn synthetic_recording(samples: usize, seed: u64) -> Result<Trajectory> {
    let mut rng = make_rng(Some(seed));
    let mut states = Array2::zeros((4, samples));
    let mut actions = Array1::zeros(samples);
    let mut state = Array1::<f64>::zeros(4);
    for l in 0..samples {
        let action = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
        states.column_mut(l).assign(&state);
        actions[l] = action;

        let noise = Array1::from_shape_fn(4, |_| rng.sample::<f64, _>(StandardNormal) * 0.01);
        state = &state + &noise;
        state[1] += if action > 0.5 { 0.01 } else { -0.01 };
        state[0] += 0.02 * state[1];
        state[2] += 0.02 * state[3];
        if state[0].abs() > 2.4 || state[2].abs() > 12.0f64.to_radians() {
            state.fill(0.0);
        }
    }

    Ok(Trajectory::new(states, 1.0, "synthetic-cartpole")?.with_actions(actions)?)
}

fn main() -> Result<()> {
    setup_logging("info")?;
    println!("=== CartPole Soft Value Iteration ===\n");

    let mut config = Config::default();
    config.control.limit = Some(2000);

    let states_path = Path::new(&config.control.states_path);
    let actions_path = Path::new(&config.control.actions_path);
    let trajectory = if states_path.exists() && actions_path.exists() {
        println!("Loading {:?}", states_path);
        load_trajectory(states_path, Some(actions_path), config.control.limit, config.control.dt)?
    } else {
        println!("No recording found, generating random-action episodes");
        synthetic_recording(config.control.limit.unwrap_or(2000), 42)?
    };

    println!("Samples: {}, state dims: {}\n", trajectory.len(), trajectory.dim());

    let report = run_control(&config, &trajectory)?;

    println!("Dictionary size: {}", report.basis);
    println!("Leading eigenvalues: {}", format_eigenvalues(&report.eigenvalues, 8));

    let mean = report.values.mean().unwrap_or(0.0);
    println!("\nMean soft value: {:.4}", mean);
    println!("First values: {:.4}", report.values.slice(ndarray::s![..5.min(report.values.len())]));

    println!("\n{:>8} {:>12} {:>12} {:>12}", "Index", "pi(0|x)", "pi(1|x)", "Integral");
    println!("{}", "-".repeat(48));
    for (l, low, high, total) in &report.policy_checks {
        println!("{:>8} {:>12.4} {:>12.4} {:>12.6}", l, low, high, total);
    }

    Ok(())
}
