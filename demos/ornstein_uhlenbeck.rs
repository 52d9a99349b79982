//! Example: Ornstein-Uhlenbeck Generator Spectrum
//!
//! This example estimates the generator of a 1-D OU process, whose exact
//! eigenvalues are `0, -theta, -2 theta, ...`, and compares gEDMD with a
//! one-step EDMD fit, the recursive estimator and Kramers-Moyal regression.
//!
//! Run with: cargo run --example ornstein_uhlenbeck

use anyhow::Result;
use koopman_generator::{
    data::{make_rng, ornstein_uhlenbeck, OrnsteinUhlenbeck},
    features::Monomials,
    koopman::{
        diagnostics::{format_eigenvalues, relative_error},
        generator_to_transition, DriftDiffusion, GeneratorData, GeneratorEstimate,
        KramersMoyal, RecursiveGenerator, RegressionMethod, EDMD,
    },
    utils::setup_logging,
};
use ndarray::{s, Array1};

fn main() -> Result<()> {
    setup_logging("warn")?;
    println!("=== Ornstein-Uhlenbeck Generator ===\n");

    let theta = 1.0;
    let sigma = 1.0;
    let dt = 0.01;
    let n_steps = 100_000;
    let params = OrnsteinUhlenbeck::isotropic(1, theta, 0.0, sigma);
    let mut rng = make_rng(Some(7));
    let states = ornstein_uhlenbeck(&Array1::zeros(1), &params, n_steps, dt, &mut rng)?;

    println!("theta = {}, sigma = {}, dt = {}, {} steps\n", theta, sigma, dt, n_steps);

    let dictionary = Monomials::new(4);
    let data = GeneratorData::build(&dictionary, states.view(), dt)?;
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 1.0)?;
    let analysis = DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation)?;

    let eigenvalues = &analysis.spectral().eigenvalues;
    println!("Estimated eigenvalues: {}", format_eigenvalues(eigenvalues, 5));
    println!(
        "Exact eigenvalues:     {}",
        (0..5)
            .map(|n| format!("{:.4}", -(n as f64) * theta))
            .collect::<Vec<_>>()
            .join(", ")
    );

    println!("\nDrift vs. exact -theta x:");
    for l in [0, n_steps / 3, 2 * n_steps / 3] {
        let x = states[[0, l]];
        println!(
            "  x = {:>8.4}   b = {:>8.4}   exact = {:>8.4}",
            x,
            analysis.drift(l)?[0],
            -theta * x
        );
    }
    let a = analysis.mean_diffusion_matrix()?;
    println!("\nMean diffusion: {:.4} (exact {:.4})", a[[0, 0]], sigma * sigma);

    // Discrete-time cross-check
    let x = states.slice(s![.., ..n_steps]);
    let z = states.slice(s![.., 1..]);
    let edmd = EDMD::fit(&dictionary, x, z, dt)?;
    let transition = generator_to_transition(estimate.generator.view(), dt)?;
    println!("\n=== Cross-checks ===\n");
    println!(
        "|exp(dt L) - K| / |K|:      {:.6}",
        relative_error(transition.view(), edmd.koopman_matrix.view())
    );
    println!(
        "EDMD continuous rates:      {}",
        format_eigenvalues(&edmd.continuous_eigenvalues(), 5)
    );

    let mut online = RecursiveGenerator::new(data.size(), 1e-6)?;
    online.update_batch(data.psi.view(), data.dpsi.view())?;
    let batch = GeneratorEstimate::fit(&data, &RegressionMethod::GramPseudoinverse, 1.0)?;
    println!(
        "Recursive vs. batch:        {:.3e}",
        relative_error(online.estimate().view(), batch.generator.view())
    );

    let km = KramersMoyal::fit(&dictionary, states.view(), dt)?;
    println!(
        "Kramers-Moyal at x_0:       b = {:.4}, a = {:.4}",
        km.drift(0)?[0],
        km.diffusion_matrix(0)?[[0, 0]]
    );

    Ok(())
}
