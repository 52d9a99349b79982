//! Example: Generator of Brownian Motion
//!
//! This example simulates a 2-D Brownian motion, fits the generator with
//! every regression method and reads drift and diffusion off the spectrum.
//! The true generator is `(delta² / 2) Δ`: zero drift, diffusion `delta² I`.
//!
//! Run with: cargo run --example brownian_generator

use anyhow::Result;
use koopman_generator::{
    data::{brownian, make_rng},
    features::Monomials,
    koopman::{
        diagnostics::format_eigenvalues, DriftDiffusion, GeneratorData, GeneratorEstimate,
        RegressionMethod, Truncation,
    },
    utils::setup_logging,
};
use ndarray::Array1;

fn main() -> Result<()> {
    setup_logging("warn")?;
    println!("=== Brownian Motion Generator ===\n");

    let delta = 2.0;
    let dt = 0.01;
    let n_steps = 10_000;
    let mut rng = make_rng(Some(42));
    let x0 = Array1::from_elem(2, 0.0);
    let states = brownian(&x0, n_steps, dt, delta, &mut rng)?;

    println!("Simulated {} steps, dt = {}, delta = {}", n_steps, dt, delta);
    println!("Expected diffusion: {:.2} on the diagonal\n", delta * delta);

    let dictionary = Monomials::new(2);
    let data = GeneratorData::build(&dictionary, states.view(), dt)?;
    println!("Dictionary: {} functions\n", data.size());

    let methods = [
        RegressionMethod::LeastSquares,
        RegressionMethod::GramPseudoinverse,
        RegressionMethod::ReducedRank { rank: 4 },
        RegressionMethod::TruncatedSvd { rank: 4 },
        RegressionMethod::Sindy {
            threshold: 0.1,
            iterations: 10,
        },
    ];

    println!(
        "{:>20} {:>12} {:>12} {:>12}",
        "Method", "Mean |b|", "a_11", "a_22"
    );
    println!("{}", "-".repeat(60));

    for method in &methods {
        let estimate = GeneratorEstimate::fit(&data, method, 0.8)?;
        let analysis =
            DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation)?;

        let mut drift_norm = 0.0;
        for l in 0..data.evaluation.samples() {
            drift_norm += analysis.drift(l)?.iter().map(|v| v * v).sum::<f64>().sqrt();
        }
        drift_norm /= data.evaluation.samples() as f64;
        let a = analysis.mean_diffusion_matrix()?;

        println!(
            "{:>20} {:>12.4} {:>12.4} {:>12.4}",
            method.name(),
            drift_norm,
            a[[0, 0]],
            a[[1, 1]]
        );
    }

    // Spectrum of the least-squares fit
    let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 0.8)?;
    let analysis = DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation)?;
    println!(
        "\nEigenvalues: {}",
        format_eigenvalues(&analysis.spectral().eigenvalues, 6)
    );

    println!("\nDrift at selected samples (full vs. truncated to 2 modes):");
    for l in [0, n_steps / 4, n_steps / 2] {
        let full = analysis.drift(l)?;
        let reduced = analysis.drift_reduced(l, Truncation::SlowestModes { count: 2 })?;
        println!("  x_{:<6} {:.4}   {:.4}", l, full, reduced);
    }

    Ok(())
}
