//! Koopman Generator CLI
//!
//! Command-line interface for generator estimation on simulated and recorded
//! trajectories.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use koopman_generator::{
    data::{load_trajectory, simulate, Process},
    experiment::{run_control, GeneratorExperiment, GeneratorReport},
    koopman::diagnostics::format_eigenvalues,
    utils::{setup_logging, Config},
};
use ndarray::{Array1, Array2};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "koopman_generator")]
#[command(about = "Stochastic Koopman Generator Estimation Tool", long_about = None)]
struct Cli {
    /// Configuration file (defaults are used when missing)
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the generator of a simulated Brownian motion
    Brownian {
        /// Noise scale (increments ~ N(0, delta² dt))
        #[arg(short, long)]
        delta: Option<f64>,

        /// Number of simulation steps
        #[arg(short, long)]
        steps: Option<usize>,

        /// State dimension
        #[arg(long)]
        dims: Option<usize>,
    },

    /// Estimate the generator of a simulated Ornstein–Uhlenbeck process
    Ou {
        /// Mean-reversion rate
        #[arg(long, default_value = "1.0")]
        theta: f64,

        /// Long-run mean
        #[arg(long, default_value = "0.0")]
        mu: f64,

        /// Noise scale
        #[arg(long, default_value = "1.0")]
        sigma: f64,

        /// Number of simulation steps
        #[arg(short, long)]
        steps: Option<usize>,

        /// State dimension
        #[arg(long)]
        dims: Option<usize>,
    },

    /// Run soft value iteration on a recorded CartPole trajectory
    Cartpole {
        /// States file (m × 4, .npy or CSV)
        #[arg(long)]
        states: Option<PathBuf>,

        /// Actions file (m, .npy or CSV)
        #[arg(long)]
        actions: Option<PathBuf>,

        /// Number of leading samples to use
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Write the default configuration file
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        Config::create_default(&cli.config)
            .with_context(|| format!("writing {:?}", cli.config))?;
        println!("Wrote default configuration to {:?}", cli.config);
        return Ok(());
    }

    let mut config = if cli.config.exists() {
        Config::load(&cli.config).with_context(|| format!("reading {:?}", cli.config))?
    } else {
        Config::default()
    };
    setup_logging(&config.logging.level)?;

    match cli.command {
        Commands::Brownian { delta, steps, dims } => {
            let default_delta = match config.simulation.process {
                Process::Brownian { delta } => delta,
                _ => 2.0,
            };
            config.simulation.process = Process::Brownian {
                delta: delta.unwrap_or(default_delta),
            };
            apply_overrides(&mut config, steps, dims);
            info!("Simulating Brownian motion");

            let trajectory = simulate(&config.simulation)?;
            let report = GeneratorExperiment::new(&config).run(&trajectory)?;
            print_report(&report, config.analysis.report_eigenvalues);
        }

        Commands::Ou {
            theta,
            mu,
            sigma,
            steps,
            dims,
        } => {
            config.simulation.process = Process::OrnsteinUhlenbeck { theta, mu, sigma };
            apply_overrides(&mut config, steps, dims);
            info!("Simulating Ornstein-Uhlenbeck process");

            let trajectory = simulate(&config.simulation)?;
            let report = GeneratorExperiment::new(&config).run(&trajectory)?;
            print_report(&report, config.analysis.report_eigenvalues);

            println!("\nExpected eigenvalues: 0, -{:.4}, -{:.4}, ...", theta, 2.0 * theta);
        }

        Commands::Cartpole {
            states,
            actions,
            limit,
        } => {
            let states = states.unwrap_or_else(|| PathBuf::from(&config.control.states_path));
            let actions = actions.unwrap_or_else(|| PathBuf::from(&config.control.actions_path));
            let limit = limit.or(config.control.limit);
            info!("Loading CartPole recording from {:?}", states);

            let trajectory = load_trajectory(states, Some(actions), limit, config.control.dt)?;
            let report = run_control(&config, &trajectory)?;

            println!("\n=== Soft Value Iteration ===\n");
            println!("Samples: {}", report.samples);
            println!("Dictionary size: {}", report.basis);
            println!(
                "Eigenvalues: {}",
                format_eigenvalues(&report.eigenvalues, config.analysis.report_eigenvalues)
            );

            let mean = report.values.mean().unwrap_or(0.0);
            let min = report.values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = report.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            println!("\nValues: mean {:.4}, min {:.4}, max {:.4}", mean, min, max);

            println!("\nPolicy checks:");
            for (l, low, high, total) in &report.policy_checks {
                println!(
                    "  x_{:<6} π(low) = {:.4}  π(high) = {:.4}  ∫π du = {:.6}",
                    l, low, high, total
                );
            }
        }

        Commands::InitConfig => {}
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, steps: Option<usize>, dims: Option<usize>) {
    if let Some(steps) = steps {
        config.simulation.n_steps = steps;
    }
    if let Some(dims) = dims {
        config.simulation.dims = dims;
    }
}

fn flatten(a: &Array2<f64>) -> Array1<f64> {
    a.iter().cloned().collect()
}

fn print_report(report: &GeneratorReport, eigenvalues: usize) {
    println!("\n=== Generator Estimation Results ===\n");
    println!("Trajectory: {} ({} samples, {} dims)", report.name, report.samples, report.dims);
    println!("Dictionary size: {}", report.basis);
    println!(
        "Method: {} on {} columns",
        report.estimate.method.name(),
        report.estimate.columns
    );
    println!("Relative residual: {:.6}", report.relative_residual);
    println!(
        "\nEigenvalues: {}",
        format_eigenvalues(&report.eigenvalues, eigenvalues)
    );

    if let Some(norm) = report.mean_drift_norm {
        println!("\nMean |b(x)|: {:.6}", norm);
    }
    if let Some(a) = &report.mean_diffusion {
        println!("Mean diffusion matrix:\n{:.4}", a);
    }
    if let Some(truncation) = &report.truncation {
        println!("Reduced drift truncation: {:?}", truncation);
    }

    if !report.sample_reports.is_empty() {
        println!("\nSamples:");
    }
    for sample in &report.sample_reports {
        println!("  x_{} = {:.4}", sample.index, sample.state);
        println!("    drift:         {:.4}", sample.drift);
        println!("    drift reduced: {:.4}", sample.drift_reduced);
        if let Some(a) = &sample.diffusion {
            let symmetric = sample.symmetric.unwrap_or(false);
            println!(
                "    diffusion:     {:.4} (symmetric: {})",
                flatten(a),
                symmetric
            );
        }
        if let Some(a) = &sample.diffusion_reduced {
            println!(
                "    diff. reduced: {:.4}",
                flatten(a)
            );
        }
        if let (Some(b), Some(a)) = (&sample.km_drift, &sample.km_diffusion) {
            println!(
                "    Kramers-Moyal: drift {:.4}, diffusion {:.4}",
                b,
                flatten(a)
            );
        }
    }

    println!("\nCross-checks:");
    if let Some(err) = report.transition_error {
        println!("  |exp(tL) - K| / |K|: {:.6}", err);
    }
    if let Some(dist) = report.edmd_spectral_distance {
        println!("  EDMD spectral distance: {:.6}", dist);
    }
    if let Some(err) = report.edmd_prediction_error {
        println!("  EDMD one-step prediction error: {:.6}", err);
    }
    if let Some(err) = report.recursive_error {
        println!("  Recursive vs batch: {:.3e}", err);
    }
    if let Some(a) = &report.km_mean_diffusion {
        println!("  Kramers-Moyal mean diffusion:\n{:.4}", a);
    }
}
