//! # Koopman Generator Estimation
//!
//! This crate estimates the infinitesimal generator of the stochastic Koopman
//! semigroup from sampled trajectories (gEDMD), and recovers drift and
//! diffusion of the underlying SDE from its spectrum.
//!
//! ## Modules
//!
//! - `data`: Brownian and Ornstein–Uhlenbeck simulation, trajectory loading
//! - `features`: Dictionaries (monomials, Gaussians) with gradients and Hessians
//! - `koopman`: gEDMD, regression methods, spectral analysis, EDMD, Kramers–Moyal
//! - `control`: Soft value iteration on extended states, Romberg quadrature
//! - `experiment`: End-to-end pipelines producing reports
//! - `utils`: Configuration and logging
//!
//! ## Example
//!
//! ```no_run
//! use koopman_generator::{
//!     simulate, DriftDiffusion, GeneratorData, GeneratorEstimate, Monomials, RegressionMethod,
//!     SimulationConfig,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let trajectory = simulate(&SimulationConfig::default())?;
//!     let dictionary = Monomials::new(2);
//!
//!     let data = GeneratorData::build(&dictionary, trajectory.states(), trajectory.dt())?;
//!     let estimate = GeneratorEstimate::fit(&data, &RegressionMethod::LeastSquares, 0.8)?;
//!
//!     let analysis = DriftDiffusion::new(estimate.generator.view(), &dictionary, &data.evaluation)?;
//!     println!("drift at x_0: {}", analysis.drift(0)?);
//!
//!     Ok(())
//! }
//! ```

pub mod control;
pub mod data;
pub mod error;
pub mod experiment;
pub mod features;
pub mod koopman;
pub mod utils;

// Re-export main types for convenience
pub use control::{CartpoleReward, Reward, SoftPolicy, SoftValueIteration};
pub use data::{load_trajectory, simulate, Process, Trajectory};
pub use error::{Error, Result};
pub use experiment::{run_control, ControlReport, GeneratorExperiment, GeneratorReport};
pub use features::{Dictionary, DictionaryEvaluation, Gaussians, Monomials};
pub use koopman::{
    DriftDiffusion, GeneratorData, GeneratorEstimate, KramersMoyal, RecursiveGenerator,
    RegressionMethod, SpectralDecomposition, Truncation, EDMD,
};
pub use utils::{setup_logging, Config, SimulationConfig};
