//! Koopman generator estimation for stochastic processes
//!
//! This module provides implementations of:
//! - gEDMD (finite-difference generator estimates and regression)
//! - Spectral analysis with drift and diffusion reconstruction
//! - EDMD for the discrete-time Koopman operator
//! - Recursive gEDMD and Kramers–Moyal regression
//! - Diagnostics

pub mod diagnostics;
mod edmd;
mod gedmd;
mod kramers_moyal;
pub mod linalg;
mod recursive;
mod regression;
mod spectral;

pub use edmd::{generator_to_transition, EDMD};
pub use gedmd::{dpsi, generator_action, GeneratorData};
pub use kramers_moyal::{upper_pairs, KramersMoyal};
pub use recursive::RecursiveGenerator;
pub use regression::{estimate_generator, ols, GeneratorEstimate, RegressionMethod};
pub use spectral::{
    selector_first_order, selector_second_order, DriftDiffusion, SpectralDecomposition,
    Truncation,
};
