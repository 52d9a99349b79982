//! Configuration management
//!
//! This module handles loading and managing experiment configuration.

use crate::control::{RombergOptions, SoftValueIteration};
use crate::data::Process;
use crate::error::{Error, Result};
use crate::features::{Dictionary, Discretization, Gaussians, Monomials};
use crate::koopman::{RegressionMethod, Truncation};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub dims: usize,
    pub n_steps: usize,
    pub dt: f64,
    pub x0: f64,
    pub seed: Option<u64>,
    pub process: Process,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dims: 2,
            n_steps: 1000,
            dt: 0.01,
            x0: 50.0,
            seed: Some(42),
            process: Process::Brownian { delta: 2.0 },
        }
    }
}

/// Dictionary configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DictionaryConfig {
    /// Monomials up to `order`
    Monomials { order: usize },
    /// Gaussians centred on a box grid
    Gaussians {
        bounds: Vec<(f64, f64)>,
        boxes: Vec<usize>,
        bandwidth: f64,
    },
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        DictionaryConfig::Monomials { order: 2 }
    }
}

impl DictionaryConfig {
    /// Build the dictionary for `dim`-dimensional samples
    pub fn build(&self, dim: usize) -> Result<Box<dyn Dictionary>> {
        match self {
            DictionaryConfig::Monomials { order } => Ok(Box::new(Monomials::new(*order))),
            DictionaryConfig::Gaussians {
                bounds,
                boxes,
                bandwidth,
            } => {
                if bounds.len() != dim {
                    return Err(Error::Config(format!(
                        "Gaussian grid has {} dimensions, data has {}",
                        bounds.len(),
                        dim
                    )));
                }
                let omega = Discretization::new(bounds.clone(), boxes.clone())?;
                Ok(Box::new(Gaussians::on_grid(&omega, *bandwidth)?))
            }
        }
    }
}

/// Generator estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(flatten)]
    pub method: RegressionMethod,
    /// Difference-quotient step; the trajectory's own step when unset
    pub time_step: Option<f64>,
    /// Leading fraction of the samples used for fitting
    pub train_fraction: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            method: RegressionMethod::LeastSquares,
            time_step: None,
            train_fraction: 0.8,
        }
    }
}

/// Spectral analysis and diagnostics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of sample indices printed in reports
    pub report_samples: usize,
    /// Eigenvalues printed in reports
    pub report_eigenvalues: usize,
    pub symmetry_rtol: f64,
    pub symmetry_atol: f64,
    /// Compare `exp(τL)` with a one-step EDMD fit
    pub edmd_check: bool,
    /// Cross-check with Kramers–Moyal regression
    pub kramers_moyal: bool,
    /// Starting regularisation of the recursive estimator; skipped when unset
    pub recursive_regularization: Option<f64>,
    /// Reduced drift truncation; slowest tenth of the spectrum when unset
    pub truncation: Option<Truncation>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            report_samples: 5,
            report_eigenvalues: 8,
            symmetry_rtol: 1e-2,
            symmetry_atol: 1e-2,
            edmd_check: true,
            kramers_moyal: true,
            recursive_regularization: Some(1e-6),
            truncation: None,
        }
    }
}

impl AnalysisConfig {
    /// Truncation for a `k`-element spectrum
    pub fn truncation_for(&self, k: usize) -> Truncation {
        self.truncation.unwrap_or_else(|| Truncation::default_for(k))
    }
}

/// CartPole control loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub states_path: String,
    pub actions_path: String,
    /// Number of leading samples to load
    pub limit: Option<usize>,
    /// Time between recorded samples
    pub dt: f64,
    /// Monomial order over the extended states
    pub order: usize,
    pub timesteps: usize,
    pub cutoff: usize,
    pub lambda: f64,
    pub divmax: usize,
    pub action_bounds: Option<(f64, f64)>,
    pub method: RegressionMethod,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            states_path: "random-cartpole-states.npy".to_string(),
            actions_path: "random-cartpole-actions.npy".to_string(),
            limit: Some(5000),
            dt: 1.0,
            order: 2,
            timesteps: 3,
            cutoff: 8,
            lambda: 1.0,
            divmax: 30,
            action_bounds: Some((0.0, 1.0)),
            method: RegressionMethod::ReducedRank { rank: 8 },
        }
    }
}

impl ControlConfig {
    /// Soft value iteration settings
    pub fn solver(&self) -> SoftValueIteration {
        SoftValueIteration {
            timesteps: self.timesteps,
            cutoff: self.cutoff,
            lambda: self.lambda,
            romberg: RombergOptions {
                divmax: self.divmax,
                ..RombergOptions::default()
            },
            action_bounds: self.action_bounds,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub dictionary: DictionaryConfig,
    pub estimator: EstimatorConfig,
    pub analysis: AnalysisConfig,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file or use default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        config.save(path)
    }
}
