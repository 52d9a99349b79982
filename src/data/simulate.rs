//! Sample-path simulators for the benchmark processes
//!
//! - Brownian motion with a scalar diffusion coefficient
//! - Vectorised Ornstein-Uhlenbeck process (exact Gaussian transition)

use super::types::Trajectory;
use crate::utils::SimulationConfig;
use crate::error::{Error, Result};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stochastic process to simulate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Process {
    /// `dX = delta dW`
    Brownian { delta: f64 },
    /// `dX = -theta (X - mu) dt + sigma dW`, same parameters in every dimension
    OrnsteinUhlenbeck { theta: f64, mu: f64, sigma: f64 },
}

impl Default for Process {
    fn default() -> Self {
        Process::Brownian { delta: 1.0 }
    }
}

/// Per-dimension Ornstein-Uhlenbeck parameters
#[derive(Debug, Clone)]
pub struct OrnsteinUhlenbeck {
    /// Mean-reversion rates
    pub theta: Array1<f64>,
    /// Long-run means
    pub mu: Array1<f64>,
    /// Diffusion coefficients
    pub sigma: Array1<f64>,
}

impl OrnsteinUhlenbeck {
    /// Same parameters replicated over `dim` independent coordinates
    pub fn isotropic(dim: usize, theta: f64, mu: f64, sigma: f64) -> Self {
        Self {
            theta: Array1::from_elem(dim, theta),
            mu: Array1::from_elem(dim, mu),
            sigma: Array1::from_elem(dim, sigma),
        }
    }

    pub fn dim(&self) -> usize {
        self.theta.len()
    }

    fn validate(&self) -> Result<()> {
        let d = self.dim();
        if self.mu.len() != d || self.sigma.len() != d {
            return Err(Error::shape(
                format!("{} parameters per vector", d),
                format!("mu: {}, sigma: {}", self.mu.len(), self.sigma.len()),
            ));
        }
        if self.theta.iter().any(|&t| t < 0.0) || self.sigma.iter().any(|&s| s < 0.0) {
            return Err(Error::InvalidInput(
                "theta and sigma must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_step(dt: f64) -> Result<()> {
    if !(dt > 0.0) || !dt.is_finite() {
        return Err(Error::InvalidInput(format!(
            "time step must be positive and finite, got {}",
            dt
        )));
    }
    Ok(())
}

/// Simulate Brownian motion started at `x0`
///
/// Each increment is `N(0, delta² · dt)`, independently per coordinate.
///
/// # Returns
///
/// `d × (n_steps + 1)` matrix whose first column is `x0`
pub fn brownian<R: Rng + ?Sized>(
    x0: &Array1<f64>,
    n_steps: usize,
    dt: f64,
    delta: f64,
    rng: &mut R,
) -> Result<Array2<f64>> {
    check_step(dt)?;
    if delta < 0.0 {
        return Err(Error::InvalidInput(format!(
            "diffusion coefficient must be non-negative, got {}",
            delta
        )));
    }

    let d = x0.len();
    let scale = delta * dt.sqrt();
    let mut path = Array2::zeros((d, n_steps + 1));
    path.column_mut(0).assign(x0);

    for t in 1..=n_steps {
        for i in 0..d {
            let xi: f64 = rng.sample(StandardNormal);
            path[[i, t]] = path[[i, t - 1]] + scale * xi;
        }
    }

    Ok(path)
}

/// Simulate a vectorised Ornstein-Uhlenbeck process started at `x0`
///
/// Uses the exact transition
/// `X' = mu + (X - mu) e^{-theta dt} + sigma sqrt((1 - e^{-2 theta dt}) / (2 theta)) xi`,
/// which reduces to a Brownian increment for `theta = 0`.
pub fn ornstein_uhlenbeck<R: Rng + ?Sized>(
    x0: &Array1<f64>,
    params: &OrnsteinUhlenbeck,
    n_steps: usize,
    dt: f64,
    rng: &mut R,
) -> Result<Array2<f64>> {
    check_step(dt)?;
    params.validate()?;
    let d = x0.len();
    if params.dim() != d {
        return Err(Error::shape(
            format!("{} OU parameters", d),
            format!("{}", params.dim()),
        ));
    }

    let decay: Vec<f64> = params.theta.iter().map(|&th| (-th * dt).exp()).collect();
    let noise: Vec<f64> = params
        .theta
        .iter()
        .zip(params.sigma.iter())
        .map(|(&th, &sig)| {
            if th > 0.0 {
                sig * ((1.0 - (-2.0 * th * dt).exp()) / (2.0 * th)).sqrt()
            } else {
                sig * dt.sqrt()
            }
        })
        .collect();

    let mut path = Array2::zeros((d, n_steps + 1));
    path.column_mut(0).assign(x0);

    for t in 1..=n_steps {
        for i in 0..d {
            let xi: f64 = rng.sample(StandardNormal);
            let prev = path[[i, t - 1]];
            path[[i, t]] = params.mu[i] + (prev - params.mu[i]) * decay[i] + noise[i] * xi;
        }
    }

    Ok(path)
}

/// Build the random generator for a simulation run
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Simulate the configured process into a trajectory
pub fn simulate(config: &SimulationConfig) -> Result<Trajectory> {
    if config.dims == 0 {
        return Err(Error::InvalidInput(
            "simulation needs at least one dimension".to_string(),
        ));
    }
    let mut rng = make_rng(config.seed);
    let x0 = Array1::from_elem(config.dims, config.x0);

    let (states, name) = match &config.process {
        Process::Brownian { delta } => (
            brownian(&x0, config.n_steps, config.dt, *delta, &mut rng)?,
            "brownian",
        ),
        Process::OrnsteinUhlenbeck { theta, mu, sigma } => {
            let params = OrnsteinUhlenbeck::isotropic(config.dims, *theta, *mu, *sigma);
            (
                ornstein_uhlenbeck(&x0, &params, config.n_steps, config.dt, &mut rng)?,
                "ornstein_uhlenbeck",
            )
        }
    };

    debug!(
        process = name,
        dims = config.dims,
        samples = states.ncols(),
        "simulated sample path"
    );

    Trajectory::new(states, config.dt, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brownian_shape_and_start() {
        let mut rng = make_rng(Some(7));
        let x0 = Array1::from_elem(3, 50.0);
        let path = brownian(&x0, 100, 0.1, 2.0, &mut rng).unwrap();

        assert_eq!(path.dim(), (3, 101));
        assert!(path.column(0).iter().all(|&v| v == 50.0));
    }

    #[test]
    fn test_brownian_increment_variance() {
        let mut rng = make_rng(Some(11));
        let x0 = Array1::zeros(1);
        let n = 20_000;
        let dt = 0.5;
        let path = brownian(&x0, n, dt, 2.0, &mut rng).unwrap();

        let var = (1..=n)
            .map(|t| (path[[0, t]] - path[[0, t - 1]]).powi(2))
            .sum::<f64>()
            / n as f64;

        // delta^2 * dt = 2.0
        assert!((var - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_ou_reverts_to_mean() {
        let mut rng = make_rng(Some(3));
        let params = OrnsteinUhlenbeck::isotropic(2, 1.0, 0.0, 0.0);
        let x0 = Array1::from_elem(2, 5.0);
        let path = ornstein_uhlenbeck(&x0, &params, 50, 0.1, &mut rng).unwrap();

        // Noise-free: deterministic exponential decay
        let expected = 5.0 * (-5.0f64).exp();
        assert!((path[[0, 50]] - expected).abs() < 1e-10);
    }

    #[test]
    fn test_ou_shape_mismatch() {
        let mut rng = make_rng(Some(1));
        let params = OrnsteinUhlenbeck::isotropic(2, 1.0, 0.0, 1.0);
        let x0 = Array1::zeros(3);
        assert!(ornstein_uhlenbeck(&x0, &params, 10, 0.1, &mut rng).is_err());
    }

    #[test]
    fn test_negative_dt_rejected() {
        let mut rng = make_rng(Some(1));
        assert!(brownian(&Array1::zeros(1), 10, -1.0, 1.0, &mut rng).is_err());
    }

    #[test]
    fn test_simulate_from_config() {
        let config = SimulationConfig {
            process: Process::OrnsteinUhlenbeck {
                theta: 2.0,
                mu: 0.0,
                sigma: 1.0,
            },
            dims: 2,
            n_steps: 200,
            dt: 0.01,
            x0: 0.0,
            seed: Some(42),
        };
        let traj = simulate(&config).unwrap();

        assert_eq!(traj.dim(), 2);
        assert_eq!(traj.len(), 201);
        assert_eq!(traj.name(), "ornstein_uhlenbeck");
    }
}
