//! Soft value iteration driven by an estimated generator
//!
//! Works on extended states `x̃ = (x, u)` whose dictionary the generator was
//! fitted on. Each iteration:
//!
//! 1. regresses the current values on the dictionary, `B_v = ols(Psiᵀ, V)`,
//!    and projects onto the generator eigenbasis, `modes = Ξ⁻¹ B_v`
//! 2. approximates `LV(l, u) = Re Σ_{ℓ<cutoff} λ_ℓ φ_ℓ(ψ(x_l, u)) modes_ℓ`
//! 3. forms the softmax policy
//!    `π(u|l) ∝ exp((r(x_l, u) + LV(l, u)) / λ)` over the action interval
//! 4. updates `V(l) = ∫ [r − λ ln π + LV] π du`
//!
//! The iteration count is fixed; there is no convergence check.

use super::quadrature::{romberg, RombergOptions};
use super::reward::Reward;
use crate::data::Trajectory;
use crate::error::{Error, Result};
use crate::features::Dictionary;
use crate::koopman::linalg::complex_inverse;
use crate::koopman::{ols, SpectralDecomposition};
use ndarray::{s, Array1, Array2, ArrayView2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Soft value iteration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftValueIteration {
    /// Number of outer iterations
    pub timesteps: usize,
    /// Number of slowest eigen-components used for `LV`
    pub cutoff: usize,
    /// Entropy temperature λ
    pub lambda: f64,
    /// Quadrature settings for every action integral
    pub romberg: RombergOptions,
    /// Action interval; defaults to the range of the recorded actions
    pub action_bounds: Option<(f64, f64)>,
}

impl Default for SoftValueIteration {
    fn default() -> Self {
        Self {
            timesteps: 100,
            cutoff: 8,
            lambda: 0.05,
            romberg: RombergOptions {
                divmax: 30,
                ..RombergOptions::default()
            },
            action_bounds: None,
        }
    }
}

impl SoftValueIteration {
    /// Run the iteration on a recorded trajectory with actions
    ///
    /// # Arguments
    ///
    /// * `generator` - Generator fitted on the extended states (k × k)
    /// * `dictionary` - Dictionary over extended states
    /// * `trajectory` - States with recorded actions
    /// * `reward` - Immediate reward
    ///
    /// # Returns
    ///
    /// Final values per state index and the policy of the last iteration
    pub fn run<'a, D, R>(
        &self,
        generator: ArrayView2<f64>,
        dictionary: &'a D,
        trajectory: &'a Trajectory,
        reward: &'a R,
    ) -> Result<(Array1<f64>, SoftPolicy<'a, D, R>)>
    where
        D: Dictionary + ?Sized,
        R: Reward + ?Sized,
    {
        if !(self.lambda > 0.0) {
            return Err(Error::InvalidInput(format!(
                "temperature must be positive, got {}",
                self.lambda
            )));
        }
        if trajectory.actions().is_none() {
            return Err(Error::InvalidInput(
                "soft value iteration needs recorded actions".to_string(),
            ));
        }
        let bounds = self
            .action_bounds
            .or_else(|| trajectory.action_bounds())
            .ok_or_else(|| Error::InvalidInput("no action range available".to_string()))?;
        if !(bounds.0 < bounds.1) {
            return Err(Error::InvalidInput(format!(
                "empty action range [{}, {}]",
                bounds.0, bounds.1
            )));
        }

        let psi = dictionary.evaluate(trajectory.extended_states().view())?;
        let k = psi.nrows();
        if generator.dim() != (k, k) {
            return Err(Error::shape(
                format!("{}×{} generator", k, k),
                format!("{:?}", generator.dim()),
            ));
        }

        let spectral = SpectralDecomposition::new(generator)?;
        let inverse = complex_inverse(spectral.eigenvectors.view())?;
        let cutoff = self.cutoff.clamp(1, k);
        let eigen = Eigenbasis {
            eigenvalues: spectral.eigenvalues[..cutoff].to_vec(),
            eigenvectors: spectral.eigenvectors.slice(s![.., ..cutoff]).to_owned(),
            inverse: inverse.slice(s![..cutoff, ..]).to_owned(),
        };

        info!(
            states = trajectory.len(),
            basis = k,
            cutoff,
            lambda = self.lambda,
            "starting soft value iteration"
        );

        let mut values = Array1::zeros(trajectory.len());
        let mut policy = SoftPolicy::build(
            self,
            &eigen,
            dictionary,
            trajectory,
            reward,
            psi.view(),
            &values,
            bounds,
        )?;

        for t in 0..self.timesteps {
            if t > 0 {
                policy = SoftPolicy::build(
                    self,
                    &eigen,
                    dictionary,
                    trajectory,
                    reward,
                    psi.view(),
                    &values,
                    bounds,
                )?;
            }

            let mut updated = Array1::zeros(values.len());
            for l in 0..values.len() {
                updated[l] = policy.value(l)?;
            }
            let change = updated
                .iter()
                .zip(values.iter())
                .map(|(a, b): (&f64, &f64)| (a - b).abs())
                .fold(0.0, f64::max);
            values = updated;

            info!(
                iteration = t + 1,
                mean_value = values.mean().unwrap_or(0.0),
                max_change = change,
                "soft value iteration step"
            );
        }

        Ok((values, policy))
    }
}

/// Slowest eigen-components of the generator
#[derive(Debug, Clone)]
struct Eigenbasis {
    eigenvalues: Vec<Complex64>,
    /// Columns `ξ_ℓ`, k × cutoff
    eigenvectors: Array2<Complex64>,
    /// Leading rows of `Ξ⁻¹`, cutoff × k
    inverse: Array2<Complex64>,
}

/// Softmax policy over a continuous action interval
pub struct SoftPolicy<'a, D: ?Sized, R: ?Sized> {
    dictionary: &'a D,
    reward: &'a R,
    trajectory: &'a Trajectory,
    eigen: Eigenbasis,
    modes: Vec<Complex64>,
    lambda: f64,
    bounds: (f64, f64),
    romberg: RombergOptions,
    /// `ln ∫ exp(exponent) du` per state index
    log_partition: Vec<f64>,
}

impl<'a, D, R> SoftPolicy<'a, D, R>
where
    D: Dictionary + ?Sized,
    R: Reward + ?Sized,
{
    #[allow(clippy::too_many_arguments)]
    fn build(
        settings: &SoftValueIteration,
        eigen: &Eigenbasis,
        dictionary: &'a D,
        trajectory: &'a Trajectory,
        reward: &'a R,
        psi: ArrayView2<f64>,
        values: &Array1<f64>,
        bounds: (f64, f64),
    ) -> Result<Self> {
        let b_v = ols(psi, values.view())?;
        let b_v = b_v.mapv(|v| Complex64::new(v, 0.0));
        let modes = eigen.inverse.dot(&b_v).to_vec();

        let mut policy = Self {
            dictionary,
            reward,
            trajectory,
            eigen: eigen.clone(),
            modes,
            lambda: settings.lambda,
            bounds,
            romberg: settings.romberg,
            log_partition: Vec::new(),
        };
        policy.log_partition = (0..trajectory.len())
            .map(|l| policy.partition(l))
            .collect::<Result<Vec<_>>>()?;

        debug!(states = policy.log_partition.len(), "normalised soft policy");
        Ok(policy)
    }

    /// Action interval
    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    /// Number of state indices the policy is defined on
    pub fn len(&self) -> usize {
        self.log_partition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_partition.is_empty()
    }

    fn check_index(&self, l: usize) -> Result<()> {
        if l >= self.trajectory.len() {
            return Err(Error::InvalidInput(format!(
                "state index {} out of range (0..{})",
                l,
                self.trajectory.len()
            )));
        }
        Ok(())
    }

    /// `LV(l, u)` from the truncated eigen-expansion
    pub fn generator_value(&self, l: usize, u: f64) -> Result<f64> {
        self.check_index(l)?;
        let states = self.trajectory.states();
        let state = states.column(l);
        let extended: Array1<f64> = state.iter().cloned().chain(std::iter::once(u)).collect();
        let psi = self.dictionary.evaluate_point(extended.view())?;

        let mut total = Complex64::new(0.0, 0.0);
        for (idx, &lambda) in self.eigen.eigenvalues.iter().enumerate() {
            let phi: Complex64 = self
                .eigen
                .eigenvectors
                .column(idx)
                .iter()
                .zip(psi.iter())
                .map(|(xi, &p)| *xi * p)
                .sum();
            total += lambda * phi * self.modes[idx];
        }
        Ok(total.re)
    }

    /// `(r(x_l, u) + LV(l, u)) / λ`
    fn exponent(&self, l: usize, u: f64) -> Result<f64> {
        let r = self.reward.reward(self.trajectory.states().column(l), u);
        Ok((r + self.generator_value(l, u)?) / self.lambda)
    }

    /// Integrate a fallible integrand, surfacing the first error
    fn integrate<F>(&self, mut f: F) -> Result<f64>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let mut failure = None;
        let value = romberg(
            |u| match f(u) {
                Ok(v) => v,
                Err(e) => {
                    failure.get_or_insert(e);
                    f64::NAN
                }
            },
            self.bounds.0,
            self.bounds.1,
            &self.romberg,
        );
        match failure {
            Some(e) => Err(e),
            None => Ok(value),
        }
    }

    /// `ln ∫ exp(exponent(l, u)) du`, shifted for overflow safety
    fn partition(&self, l: usize) -> Result<f64> {
        let (a, b) = self.bounds;
        let shift = [a, 0.5 * (a + b), b]
            .iter()
            .map(|&u| self.exponent(l, u))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);

        let z = self.integrate(|u| Ok((self.exponent(l, u)? - shift).exp()))?;
        if !(z > 0.0) || !z.is_finite() {
            return Err(Error::InvalidInput(format!(
                "policy normaliser for state {} is {}",
                l, z
            )));
        }
        Ok(shift + z.ln())
    }

    /// `ln π(u|l)`
    pub fn log_density(&self, u: f64, l: usize) -> Result<f64> {
        self.check_index(l)?;
        if u < self.bounds.0 || u > self.bounds.1 {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(self.exponent(l, u)? - self.log_partition[l])
    }

    /// Policy density `π(u|l)`; zero outside the action interval
    pub fn density(&self, u: f64, l: usize) -> Result<f64> {
        Ok(self.log_density(u, l)?.exp())
    }

    /// `V(l) = ∫ [r − λ ln π + LV] π du`
    pub fn value(&self, l: usize) -> Result<f64> {
        self.check_index(l)?;
        let states = self.trajectory.states();
        let state = states.column(l);
        self.integrate(|u| {
            let log_pi = self.log_density(u, l)?;
            let r = self.reward.reward(state, u);
            let lv = self.generator_value(l, u)?;
            Ok((r - self.lambda * log_pi + lv) * log_pi.exp())
        })
    }

    /// Log-normaliser of the policy at state `l`
    pub fn log_partition(&self, l: usize) -> Result<f64> {
        self.check_index(l)?;
        Ok(self.log_partition[l])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Monomials;
    use ndarray::{array, ArrayView1};

    struct ActionReward;

    impl Reward for ActionReward {
        fn reward(&self, _state: ArrayView1<f64>, action: f64) -> f64 {
            action
        }
    }

    fn trajectory() -> Trajectory {
        Trajectory::new(array![[0.0, 0.5, 1.0, -0.5, 0.2]], 1.0, "test")
            .unwrap()
            .with_actions(array![0.0, 1.0, 0.3, 0.7, 0.5])
            .unwrap()
    }

    fn settings() -> SoftValueIteration {
        SoftValueIteration {
            timesteps: 2,
            cutoff: 3,
            lambda: 0.5,
            ..SoftValueIteration::default()
        }
    }

    #[test]
    fn test_policy_integrates_to_one() {
        let traj = trajectory();
        let generator = Array2::from_diag(&array![0.0, -1.0, -0.5]);
        let dict = Monomials::new(1);
        let (_, policy) = settings()
            .run(generator.view(), &dict, &traj, &ActionReward)
            .unwrap();

        for l in 0..traj.len() {
            let total = romberg(
                |u| policy.density(u, l).unwrap(),
                0.0,
                1.0,
                &RombergOptions::default(),
            );
            assert!((total - 1.0).abs() < 1e-6, "state {}: {}", l, total);
            assert!(policy.density(1.0, l).unwrap() > policy.density(0.0, l).unwrap());
        }
        assert_eq!(policy.density(2.0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_value_is_soft_maximum() {
        let traj = trajectory();
        let generator = Array2::from_diag(&array![0.0, -1.0, -0.5]);
        let dict = Monomials::new(1);
        let (values, _) = settings()
            .run(generator.view(), &dict, &traj, &ActionReward)
            .unwrap();

        // With r = u and no generator contribution, V = λ ln ∫ exp(u/λ) du
        let expected = 0.5 * ((2f64.exp() - 1.0) / 2.0).ln();
        for v in values.iter() {
            assert!((v - expected).abs() < 1e-6, "{} vs {}", v, expected);
        }
    }

    #[test]
    fn test_requires_actions() {
        let traj = Trajectory::new(array![[0.0, 1.0]], 1.0, "no actions").unwrap();
        let generator = Array2::zeros((2, 2));
        let dict = Monomials::new(1);
        let result = settings().run(generator.view(), &dict, &traj, &ActionReward);
        assert!(result.is_err());
    }

    #[test]
    fn test_generator_shape_checked() {
        let traj = trajectory();
        let generator = Array2::zeros((2, 2));
        let dict = Monomials::new(1);
        let result = settings().run(generator.view(), &dict, &traj, &ActionReward);
        assert!(result.is_err());
    }
}
