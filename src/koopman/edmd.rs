//! Extended Dynamic Mode Decomposition (EDMD)
//!
//! Discrete-time counterpart of the generator estimate: from snapshot pairs
//! `(x_j, z_j)` with `z_j` one time step after `x_j`, EDMD solves
//! `Psi_Z ≈ K Psi_X` in the least-squares sense. For a small step `τ` the
//! matrix exponential of the generator should reproduce it,
//! `exp(τ L) ≈ K_τ`.

use super::linalg::{eigenvalues, expm, pinv};
use crate::data::Trajectory;
use crate::error::{Error, Result};
use crate::features::Dictionary;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_complex::Complex64;
use tracing::debug;

/// Extended Dynamic Mode Decomposition
///
/// `koopman_matrix` is stored in the same orientation as the generator
/// estimates: column `k` holds the coefficients of `K ψ_k`, so that
/// `ψ(z)ᵀ ≈ ψ(x)ᵀ K`.
#[derive(Debug, Clone)]
pub struct EDMD {
    /// Approximated Koopman matrix in dictionary space
    pub koopman_matrix: Array2<f64>,
    /// Eigenvalues of the Koopman matrix, descending real part
    pub eigenvalues: Vec<Complex64>,
    /// Time between `x_j` and `z_j`
    pub time_step: f64,
}

impl EDMD {
    /// Fit EDMD to snapshot pairs
    ///
    /// # Arguments
    ///
    /// * `dictionary` - Dictionary for lifting
    /// * `x` - Snapshots (d × m)
    /// * `z` - Successor snapshots (d × m)
    /// * `time_step` - Lag between the two sets
    pub fn fit<D: Dictionary + ?Sized>(
        dictionary: &D,
        x: ArrayView2<f64>,
        z: ArrayView2<f64>,
        time_step: f64,
    ) -> Result<Self> {
        if x.dim() != z.dim() {
            return Err(Error::shape(
                format!("successors shaped {:?}", x.dim()),
                format!("{:?}", z.dim()),
            ));
        }
        let psi_x = dictionary.evaluate(x)?;
        let psi_z = dictionary.evaluate(z)?;
        Self::from_lifted(psi_x.view(), psi_z.view(), time_step)
    }

    /// Fit EDMD to consecutive samples of a trajectory
    pub fn from_trajectory<D: Dictionary + ?Sized>(
        dictionary: &D,
        trajectory: &Trajectory,
    ) -> Result<Self> {
        let (x, z) = trajectory.snapshot_pairs()?;
        Self::fit(dictionary, x.view(), z.view(), trajectory.dt())
    }

    /// Fit EDMD to already lifted data (k × m each)
    pub fn from_lifted(
        psi_x: ArrayView2<f64>,
        psi_z: ArrayView2<f64>,
        time_step: f64,
    ) -> Result<Self> {
        if psi_x.dim() != psi_z.dim() {
            return Err(Error::shape(
                format!("lifted successors shaped {:?}", psi_x.dim()),
                format!("{:?}", psi_z.dim()),
            ));
        }
        if psi_x.ncols() == 0 {
            return Err(Error::InvalidInput("Need at least 1 snapshot pair".to_string()));
        }
        if !(time_step > 0.0) {
            return Err(Error::InvalidInput(format!(
                "time step must be positive, got {}",
                time_step
            )));
        }

        // K = Psi_Z Psi_X⁺, stored transposed
        let koopman_matrix = psi_z.dot(&pinv(psi_x)?).t().to_owned();
        let eigenvalues = eigenvalues(koopman_matrix.view())?;

        debug!(
            basis = koopman_matrix.nrows(),
            pairs = psi_x.ncols(),
            "fitted EDMD Koopman matrix"
        );

        Ok(Self {
            koopman_matrix,
            eigenvalues,
            time_step,
        })
    }

    /// Advance a dictionary vector `steps` times, returning every iterate
    pub fn predict(&self, psi0: ArrayView1<f64>, steps: usize) -> Result<Vec<Array1<f64>>> {
        if psi0.len() != self.koopman_matrix.nrows() {
            return Err(Error::shape(
                format!("{} dictionary values", self.koopman_matrix.nrows()),
                format!("{}", psi0.len()),
            ));
        }
        let mut psi = psi0.to_owned();
        let mut predictions = Vec::with_capacity(steps);
        for _ in 0..steps {
            psi = self.koopman_matrix.t().dot(&psi);
            predictions.push(psi.clone());
        }
        Ok(predictions)
    }

    /// Continuous-time rates `ln(μ)/τ` implied by the Koopman eigenvalues
    pub fn continuous_eigenvalues(&self) -> Vec<Complex64> {
        self.eigenvalues
            .iter()
            .map(|mu| mu.ln() / self.time_step)
            .collect()
    }
}

/// Transition operator `exp(τ L)` of a generator over lag `τ`
pub fn generator_to_transition(generator: ArrayView2<f64>, tau: f64) -> Result<Array2<f64>> {
    let scaled = generator.mapv(|v| v * tau);
    expm(scaled.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Monomials;
    use ndarray::array;

    #[test]
    fn test_linear_map_recovered() {
        // z = 0.5 x exactly; with [1, x] the Koopman matrix is diag(1, 0.5)
        let x = array![[1.0, 2.0, -1.0, 0.5]];
        let z = x.mapv(|v| 0.5 * v);
        let edmd = EDMD::fit(&Monomials::new(1), x.view(), z.view(), 1.0).unwrap();

        assert!((edmd.koopman_matrix[[0, 0]] - 1.0).abs() < 1e-10);
        assert!((edmd.koopman_matrix[[1, 1]] - 0.5).abs() < 1e-10);
        assert!(edmd.koopman_matrix[[0, 1]].abs() < 1e-10);
        assert!(edmd.eigenvalues.iter().all(|mu| mu.norm() <= 1.0 + 1e-10));

        let rates = edmd.continuous_eigenvalues();
        assert!(rates[0].norm() < 1e-10);
        assert!((rates[1].re - 0.5f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_predict_iterates() {
        let x = array![[1.0, 2.0, -1.0]];
        let z = x.mapv(|v| 0.5 * v);
        let edmd = EDMD::fit(&Monomials::new(1), x.view(), z.view(), 1.0).unwrap();

        let path = edmd.predict(array![1.0, 4.0].view(), 2).unwrap();
        assert_eq!(path.len(), 2);
        assert!((path[1][1] - 1.0).abs() < 1e-10);
        assert!((path[1][0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_generator_to_transition() {
        let l = array![[0.0, 0.0], [0.0, -1.0]];
        let k = generator_to_transition(l.view(), 2.0).unwrap();
        assert!((k[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((k[[1, 1]] - (-2.0f64).exp()).abs() < 1e-10);
    }

    #[test]
    fn test_mismatched_pairs_rejected() {
        let x = array![[1.0, 2.0]];
        let z = array![[1.0, 2.0, 3.0]];
        assert!(EDMD::fit(&Monomials::new(1), x.view(), z.view(), 1.0).is_err());
    }
}
