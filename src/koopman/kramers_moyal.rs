//! Kramers–Moyal regression of drift and diffusion
//!
//! Direct estimate of the SDE coefficients without going through the
//! generator spectrum. With `Δ_j = x_{j+1} − x_j` and sampling step `h`:
//!
//! - drift coefficients `C` (k × d) solve `min ‖Psiᵀ C − Sᵀ‖` with `S_j = Δ_j / h`
//! - diffusion coefficients `D` (k × s) solve `min ‖Psiᵀ D − Bᵀ‖` with
//!   `B_{(i,j),l} = Δ_{i,l} Δ_{j,l} / h` for `i ≤ j`
//!
//! so that `b(x) ≈ Cᵀ ψ(x)` and `a_ij(x) ≈ D_{(i,j)}ᵀ ψ(x)`.

use super::linalg::pinv;
use crate::error::{Error, Result};
use crate::features::Dictionary;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use tracing::debug;

/// Index pairs `(i, j)`, `i ≤ j`, in the order of the flattened diffusion
pub fn upper_pairs(d: usize) -> Vec<(usize, usize)> {
    (0..d).flat_map(|i| (i..d).map(move |j| (i, j))).collect()
}

/// Fitted Kramers–Moyal coefficients
#[derive(Debug, Clone)]
pub struct KramersMoyal {
    /// Drift coefficients, k × d
    pub drift_coefficients: Array2<f64>,
    /// Diffusion coefficients, k × d(d+1)/2
    pub diffusion_coefficients: Array2<f64>,
    /// Dictionary values over all fitted samples, k × m
    psi: Array2<f64>,
    pairs: Vec<(usize, usize)>,
}

impl KramersMoyal {
    /// Fit on consecutive samples `x` (d × m) spaced `h` apart
    pub fn fit<D: Dictionary + ?Sized>(dictionary: &D, x: ArrayView2<f64>, h: f64) -> Result<Self> {
        let psi = dictionary.evaluate(x)?;
        Self::from_lifted(psi, x, h)
    }

    /// Fit with precomputed dictionary values `psi` (k × m)
    pub fn from_lifted(psi: Array2<f64>, x: ArrayView2<f64>, h: f64) -> Result<Self> {
        let (d, m) = x.dim();
        if m < 2 {
            return Err(Error::InvalidInput(
                "need at least 2 samples to form increments".to_string(),
            ));
        }
        if psi.ncols() != m {
            return Err(Error::shape(
                format!("dictionary values over {} samples", m),
                format!("{}", psi.ncols()),
            ));
        }
        if !(h > 0.0) {
            return Err(Error::InvalidInput(format!(
                "sampling step must be positive, got {}",
                h
            )));
        }

        let pairs = upper_pairs(d);
        let n = m - 1;
        let increments = &x.slice(s![.., 1..]) - &x.slice(s![.., ..n]);

        let drift_targets = increments.t().mapv(|v| v / h);
        let diffusion_targets = Array2::from_shape_fn((n, pairs.len()), |(l, r)| {
            let (i, j) = pairs[r];
            increments[[i, l]] * increments[[j, l]] / h
        });

        // Psiᵀ⁺ applied to both target blocks at once
        let solver = pinv(psi.slice(s![.., ..n]).t())?;
        let drift_coefficients = solver.dot(&drift_targets);
        let diffusion_coefficients = solver.dot(&diffusion_targets);

        debug!(
            basis = psi.nrows(),
            samples = n,
            "fitted Kramers-Moyal coefficients"
        );

        Ok(Self {
            drift_coefficients,
            diffusion_coefficients,
            psi,
            pairs,
        })
    }

    pub fn dim(&self) -> usize {
        self.drift_coefficients.ncols()
    }

    pub fn samples(&self) -> usize {
        self.psi.ncols()
    }

    fn column(&self, l: usize) -> Result<ArrayView1<'_, f64>> {
        if l >= self.samples() {
            return Err(Error::InvalidInput(format!(
                "sample index {} out of range (0..{})",
                l,
                self.samples()
            )));
        }
        Ok(self.psi.column(l))
    }

    /// Drift at a dictionary vector
    pub fn drift_at(&self, psi: ArrayView1<f64>) -> Array1<f64> {
        self.drift_coefficients.t().dot(&psi)
    }

    /// Symmetric diffusion matrix at a dictionary vector
    pub fn diffusion_matrix_at(&self, psi: ArrayView1<f64>) -> Array2<f64> {
        let flat = self.diffusion_coefficients.t().dot(&psi);
        let d = self.dim();
        let mut a = Array2::zeros((d, d));
        for (r, &(i, j)) in self.pairs.iter().enumerate() {
            a[[i, j]] = flat[r];
            a[[j, i]] = flat[r];
        }
        a
    }

    /// Drift at fitted sample `l`
    pub fn drift(&self, l: usize) -> Result<Array1<f64>> {
        Ok(self.drift_at(self.column(l)?))
    }

    /// Diffusion matrix at fitted sample `l`
    pub fn diffusion_matrix(&self, l: usize) -> Result<Array2<f64>> {
        Ok(self.diffusion_matrix_at(self.column(l)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{make_rng, ornstein_uhlenbeck, OrnsteinUhlenbeck};
    use crate::features::Monomials;

    #[test]
    fn test_upper_pairs() {
        assert_eq!(upper_pairs(2), vec![(0, 0), (0, 1), (1, 1)]);
        assert_eq!(upper_pairs(3).len(), 6);
    }

    #[test]
    fn test_deterministic_linear_drift() {
        // x_{j+1} = x_j + h (1 - x_j): increments carry drift 1 - x exactly
        let h = 0.1;
        let mut x = Array2::zeros((1, 20));
        x[[0, 0]] = 3.0;
        for j in 1..20 {
            x[[0, j]] = x[[0, j - 1]] + h * (1.0 - x[[0, j - 1]]);
        }
        let km = KramersMoyal::fit(&Monomials::new(1), x.view(), h).unwrap();

        assert!((km.drift_coefficients[[0, 0]] - 1.0).abs() < 1e-8);
        assert!((km.drift_coefficients[[1, 0]] + 1.0).abs() < 1e-8);
        let b = km.drift(5).unwrap();
        assert!((b[0] - (1.0 - x[[0, 5]])).abs() < 1e-8);
    }

    #[test]
    fn test_ou_coefficients() {
        let mut rng = make_rng(Some(21));
        let params = OrnsteinUhlenbeck::isotropic(1, 1.0, 0.0, 1.0);
        let x = ornstein_uhlenbeck(&Array1::zeros(1), &params, 50_000, 0.01, &mut rng).unwrap();
        let km = KramersMoyal::fit(&Monomials::new(1), x.view(), 0.01).unwrap();

        assert!((km.drift_coefficients[[1, 0]] + 1.0).abs() < 0.3);

        let mean_diffusion = (0..km.samples())
            .map(|l| km.diffusion_matrix(l).unwrap()[[0, 0]])
            .sum::<f64>()
            / km.samples() as f64;
        assert!((mean_diffusion - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_index_out_of_range() {
        let x = ndarray::array![[0.0, 1.0, 2.0]];
        let km = KramersMoyal::fit(&Monomials::new(1), x.view(), 1.0).unwrap();
        assert!(km.drift(3).is_err());
    }
}
