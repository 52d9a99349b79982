//! Recursive gEDMD
//!
//! Keeps `A = dPsi Psiᵀ` and the inverse Gram matrix `G⁻¹ = (Psi Psiᵀ + δI)⁻¹`
//! up to date one sample at a time. The inverse is refreshed with the
//! Sherman–Morrison identity
//!
//! ```text
//! G⁻¹ ← G⁻¹ − (G⁻¹ψ)(ψᵀG⁻¹) / (1 + ψᵀG⁻¹ψ)
//! ```
//!
//! so each update costs `O(k²)` instead of a fresh `O(k³)` inversion.

use super::gedmd::GeneratorData;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::debug;

/// Online generator estimator
#[derive(Debug, Clone)]
pub struct RecursiveGenerator {
    a: Array2<f64>,
    g_inv: Array2<f64>,
    regularization: f64,
    samples: usize,
}

impl RecursiveGenerator {
    /// Start from `G = δI` for a `k`-element dictionary
    pub fn new(k: usize, regularization: f64) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidInput("dictionary must not be empty".to_string()));
        }
        if !(regularization > 0.0) {
            return Err(Error::InvalidInput(format!(
                "regularization must be positive, got {}",
                regularization
            )));
        }
        let mut g_inv = Array2::zeros((k, k));
        g_inv.diag_mut().fill(1.0 / regularization);
        Ok(Self {
            a: Array2::zeros((k, k)),
            g_inv,
            regularization,
            samples: 0,
        })
    }

    /// Feed every column of prepared generator data
    pub fn from_data(data: &GeneratorData, regularization: f64) -> Result<Self> {
        let mut estimator = Self::new(data.size(), regularization)?;
        estimator.update_batch(data.psi.view(), data.dpsi.view())?;
        Ok(estimator)
    }

    pub fn size(&self) -> usize {
        self.a.nrows()
    }

    /// Number of samples absorbed so far
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    /// Absorb one sample `(ψ(x_l), dψ(x_l))`
    pub fn update(&mut self, psi: ArrayView1<f64>, dpsi: ArrayView1<f64>) -> Result<()> {
        let k = self.size();
        if psi.len() != k || dpsi.len() != k {
            return Err(Error::shape(
                format!("{} dictionary values", k),
                format!("{} and {}", psi.len(), dpsi.len()),
            ));
        }

        for i in 0..k {
            for j in 0..k {
                self.a[[i, j]] += dpsi[i] * psi[j];
            }
        }

        let g_psi = self.g_inv.dot(&psi);
        let denominator = 1.0 + psi.dot(&g_psi);
        // G⁻¹ is symmetric, so ψᵀG⁻¹ = (G⁻¹ψ)ᵀ
        for i in 0..k {
            for j in 0..k {
                self.g_inv[[i, j]] -= g_psi[i] * g_psi[j] / denominator;
            }
        }

        self.samples += 1;
        Ok(())
    }

    /// Absorb every column of `psi`/`dpsi` (k × m each)
    pub fn update_batch(&mut self, psi: ArrayView2<f64>, dpsi: ArrayView2<f64>) -> Result<()> {
        if psi.dim() != dpsi.dim() {
            return Err(Error::shape(
                format!("dPsi of shape {:?}", psi.dim()),
                format!("{:?}", dpsi.dim()),
            ));
        }
        for (p, dp) in psi.columns().into_iter().zip(dpsi.columns()) {
            self.update(p, dp)?;
        }
        debug!(samples = self.samples, "recursive generator updated");
        Ok(())
    }

    /// Current generator estimate `L = (A G⁻¹)ᵀ`
    pub fn estimate(&self) -> Array2<f64> {
        self.a.dot(&self.g_inv).t().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{make_rng, ornstein_uhlenbeck, OrnsteinUhlenbeck};
    use crate::features::Monomials;
    use crate::koopman::{estimate_generator, RegressionMethod};
    use ndarray::Array1;

    #[test]
    fn test_matches_batch_gram_estimator() {
        let mut rng = make_rng(Some(3));
        let params = OrnsteinUhlenbeck::isotropic(1, 1.0, 0.0, 1.0);
        let x = ornstein_uhlenbeck(&Array1::zeros(1), &params, 2000, 0.01, &mut rng).unwrap();
        let data = GeneratorData::build(&Monomials::new(2), x.view(), 0.01).unwrap();

        let batch = estimate_generator(
            data.psi.view(),
            data.dpsi.view(),
            &RegressionMethod::GramPseudoinverse,
        )
        .unwrap();
        let online = RecursiveGenerator::from_data(&data, 1e-6).unwrap();
        let recursive = online.estimate();

        let scale = batch.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
        for (a, b) in batch.iter().zip(recursive.iter()) {
            assert!((a - b).abs() < 1e-4 * scale, "{} vs {}", a, b);
        }
        assert_eq!(online.samples(), 2000);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(RecursiveGenerator::new(0, 1.0).is_err());
        assert!(RecursiveGenerator::new(3, 0.0).is_err());
    }

    #[test]
    fn test_shape_check() {
        let mut est = RecursiveGenerator::new(2, 1.0).unwrap();
        let psi = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let dpsi = Array1::from_vec(vec![0.0, 0.0]);
        assert!(est.update(psi.view(), dpsi.view()).is_err());
    }
}
