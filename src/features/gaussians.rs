//! Gaussian radial basis dictionary
//!
//! `ψ_k(x) = exp(-‖x - c_k‖² / (2σ²))` with derivatives
//! `∇ψ_k = -(x - c_k)/σ² ψ_k` and
//! `∇²ψ_k = ((x - c_k)(x - c_k)ᵀ/σ⁴ - I/σ²) ψ_k`.

use super::{Discretization, Dictionary};
use crate::error::{Error, Result};
use ndarray::{Array2, Array3, Array4, ArrayView2};

/// Gaussian radial functions at fixed centres
#[derive(Debug, Clone)]
pub struct Gaussians {
    /// Centres, d × k (one centre per column)
    pub centers: Array2<f64>,
    /// Bandwidth σ
    pub bandwidth: f64,
}

impl Gaussians {
    /// Create a new Gaussian dictionary
    ///
    /// # Arguments
    ///
    /// * `centers` - Matrix of centre points (each column is a centre)
    /// * `bandwidth` - Width parameter σ
    pub fn new(centers: Array2<f64>, bandwidth: f64) -> Result<Self> {
        if !(bandwidth > 0.0) {
            return Err(Error::InvalidInput(format!(
                "bandwidth must be positive, got {}",
                bandwidth
            )));
        }
        Ok(Self { centers, bandwidth })
    }

    /// Centres at the box midpoints of a discretisation
    pub fn on_grid(omega: &Discretization, bandwidth: f64) -> Result<Self> {
        Self::new(omega.midpoints(), bandwidth)
    }

    fn check(&self, x: &ArrayView2<f64>) -> Result<()> {
        if x.nrows() != self.centers.nrows() {
            return Err(Error::shape(
                format!("{}-dimensional samples", self.centers.nrows()),
                format!("{}-dimensional samples", x.nrows()),
            ));
        }
        Ok(())
    }
}

impl Dictionary for Gaussians {
    fn size(&self, _dim: usize) -> usize {
        self.centers.ncols()
    }

    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check(&x)?;
        let (d, m) = x.dim();
        let k = self.centers.ncols();
        let scale = 1.0 / (2.0 * self.bandwidth * self.bandwidth);
        let mut out = Array2::zeros((k, m));

        for l in 0..m {
            for c in 0..k {
                let mut dist_sq = 0.0;
                for i in 0..d {
                    let diff = x[[i, l]] - self.centers[[i, c]];
                    dist_sq += diff * diff;
                }
                out[[c, l]] = (-dist_sq * scale).exp();
            }
        }
        Ok(out)
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array3<f64>> {
        let psi = self.evaluate(x)?;
        let (d, m) = x.dim();
        let k = self.centers.ncols();
        let inv_var = 1.0 / (self.bandwidth * self.bandwidth);
        let mut out = Array3::zeros((k, d, m));

        for l in 0..m {
            for c in 0..k {
                for i in 0..d {
                    out[[c, i, l]] = -(x[[i, l]] - self.centers[[i, c]]) * inv_var * psi[[c, l]];
                }
            }
        }
        Ok(out)
    }

    fn hessian(&self, x: ArrayView2<f64>) -> Result<Array4<f64>> {
        let psi = self.evaluate(x)?;
        let (d, m) = x.dim();
        let k = self.centers.ncols();
        let inv_var = 1.0 / (self.bandwidth * self.bandwidth);
        let mut out = Array4::zeros((k, d, d, m));

        for l in 0..m {
            for c in 0..k {
                for i in 0..d {
                    let di = x[[i, l]] - self.centers[[i, c]];
                    for j in 0..d {
                        let dj = x[[j, l]] - self.centers[[j, c]];
                        let delta = if i == j { inv_var } else { 0.0 };
                        out[[c, i, j, l]] = (di * dj * inv_var * inv_var - delta) * psi[[c, l]];
                    }
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "Gaussians"
    }
}
