//! Generator regression
//!
//! Solves `min_M ‖dPsi − M Psi‖_F` for the `k × k` matrix `M` and returns the
//! generator estimate `L = Mᵀ`. Several estimators are available:
//!
//! - plain least squares via the pseudoinverse of `Psi`
//! - pseudoinverse of the Gram matrix `Psi Psiᵀ`
//! - reduced-rank regression
//! - rank-truncated SVD (gEDMD with a truncated pseudoinverse)
//! - SINDy-style sequentially thresholded least squares

use super::gedmd::GeneratorData;
use super::linalg::{pinv, svd, truncated_pinv};
use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Regression used to fit the generator matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RegressionMethod {
    /// `M = dPsi Psi⁺`
    LeastSquares,
    /// `M = (dPsi Psiᵀ)(Psi Psiᵀ)⁺`
    GramPseudoinverse,
    /// Least squares projected onto the leading `rank` directions of the fit
    ReducedRank { rank: usize },
    /// `M = dPsi Psi_r⁺` with a rank-`rank` truncated pseudoinverse
    TruncatedSvd { rank: usize },
    /// Sequentially thresholded least squares
    Sindy { threshold: f64, iterations: usize },
}

impl Default for RegressionMethod {
    fn default() -> Self {
        RegressionMethod::LeastSquares
    }
}

impl RegressionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            RegressionMethod::LeastSquares => "least squares",
            RegressionMethod::GramPseudoinverse => "Gram pseudoinverse",
            RegressionMethod::ReducedRank { .. } => "reduced rank",
            RegressionMethod::TruncatedSvd { .. } => "truncated SVD",
            RegressionMethod::Sindy { .. } => "SINDy",
        }
    }
}

/// Fitted generator matrix
#[derive(Debug, Clone)]
pub struct GeneratorEstimate {
    /// `L = Mᵀ`, k × k
    pub generator: Array2<f64>,
    /// Method used for the fit
    pub method: RegressionMethod,
    /// Number of sample columns used in the fit
    pub columns: usize,
}

impl GeneratorEstimate {
    /// Fit on the leading `train_fraction` of the generator data
    pub fn fit(data: &GeneratorData, method: &RegressionMethod, train_fraction: f64) -> Result<Self> {
        let (psi, dpsi) = data.training_split(train_fraction)?;
        let generator = estimate_generator(psi.view(), dpsi.view(), method)?;

        info!(
            method = method.name(),
            basis = generator.nrows(),
            columns = psi.ncols(),
            "fitted generator"
        );

        Ok(Self {
            generator,
            method: method.clone(),
            columns: psi.ncols(),
        })
    }

    /// `M = Lᵀ`, mapping `Psi` to `dPsi`
    pub fn m_matrix(&self) -> Array2<f64> {
        self.generator.t().to_owned()
    }

    /// Predicted generator action `M Psi`
    pub fn predict(&self, psi: ArrayView2<f64>) -> Array2<f64> {
        self.generator.t().dot(&psi)
    }

    /// Frobenius residual `‖dPsi − M Psi‖_F` on the given matrices
    pub fn residual(&self, psi: ArrayView2<f64>, dpsi: ArrayView2<f64>) -> f64 {
        let predicted = self.predict(psi);
        (&dpsi - &predicted).iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

fn check_shapes(psi: &ArrayView2<f64>, dpsi: &ArrayView2<f64>) -> Result<()> {
    if psi.dim() != dpsi.dim() {
        return Err(Error::shape(
            format!("dPsi of shape {:?}", psi.dim()),
            format!("{:?}", dpsi.dim()),
        ));
    }
    if psi.ncols() == 0 || psi.nrows() == 0 {
        return Err(Error::InvalidInput("empty data matrices".to_string()));
    }
    Ok(())
}

fn check_rank(rank: usize, k: usize) -> Result<()> {
    if rank == 0 || rank > k {
        return Err(Error::InvalidInput(format!(
            "rank must lie in 1..={}, got {}",
            k, rank
        )));
    }
    Ok(())
}

/// Estimate the generator `L` (k × k) from `Psi` and `dPsi` (both k × m)
pub fn estimate_generator(
    psi: ArrayView2<f64>,
    dpsi: ArrayView2<f64>,
    method: &RegressionMethod,
) -> Result<Array2<f64>> {
    check_shapes(&psi, &dpsi)?;
    let k = psi.nrows();

    if tracing::enabled!(tracing::Level::DEBUG) {
        let gram = psi.dot(&psi.t());
        let s = svd(gram.view())?.singular_values;
        let smallest = s.iter().cloned().fold(f64::INFINITY, f64::min);
        let largest = s.iter().cloned().fold(0.0, f64::max);
        debug!(condition = largest / smallest, "Gram matrix conditioning");
    }

    let m_matrix = match method {
        RegressionMethod::LeastSquares => dpsi.dot(&pinv(psi)?),
        RegressionMethod::GramPseudoinverse => {
            let gram = psi.dot(&psi.t());
            let cross = dpsi.dot(&psi.t());
            cross.dot(&pinv(gram.view())?)
        }
        RegressionMethod::TruncatedSvd { rank } => {
            check_rank(*rank, k)?;
            dpsi.dot(&truncated_pinv(psi, *rank)?)
        }
        RegressionMethod::ReducedRank { rank } => {
            check_rank(*rank, k)?;
            return reduced_rank(psi, dpsi, *rank);
        }
        RegressionMethod::Sindy {
            threshold,
            iterations,
        } => return sindy(psi, dpsi, *threshold, *iterations),
    };

    Ok(m_matrix.t().to_owned())
}

/// Reduced-rank regression
///
/// `B_ols` solves `Psiᵀ B ≈ dPsiᵀ`; the fit is then projected onto the
/// leading right singular vectors `V_r` of the fitted values `Psiᵀ B_ols`,
/// giving `B_rr = B_ols V_r V_rᵀ`.
fn reduced_rank(psi: ArrayView2<f64>, dpsi: ArrayView2<f64>, rank: usize) -> Result<Array2<f64>> {
    let b_ols = dpsi.dot(&pinv(psi)?).t().to_owned();
    let fitted = psi.t().dot(&b_ols);

    // Right singular vectors of the fit are those of its Gram matrix
    let v_t = svd(fitted.t().dot(&fitted).view())?.v_t;
    let k = b_ols.ncols();
    let mut projector = Array2::zeros((k, k));
    for r in 0..rank {
        let v = v_t.row(r);
        for i in 0..k {
            for j in 0..k {
                projector[[i, j]] += v[i] * v[j];
            }
        }
    }

    Ok(b_ols.dot(&projector))
}

/// Sequentially thresholded least squares (SINDy)
///
/// Starting from the least-squares solution `Ξ` of `Psiᵀ Ξ ≈ dPsiᵀ`, entries
/// with magnitude below `threshold` are zeroed and each column is refitted
/// on its remaining support, `iterations` times.
fn sindy(
    psi: ArrayView2<f64>,
    dpsi: ArrayView2<f64>,
    threshold: f64,
    iterations: usize,
) -> Result<Array2<f64>> {
    let k = psi.nrows();
    let gram = psi.dot(&psi.t());
    let cross = psi.dot(&dpsi.t());
    let mut xi = pinv(gram.view())?.dot(&cross);

    for _ in 0..iterations {
        xi.mapv_inplace(|v| if v.abs() < threshold { 0.0 } else { v });

        for target in 0..k {
            let support: Vec<usize> = (0..k).filter(|&i| xi[[i, target]] != 0.0).collect();
            if support.is_empty() {
                continue;
            }
            let sub_gram = Array2::from_shape_fn((support.len(), support.len()), |(a, b)| {
                gram[[support[a], support[b]]]
            });
            let sub_rhs = Array1::from_shape_fn(support.len(), |a| cross[[support[a], target]]);
            let coeffs = pinv(sub_gram.view())?.dot(&sub_rhs);

            for i in 0..k {
                xi[[i, target]] = 0.0;
            }
            for (a, &i) in support.iter().enumerate() {
                xi[[i, target]] = coeffs[a];
            }
        }
    }

    Ok(xi)
}

/// Least-squares coefficients `c` with `Psiᵀ c ≈ y`
///
/// # Arguments
///
/// * `psi` - Dictionary values (k × m)
/// * `y` - Targets, one per sample (m)
pub fn ols(psi: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Array1<f64>> {
    if psi.ncols() != y.len() {
        return Err(Error::shape(
            format!("{} targets", psi.ncols()),
            format!("{}", y.len()),
        ));
    }
    let gram = psi.dot(&psi.t());
    Ok(pinv(gram.view())?.dot(&psi.dot(&y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Psi rows [1, x], dPsi generated by an exact linear generator
    fn exact_data() -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let xs = [-1.0, -0.5, 0.0, 0.3, 0.8, 1.5];
        let psi = Array2::from_shape_fn((2, xs.len()), |(k, l)| if k == 0 { 1.0 } else { xs[l] });
        // L psi: d(1) = 0, d(x) = 0.5 - 2 x
        let m = array![[0.0, 0.0], [0.5, -2.0]];
        let dpsi = m.dot(&psi);
        (psi, dpsi, m.t().to_owned())
    }

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tol, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_least_squares_recovers_exact_generator() {
        let (psi, dpsi, l) = exact_data();
        let est = estimate_generator(psi.view(), dpsi.view(), &RegressionMethod::LeastSquares).unwrap();
        assert_close(&est, &l, 1e-10);
    }

    #[test]
    fn test_gram_matches_least_squares() {
        let (psi, dpsi, l) = exact_data();
        let est =
            estimate_generator(psi.view(), dpsi.view(), &RegressionMethod::GramPseudoinverse).unwrap();
        assert_close(&est, &l, 1e-9);
    }

    #[test]
    fn test_full_rank_variants_agree() {
        let (psi, dpsi, l) = exact_data();
        let rr = estimate_generator(
            psi.view(),
            dpsi.view(),
            &RegressionMethod::ReducedRank { rank: 2 },
        )
        .unwrap();
        let ts = estimate_generator(
            psi.view(),
            dpsi.view(),
            &RegressionMethod::TruncatedSvd { rank: 2 },
        )
        .unwrap();
        assert_close(&rr, &l, 1e-9);
        assert_close(&ts, &l, 1e-9);
    }

    #[test]
    fn test_reduced_rank_has_lower_rank() {
        let (psi, dpsi, _) = exact_data();
        let rr = estimate_generator(
            psi.view(),
            dpsi.view(),
            &RegressionMethod::ReducedRank { rank: 1 },
        )
        .unwrap();
        let s = svd(rr.view()).unwrap().singular_values;
        assert!(s[1].abs() < 1e-9);
    }

    #[test]
    fn test_sindy_zeroes_small_terms() {
        let (psi, mut dpsi, _) = exact_data();
        // Tiny spurious dependence
        for l in 0..dpsi.ncols() {
            dpsi[[1, l]] += 1e-4 * psi[[1, l]];
        }
        let est = estimate_generator(
            psi.view(),
            dpsi.view(),
            &RegressionMethod::Sindy {
                threshold: 0.05,
                iterations: 10,
            },
        )
        .unwrap();

        assert_eq!(est[[0, 0]], 0.0);
        assert!((est[[0, 1]] - 0.5).abs() < 1e-6);
        assert!((est[[1, 1]] + 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_rank() {
        let (psi, dpsi, _) = exact_data();
        let r = estimate_generator(
            psi.view(),
            dpsi.view(),
            &RegressionMethod::TruncatedSvd { rank: 5 },
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let psi = Array2::zeros((2, 4));
        let dpsi = Array2::zeros((2, 3));
        assert!(estimate_generator(psi.view(), dpsi.view(), &RegressionMethod::LeastSquares).is_err());
    }

    #[test]
    fn test_ols_vector() {
        let (psi, _, _) = exact_data();
        let y = psi.row(1).mapv(|x| 3.0 - x);
        let c = ols(psi.view(), y.view()).unwrap();
        assert!((c[0] - 3.0).abs() < 1e-10);
        assert!((c[1] + 1.0).abs() < 1e-10);
    }
}
