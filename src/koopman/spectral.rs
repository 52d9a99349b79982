//! Spectral analysis of the generator and drift/diffusion reconstruction
//!
//! With `L = Ξ Λ Ξ⁻¹`:
//!
//! - eigenfunctions `φ(x) = Ξᵀ ψ(x)`
//! - Koopman modes `V = Bᵀ Ξ⁻ᵀ` for a selector `B` with `Bᵀ ψ(x) = g(x)`
//! - drift `b(x) = (L B)ᵀ ψ(x) = Σ_ℓ λ_ℓ φ_ℓ(x) v_ℓ`
//! - diffusion `vec(a)(x) = (L B₂)ᵀ ψ(x) − B₂ᵀ ∇ψ(x) b(x)`, where `B₂` selects
//!   the second-order monomials

use super::linalg::{complex_inverse, eig, psd_sqrt};
use crate::error::{Error, Result};
use crate::features::{Dictionary, DictionaryEvaluation};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Which eigen-components a reduced reconstruction keeps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Truncation {
    /// Every component (reproduces the full reconstruction)
    All,
    /// The `count` components with the largest real part (slowest decay)
    SlowestModes { count: usize },
    /// Indices `k-1` down to `k-count+1` of the spectrum, i.e. `count - 1`
    /// components taken by position rather than by eigenvalue
    IndexTail { count: usize },
}

impl Truncation {
    /// Slowest tenth of a `k`-element spectrum, at least one mode
    pub fn default_for(k: usize) -> Self {
        Truncation::SlowestModes {
            count: (k / 10).max(1),
        }
    }

    /// Indices of the kept components in a `k`-element spectrum sorted by
    /// descending real part
    pub fn indices(&self, k: usize) -> Vec<usize> {
        match *self {
            Truncation::All => (0..k).collect(),
            Truncation::SlowestModes { count } => (0..count.min(k)).collect(),
            Truncation::IndexTail { count } => {
                let count = count.min(k);
                if count == 0 {
                    return Vec::new();
                }
                (k - count + 1..k).rev().collect()
            }
        }
    }
}

/// Eigendecomposition of a generator matrix
#[derive(Debug, Clone)]
pub struct SpectralDecomposition {
    /// Eigenvalues, sorted by descending real part
    pub eigenvalues: Vec<Complex64>,
    /// Eigenvectors `Ξ` as columns, k × k
    pub eigenvectors: Array2<Complex64>,
}

impl SpectralDecomposition {
    pub fn new(generator: ArrayView2<f64>) -> Result<Self> {
        let (eigenvalues, eigenvectors) = eig(generator)?;
        Ok(Self {
            eigenvalues,
            eigenvectors,
        })
    }

    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Eigenfunction matrix `Ξᵀ Psi`, k × m
    pub fn eigenfunctions(&self, psi: ArrayView2<f64>) -> Array2<Complex64> {
        let psi_c = psi.mapv(|v| Complex64::new(v, 0.0));
        self.eigenvectors.t().dot(&psi_c)
    }

    /// Eigenfunction values `Ξᵀ ψ(x)` for one dictionary vector
    pub fn eigenfunctions_at(&self, psi: ArrayView1<f64>) -> Array1<Complex64> {
        let psi_c = psi.mapv(|v| Complex64::new(v, 0.0));
        self.eigenvectors.t().dot(&psi_c)
    }

    /// `Ξ⁻ᵀ`
    pub fn inverse_transpose(&self) -> Result<Array2<Complex64>> {
        Ok(complex_inverse(self.eigenvectors.view())?.t().to_owned())
    }

    /// Koopman modes `Bᵀ Ξ⁻ᵀ` for a real selector `B` (k × p); column `ℓ` is `v_ℓ`
    pub fn koopman_modes(&self, selector: ArrayView2<f64>) -> Result<Array2<Complex64>> {
        if selector.nrows() != self.len() {
            return Err(Error::shape(
                format!("selector with {} rows", self.len()),
                format!("{} rows", selector.nrows()),
            ));
        }
        let b_t = selector.t().mapv(|v| Complex64::new(v, 0.0));
        Ok(b_t.dot(&self.inverse_transpose()?))
    }

    /// Rebuild `Ξ Λ Ξ⁻¹` (real part)
    pub fn reconstruct(&self) -> Result<Array2<f64>> {
        let inv = complex_inverse(self.eigenvectors.view())?;
        let mut scaled = self.eigenvectors.clone();
        for (mut column, &lambda) in scaled.columns_mut().into_iter().zip(self.eigenvalues.iter()) {
            column.mapv_inplace(|v| v * lambda);
        }
        Ok(scaled.dot(&inv).mapv(|v| v.re))
    }
}

/// Selector picking the first-order monomials `x_0 … x_{d-1}` (k × d)
///
/// Assumes the constant sits at index 0 and `x_i` at index `i + 1`. A
/// one-element dictionary selects its only entry.
pub fn selector_first_order(d: usize, k: usize) -> Result<Array2<f64>> {
    let mut b = Array2::zeros((k, d));
    if k == 1 {
        if d > 0 {
            b[[0, 0]] = 1.0;
        }
        return Ok(b);
    }
    if k < d + 1 {
        return Err(Error::InvalidInput(format!(
            "{} basis functions cannot hold {} first-order monomials",
            k, d
        )));
    }
    for i in 0..d {
        b[[i + 1, i]] = 1.0;
    }
    Ok(b)
}

/// Selector picking the `s = d(d+1)/2` second-order monomials (k × s)
///
/// Assumes they directly follow the first-order block, at indices
/// `d+1 … d+s`.
pub fn selector_second_order(d: usize, k: usize) -> Result<Array2<f64>> {
    let s = d * (d + 1) / 2;
    let mut b = Array2::zeros((k, s));
    if k == 1 {
        if s > 0 {
            b[[0, 0]] = 1.0;
        }
        return Ok(b);
    }
    if k < d + 1 + s {
        return Err(Error::InvalidInput(format!(
            "{} basis functions cannot hold {} second-order monomials",
            k, s
        )));
    }
    for r in 0..s {
        b[[d + 1 + r, r]] = 1.0;
    }
    Ok(b)
}

/// Second-order layout: basis position `d+1+r` holds `x_i x_j` for pair `r`
fn second_order_pairs(exponents: &[Vec<usize>], d: usize) -> Option<Vec<(usize, usize)>> {
    let s = d * (d + 1) / 2;
    if exponents.len() < d + 1 + s {
        return None;
    }
    let mut pairs = Vec::with_capacity(s);
    for exps in &exponents[d + 1..d + 1 + s] {
        if exps.iter().sum::<usize>() != 2 {
            return None;
        }
        let vars: Vec<usize> = exps
            .iter()
            .enumerate()
            .flat_map(|(i, &e)| std::iter::repeat(i).take(e))
            .collect();
        pairs.push((vars[0], vars[1]));
    }
    Some(pairs)
}

fn first_order_layout(exponents: &[Vec<usize>], d: usize) -> bool {
    exponents.len() > d
        && exponents[0].iter().all(|&e| e == 0)
        && (0..d).all(|i| {
            exponents[i + 1]
                .iter()
                .enumerate()
                .all(|(j, &e)| e == usize::from(i == j))
        })
}

/// Drift and diffusion estimates from a fitted generator
///
/// Requires a monomial dictionary whose layout matches the selectors: the
/// constant, then the first-order block, then (for diffusion) the
/// second-order block.
pub struct DriftDiffusion<'a> {
    evaluation: &'a DictionaryEvaluation,
    spectral: SpectralDecomposition,
    /// `Ξᵀ Psi` over all samples
    eigenfunctions: Array2<Complex64>,
    /// `(L B)ᵀ`, d × k
    drift_map: Array2<f64>,
    /// Drift Koopman modes `Bᵀ Ξ⁻ᵀ`, d × k
    drift_modes: Array2<Complex64>,
    /// `(L B₂)ᵀ` and `B₂ᵀ` when second-order monomials are present
    second_order: Option<SecondOrder>,
    dim: usize,
}

struct SecondOrder {
    diffusion_map: Array2<f64>,
    selector_t: Array2<f64>,
    pairs: Vec<(usize, usize)>,
}

impl<'a> DriftDiffusion<'a> {
    /// Prepare drift/diffusion reconstruction
    ///
    /// # Arguments
    ///
    /// * `generator` - Fitted generator `L` (k × k)
    /// * `dictionary` - Dictionary the generator was fitted with
    /// * `evaluation` - Dictionary evaluation over the samples to analyse
    pub fn new<D: Dictionary + ?Sized>(
        generator: ArrayView2<f64>,
        dictionary: &D,
        evaluation: &'a DictionaryEvaluation,
    ) -> Result<Self> {
        let d = evaluation.dim();
        let k = evaluation.size();
        if generator.dim() != (k, k) {
            return Err(Error::shape(
                format!("{}×{} generator", k, k),
                format!("{:?}", generator.dim()),
            ));
        }
        let exponents = dictionary.exponents(d).ok_or_else(|| {
            Error::InvalidInput(format!(
                "drift and diffusion reconstruction needs a monomial dictionary, got {}",
                dictionary.name()
            ))
        })?;
        if !first_order_layout(&exponents, d) {
            return Err(Error::InvalidInput(
                "dictionary does not start with the constant and first-order monomials"
                    .to_string(),
            ));
        }

        let first = selector_first_order(d, k)?;
        let drift_map = generator.dot(&first).t().to_owned();

        let second_order = match second_order_pairs(&exponents, d) {
            Some(pairs) => {
                let second = selector_second_order(d, k)?;
                Some(SecondOrder {
                    diffusion_map: generator.dot(&second).t().to_owned(),
                    selector_t: second.t().to_owned(),
                    pairs,
                })
            }
            None => None,
        };

        let spectral = SpectralDecomposition::new(generator)?;
        let eigenfunctions = spectral.eigenfunctions(evaluation.values.view());
        let drift_modes = spectral.koopman_modes(first.view())?;

        Ok(Self {
            evaluation,
            spectral,
            eigenfunctions,
            drift_map,
            drift_modes,
            second_order,
            dim: d,
        })
    }

    pub fn spectral(&self) -> &SpectralDecomposition {
        &self.spectral
    }

    /// Eigenfunction matrix `Ξᵀ Psi` over the analysed samples
    pub fn eigenfunctions(&self) -> &Array2<Complex64> {
        &self.eigenfunctions
    }

    /// Drift Koopman modes, d × k
    pub fn drift_modes(&self) -> &Array2<Complex64> {
        &self.drift_modes
    }

    fn check_index(&self, l: usize) -> Result<()> {
        if l >= self.evaluation.samples() {
            return Err(Error::InvalidInput(format!(
                "sample index {} out of range (0..{})",
                l,
                self.evaluation.samples()
            )));
        }
        Ok(())
    }

    /// Drift `b(x_l) = (L B)ᵀ ψ(x_l)`
    pub fn drift(&self, l: usize) -> Result<Array1<f64>> {
        self.check_index(l)?;
        Ok(self.drift_map.dot(&self.evaluation.values.column(l)))
    }

    /// Drift from a truncated eigen-expansion `Re Σ_ℓ λ_ℓ φ_ℓ(x_l) v_ℓ`
    pub fn drift_reduced(&self, l: usize, truncation: Truncation) -> Result<Array1<f64>> {
        self.check_index(l)?;
        let mut acc = Array1::<Complex64>::zeros(self.dim);
        for idx in truncation.indices(self.spectral.len()) {
            let weight = self.spectral.eigenvalues[idx] * self.eigenfunctions[[idx, l]];
            for i in 0..self.dim {
                acc[i] += weight * self.drift_modes[[i, idx]];
            }
        }
        Ok(acc.mapv(|v| v.re))
    }

    fn second(&self) -> Result<&SecondOrder> {
        self.second_order.as_ref().ok_or_else(|| {
            Error::InvalidInput(
                "diffusion reconstruction needs second-order monomials in the dictionary"
                    .to_string(),
            )
        })
    }

    fn diffusion_with(&self, l: usize, drift: &Array1<f64>) -> Result<Array1<f64>> {
        let second = self.second()?;
        let psi = self.evaluation.values.column(l);
        let gradient = self
            .evaluation
            .gradient
            .index_axis(ndarray::Axis(2), l);
        let correction = second.selector_t.dot(&gradient.dot(drift));
        Ok(second.diffusion_map.dot(&psi) - correction)
    }

    /// Flattened diffusion `vec(a)(x_l)` using the full drift, ordered like
    /// the second-order monomials
    pub fn diffusion(&self, l: usize) -> Result<Array1<f64>> {
        let b = self.drift(l)?;
        self.diffusion_with(l, &b)
    }

    /// Flattened diffusion using the truncated drift
    pub fn diffusion_reduced(&self, l: usize, truncation: Truncation) -> Result<Array1<f64>> {
        let b = self.drift_reduced(l, truncation)?;
        self.diffusion_with(l, &b)
    }

    /// Symmetric `d × d` diffusion matrix at sample `l`
    pub fn diffusion_matrix(&self, l: usize) -> Result<Array2<f64>> {
        let flat = self.diffusion(l)?;
        self.unflatten(&flat)
    }

    /// Symmetric `d × d` diffusion matrix from the truncated drift
    pub fn diffusion_matrix_reduced(&self, l: usize, truncation: Truncation) -> Result<Array2<f64>> {
        let flat = self.diffusion_reduced(l, truncation)?;
        self.unflatten(&flat)
    }

    fn unflatten(&self, flat: &Array1<f64>) -> Result<Array2<f64>> {
        let second = self.second()?;
        let mut a = Array2::zeros((self.dim, self.dim));
        for (r, &(i, j)) in second.pairs.iter().enumerate() {
            a[[i, j]] = flat[r];
            a[[j, i]] = flat[r];
        }
        Ok(a)
    }

    /// Noise factor `σ(x_l)` with `σ σᵀ ≈ a(x_l)`, negative eigenvalues clipped
    pub fn diffusion_factor(&self, l: usize) -> Result<Array2<f64>> {
        let a = self.diffusion_matrix(l)?;
        psd_sqrt(a.view())
    }

    /// Mean diffusion matrix over all analysed samples
    pub fn mean_diffusion_matrix(&self) -> Result<Array2<f64>> {
        let m = self.evaluation.samples();
        let mut total = Array2::zeros((self.dim, self.dim));
        for l in 0..m {
            total += &self.diffusion_matrix(l)?;
        }
        Ok(total / m.max(1) as f64)
    }
}
