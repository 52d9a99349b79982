//! Finite-difference estimate of the generator applied to a dictionary
//!
//! For a time step `t` and sample `x_l`, with `Δ = x_{l+1} - x_l`:
//!
//! ```text
//! dψ_k(x_l) = (1/t) Δ · ∇ψ_k(x_l) + (1/(2t)) (Δ Δᵀ) : ∇²ψ_k(x_l)
//! ```
//!
//! The final sample has no successor, so the resulting `dPsi` has `m - 1`
//! columns and is paired with the first `m - 1` columns of `Psi`.

use crate::error::{Error, Result};
use crate::features::{Dictionary, DictionaryEvaluation};
use ndarray::{s, Array2, ArrayView2};
use tracing::debug;

/// Data matrices for generator regression
#[derive(Debug, Clone)]
pub struct GeneratorData {
    /// `Psi` restricted to samples with a successor, k × (m-1)
    pub psi: Array2<f64>,
    /// Finite-difference generator action `dPsi`, k × (m-1)
    pub dpsi: Array2<f64>,
    /// Full dictionary evaluation over all m samples
    pub evaluation: DictionaryEvaluation,
    /// Time step used in the difference quotients
    pub time_step: f64,
}

impl GeneratorData {
    /// Evaluate `dictionary` on `x` (d × m) and build `Psi`/`dPsi`
    pub fn build<D: Dictionary + ?Sized>(
        dictionary: &D,
        x: ArrayView2<f64>,
        time_step: f64,
    ) -> Result<Self> {
        let evaluation = DictionaryEvaluation::compute(dictionary, x)?;
        Self::from_evaluation(evaluation, x, time_step)
    }

    /// Build from an existing evaluation of the same samples
    pub fn from_evaluation(
        evaluation: DictionaryEvaluation,
        x: ArrayView2<f64>,
        time_step: f64,
    ) -> Result<Self> {
        let dpsi = generator_action(x, &evaluation, time_step)?;
        let m = x.ncols();
        let psi = evaluation.values.slice(s![.., ..m - 1]).to_owned();

        debug!(
            basis = psi.nrows(),
            columns = psi.ncols(),
            time_step,
            "built generator data matrices"
        );

        Ok(Self {
            psi,
            dpsi,
            evaluation,
            time_step,
        })
    }

    /// Number of basis functions `k`
    pub fn size(&self) -> usize {
        self.psi.nrows()
    }

    /// Number of regression columns `m - 1`
    pub fn columns(&self) -> usize {
        self.psi.ncols()
    }

    /// Keep the leading `fraction` of the regression columns
    pub fn training_split(&self, fraction: f64) -> Result<(Array2<f64>, Array2<f64>)> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "training fraction must lie in (0, 1], got {}",
                fraction
            )));
        }
        let n = (((self.columns() as f64) * fraction) as usize).max(1);
        Ok((
            self.psi.slice(s![.., ..n]).to_owned(),
            self.dpsi.slice(s![.., ..n]).to_owned(),
        ))
    }
}

/// Estimate `dψ_k(x_l)` for one basis function and one sample
///
/// Uses the step from `x_l` to `x_{l+1}`, so `l` must leave a successor.
pub fn dpsi(
    x: ArrayView2<f64>,
    evaluation: &DictionaryEvaluation,
    k: usize,
    l: usize,
    time_step: f64,
) -> Result<f64> {
    let m = x.ncols();
    if l + 1 >= m {
        return Err(Error::InvalidInput(format!(
            "sample index {} has no successor in {} samples",
            l, m
        )));
    }
    if k >= evaluation.size() || l >= evaluation.samples() || evaluation.dim() != x.nrows() {
        return Err(Error::InvalidInput(format!(
            "index ({}, {}) outside evaluation of {} functions over {} samples",
            k,
            l,
            evaluation.size(),
            evaluation.samples()
        )));
    }
    Ok(dpsi_at(x, evaluation, k, l, time_step))
}

fn dpsi_at(
    x: ArrayView2<f64>,
    evaluation: &DictionaryEvaluation,
    k: usize,
    l: usize,
    time_step: f64,
) -> f64 {
    let d = x.nrows();
    let mut drift = 0.0;
    let mut diffusion = 0.0;
    for i in 0..d {
        let di = x[[i, l + 1]] - x[[i, l]];
        drift += di * evaluation.gradient[[k, i, l]];
        for j in 0..d {
            let dj = x[[j, l + 1]] - x[[j, l]];
            diffusion += di * dj * evaluation.hessian[[k, i, j, l]];
        }
    }

    drift / time_step + diffusion / (2.0 * time_step)
}

/// Build the `k × (m-1)` matrix `dPsi`
///
/// # Arguments
///
/// * `x` - Samples (d × m), consecutive columns one time step apart
/// * `evaluation` - Dictionary values/derivatives over the same samples
/// * `time_step` - Difference-quotient step `t`
pub fn generator_action(
    x: ArrayView2<f64>,
    evaluation: &DictionaryEvaluation,
    time_step: f64,
) -> Result<Array2<f64>> {
    let (d, m) = x.dim();
    if m < 2 {
        return Err(Error::InvalidInput(
            "need at least 2 samples to form difference quotients".to_string(),
        ));
    }
    if !(time_step > 0.0) {
        return Err(Error::InvalidInput(format!(
            "time step must be positive, got {}",
            time_step
        )));
    }
    if evaluation.samples() != m || evaluation.dim() != d {
        return Err(Error::shape(
            format!("evaluation over {} samples of dimension {}", m, d),
            format!(
                "{} samples of dimension {}",
                evaluation.samples(),
                evaluation.dim()
            ),
        ));
    }

    let k = evaluation.size();
    let out = Array2::from_shape_fn((k, m - 1), |(row, l)| {
        dpsi_at(x, evaluation, row, l, time_step)
    });

    Ok(out)
}
