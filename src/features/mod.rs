//! Dictionaries of observables and their derivatives
//!
//! A dictionary is a fixed, finite set of scalar functions `ψ_1 … ψ_k` of the
//! state. Generator estimation needs their values, gradients and Hessians at
//! every sample, so each dictionary evaluates all three analytically.

mod domain;
mod gaussians;
mod monomials;

pub use domain::Discretization;
pub use gaussians::Gaussians;
pub use monomials::Monomials;

use crate::error::Result;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, ArrayView2, Axis};

/// Dictionary trait for (g)EDMD observables
///
/// All evaluators take a `d × m` data matrix (one sample per column) and
/// return arrays indexed `[basis, …, sample]`.
pub trait Dictionary: Send + Sync {
    /// Number of basis functions for `dim`-dimensional inputs
    fn size(&self, dim: usize) -> usize;

    /// Values, shaped `k × m`
    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Gradients, shaped `k × d × m`
    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array3<f64>>;

    /// Hessians, shaped `k × d × d × m`
    fn hessian(&self, x: ArrayView2<f64>) -> Result<Array4<f64>>;

    /// Get dictionary name
    fn name(&self) -> &str;

    /// Monomial exponents of each basis function, if the dictionary is polynomial
    fn exponents(&self, _dim: usize) -> Option<Vec<Vec<usize>>> {
        None
    }

    /// Values at a single point
    fn evaluate_point(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        let column = x.insert_axis(Axis(1));
        let values = self.evaluate(column)?;
        Ok(values.column(0).to_owned())
    }
}

/// Values, gradients and Hessians of a dictionary over one data set
#[derive(Debug, Clone)]
pub struct DictionaryEvaluation {
    /// `Psi`, k × m
    pub values: Array2<f64>,
    /// `nablaPsi`, k × d × m
    pub gradient: Array3<f64>,
    /// `nabla2Psi`, k × d × d × m
    pub hessian: Array4<f64>,
}

impl DictionaryEvaluation {
    /// Evaluate a dictionary and both derivatives on `x` (d × m)
    pub fn compute<D: Dictionary + ?Sized>(dictionary: &D, x: ArrayView2<f64>) -> Result<Self> {
        let values = dictionary.evaluate(x)?;
        let gradient = dictionary.gradient(x)?;
        let hessian = dictionary.hessian(x)?;

        tracing::debug!(
            dictionary = dictionary.name(),
            basis = values.nrows(),
            samples = values.ncols(),
            "evaluated dictionary"
        );

        Ok(Self {
            values,
            gradient,
            hessian,
        })
    }

    /// Number of basis functions `k`
    pub fn size(&self) -> usize {
        self.values.nrows()
    }

    /// Number of samples `m`
    pub fn samples(&self) -> usize {
        self.values.ncols()
    }

    /// State dimension `d`
    pub fn dim(&self) -> usize {
        self.gradient.shape()[1]
    }
}
