//! Monomial dictionary with analytic derivatives
//!
//! Basis functions are all monomials of total degree `≤ order`, in graded
//! order: the constant, then `x_0 … x_{d-1}`, then `x_0², x_0 x_1, …, x_{d-1}²`,
//! and so on. Within a degree the exponent tuples are sorted in descending
//! lexicographic order.

use super::Dictionary;
use crate::error::Result;
use ndarray::{Array2, Array3, Array4, ArrayView2};

/// Monomials up to a fixed total degree
#[derive(Debug, Clone)]
pub struct Monomials {
    /// Maximum total degree
    pub order: usize,
}

impl Monomials {
    /// Create a new monomial dictionary
    ///
    /// # Arguments
    ///
    /// * `order` - Maximum total polynomial degree
    pub fn new(order: usize) -> Self {
        Self { order }
    }

    /// Exponent tuples of every basis function for `dim` variables
    pub fn powers(&self, dim: usize) -> Vec<Vec<usize>> {
        let mut all = Vec::with_capacity(binomial(dim + self.order, self.order));
        for degree in 0..=self.order {
            let mut current = vec![0; dim];
            push_degree(&mut all, &mut current, 0, degree);
        }
        all
    }
}

fn push_degree(out: &mut Vec<Vec<usize>>, current: &mut Vec<usize>, var: usize, remaining: usize) {
    let dim = current.len();
    if var + 1 >= dim {
        if dim > 0 {
            current[dim - 1] = remaining;
            out.push(current.clone());
            current[dim - 1] = 0;
        } else if remaining == 0 {
            out.push(Vec::new());
        }
        return;
    }
    for e in (0..=remaining).rev() {
        current[var] = e;
        push_degree(out, current, var + 1, remaining - e);
    }
    current[var] = 0;
}

/// `∂^orders ∏ x_j^{e_j}` evaluated at one sample
fn partial(x: &[f64], exps: &[usize], orders: &[usize]) -> f64 {
    let mut result = 1.0;
    for ((&xj, &e), &o) in x.iter().zip(exps.iter()).zip(orders.iter()) {
        if o > e {
            return 0.0;
        }
        // Falling factorial e (e-1) … (e-o+1)
        for f in 0..o {
            result *= (e - f) as f64;
        }
        result *= xj.powi((e - o) as i32);
    }
    result
}

impl Dictionary for Monomials {
    fn size(&self, dim: usize) -> usize {
        binomial(dim + self.order, self.order)
    }

    fn evaluate(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (d, m) = x.dim();
        let powers = self.powers(d);
        let zeros = vec![0; d];
        let mut out = Array2::zeros((powers.len(), m));

        for (l, col) in x.columns().into_iter().enumerate() {
            let sample: Vec<f64> = col.to_vec();
            for (k, exps) in powers.iter().enumerate() {
                out[[k, l]] = partial(&sample, exps, &zeros);
            }
        }
        Ok(out)
    }

    fn gradient(&self, x: ArrayView2<f64>) -> Result<Array3<f64>> {
        let (d, m) = x.dim();
        let powers = self.powers(d);
        let mut out = Array3::zeros((powers.len(), d, m));
        let mut orders = vec![0; d];

        for (l, col) in x.columns().into_iter().enumerate() {
            let sample: Vec<f64> = col.to_vec();
            for (k, exps) in powers.iter().enumerate() {
                for i in 0..d {
                    orders[i] = 1;
                    out[[k, i, l]] = partial(&sample, exps, &orders);
                    orders[i] = 0;
                }
            }
        }
        Ok(out)
    }

    fn hessian(&self, x: ArrayView2<f64>) -> Result<Array4<f64>> {
        let (d, m) = x.dim();
        let powers = self.powers(d);
        let mut out = Array4::zeros((powers.len(), d, d, m));
        let mut orders = vec![0; d];

        for (l, col) in x.columns().into_iter().enumerate() {
            let sample: Vec<f64> = col.to_vec();
            for (k, exps) in powers.iter().enumerate() {
                // Degree < 2 monomials have a zero Hessian
                if exps.iter().sum::<usize>() < 2 {
                    continue;
                }
                for i in 0..d {
                    for j in i..d {
                        orders[i] += 1;
                        orders[j] += 1;
                        let v = partial(&sample, exps, &orders);
                        orders[i] = 0;
                        orders[j] = 0;
                        out[[k, i, j, l]] = v;
                        out[[k, j, i, l]] = v;
                    }
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "Monomials"
    }

    fn exponents(&self, dim: usize) -> Option<Vec<Vec<usize>>> {
        Some(self.powers(dim))
    }
}

/// Binomial coefficient
pub(crate) fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    if k == 0 || k == n {
        return 1;
    }

    let k = k.min(n - k);
    let mut result = 1usize;

    for i in 0..k {
        result = result * (n - i) / (i + 1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn index_of(powers: &[Vec<usize>], exps: &[usize]) -> usize {
        powers.iter().position(|p| p.as_slice() == exps).unwrap()
    }

    #[test]
    fn test_size_matches_powers() {
        let dict = Monomials::new(2);
        assert_eq!(dict.size(3), 10);
        assert_eq!(dict.powers(3).len(), 10);
        assert_eq!(Monomials::new(10).size(1), 11);
    }

    #[test]
    fn test_graded_ordering() {
        let powers = Monomials::new(2).powers(2);
        assert_eq!(
            powers,
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 2],
            ]
        );
    }

    #[test]
    fn test_values() {
        let dict = Monomials::new(2);
        let x = array![[2.0], [3.0]];
        let psi = dict.evaluate(x.view()).unwrap();

        let expected = [1.0, 2.0, 3.0, 4.0, 6.0, 9.0];
        for (k, e) in expected.iter().enumerate() {
            assert_eq!(psi[[k, 0]], *e);
        }
    }

    #[test]
    fn test_gradient() {
        let dict = Monomials::new(2);
        let x = array![[2.0], [3.0]];
        let grad = dict.gradient(x.view()).unwrap();

        assert_eq!(grad.dim(), (6, 2, 1));
        // d/dx0 of x0*x1 = x1
        assert_eq!(grad[[4, 0, 0]], 3.0);
        // d/dx1 of x1^2 = 2 x1
        assert_eq!(grad[[5, 1, 0]], 6.0);
        // constant
        assert_eq!(grad[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_hessian() {
        let dict = Monomials::new(3);
        let x = array![[2.0], [3.0]];
        let hess = dict.hessian(x.view()).unwrap();
        let powers = dict.powers(2);

        let k = index_of(&powers, &[2, 0]);
        assert_eq!(hess[[k, 0, 0, 0]], 2.0);

        let k = index_of(&powers, &[1, 1]);
        assert_eq!(hess[[k, 0, 1, 0]], 1.0);
        assert_eq!(hess[[k, 1, 0, 0]], 1.0);

        // x0^2 x1 -> d2/dx0dx1 = 2 x0
        let k = index_of(&powers, &[2, 1]);
        assert_eq!(hess[[k, 0, 1, 0]], 4.0);
        // x1^3 -> d2/dx1^2 = 6 x1
        let k = index_of(&powers, &[0, 3]);
        assert_eq!(hess[[k, 1, 1, 0]], 18.0);
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(4, 0), 1);
        assert_eq!(binomial(4, 4), 1);
    }
}
