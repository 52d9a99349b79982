//! Diagnostics for fitted generators
//!
//! Provides helper functions for:
//! - Matrix errors (Frobenius, relative)
//! - Symmetry checks on diffusion estimates
//! - Eigenvalue comparison and formatting

use ndarray::ArrayView2;
use num_complex::Complex64;

/// Frobenius norm `‖A‖_F`
pub fn frobenius(a: ArrayView2<f64>) -> f64 {
    a.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Frobenius norm of the difference `‖A − B‖_F`
///
/// Returns infinity when the shapes differ.
pub fn frobenius_error(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    if a.dim() != b.dim() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// `‖A − B‖_F / ‖B‖_F`, with `B` the reference
pub fn relative_error(a: ArrayView2<f64>, reference: ArrayView2<f64>) -> f64 {
    let norm = frobenius(reference);
    if norm < f64::EPSILON {
        return frobenius_error(a, reference);
    }
    frobenius_error(a, reference) / norm
}

/// Whether `a` is square and `|a_ij − a_ji| ≤ atol + rtol·|a_ji|` everywhere
pub fn check_symmetric(a: ArrayView2<f64>, rtol: f64, atol: f64) -> bool {
    let (r, c) = a.dim();
    if r != c {
        return false;
    }
    for i in 0..r {
        for j in (i + 1)..c {
            if (a[[i, j]] - a[[j, i]]).abs() > atol + rtol * a[[j, i]].abs() {
                return false;
            }
        }
    }
    true
}

/// Mean distance between two eigenvalue sets
///
/// Both sets are sorted by descending real part and compared pairwise; the
/// shorter set is padded with zeros.
pub fn spectral_distance(eigenvalues1: &[Complex64], eigenvalues2: &[Complex64]) -> f64 {
    let sort = |values: &[Complex64]| {
        let mut sorted = values.to_vec();
        sorted.sort_by(super::linalg::spectral_order);
        sorted
    };
    let mut first = sort(eigenvalues1);
    let mut second = sort(eigenvalues2);

    let n = first.len().max(second.len());
    if n == 0 {
        return 0.0;
    }
    first.resize(n, Complex64::new(0.0, 0.0));
    second.resize(n, Complex64::new(0.0, 0.0));

    first
        .iter()
        .zip(second.iter())
        .map(|(a, b)| (a - b).norm())
        .sum::<f64>()
        / n as f64
}

/// One line per eigenvalue, `index: re ± im i`
pub fn format_eigenvalues(eigenvalues: &[Complex64], limit: usize) -> String {
    eigenvalues
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, ev)| {
            if ev.im.abs() < 1e-12 {
                format!("  λ_{:<3} = {:>12.6}", i, ev.re)
            } else {
                format!("  λ_{:<3} = {:>12.6} {:+.6}i", i, ev.re, ev.im)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_frobenius_error() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[1.0, 2.0], [3.0, 6.0]];
        assert!((frobenius_error(a.view(), b.view()) - 2.0).abs() < 1e-12);
        assert_eq!(frobenius_error(a.view(), array![[1.0]].view()), f64::INFINITY);
        assert!(relative_error(b.view(), b.view()) < 1e-12);
    }

    #[test]
    fn test_check_symmetric() {
        let sym = array![[2.0, 0.5], [0.5, 1.0]];
        let asym = array![[2.0, 0.5], [0.6, 1.0]];
        assert!(check_symmetric(sym.view(), 1e-5, 1e-8));
        assert!(!check_symmetric(asym.view(), 1e-5, 1e-8));
        assert!(!check_symmetric(array![[1.0, 2.0]].view(), 1e-5, 1e-8));
    }

    #[test]
    fn test_spectral_distance() {
        let a = vec![Complex64::new(0.0, 0.0), Complex64::new(-1.0, 0.0)];
        let b = vec![Complex64::new(-1.1, 0.0), Complex64::new(0.0, 0.0)];
        assert!((spectral_distance(&a, &b) - 0.05).abs() < 1e-12);
        assert_eq!(spectral_distance(&[], &[]), 0.0);
    }

    #[test]
    fn test_format_eigenvalues() {
        let text = format_eigenvalues(&[Complex64::new(-1.0, 0.0), Complex64::new(-2.0, 3.0)], 5);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("+3.000000i"));
    }
}
