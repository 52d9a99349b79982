//! Dense linear algebra on `ndarray` matrices
//!
//! Data matrices live in `ndarray`; decompositions are delegated to
//! `nalgebra` and converted back at the boundary.

use crate::error::{Error, Result};
use nalgebra::{DMatrix, Schur, SymmetricEigen, SVD};
use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;
use std::cmp::Ordering;

const MAX_ITER: usize = 10_000;

pub(crate) fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
    let (r, c) = a.dim();
    DMatrix::from_fn(r, c, |i, j| a[[i, j]])
}

pub(crate) fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

pub(crate) fn to_complex_dmatrix(a: ArrayView2<Complex64>) -> DMatrix<Complex64> {
    let (r, c) = a.dim();
    DMatrix::from_fn(r, c, |i, j| a[[i, j]])
}

pub(crate) fn from_complex_dmatrix(m: &DMatrix<Complex64>) -> Array2<Complex64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Thin singular value decomposition `A = U diag(s) Vᵀ`, singular values descending
pub struct Svd {
    pub u: Array2<f64>,
    pub singular_values: Array1<f64>,
    pub v_t: Array2<f64>,
}

/// Singular value decomposition with descending singular values
pub fn svd(a: ArrayView2<f64>) -> Result<Svd> {
    let m = to_dmatrix(a);
    let decomposition = SVD::try_new(m, true, true, f64::EPSILON, MAX_ITER)
        .ok_or_else(|| Error::Decomposition("SVD did not converge".to_string()))?;

    let (u, v_t) = match (decomposition.u, decomposition.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(Error::Decomposition("SVD factors missing".to_string())),
    };
    let s = decomposition.singular_values;

    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&i, &j| s[j].partial_cmp(&s[i]).unwrap_or(Ordering::Equal));

    let rank = order.len();
    let u_sorted = Array2::from_shape_fn((u.nrows(), rank), |(i, j)| u[(i, order[j])]);
    let v_sorted = Array2::from_shape_fn((rank, v_t.ncols()), |(i, j)| v_t[(order[i], j)]);
    let s_sorted = order.iter().map(|&i| s[i]).collect();

    Ok(Svd {
        u: u_sorted,
        singular_values: s_sorted,
        v_t: v_sorted,
    })
}

/// Moore-Penrose pseudoinverse, dropping singular values below `rcond · σ_max`
pub fn pinv(a: ArrayView2<f64>) -> Result<Array2<f64>> {
    truncated_pinv(a, usize::MAX)
}

/// Pseudoinverse restricted to the leading `rank` singular triplets
pub fn truncated_pinv(a: ArrayView2<f64>, rank: usize) -> Result<Array2<f64>> {
    let (r, c) = a.dim();
    if r == 0 || c == 0 {
        return Ok(Array2::zeros((c, r)));
    }
    let Svd {
        u,
        singular_values: s,
        v_t,
    } = svd(a)?;

    let s_max = s.iter().cloned().fold(0.0, f64::max);
    let cutoff = r.max(c) as f64 * f64::EPSILON * s_max;
    let mut result = Array2::zeros((c, r));

    for (idx, &sigma) in s.iter().enumerate().take(rank) {
        if sigma <= cutoff {
            break;
        }
        let inv = 1.0 / sigma;
        for i in 0..c {
            let vi = v_t[[idx, i]] * inv;
            if vi == 0.0 {
                continue;
            }
            for j in 0..r {
                result[[i, j]] += vi * u[[j, idx]];
            }
        }
    }
    Ok(result)
}

/// Inverse of a square real matrix
pub fn inverse(a: ArrayView2<f64>) -> Result<Array2<f64>> {
    let m = to_dmatrix(a);
    m.try_inverse()
        .map(|inv| from_dmatrix(&inv))
        .ok_or_else(|| Error::SingularMatrix(format!("{}×{} matrix", a.nrows(), a.ncols())))
}

/// Inverse of a square complex matrix
pub fn complex_inverse(a: ArrayView2<Complex64>) -> Result<Array2<Complex64>> {
    let m = to_complex_dmatrix(a);
    m.try_inverse()
        .map(|inv| from_complex_dmatrix(&inv))
        .ok_or_else(|| {
            Error::SingularMatrix(format!("{}×{} eigenvector matrix", a.nrows(), a.ncols()))
        })
}

/// Matrix exponential `exp(A)`
pub fn expm(a: ArrayView2<f64>) -> Result<Array2<f64>> {
    if a.nrows() != a.ncols() {
        return Err(Error::shape(
            "square matrix",
            format!("{}×{}", a.nrows(), a.ncols()),
        ));
    }
    Ok(from_dmatrix(&to_dmatrix(a).exp()))
}

/// Order eigenvalues by descending real part, then descending imaginary part
pub(crate) fn spectral_order(a: &Complex64, b: &Complex64) -> Ordering {
    b.re.partial_cmp(&a.re)
        .unwrap_or(Ordering::Equal)
        .then(b.im.partial_cmp(&a.im).unwrap_or(Ordering::Equal))
}

/// Eigenvalues of a general real square matrix, sorted by descending real part
pub fn eigenvalues(a: ArrayView2<f64>) -> Result<Vec<Complex64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::shape("square matrix", format!("{}×{}", n, a.ncols())));
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    let schur = Schur::try_new(to_dmatrix(a), f64::EPSILON, MAX_ITER)
        .ok_or_else(|| Error::Decomposition("Schur decomposition did not converge".to_string()))?;
    let mut values: Vec<Complex64> = schur.complex_eigenvalues().iter().cloned().collect();
    values.sort_by(spectral_order);
    Ok(values)
}

/// Eigendecomposition of a general real square matrix
///
/// Eigenvalues come from the real Schur form. Each eigenvector is the right
/// singular vector of `A - λI` with the smallest singular value; for an
/// eigenvalue repeated `r` times the `r` smallest are used in turn, so a
/// non-defective repeated eigenvalue still yields independent vectors.
///
/// # Returns
///
/// Eigenvalues sorted by descending real part and the matching unit-norm
/// eigenvectors as the columns of an `n × n` complex matrix.
pub fn eig(a: ArrayView2<f64>) -> Result<(Vec<Complex64>, Array2<Complex64>)> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::shape("square matrix", format!("{}×{}", n, a.ncols())));
    }
    if n == 0 {
        return Ok((Vec::new(), Array2::zeros((0, 0))));
    }

    let scale = a.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
    let eigenvalues = self::eigenvalues(a)?;

    let cluster_tol = 1e-6 * scale;
    let mut eigenvectors = Array2::zeros((n, n));

    for (col, &lambda) in eigenvalues.iter().enumerate() {
        let multiplicity_index = eigenvalues[..col]
            .iter()
            .filter(|&&mu| (mu - lambda).norm() < cluster_tol)
            .count();

        let shifted = DMatrix::from_fn(n, n, |i, j| {
            let v = Complex64::new(a[[i, j]], 0.0);
            if i == j {
                v - lambda
            } else {
                v
            }
        });
        let decomposition = SVD::try_new(shifted, false, true, f64::EPSILON, MAX_ITER)
            .ok_or_else(|| Error::Decomposition("eigenvector SVD did not converge".to_string()))?;
        let v_t = decomposition
            .v_t
            .ok_or_else(|| Error::Decomposition("eigenvector SVD factors missing".to_string()))?;
        let s = decomposition.singular_values;

        let mut order: Vec<usize> = (0..s.len()).collect();
        order.sort_by(|&i, &j| s[i].partial_cmp(&s[j]).unwrap_or(Ordering::Equal));
        let pick = order[multiplicity_index.min(n - 1)];

        // v = conj(row of Vᴴ)
        let mut v: Vec<Complex64> = (0..n).map(|j| v_t[(pick, j)].conj()).collect();

        // Fix the phase: largest component real and positive
        let (_, pivot) = v
            .iter()
            .enumerate()
            .fold((0.0, 0), |(best, at), (i, c)| {
                if c.norm() > best {
                    (c.norm(), i)
                } else {
                    (best, at)
                }
            });
        let phase = v[pivot] / v[pivot].norm().max(f64::MIN_POSITIVE);
        let norm = v.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);
        for c in v.iter_mut() {
            *c = *c / phase / norm;
        }

        for (i, c) in v.into_iter().enumerate() {
            eigenvectors[[i, col]] = c;
        }
    }

    Ok((eigenvalues, eigenvectors))
}

/// Symmetric positive semi-definite square root, negative eigenvalues clipped to zero
pub fn psd_sqrt(a: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::shape("square matrix", format!("{}×{}", n, a.ncols())));
    }
    let m = to_dmatrix(a);
    let sym = (&m + m.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(sym);

    let mut root = DMatrix::zeros(n, n);
    for (idx, &lambda) in eigen.eigenvalues.iter().enumerate() {
        let s = lambda.max(0.0).sqrt();
        let v = eigen.eigenvectors.column(idx);
        root += v * v.transpose() * s;
    }
    Ok(from_dmatrix(&root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pinv_of_invertible_is_inverse() {
        let a = array![[4.0, 1.0], [2.0, 3.0]];
        let p = pinv(a.view()).unwrap();
        let id = a.dot(&p);

        assert!((id[[0, 0]] - 1.0).abs() < 1e-10);
        assert!(id[[0, 1]].abs() < 1e-10);
        assert!((id[[1, 1]] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pinv_rank_deficient() {
        let a = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let p = pinv(a.view()).unwrap();
        let apa = a.dot(&p).dot(&a);

        for (x, y) in apa.iter().zip(a.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_svd_sorted() {
        let a = array![[1.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 3.0]];
        let s = svd(a.view()).unwrap().singular_values;
        assert!((s[0] - 5.0).abs() < 1e-12);
        assert!((s[1] - 3.0).abs() < 1e-12);
        assert!((s[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_eig_triangular() {
        let a = array![[-1.0, 2.0], [0.0, -3.0]];
        let (vals, vecs) = eig(a.view()).unwrap();

        assert!((vals[0].re + 1.0).abs() < 1e-10);
        assert!((vals[1].re + 3.0).abs() < 1e-10);

        // A v = λ v
        for col in 0..2 {
            for i in 0..2 {
                let av: Complex64 = (0..2).map(|j| vecs[[j, col]] * a[[i, j]]).sum();
                assert!((av - vals[col] * vecs[[i, col]]).norm() < 1e-8);
            }
        }
    }

    #[test]
    fn test_eig_rotation_is_complex() {
        let a = array![[0.0, -1.0], [1.0, 0.0]];
        let (vals, _) = eig(a.view()).unwrap();
        assert!((vals[0].im - 1.0).abs() < 1e-10);
        assert!((vals[1].im + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_eig_repeated_eigenvalue() {
        let a = Array2::<f64>::zeros((3, 3));
        let (_, vecs) = eig(a.view()).unwrap();
        assert!(complex_inverse(vecs.view()).is_ok());
    }

    #[test]
    fn test_expm_diagonal() {
        let a = array![[1.0, 0.0], [0.0, -2.0]];
        let e = expm(a.view()).unwrap();
        assert!((e[[0, 0]] - 1f64.exp()).abs() < 1e-10);
        assert!((e[[1, 1]] - (-2f64).exp()).abs() < 1e-10);
        assert!(e[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn test_psd_sqrt() {
        let a = array![[4.0, 0.0], [0.0, 9.0]];
        let r = psd_sqrt(a.view()).unwrap();
        assert!((r[[0, 0]] - 2.0).abs() < 1e-10);
        assert!((r[[1, 1]] - 3.0).abs() < 1e-10);

        // Negative eigenvalues are clipped
        let b = array![[-1.0, 0.0], [0.0, 1.0]];
        let r = psd_sqrt(b.view()).unwrap();
        assert!(r[[0, 0]].abs() < 1e-12);
    }

    #[test]
    fn test_singular_inverse() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(inverse(a.view()), Err(Error::SingularMatrix(_))));
    }
}
