//! Romberg quadrature
//!
//! Repeated trapezoid halving with Richardson extrapolation. When the
//! tolerance is not met within `divmax` halvings the last extrapolated value
//! is returned and a warning is logged.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stopping rule for [`romberg`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RombergOptions {
    /// Absolute tolerance between successive diagonal estimates
    pub tol: f64,
    /// Relative tolerance between successive diagonal estimates
    pub rtol: f64,
    /// Maximum number of interval halvings
    pub divmax: usize,
}

impl Default for RombergOptions {
    fn default() -> Self {
        Self {
            tol: 1.48e-8,
            rtol: 1.48e-8,
            divmax: 10,
        }
    }
}

/// Integrate `f` over `[a, b]`
pub fn romberg<F>(mut f: F, a: f64, b: f64, options: &RombergOptions) -> f64
where
    F: FnMut(f64) -> f64,
{
    let range = b - a;
    if range == 0.0 {
        return 0.0;
    }

    let mut n = 1usize;
    let mut ordsum = 0.5 * (f(a) + f(b));
    let mut last_row = vec![range * ordsum];
    let mut result = last_row[0];
    let mut err = f64::INFINITY;

    for i in 1..=options.divmax {
        n *= 2;
        // Midpoints of the previous n/2 panels
        let panels = n / 2;
        let h = range / panels as f64;
        ordsum += (0..panels)
            .map(|p| f(a + h * (p as f64 + 0.5)))
            .sum::<f64>();

        let mut row = Vec::with_capacity(i + 1);
        row.push(range * ordsum / n as f64);
        for k in 0..i {
            let factor = 4f64.powi(k as i32 + 1);
            let refined = (factor * row[k] - last_row[k]) / (factor - 1.0);
            row.push(refined);
        }

        result = row[i];
        err = (result - last_row[i - 1]).abs();
        if err < options.tol || err < options.rtol * result.abs() {
            return result;
        }
        last_row = row;
    }

    warn!(
        divmax = options.divmax,
        error = err,
        "romberg quadrature did not reach tolerance"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_polynomial() {
        let v = romberg(|x| x * x, 0.0, 1.0, &RombergOptions::default());
        assert!((v - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sine() {
        let v = romberg(f64::sin, 0.0, PI, &RombergOptions::default());
        assert!((v - 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_exponential_reversed_bounds() {
        let v = romberg(f64::exp, 1.0, 0.0, &RombergOptions::default());
        assert!((v + (1f64.exp() - 1.0)).abs() < 1e-8);
    }

    #[test]
    fn test_non_convergence_returns_estimate() {
        let options = RombergOptions {
            divmax: 1,
            ..RombergOptions::default()
        };
        let v = romberg(|x: f64| (20.0 * x).sin(), 0.0, 3.0, &options);
        assert!(v.is_finite());
    }

    #[test]
    fn test_empty_interval() {
        assert_eq!(romberg(|x| x, 2.0, 2.0, &RombergOptions::default()), 0.0);
    }
}
