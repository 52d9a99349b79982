//! Box discretisation of a rectangular domain
//!
//! Used to place Gaussian dictionary centres on a regular grid.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// Regular box grid over `[lo_0, hi_0] × … × [lo_{d-1}, hi_{d-1}]`
#[derive(Debug, Clone)]
pub struct Discretization {
    /// Lower and upper bound per dimension
    bounds: Vec<(f64, f64)>,
    /// Number of boxes per dimension
    boxes: Vec<usize>,
}

impl Discretization {
    /// Create a discretisation
    ///
    /// # Arguments
    ///
    /// * `bounds` - `(lower, upper)` per dimension
    /// * `boxes` - number of boxes per dimension
    pub fn new(bounds: Vec<(f64, f64)>, boxes: Vec<usize>) -> Result<Self> {
        if bounds.len() != boxes.len() || bounds.is_empty() {
            return Err(Error::shape(
                format!("{} box counts", bounds.len()),
                format!("{}", boxes.len()),
            ));
        }
        if bounds.iter().any(|(lo, hi)| !(hi > lo)) {
            return Err(Error::InvalidInput(
                "every upper bound must exceed its lower bound".to_string(),
            ));
        }
        if boxes.iter().any(|&n| n == 0) {
            return Err(Error::InvalidInput(
                "every dimension needs at least one box".to_string(),
            ));
        }
        Ok(Self { bounds, boxes })
    }

    pub fn dim(&self) -> usize {
        self.bounds.len()
    }

    /// Total number of boxes
    pub fn num_boxes(&self) -> usize {
        self.boxes.iter().product()
    }

    /// Edge length of a box in each dimension
    pub fn box_size(&self) -> Array1<f64> {
        self.bounds
            .iter()
            .zip(self.boxes.iter())
            .map(|((lo, hi), &n)| (hi - lo) / n as f64)
            .collect()
    }

    /// Box centres, `d × num_boxes`, first dimension varying fastest
    pub fn midpoints(&self) -> Array2<f64> {
        let d = self.dim();
        let n = self.num_boxes();
        let h = self.box_size();
        let mut centers = Array2::zeros((d, n));

        for idx in 0..n {
            let mut rest = idx;
            for i in 0..d {
                let j = rest % self.boxes[i];
                rest /= self.boxes[i];
                centers[[i, idx]] = self.bounds[i].0 + (j as f64 + 0.5) * h[i];
            }
        }
        centers
    }

    /// Linear index of the box containing `x`, if inside the domain
    pub fn box_index(&self, x: ArrayView1<f64>) -> Option<usize> {
        if x.len() != self.dim() {
            return None;
        }
        let h = self.box_size();
        let mut index = 0;
        let mut stride = 1;
        for i in 0..self.dim() {
            let (lo, hi) = self.bounds[i];
            if x[i] < lo || x[i] > hi {
                return None;
            }
            let j = (((x[i] - lo) / h[i]) as usize).min(self.boxes[i] - 1);
            index += j * stride;
            stride *= self.boxes[i];
        }
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_midpoints_1d() {
        let omega = Discretization::new(vec![(-200.0, 200.0)], vec![1000]).unwrap();
        let c = omega.midpoints();

        assert_eq!(c.dim(), (1, 1000));
        assert!((c[[0, 0]] + 199.8).abs() < 1e-10);
        assert!((c[[0, 999]] - 199.8).abs() < 1e-10);
    }

    #[test]
    fn test_box_index_roundtrip() {
        let omega = Discretization::new(vec![(0.0, 1.0), (0.0, 2.0)], vec![4, 2]).unwrap();
        let c = omega.midpoints();

        for idx in 0..omega.num_boxes() {
            assert_eq!(omega.box_index(c.column(idx)), Some(idx));
        }
        assert_eq!(omega.box_index(array![1.5, 0.0].view()), None);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(Discretization::new(vec![(1.0, 0.0)], vec![3]).is_err());
        assert!(Discretization::new(vec![(0.0, 1.0)], vec![0]).is_err());
        assert!(Discretization::new(vec![(0.0, 1.0)], vec![2, 2]).is_err());
    }
}
