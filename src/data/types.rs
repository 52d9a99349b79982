//! Core data types for sampled trajectories

use crate::error::{Error, Result};
use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};

/// Sampled trajectory of a stochastic process
///
/// States are stored column-wise: a `d × m` matrix where column `l` is the
/// snapshot at time `l · dt`. An optional action row accompanies recorded
/// control data (e.g. CartPole).
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// State snapshots (d × m)
    states: Array2<f64>,
    /// Optional scalar action per snapshot
    actions: Option<Array1<f64>>,
    /// Time step between snapshots
    dt: f64,
    /// Name/label
    name: String,
}

impl Trajectory {
    /// Create a new trajectory from a `d × m` state matrix
    pub fn new(states: Array2<f64>, dt: f64, name: &str) -> Result<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(Error::InvalidInput(format!(
                "time step must be positive and finite, got {}",
                dt
            )));
        }
        if states.nrows() == 0 {
            return Err(Error::InvalidInput(
                "trajectory needs at least one state dimension".to_string(),
            ));
        }
        Ok(Self {
            states,
            actions: None,
            dt,
            name: name.to_string(),
        })
    }

    /// Attach one action per snapshot
    pub fn with_actions(mut self, actions: Array1<f64>) -> Result<Self> {
        if actions.len() != self.len() {
            return Err(Error::shape(
                format!("{} actions", self.len()),
                format!("{} actions", actions.len()),
            ));
        }
        self.actions = Some(actions);
        Ok(self)
    }

    /// State dimension `d`
    pub fn dim(&self) -> usize {
        self.states.nrows()
    }

    /// Number of snapshots `m`
    pub fn len(&self) -> usize {
        self.states.ncols()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.states.ncols() == 0
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn states(&self) -> ArrayView2<'_, f64> {
        self.states.view()
    }

    pub fn actions(&self) -> Option<&Array1<f64>> {
        self.actions.as_ref()
    }

    /// States with the action appended as an extra last row (`(d+1) × m`)
    ///
    /// Without actions this is just a copy of the states.
    pub fn extended_states(&self) -> Array2<f64> {
        match &self.actions {
            Some(u) => {
                let row = u.view().insert_axis(Axis(0));
                // Shapes agree by construction
                concatenate(Axis(0), &[self.states.view(), row])
                    .unwrap_or_else(|_| self.states.clone())
            }
            None => self.states.clone(),
        }
    }

    /// Snapshot pairs `(X, Z)` where `Z` is `X` advanced by one step
    pub fn snapshot_pairs(&self) -> Result<(Array2<f64>, Array2<f64>)> {
        let m = self.len();
        if m < 2 {
            return Err(Error::InvalidInput(
                "need at least 2 snapshots to form pairs".to_string(),
            ));
        }
        let x = self.states.slice(s![.., ..m - 1]).to_owned();
        let z = self.states.slice(s![.., 1..]).to_owned();
        Ok((x, z))
    }

    /// Keep only the first `n` snapshots
    pub fn truncate(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            states: self.states.slice(s![.., ..n]).to_owned(),
            actions: self.actions.as_ref().map(|u| u.slice(s![..n]).to_owned()),
            dt: self.dt,
            name: self.name.clone(),
        }
    }

    /// Range `[min, max]` of the recorded actions
    pub fn action_bounds(&self) -> Option<(f64, f64)> {
        let u = self.actions.as_ref()?;
        if u.is_empty() {
            return None;
        }
        let low = u.iter().cloned().fold(f64::INFINITY, f64::min);
        let high = u.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Some((low, high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_snapshot_pairs() {
        let traj = Trajectory::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], 1.0, "t").unwrap();
        let (x, z) = traj.snapshot_pairs().unwrap();

        assert_eq!(x.dim(), (2, 2));
        assert_eq!(z[[0, 0]], 2.0);
        assert_eq!(z[[1, 1]], 6.0);
    }

    #[test]
    fn test_extended_states() {
        let traj = Trajectory::new(array![[1.0, 2.0], [3.0, 4.0]], 0.1, "t")
            .unwrap()
            .with_actions(array![0.0, 1.0])
            .unwrap();

        let ext = traj.extended_states();
        assert_eq!(ext.dim(), (3, 2));
        assert_eq!(ext[[2, 1]], 1.0);
        assert_eq!(traj.action_bounds(), Some((0.0, 1.0)));
    }

    #[test]
    fn test_action_length_mismatch() {
        let traj = Trajectory::new(array![[1.0, 2.0]], 1.0, "t").unwrap();
        assert!(traj.with_actions(array![1.0]).is_err());
    }

    #[test]
    fn test_truncate() {
        let traj = Trajectory::new(Array2::zeros((1, 10)), 1.0, "t")
            .unwrap()
            .with_actions(Array1::zeros(10))
            .unwrap();
        let head = traj.truncate(8);
        assert_eq!(head.len(), 8);
        assert_eq!(head.actions().map(|u| u.len()), Some(8));
        assert_eq!(traj.truncate(20).len(), 10);
    }

    #[test]
    fn test_invalid_dt() {
        assert!(Trajectory::new(Array2::zeros((1, 3)), 0.0, "t").is_err());
    }
}
