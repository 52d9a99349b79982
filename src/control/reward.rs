//! Rewards for the soft value iteration

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Immediate reward `r(x, u)`
pub trait Reward: Send + Sync {
    fn reward(&self, state: ArrayView1<f64>, action: f64) -> f64;
}

/// CartPole survival reward
///
/// State layout is `[x, ẋ, θ, θ̇]`. The reward is 1 while the cart stays
/// within `position_limit` and the pole within `angle_limit` radians of
/// upright, 0 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartpoleReward {
    pub position_limit: f64,
    pub angle_limit: f64,
}

impl Default for CartpoleReward {
    fn default() -> Self {
        Self {
            position_limit: 2.4,
            angle_limit: 12.0f64.to_radians(),
        }
    }
}

impl Reward for CartpoleReward {
    fn reward(&self, state: ArrayView1<f64>, _action: f64) -> f64 {
        if state.len() < 3 {
            return 0.0;
        }
        let alive = state[0].abs() <= self.position_limit && state[2].abs() <= self.angle_limit;
        if alive {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cartpole_reward() {
        let r = CartpoleReward::default();
        assert_eq!(r.reward(array![0.0, 1.0, 0.1, -2.0].view(), 0.0), 1.0);
        assert_eq!(r.reward(array![2.5, 0.0, 0.0, 0.0].view(), 1.0), 0.0);
        assert_eq!(r.reward(array![0.0, 0.0, 0.3, 0.0].view(), 1.0), 0.0);
        assert_eq!(r.reward(array![-2.4, 0.0, -0.2, 0.0].view(), 1.0), 1.0);
    }
}
