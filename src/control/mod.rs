//! Experimental control loop on extended states
//!
//! This module provides:
//! - Romberg quadrature over the action interval
//! - Rewards, including the CartPole survival reward
//! - Soft value iteration with a softmax policy

mod quadrature;
mod reward;
mod value_iteration;

pub use quadrature::{romberg, RombergOptions};
pub use reward::{CartpoleReward, Reward};
pub use value_iteration::{SoftPolicy, SoftValueIteration};
