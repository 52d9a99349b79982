//! Trajectory data: simulation and loading of recorded samples

mod loader;
mod simulate;
mod types;

pub use loader::{load_matrix, load_trajectory, load_vector};
pub use simulate::{brownian, make_rng, ornstein_uhlenbeck, simulate, OrnsteinUhlenbeck, Process};
pub use types::Trajectory;
