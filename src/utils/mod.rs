//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup

mod config;
mod logging;

pub use config::{
    AnalysisConfig, Config, ControlConfig, DictionaryConfig, EstimatorConfig, LoggingConfig,
    SimulationConfig,
};
pub use logging::setup_logging;
