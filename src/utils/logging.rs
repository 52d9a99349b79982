//! Logging setup
//!
//! This module provides logging configuration.

use crate::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup logging with the specified level
///
/// `RUST_LOG` takes precedence when set. Calling this more than once keeps
/// the first subscriber.
pub fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .try_init()
        .ok();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_setup() {
        assert!(setup_logging("debug").is_ok());
        assert!(setup_logging("info").is_ok());
    }
}
