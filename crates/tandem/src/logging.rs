//! Tracing setup for binaries built on Tandem.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::TandemError;

/// Installs a global subscriber that prints to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (for example `"info"` or `"tandem_world=debug,info"`).
///
/// # Errors
/// [`TandemError::Logging`] if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), TandemError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}
