use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

use crate::error::{CatalogError, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used. Fails if a
/// subscriber is already installed, which hosts calling in twice may ignore.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| CatalogError::config(format!("failed to initialize tracing: {e}")))
}
