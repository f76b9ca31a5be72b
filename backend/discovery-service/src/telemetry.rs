use crate::config::LogFormat;
use tracing_subscriber::{fmt, prelude::*, util::TryInitError, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_tracing(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
}
