use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub mod sink;

pub use sink::{LogSink, SinkError, TracingSink};

/// Installs the global subscriber. `LOG_FORMAT` wins over `logging.format`
/// and `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match log_format.as_str() {
        "json" => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        _ => subscriber.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    Ok(())
}
