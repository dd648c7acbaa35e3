use thiserror::Error;
use tracing::info;

/// Failure reported by a [`LogSink`]. Callers are expected to propagate it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Destination for the request log lines. Injected into filters at
/// construction instead of being looked up globally.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str) -> Result<(), SinkError>;
}

/// Forwards every line to the `tracing` subscriber at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub const TARGET: &'static str = "gateway::request_log";

    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn info(&self, message: &str) -> Result<(), SinkError> {
        info!(target: "gateway::request_log", "{}", message);
        Ok(())
    }
}
