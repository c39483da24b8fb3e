use thiserror::Error;

/// Errors returned synchronously by the sync engine API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The engine has been closed, or a channel id does not belong to it.
    #[error("invalid or closed sync handle")]
    InvalidHandle,
    #[error("invalid tempo: {0} microseconds per beat")]
    InvalidTempo(u32),
    #[error("invalid resolution: {0} ticks per beat (expected 1..=960)")]
    InvalidResolution(u32),
    #[error("invalid timer period: {0} microseconds")]
    InvalidPeriod(u64),
    /// The output queue is at capacity; the event was rejected.
    #[error("output queue full ({capacity} events)")]
    QueueFull { capacity: usize },
    #[error("allocation failure: {0}")]
    AllocationFailure(String),
    /// A slave-only operation was attempted in internal mode.
    #[error("operation requires external sync mode")]
    InvalidMode,
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
