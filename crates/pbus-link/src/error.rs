//! Error types for the bus link

use thiserror::Error;

/// Errors that can occur while running or talking to a bus link
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O failure on the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port failure
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Bad configuration; connecting will not succeed until it is fixed
    #[error("configuration error: {0}")]
    Config(String),

    /// The bus actor has shut down and no longer accepts commands
    #[error("bus is no longer running")]
    ChannelClosed,
}

impl LinkError {
    /// Configuration errors are terminal: retrying the same connect
    /// cannot succeed, so the supervisor must not schedule reconnection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkError::Config(_))
    }
}
