//! Error types for Pbus frame handling and addressing

use thiserror::Error;

/// Errors produced while building frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload exceeds the 8 data bytes a frame can carry
    #[error("payload too long: {len} bytes (max 8)")]
    PayloadTooLong { len: usize },
}

/// Errors produced by module address and channel arithmetic
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Address outside the valid bus range 1-64
    #[error("invalid module address: {0}")]
    InvalidAddress(String),

    /// Channel index past the module's last sub-channel
    #[error("channel index {index} out of range (module has {count} channels)")]
    ChannelOutOfRange { index: usize, count: usize },

    /// Channel identifier names an address the module does not own
    #[error("address {address} is not an active address of this module")]
    UnknownAddress { address: u8 },

    /// Channel byte with zero or more than one bit set
    #[error("invalid channel mask: 0x{0:02X}")]
    InvalidMask(u8),
}
