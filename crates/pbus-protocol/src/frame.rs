//! Pbus frame construction and checksum arithmetic
//!
//! # Frame Format
//! ```text
//! 0F [addr] [len] [data (0..=8 bytes)] [checksum] 04
//! ```
//!
//! - `0F`: start byte (STX)
//! - `addr`: module address (1-64)
//! - `len`: number of data bytes (0-8)
//! - `data`: command byte plus payload
//! - `checksum`: two's complement of the byte sum over STX..last data byte
//! - `04`: end byte (ETX)

use std::fmt;

use crate::error::FrameError;

/// Frame start byte
pub const STX: u8 = 0x0F;
/// Frame end byte
pub const ETX: u8 = 0x04;
/// Maximum number of data bytes in one frame
pub const MAX_DATA_LEN: usize = 8;
/// Shortest possible frame: STX, address, length 0, checksum, ETX
pub const MIN_FRAME_LEN: usize = 5;
/// Longest possible frame (full 8-byte payload)
pub const MAX_FRAME_LEN: usize = MIN_FRAME_LEN + MAX_DATA_LEN;

/// Compute the Pbus checksum over the given bytes
///
/// Bytes are summed as unsigned values modulo 256; the checksum is the
/// value that makes the total sum to zero: `(0x100 - sum) & 0xFF`.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    0u8.wrapping_sub(sum)
}

/// One complete STX..ETX byte sequence on the bus
///
/// Immutable once built. Produced either by [`Frame::build`] for the
/// outbound path or by the frame reader for inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Build a frame from a module address and data bytes
    ///
    /// Stamps STX, length, checksum and ETX around the payload. Pure;
    /// fails only when the payload exceeds [`MAX_DATA_LEN`].
    pub fn build(address: u8, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_DATA_LEN {
            return Err(FrameError::PayloadTooLong { len: data.len() });
        }

        let mut bytes = Vec::with_capacity(MIN_FRAME_LEN + data.len());
        bytes.push(STX);
        bytes.push(address);
        bytes.push(data.len() as u8);
        bytes.extend_from_slice(data);
        bytes.push(checksum(&bytes));
        bytes.push(ETX);

        Ok(Self { bytes })
    }

    /// Wrap already-validated wire bytes, as reconstructed by the reader
    pub(crate) fn from_wire_unchecked(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= MIN_FRAME_LEN);
        Self { bytes }
    }

    /// Module address this frame is addressed to (or originates from)
    pub fn address(&self) -> u8 {
        self.bytes[1]
    }

    /// Declared number of data bytes
    pub fn data_len(&self) -> usize {
        self.bytes[2] as usize
    }

    /// Data bytes: command byte plus payload
    pub fn data(&self) -> &[u8] {
        &self.bytes[3..3 + self.data_len()]
    }

    /// First data byte, the command code, if the frame carries data
    pub fn command(&self) -> Option<u8> {
        self.data().first().copied()
    }

    /// The checksum byte as present on the wire
    pub fn checksum_byte(&self) -> u8 {
        self.bytes[self.bytes.len() - 2]
    }

    /// The complete wire byte sequence
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the frame, yielding the wire bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr {:02}", self.address())?;
        match self.command() {
            Some(cmd) => write!(f, " cmd 0x{:02X}", cmd)?,
            None => write!(f, " (no data)")?,
        }
        if self.data().len() > 1 {
            write!(f, " payload {:02X?}", &self.data()[1..])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stamps_framing_bytes() {
        let frame = Frame::build(0x05, &[0x12, 0xFF]).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(bytes[0], STX);
        assert_eq!(bytes[1], 0x05);
        assert_eq!(bytes[2], 2);
        assert_eq!(&bytes[3..5], &[0x12, 0xFF]);
        assert_eq!(bytes[6], ETX);
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn checksum_makes_sum_zero() {
        let frame = Frame::build(0x21, &[0x41, 0x01, 0x00]).unwrap();
        let bytes = frame.as_bytes();

        // Summing everything up to and including the checksum gives 0 mod 256
        let total: u8 = bytes[..bytes.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(total, 0);

        let upto = bytes.len() - 2;
        assert_eq!(checksum(&bytes[..upto]), frame.checksum_byte());
    }

    #[test]
    fn empty_payload_is_valid() {
        let frame = Frame::build(0x40, &[]).unwrap();
        assert_eq!(frame.data_len(), 0);
        assert_eq!(frame.command(), None);
        assert_eq!(frame.as_bytes().len(), MIN_FRAME_LEN);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = Frame::build(0x01, &[0u8; 9]).unwrap_err();
        assert_eq!(err, FrameError::PayloadTooLong { len: 9 });
    }

    #[test]
    fn full_payload_is_accepted() {
        let frame = Frame::build(0x01, &[0u8; 8]).unwrap();
        assert_eq!(frame.data_len(), 8);
        assert_eq!(frame.as_bytes().len(), MAX_FRAME_LEN);
    }
}
