//! Pbus Wire Protocol Library
//!
//! This crate provides the pure-protocol half of the Pbus engine:
//!
//! - **Frame codec**: build outbound frames and compute the bus checksum
//! - **Frame reader**: a streaming state machine that turns raw transport
//!   bytes into complete, checksum-valid frames and resynchronizes after
//!   any framing violation
//! - **Command table**: the byte codes modules understand, kept opaque to
//!   the engine itself
//! - **Addressing**: module addresses (1-64) and the channel index to
//!   (address, bit mask) arithmetic shared by all device decoders
//!
//! No I/O happens here; the async transport side lives in `pbus-link`.
//!
//! # Example
//!
//! ```rust
//! use pbus_protocol::{command, Frame, FrameReader};
//!
//! // Ask module 5 for its digital status
//! let request = Frame::build(5, &[command::DIGITAL_STATUS_REQUEST]).unwrap();
//!
//! // Feed received bytes through the reader
//! let mut reader = FrameReader::new();
//! reader.push_bytes(request.as_bytes());
//!
//! let frame = reader.next_frame().unwrap();
//! assert_eq!(frame.address(), 5);
//! assert_eq!(frame.command(), Some(command::DIGITAL_STATUS_REQUEST));
//! ```

pub mod address;
pub mod command;
pub mod error;
pub mod frame;
pub mod reader;

pub use address::{ChannelIdentifier, ModuleAddress, MAX_ADDRESS, MIN_ADDRESS};
pub use error::{AddressError, FrameError};
pub use frame::{checksum, Frame, ETX, MAX_DATA_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN, STX};
pub use reader::FrameReader;
