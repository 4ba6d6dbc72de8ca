//! Streaming Pbus frame reader
//!
//! A push-based state machine that aggregates raw transport bytes into
//! checksum-valid frames. The transport task feeds it whatever the stream
//! delivered (`push_bytes`) and then drains completed frames
//! (`next_frame`); the reader itself never touches I/O.
//!
//! Malformed input is never fatal. On any framing violation the partial
//! frame is discarded and scanning resumes at the next byte, so a valid
//! frame that arrived in the same burst as a corrupted one still comes
//! out. Violations are logged and counted for diagnostics only.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::frame::{checksum, Frame, ETX, MAX_DATA_LEN, STX};

/// Decoder states, one per expected wire position
#[derive(Debug)]
enum ReadState {
    AwaitStx,
    AwaitAddress,
    AwaitLength {
        address: u8,
    },
    ReadData {
        address: u8,
        length: u8,
        data: Vec<u8>,
    },
    AwaitChecksum {
        address: u8,
        length: u8,
        data: Vec<u8>,
    },
    /// Header, data and checksum collected; only the end byte is missing
    AwaitEtx {
        partial: Vec<u8>,
    },
}

/// Byte-stream state machine emitting complete, checksum-valid frames
#[derive(Debug)]
pub struct FrameReader {
    buf: VecDeque<u8>,
    state: ReadState,
    framing_errors: u64,
}

impl FrameReader {
    /// Create a reader in the initial (awaiting STX) state
    pub fn new() -> Self {
        Self {
            buf: VecDeque::with_capacity(64),
            state: ReadState::AwaitStx,
            framing_errors: 0,
        }
    }

    /// Append raw bytes from the transport to the internal buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend(data);
    }

    /// Number of framing violations seen since creation
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    /// Drop buffered bytes and any partial frame, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = ReadState::AwaitStx;
    }

    /// Extract the next complete frame, if the buffer holds one
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(byte) = self.buf.pop_front() {
            if let Some(frame) = self.step(byte) {
                return Some(frame);
            }
        }
        None
    }

    /// Advance the state machine by one byte
    fn step(&mut self, byte: u8) -> Option<Frame> {
        match std::mem::replace(&mut self.state, ReadState::AwaitStx) {
            ReadState::AwaitStx => {
                if byte == STX {
                    self.state = ReadState::AwaitAddress;
                } else {
                    // Stay put; line noise between frames is discarded byte by byte
                    self.framing_errors += 1;
                    trace!("discarding byte 0x{:02X} while waiting for STX", byte);
                }
                None
            }

            ReadState::AwaitAddress => {
                self.state = ReadState::AwaitLength { address: byte };
                None
            }

            ReadState::AwaitLength { address } => {
                if byte as usize <= MAX_DATA_LEN {
                    if byte == 0 {
                        self.state = ReadState::AwaitChecksum {
                            address,
                            length: 0,
                            data: Vec::new(),
                        };
                    } else {
                        self.state = ReadState::ReadData {
                            address,
                            length: byte,
                            data: Vec::with_capacity(byte as usize),
                        };
                    }
                } else {
                    // Some modules omit the length byte and send a single
                    // data byte in its place. Treat the byte as that data
                    // byte and validate against a reconstructed length of 1.
                    debug!(
                        "length byte 0x{:02X} > 8, treating it as a lone data byte",
                        byte
                    );
                    self.state = ReadState::AwaitChecksum {
                        address,
                        length: 1,
                        data: vec![byte],
                    };
                }
                None
            }

            ReadState::ReadData {
                address,
                length,
                mut data,
            } => {
                data.push(byte);
                self.state = if data.len() == length as usize {
                    ReadState::AwaitChecksum {
                        address,
                        length,
                        data,
                    }
                } else {
                    ReadState::ReadData {
                        address,
                        length,
                        data,
                    }
                };
                None
            }

            ReadState::AwaitChecksum {
                address,
                length,
                data,
            } => {
                let mut partial = Vec::with_capacity(5 + data.len());
                partial.push(STX);
                partial.push(address);
                partial.push(length);
                partial.extend_from_slice(&data);

                let expected = checksum(&partial);
                if byte == expected {
                    partial.push(byte);
                    self.state = ReadState::AwaitEtx { partial };
                } else {
                    self.framing_errors += 1;
                    warn!(
                        "frame for address {} has checksum 0x{:02X}, expected 0x{:02X}; resyncing",
                        address, byte, expected
                    );
                    // state already reset to AwaitStx by the take above
                }
                None
            }

            ReadState::AwaitEtx { mut partial } => {
                if byte == ETX {
                    partial.push(ETX);
                    trace!("frame received: {:02X?}", partial);
                    Some(Frame::from_wire_unchecked(partial))
                } else {
                    self.framing_errors += 1;
                    warn!("frame ends with 0x{:02X} instead of ETX; resyncing", byte);
                    None
                }
            }
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn read_all(reader: &mut FrameReader, bytes: &[u8]) -> Vec<Frame> {
        reader.push_bytes(bytes);
        std::iter::from_fn(|| reader.next_frame()).collect()
    }

    #[test]
    fn complete_frame_round_trips() {
        let built = Frame::build(0x05, &[0x22, 0x03]).unwrap();

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, built.as_bytes());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], built);
        assert_eq!(reader.framing_errors(), 0);
    }

    #[test]
    fn zero_length_frame_round_trips() {
        let built = Frame::build(0x12, &[]).unwrap();

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, built.as_bytes());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data_len(), 0);
    }

    #[test]
    fn stray_bytes_before_stx_are_skipped() {
        let built = Frame::build(0x07, &[0x12]).unwrap();
        let mut bytes = vec![0x00, 0xAA, 0x55];
        bytes.extend_from_slice(built.as_bytes());

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, &bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address(), 0x07);
        assert_eq!(reader.framing_errors(), 3);
    }

    #[test]
    fn frame_split_across_pushes() {
        let built = Frame::build(0x09, &[0x41, 0x02, 0x01]).unwrap();
        let bytes = built.as_bytes();

        let mut reader = FrameReader::new();
        reader.push_bytes(&bytes[..4]);
        assert!(reader.next_frame().is_none());
        reader.push_bytes(&bytes[4..]);
        assert_eq!(reader.next_frame(), Some(built));
    }

    #[test]
    fn bad_checksum_resyncs_to_next_frame() {
        let good = Frame::build(0x22, &[]).unwrap();

        // Two-byte frame for address 0x10 with a deliberately wrong checksum
        let mut bytes = vec![STX, 0x10, 0x02, 0x01, 0x02, 0xFF, ETX];
        bytes.extend_from_slice(good.as_bytes());

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, &bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address(), 0x22);
        assert_eq!(frames[0].data_len(), 0);
        assert!(reader.framing_errors() > 0);
    }

    #[test]
    fn bad_etx_resyncs_to_next_frame() {
        let good = Frame::build(0x03, &[0x12]).unwrap();

        let mut bad = Frame::build(0x02, &[0x11]).unwrap().into_bytes();
        let last = bad.len() - 1;
        bad[last] = 0x77; // corrupt the end byte
        bad.extend_from_slice(good.as_bytes());

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, &bad);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address(), 0x03);
    }

    #[test]
    fn oversized_length_byte_becomes_lone_data_byte() {
        // 0x09 > 8 is taken as the single data byte; the checksum covers the
        // reconstructed header [STX, addr, 0x01, 0x09]
        let addr = 0x15;
        let cksum = checksum(&[STX, addr, 0x01, 0x09]);
        let bytes = vec![STX, addr, 0x09, cksum, ETX];

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, &bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].address(), addr);
        assert_eq!(frames[0].data_len(), 1);
        assert_eq!(frames[0].data(), &[0x09]);
        assert_eq!(reader.framing_errors(), 0);
    }

    #[test]
    fn reset_drops_partial_state() {
        let built = Frame::build(0x05, &[0x12]).unwrap();

        let mut reader = FrameReader::new();
        reader.push_bytes(&built.as_bytes()[..3]);
        assert!(reader.next_frame().is_none());

        reader.reset();
        let frames = read_all(&mut reader, built.as_bytes());
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn back_to_back_frames_in_one_push() {
        let a = Frame::build(0x01, &[0x12]).unwrap();
        let b = Frame::build(0x02, &[0x13]).unwrap();
        let mut bytes = a.as_bytes().to_vec();
        bytes.extend_from_slice(b.as_bytes());

        let mut reader = FrameReader::new();
        let frames = read_all(&mut reader, &bytes);

        assert_eq!(frames, vec![a, b]);
    }
}
