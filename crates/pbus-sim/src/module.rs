//! Virtual bus module simulation
//!
//! Provides a simulated relay module that answers status requests and
//! executes relay commands with wire-accurate frames.

use std::collections::VecDeque;

use pbus_protocol::{command, Frame, FrameError, FrameReader};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

/// A simulated relay module at a fixed bus address
///
/// The module decodes frames from raw bytes, ignores traffic for other
/// addresses and queues wire-ready answer frames for everything it
/// understands.
#[derive(Debug)]
pub struct VirtualModule {
    /// Bus address this module answers on
    address: u8,
    /// Module type identifier reported on type requests
    module_type: u8,
    /// Current relay states, one bit per channel
    relay_bits: u8,
    /// Decoder for the inbound byte stream
    reader: FrameReader,
    /// Answer frames not yet taken by the caller
    pending: VecDeque<Frame>,
}

impl VirtualModule {
    /// Create a module of the given type at the given address
    pub fn new(address: u8, module_type: u8) -> Self {
        Self {
            address,
            module_type,
            relay_bits: 0,
            reader: FrameReader::new(),
            pending: VecDeque::new(),
        }
    }

    /// The bus address this module answers on
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current relay states, one bit per channel
    pub fn relay_bits(&self) -> u8 {
        self.relay_bits
    }

    /// Whether the given 1-based channel is switched on
    pub fn channel_on(&self, channel: u8) -> bool {
        (1..=8).contains(&channel) && self.relay_bits & (1 << (channel - 1)) != 0
    }

    /// Feed raw bus bytes into the module
    ///
    /// Frames addressed elsewhere are ignored. Answers queue up for
    /// [`take_output`](Self::take_output).
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        self.reader.push_bytes(bytes);
        while let Some(frame) = self.reader.next_frame() {
            if frame.address() != self.address {
                trace!(
                    "module {} ignoring frame for address {}",
                    self.address,
                    frame.address()
                );
                continue;
            }
            self.handle_frame(&frame)?;
        }
        Ok(())
    }

    /// Queue an unsolicited module type answer, as a module does on power-up
    pub fn announce(&mut self) -> Result<(), FrameError> {
        self.answer(&[command::MODULE_TYPE_ANSWER, self.module_type])
    }

    /// Take the next queued answer frame
    pub fn take_output(&mut self) -> Option<Frame> {
        self.pending.pop_front()
    }

    fn handle_frame(&mut self, frame: &Frame) -> Result<(), FrameError> {
        let Some(cmd) = frame.command() else {
            trace!("module {} ignoring empty frame", self.address);
            return Ok(());
        };

        match cmd {
            command::MODULE_TYPE_REQUEST => {
                self.answer(&[command::MODULE_TYPE_ANSWER, self.module_type])
            }
            command::DIGITAL_STATUS_REQUEST => {
                self.answer(&[command::DIGITAL_STATUS_ANSWER, self.relay_bits])
            }
            command::FEEDBACK_REQUEST => {
                self.answer(&[command::FEEDBACK_ANSWER, self.relay_bits])
            }
            command::SWITCH_RELAY => {
                let data = frame.data();
                if data.len() < 3 {
                    warn!("module {} got short relay command", self.address);
                    return Ok(());
                }
                let channel = data[1];
                let on = data[2] != 0;
                if !(1..=8).contains(&channel) {
                    warn!(
                        "module {} got relay command for channel {}",
                        self.address, channel
                    );
                    return Ok(());
                }
                let mask = 1 << (channel - 1);
                if on {
                    self.relay_bits |= mask;
                } else {
                    self.relay_bits &= !mask;
                }
                debug!(
                    "module {} relay {} switched {}",
                    self.address,
                    channel,
                    if on { "on" } else { "off" }
                );
                // Modules report the new state right after switching
                self.answer(&[command::DIGITAL_STATUS_ANSWER, self.relay_bits])
            }
            other => {
                trace!(
                    "module {} ignoring unsupported command {:#04x}",
                    self.address,
                    other
                );
                Ok(())
            }
        }
    }

    fn answer(&mut self, data: &[u8]) -> Result<(), FrameError> {
        self.pending.push_back(Frame::build(self.address, data)?);
        Ok(())
    }
}

/// Drive a module over an async byte stream until the peer disconnects
///
/// Reads bus traffic, feeds it to the module and writes its answers back.
/// Used with one end of a `tokio::io::duplex` pair to stand in for a
/// physical module behind a serial or TCP interface.
pub async fn run_module_io<S>(mut module: VirtualModule, stream: S) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let mut buf = [0u8; 256];

    loop {
        let n = read_half.read(&mut buf).await?;
        if n == 0 {
            debug!("module {} peer disconnected", module.address());
            return Ok(());
        }
        if let Err(e) = module.push_bytes(&buf[..n]) {
            warn!("module {} produced invalid answer: {}", module.address(), e);
            continue;
        }
        while let Some(frame) = module.take_output() {
            write_half.write_all(frame.as_bytes()).await?;
        }
        write_half.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbus_protocol::command::module_type;

    fn feed(module: &mut VirtualModule, frame: Frame) {
        module.push_bytes(frame.as_bytes()).unwrap();
    }

    #[test]
    fn answers_module_type_request() {
        let mut module = VirtualModule::new(5, module_type::M2Y10);
        feed(&mut module, Frame::build(5, &[command::MODULE_TYPE_REQUEST]).unwrap());

        let answer = module.take_output().unwrap();
        assert_eq!(answer.address(), 5);
        assert_eq!(answer.data(), &[command::MODULE_TYPE_ANSWER, module_type::M2Y10]);
        assert!(module.take_output().is_none());
    }

    #[test]
    fn switch_relay_updates_state_and_reports() {
        let mut module = VirtualModule::new(3, module_type::M2Y420);
        feed(
            &mut module,
            Frame::build(3, &[command::SWITCH_RELAY, 2, 1]).unwrap(),
        );

        assert!(module.channel_on(2));
        assert!(!module.channel_on(1));

        let answer = module.take_output().unwrap();
        assert_eq!(answer.data(), &[command::DIGITAL_STATUS_ANSWER, 0b0000_0010]);

        feed(
            &mut module,
            Frame::build(3, &[command::SWITCH_RELAY, 2, 0]).unwrap(),
        );
        assert!(!module.channel_on(2));
        let answer = module.take_output().unwrap();
        assert_eq!(answer.data(), &[command::DIGITAL_STATUS_ANSWER, 0]);
    }

    #[test]
    fn ignores_frames_for_other_addresses() {
        let mut module = VirtualModule::new(7, module_type::M2Y10);
        feed(
            &mut module,
            Frame::build(8, &[command::DIGITAL_STATUS_REQUEST]).unwrap(),
        );
        assert!(module.take_output().is_none());
    }

    #[test]
    fn status_request_reports_relay_bits() {
        let mut module = VirtualModule::new(2, module_type::M2Y10);
        feed(
            &mut module,
            Frame::build(2, &[command::SWITCH_RELAY, 5, 1]).unwrap(),
        );
        let _ = module.take_output();

        feed(
            &mut module,
            Frame::build(2, &[command::DIGITAL_STATUS_REQUEST]).unwrap(),
        );
        let answer = module.take_output().unwrap();
        assert_eq!(answer.data(), &[command::DIGITAL_STATUS_ANSWER, 0b0001_0000]);
    }

    #[tokio::test]
    async fn io_loop_answers_over_duplex() {
        let (local, mut remote) = tokio::io::duplex(256);
        let module = VirtualModule::new(9, module_type::M2Y10);
        let task = tokio::spawn(run_module_io(module, local));

        let request = Frame::build(9, &[command::MODULE_TYPE_REQUEST]).unwrap();
        remote.write_all(request.as_bytes()).await.unwrap();

        let mut reader = FrameReader::new();
        let mut buf = [0u8; 64];
        let answer = loop {
            let n = remote.read(&mut buf).await.unwrap();
            reader.push_bytes(&buf[..n]);
            if let Some(frame) = reader.next_frame() {
                break frame;
            }
        };
        assert_eq!(answer.address(), 9);
        assert_eq!(answer.data()[0], command::MODULE_TYPE_ANSWER);

        drop(remote);
        task.await.unwrap().unwrap();
    }
}
