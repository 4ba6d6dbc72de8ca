//! Outbound frame pacing
//!
//! Module firmware needs quiet time between frames, so every write is
//! spaced at least [`SEND_SPACING`] after the previous one. Frames queue
//! in FIFO order and the supervisor drains the queue against the
//! deadline this type computes.

use std::collections::VecDeque;
use std::time::Duration;

use pbus_protocol::Frame;
use tokio::time::Instant;

/// Minimum gap between consecutive frame writes
pub const SEND_SPACING: Duration = Duration::from_millis(60);

/// FIFO queue of outbound frames with write-spacing bookkeeping
pub struct PacedSender {
    queue: VecDeque<Frame>,
    last_write: Option<Instant>,
}

impl PacedSender {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            last_write: None,
        }
    }

    /// Append a frame; it will be written after everything already queued
    pub fn enqueue(&mut self, frame: Frame) {
        self.queue.push_back(frame);
    }

    /// Earliest instant the next queued frame may be written
    ///
    /// `None` when the queue is empty. The first write after a
    /// (re)connection goes out immediately.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.queue.is_empty() {
            return None;
        }
        match self.last_write {
            Some(at) => Some(at + SEND_SPACING),
            None => Some(Instant::now()),
        }
    }

    /// Take the next frame for writing and stamp the spacing clock
    pub fn begin_write(&mut self) -> Option<Frame> {
        let frame = self.queue.pop_front()?;
        self.last_write = Some(Instant::now());
        Some(frame)
    }

    /// Discard all queued frames, keeping the spacing clock
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Default for PacedSender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(address: u8) -> Frame {
        Frame::build(address, &[0x12]).unwrap()
    }

    #[test]
    fn empty_queue_has_no_deadline() {
        let pacer = PacedSender::new();
        assert!(pacer.next_deadline().is_none());
        assert!(pacer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn first_write_is_immediate() {
        let mut pacer = PacedSender::new();
        pacer.enqueue(frame(1));

        let deadline = pacer.next_deadline().unwrap();
        assert!(deadline <= Instant::now());
        assert_eq!(pacer.begin_write().unwrap().address(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_write_waits_for_spacing() {
        let mut pacer = PacedSender::new();
        pacer.enqueue(frame(1));
        pacer.enqueue(frame(2));

        let start = Instant::now();
        pacer.begin_write().unwrap();

        let deadline = pacer.next_deadline().unwrap();
        assert_eq!(deadline, start + SEND_SPACING);

        tokio::time::sleep_until(deadline).await;
        assert_eq!(pacer.begin_write().unwrap().address(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_preserves_fifo_order() {
        let mut pacer = PacedSender::new();
        for address in 1..=4 {
            pacer.enqueue(frame(address));
        }

        let mut written = Vec::new();
        while let Some(deadline) = pacer.next_deadline() {
            tokio::time::sleep_until(deadline).await;
            written.push(pacer.begin_write().unwrap().address());
        }
        assert_eq!(written, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_pending_but_keeps_clock() {
        let mut pacer = PacedSender::new();
        pacer.enqueue(frame(1));
        pacer.begin_write().unwrap();

        pacer.enqueue(frame(2));
        pacer.clear();
        assert!(pacer.next_deadline().is_none());

        // A fresh enqueue still honors the spacing from the last write
        pacer.enqueue(frame(3));
        let deadline = pacer.next_deadline().unwrap();
        assert!(deadline > Instant::now());
    }
}
