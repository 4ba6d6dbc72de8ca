//! Per-address listener registry and frame dispatch
//!
//! Each module address maps to at most one consumer; frames for
//! unclaimed addresses go to a single catch-all consumer (used by
//! discovery layers to notice new modules). The registry is owned by the
//! supervisor actor, so all mutation arrives serialized through its
//! command channel and no locking is needed.

use std::collections::HashMap;

use pbus_protocol::Frame;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receives the frames addressed to a registered module address
pub trait FrameConsumer: Send {
    /// Called from the read task for every frame routed to this consumer
    fn on_frame(&mut self, frame: Frame);
}

/// Channel senders make natural consumers: delivery order is preserved
/// and the receiving task decodes at its own pace.
impl FrameConsumer for mpsc::UnboundedSender<Frame> {
    fn on_frame(&mut self, frame: Frame) {
        if self.send(frame).is_err() {
            debug!("frame consumer dropped its receiver; frame discarded");
        }
    }
}

/// Maps module addresses to their consumers
pub struct ListenerRegistry {
    listeners: HashMap<u8, Box<dyn FrameConsumer>>,
    catch_all: Option<Box<dyn FrameConsumer>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            catch_all: None,
        }
    }

    /// Claim an address; replaces any previous consumer for it
    pub fn register(&mut self, address: u8, consumer: Box<dyn FrameConsumer>) {
        if self.listeners.insert(address, consumer).is_some() {
            debug!("replaced existing listener for address {}", address);
        } else {
            debug!("registered listener for address {}", address);
        }
    }

    /// Release an address
    pub fn unregister(&mut self, address: u8) {
        if self.listeners.remove(&address).is_some() {
            debug!("unregistered listener for address {}", address);
        }
    }

    /// Install the catch-all consumer for unclaimed addresses
    pub fn set_catch_all(&mut self, consumer: Box<dyn FrameConsumer>) {
        self.catch_all = Some(consumer);
    }

    /// Remove the catch-all consumer
    pub fn clear_catch_all(&mut self) {
        self.catch_all = None;
    }

    /// Route an inbound frame to its consumer
    ///
    /// The registered consumer for the frame's address wins; otherwise
    /// the catch-all gets it; otherwise the frame is dropped. An unknown
    /// address is not an error.
    pub fn dispatch(&mut self, frame: Frame) {
        let address = frame.address();

        if let Some(listener) = self.listeners.get_mut(&address) {
            trace!("dispatching frame for address {} to its listener", address);
            listener.on_frame(frame);
        } else if let Some(catch_all) = self.catch_all.as_mut() {
            trace!(
                "dispatching frame for unclaimed address {} to catch-all",
                address
            );
            catch_all.on_frame(frame);
        } else {
            debug!("no listener for address {}; frame dropped", address);
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbus_protocol::Frame;

    fn channel_consumer() -> (Box<dyn FrameConsumer>, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Box::new(tx), rx)
    }

    #[test]
    fn registered_address_wins_over_catch_all() {
        let mut registry = ListenerRegistry::new();
        let (consumer, mut rx) = channel_consumer();
        let (fallback, mut fallback_rx) = channel_consumer();

        registry.register(5, consumer);
        registry.set_catch_all(fallback);

        registry.dispatch(Frame::build(5, &[0x22, 0x01]).unwrap());

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.address(), 5);
        assert!(rx.try_recv().is_err(), "delivered more than once");
        assert!(fallback_rx.try_recv().is_err(), "catch-all also received");
    }

    #[test]
    fn unclaimed_address_goes_to_catch_all() {
        let mut registry = ListenerRegistry::new();
        let (fallback, mut fallback_rx) = channel_consumer();
        registry.set_catch_all(fallback);

        registry.dispatch(Frame::build(9, &[0x21, 0x02]).unwrap());

        assert_eq!(fallback_rx.try_recv().unwrap().address(), 9);
        assert!(fallback_rx.try_recv().is_err());
    }

    #[test]
    fn no_listener_drops_frame() {
        let mut registry = ListenerRegistry::new();
        // Nothing registered; dispatch must simply not panic
        registry.dispatch(Frame::build(3, &[]).unwrap());
    }

    #[test]
    fn unregister_reroutes_to_catch_all() {
        let mut registry = ListenerRegistry::new();
        let (consumer, mut rx) = channel_consumer();
        let (fallback, mut fallback_rx) = channel_consumer();

        registry.register(7, consumer);
        registry.set_catch_all(fallback);
        registry.unregister(7);

        registry.dispatch(Frame::build(7, &[0x22, 0x00]).unwrap());

        assert!(rx.try_recv().is_err());
        assert_eq!(fallback_rx.try_recv().unwrap().address(), 7);
    }

    #[test]
    fn clearing_catch_all_stops_delivery() {
        let mut registry = ListenerRegistry::new();
        let (fallback, mut fallback_rx) = channel_consumer();

        registry.set_catch_all(fallback);
        registry.clear_catch_all();

        registry.dispatch(Frame::build(2, &[]).unwrap());
        assert!(fallback_rx.try_recv().is_err());
    }
}
