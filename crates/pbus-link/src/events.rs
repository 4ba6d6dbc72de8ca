//! Connection state and the event stream observers receive
//!
//! All link activity that collaborators care about (connectivity changes
//! and their reasons) is emitted through a single event channel, keeping
//! observation separate from the frame dispatch path.

/// Lifecycle state of the bus connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No transport, and no reconnection pending
    Disconnected,
    /// A connect attempt is in progress
    Connecting,
    /// Transport open; frames flow in both directions
    Online,
    /// Waiting out the retry interval after a failure
    Reconnecting,
}

impl LinkState {
    /// Human-readable name, for status display
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Online => "online",
            LinkState::Reconnecting => "reconnecting",
        }
    }
}

/// Events emitted by the bus supervisor
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The transport is open and the read loop is running
    Online,

    /// An established connection was lost
    Offline {
        /// What failed (read error, write error, peer closed)
        reason: String,
    },

    /// A connect attempt did not succeed
    ConnectFailed {
        /// Why the attempt failed
        reason: String,
        /// Terminal failures (bad configuration) stop the retry loop
        terminal: bool,
    },
}

impl LinkEvent {
    /// Whether this event leaves the link unusable until reconnection
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LinkEvent::Offline { .. } | LinkEvent::ConnectFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classification() {
        assert!(!LinkEvent::Online.is_failure());
        assert!(LinkEvent::Offline {
            reason: "peer closed".into()
        }
        .is_failure());
        assert!(LinkEvent::ConnectFailed {
            reason: "no such port".into(),
            terminal: true
        }
        .is_failure());
    }

    #[test]
    fn state_names() {
        assert_eq!(LinkState::Online.name(), "online");
        assert_eq!(LinkState::Reconnecting.name(), "reconnecting");
    }
}
