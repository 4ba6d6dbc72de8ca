//! Bus link layer: transports, connection supervision and frame dispatch
//!
//! This crate connects a [`pbus_protocol`] frame engine to a real bus
//! interface. It provides:
//!
//! - [`Connector`] implementations for serial ports and TCP gateways
//! - a supervisor actor that owns the connection, retries failed links
//!   at a configurable interval and paces outbound frames
//! - a per-address listener registry with a catch-all consumer for
//!   frames nobody has claimed
//!
//! All interaction goes through a [`BusHandle`]; the supervisor task owns
//! every piece of mutable state.

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod sender;
pub mod supervisor;
pub mod transport;

pub use config::{BusConfig, NetworkBusConfig, SerialBusConfig};
pub use error::LinkError;
pub use events::{LinkEvent, LinkState};
pub use registry::{FrameConsumer, ListenerRegistry};
pub use sender::{PacedSender, SEND_SPACING};
pub use supervisor::{BusCommand, BusHandle};
pub use transport::{BusConnector, BusStream, Connector, SerialConnector, TcpConnector};
