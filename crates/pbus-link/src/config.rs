//! Bus connection configuration
//!
//! Plain serde structs so host applications can load them from JSON/YAML
//! or build them in code. A `reconnection_interval` of 0 disables
//! automatic reconnection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_baudrate() -> u32 {
    9600
}

fn default_reconnection_interval() -> u64 {
    15
}

/// Configuration for a bus reached through a serial port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerialBusConfig {
    /// Serial port path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    /// Baud rate of the bus interface
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// Seconds between reconnect attempts; 0 disables reconnection
    #[serde(default = "default_reconnection_interval")]
    pub reconnection_interval: u64,
}

/// Configuration for a bus reached through a TCP gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkBusConfig {
    /// Host name or IP address of the gateway
    pub address: String,
    /// TCP port of the gateway
    pub port: u16,
    /// Seconds between reconnect attempts; 0 disables reconnection
    #[serde(default = "default_reconnection_interval")]
    pub reconnection_interval: u64,
}

/// Either way of reaching a Pbus interface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BusConfig {
    /// Direct serial connection
    Serial(SerialBusConfig),
    /// TCP connection to a bus gateway
    Network(NetworkBusConfig),
}

impl BusConfig {
    /// The configured retry period; zero means reconnection is disabled
    pub fn reconnection_interval(&self) -> Duration {
        let seconds = match self {
            BusConfig::Serial(c) => c.reconnection_interval,
            BusConfig::Network(c) => c.reconnection_interval,
        };
        Duration::from_secs(seconds)
    }

    /// Short description of the endpoint, for logs and status display
    pub fn endpoint(&self) -> String {
        match self {
            BusConfig::Serial(c) => format!("{} @ {} baud", c.port, c.baudrate),
            BusConfig::Network(c) => format!("{}:{}", c.address, c.port),
        }
    }
}
