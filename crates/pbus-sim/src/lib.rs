//! Bus Module Simulation Library
//!
//! This crate provides simulated bus modules for testing the link layer
//! without physical hardware. It includes:
//!
//! - **VirtualModule**: a relay module that answers status requests and
//!   executes relay commands with wire-accurate frames
//! - **run_module_io**: drives a module over any async byte stream, so a
//!   `tokio::io::duplex` pair can stand in for a serial line
//!
//! # Example
//!
//! ```rust
//! use pbus_sim::VirtualModule;
//! use pbus_protocol::{command, Frame};
//!
//! let mut module = VirtualModule::new(5, command::module_type::M2Y10);
//!
//! // Switch relay channel 2 on
//! let request = Frame::build(5, &[command::SWITCH_RELAY, 2, 1]).unwrap();
//! module.push_bytes(request.as_bytes()).unwrap();
//!
//! // The module reports its new state
//! let answer = module.take_output().unwrap();
//! assert_eq!(answer.data(), &[command::DIGITAL_STATUS_ANSWER, 0b10]);
//! ```

pub mod module;

pub use module::{run_module_io, VirtualModule};
