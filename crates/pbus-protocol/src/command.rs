//! Pbus command byte table
//!
//! The first data byte of a frame selects the operation. The engine treats
//! these as opaque payload bytes; the table exists so callers and
//! diagnostics can name them.

/// Ask a module to report its type
pub const MODULE_TYPE_REQUEST: u8 = 0x11;
/// Module type report
pub const MODULE_TYPE_ANSWER: u8 = 0x21;
/// Module announces its removal from the bus
pub const MODULE_REMOVED: u8 = 0x31;

/// Ask for the digital input/output bitmask
pub const DIGITAL_STATUS_REQUEST: u8 = 0x12;
/// Digital status report
pub const DIGITAL_STATUS_ANSWER: u8 = 0x22;

/// Ask for analog channel values
pub const ANALOG_STATUS_REQUEST: u8 = 0x13;
/// Analog status report
pub const ANALOG_STATUS_ANSWER: u8 = 0x23;

/// Ask for output feedback state
pub const FEEDBACK_REQUEST: u8 = 0x14;
/// Feedback report
pub const FEEDBACK_ANSWER: u8 = 0x24;

/// Switch a relay channel on or off
pub const SWITCH_RELAY: u8 = 0x41;
/// Set an analog output value
pub const SET_VALUE: u8 = 0x42;

/// Module type identifiers reported in a MODULE_TYPE_ANSWER
pub mod module_type {
    pub const M2C: u8 = 0x00;
    pub const M2D20: u8 = 0x01;
    pub const M2R1K: u8 = 0x02;
    pub const M2Y10: u8 = 0x03;
    pub const M2U10: u8 = 0x06;
    pub const M2Y10M: u8 = 0x07;
    pub const M2P100: u8 = 0x0A;
    pub const M2Y420: u8 = 0x0B;
    pub const M2I25: u8 = 0x0E;
    pub const M4D20: u8 = 0x11;
    pub const M2P1K: u8 = 0x16;
    pub const M2I420: u8 = 0x1A;
    pub const M2Q250: u8 = 0x1D;
    pub const M2Q250M: u8 = 0x20;
    pub const M2D42: u8 = 0x21;
    pub const M3QM3: u8 = 0x28;
    pub const M2D250: u8 = 0x31;
}

/// Human-readable name of a command byte, for diagnostics
pub fn name(command: u8) -> Option<&'static str> {
    match command {
        MODULE_TYPE_REQUEST => Some("module type request"),
        MODULE_TYPE_ANSWER => Some("module type answer"),
        MODULE_REMOVED => Some("module removed"),
        DIGITAL_STATUS_REQUEST => Some("digital status request"),
        DIGITAL_STATUS_ANSWER => Some("digital status answer"),
        ANALOG_STATUS_REQUEST => Some("analog status request"),
        ANALOG_STATUS_ANSWER => Some("analog status answer"),
        FEEDBACK_REQUEST => Some("feedback request"),
        FEEDBACK_ANSWER => Some("feedback answer"),
        SWITCH_RELAY => Some("switch relay"),
        SET_VALUE => Some("set value"),
        _ => None,
    }
}
