//! Peripheral abstractions for the keycard service.
//!
//! - RGB indicator LED: LP5662 over I²C, or the board's LED script
//! - Board lamps driven by `ledcontrol.sh`
//! - Tag presence sources: mock, polled readers (PC/SC behind the
//!   `hardware-pcsc` feature) and a line protocol for emulation
//!
//! [`indicator::IndicatorController`] layers the blink and flash protocol
//! on top of whichever indicator backend was selected at startup.

pub mod devices;
pub mod error;
pub mod indicator;
pub mod lp5662;
pub mod mock;
pub mod presence;
pub mod script;
pub mod traits;
pub mod types;

#[cfg(feature = "hardware-pcsc")]
pub mod pcsc_reader;

pub use devices::{AnyIndicator, AnyLamps, AnyPresence, AnyTagPoller, IndicatorBackend};
pub use error::{HardwareError, Result};
pub use indicator::IndicatorController;
pub use traits::{LampBank, PresenceSource, RgbIndicator, TagPoller};
pub use types::{LampMode, LedColor, PresenceEvent, TagData};
