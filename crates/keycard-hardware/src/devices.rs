//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn RgbIndicator>`
//! is not an option. The enums here give concrete dispatch over every
//! backend instead, chosen once at startup.
//!
//! # Examples
//!
//! ```
//! use keycard_hardware::devices::AnyIndicator;
//! use keycard_hardware::mock::MockIndicator;
//!
//! let (led, _handle) = MockIndicator::new();
//! let any_led = AnyIndicator::Mock(led);
//!
//! // Can now be used polymorphically through the RgbIndicator trait
//! ```

use std::path::PathBuf;

use keycard_core::constants::{DEFAULT_LP5662_ADDRESS, DEFAULT_LP5662_DEVICE, GREEN_LED_SCRIPT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::lp5662::Lp5662;
use crate::mock::{MockIndicator, MockLamps, MockPresence, MockTagPoller};
use crate::presence::{LinePresence, PollingPresence};
use crate::script::{ScriptIndicator, ScriptLamps};
use crate::traits::{LampBank, PresenceSource, RgbIndicator, TagPoller};
use crate::{LampMode, LedColor, PresenceEvent, Result};

#[cfg(feature = "hardware-pcsc")]
use crate::pcsc_reader::PcscPoller;

/// Which RGB indicator to drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorBackend {
    /// LP5662 driver on an I²C bus.
    Lp5662 { device: PathBuf, address: u8 },

    /// Single-color LED switched by a helper script.
    Script { script: PathBuf },
}

impl IndicatorBackend {
    /// LP5662 on the board's default bus and address.
    pub fn lp5662_default() -> Self {
        Self::Lp5662 {
            device: PathBuf::from(DEFAULT_LP5662_DEVICE),
            address: DEFAULT_LP5662_ADDRESS,
        }
    }

    /// The board's default status LED script.
    pub fn script_default() -> Self {
        Self::Script {
            script: PathBuf::from(GREEN_LED_SCRIPT),
        }
    }
}

impl Default for IndicatorBackend {
    fn default() -> Self {
        Self::lp5662_default()
    }
}

/// Enum wrapper for RGB indicator dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyIndicator {
    /// LP5662 RGB driver.
    Lp5662(Lp5662),

    /// Script-driven status LED.
    Script(ScriptIndicator),

    /// Mock indicator for development and testing.
    Mock(MockIndicator),
}

impl AnyIndicator {
    /// Construct the configured backend.
    ///
    /// Hardware that cannot be initialized is not fatal: the status LED
    /// script is used instead and a warning is logged.
    pub fn open(backend: &IndicatorBackend) -> Self {
        match backend {
            IndicatorBackend::Lp5662 { device, address } => match Lp5662::open(device, *address) {
                Ok(led) => Self::Lp5662(led),
                Err(err) => {
                    warn!(
                        device = %device.display(),
                        error = %err,
                        "LP5662 unavailable, falling back to LED script"
                    );
                    Self::Script(ScriptIndicator::new())
                }
            },
            IndicatorBackend::Script { script } => {
                info!(script = %script.display(), "Using script indicator");
                Self::Script(ScriptIndicator::with_script(script.clone()))
            }
        }
    }

    /// Short backend name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lp5662(_) => "lp5662",
            Self::Script(_) => "script",
            Self::Mock(_) => "mock",
        }
    }
}

impl RgbIndicator for AnyIndicator {
    async fn set_color(&mut self, color: LedColor) -> Result<()> {
        match self {
            Self::Lp5662(device) => device.set_color(color).await,
            Self::Script(device) => device.set_color(color).await,
            Self::Mock(device) => device.set_color(color).await,
        }
    }

    async fn on(&mut self) -> Result<()> {
        match self {
            Self::Lp5662(device) => device.on().await,
            Self::Script(device) => device.on().await,
            Self::Mock(device) => device.on().await,
        }
    }

    async fn off(&mut self) -> Result<()> {
        match self {
            Self::Lp5662(device) => device.off().await,
            Self::Script(device) => device.off().await,
            Self::Mock(device) => device.off().await,
        }
    }

    async fn release(&mut self) -> Result<()> {
        match self {
            Self::Lp5662(device) => device.release().await,
            Self::Script(device) => device.release().await,
            Self::Mock(device) => device.release().await,
        }
    }
}

/// Enum wrapper for lamp bank dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyLamps {
    /// Lamps driven by `ledcontrol.sh`.
    Script(ScriptLamps),

    /// Mock lamps for development and testing.
    Mock(MockLamps),
}

impl LampBank for AnyLamps {
    async fn set_lamp(&mut self, lamp: u8, mode: LampMode) -> Result<()> {
        match self {
            Self::Script(device) => device.set_lamp(lamp, mode).await,
            Self::Mock(device) => device.set_lamp(lamp, mode).await,
        }
    }
}

/// Enum wrapper for polled tag readers.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTagPoller {
    /// Mock reader for development and testing.
    Mock(MockTagPoller),

    /// PC/SC contactless reader.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscPoller),
}

impl TagPoller for AnyTagPoller {
    async fn visible_tags(&mut self) -> Result<Vec<Vec<u8>>> {
        match self {
            Self::Mock(device) => device.visible_tags().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(device) => device.visible_tags().await,
        }
    }
}

/// Enum wrapper for presence source dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyPresence {
    /// Event-driven mock source.
    Mock(MockPresence),

    /// A polled reader.
    Polling(PollingPresence<AnyTagPoller>),

    /// Line protocol, typically stdin.
    Lines(LinePresence),
}

impl PresenceSource for AnyPresence {
    async fn next_event(&mut self) -> Result<PresenceEvent> {
        match self {
            Self::Mock(source) => source.next_event().await,
            Self::Polling(source) => source.next_event().await,
            Self::Lines(source) => source.next_event().await,
        }
    }
}
