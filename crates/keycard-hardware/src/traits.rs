//! Hardware device trait definitions.
//!
//! These traits are the contract between the keycard service and its
//! peripherals: the RGB indicator LED, the board lamps and the tag presence
//! source. Real hardware, helper scripts and test doubles all sit behind
//! the same interfaces.
//!
//! All traits use native `async fn` methods, so they are not object-safe.
//! Dynamic selection goes through the enum wrappers in
//! [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{LampMode, LedColor, PresenceEvent};

/// Single RGB indicator LED.
///
/// # Examples
///
/// ```no_run
/// use keycard_hardware::traits::RgbIndicator;
/// use keycard_hardware::{LedColor, Result};
///
/// async fn deny<I: RgbIndicator>(led: &mut I) -> Result<()> {
///     led.set_color(LedColor::Red).await?;
///     tokio::time::sleep(std::time::Duration::from_millis(500)).await;
///     led.off().await
/// }
/// ```
pub trait RgbIndicator: Send + Sync {
    /// Show `color`. Non-off colors become the color used by [`on`](Self::on).
    async fn set_color(&mut self, color: LedColor) -> Result<()>;

    /// Light the LED with the last color shown (green if none yet).
    async fn on(&mut self) -> Result<()>;

    /// Turn the LED off.
    async fn off(&mut self) -> Result<()>;

    /// Release the underlying device. Further calls may fail.
    async fn release(&mut self) -> Result<()>;
}

/// Numbered lamps on the board, driven independently of the RGB indicator.
pub trait LampBank: Send + Sync {
    /// Put lamp `lamp` into `mode`.
    async fn set_lamp(&mut self, lamp: u8, mode: LampMode) -> Result<()>;
}

/// Source of tag presence events.
///
/// Implementations must be cancel-safe: the service races `next_event`
/// against shutdown and drops the future when shutdown wins.
pub trait PresenceSource: Send {
    /// Wait for the next presence event.
    ///
    /// # Errors
    ///
    /// Transient read failures are returned as errors and the caller retries.
    /// [`HardwareError::Disconnected`](crate::HardwareError::Disconnected)
    /// means the source has ended and will produce nothing further.
    async fn next_event(&mut self) -> Result<PresenceEvent>;
}

/// Reader that can list the raw UIDs of tags currently in its field.
///
/// Wrapped by [`PollingPresence`](crate::presence::PollingPresence) to turn
/// it into a [`PresenceSource`].
pub trait TagPoller: Send {
    /// Raw UIDs of every tag in the field right now.
    async fn visible_tags(&mut self) -> Result<Vec<Vec<u8>>>;
}
