//! Mock indicator LED and lamp bank for testing.
//!
//! Both devices record every call into a log shared with a handle, so tests
//! can assert on the exact sequence of indicator operations.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{HardwareError, Result};
use crate::traits::{LampBank, RgbIndicator};
use crate::types::{LampMode, LedColor};

/// One recorded call on a [`MockIndicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCall {
    SetColor(LedColor),
    On,
    Off,
    Release,
}

#[derive(Debug)]
struct IndicatorLog {
    calls: Vec<IndicatorCall>,
    lit: LedColor,
    last_color: LedColor,
    released: bool,
    failing: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock RGB indicator.
///
/// # Examples
///
/// ```
/// use keycard_hardware::mock::{IndicatorCall, MockIndicator};
/// use keycard_hardware::traits::RgbIndicator;
/// use keycard_hardware::LedColor;
///
/// #[tokio::main]
/// async fn main() -> keycard_hardware::Result<()> {
///     let (mut led, handle) = MockIndicator::new();
///
///     led.set_color(LedColor::Amber).await?;
///     assert_eq!(handle.lit(), LedColor::Amber);
///
///     led.off().await?;
///     assert_eq!(
///         handle.calls(),
///         vec![IndicatorCall::SetColor(LedColor::Amber), IndicatorCall::Off]
///     );
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockIndicator {
    log: Arc<Mutex<IndicatorLog>>,
}

impl MockIndicator {
    /// Create a new mock indicator and its inspection handle.
    pub fn new() -> (Self, MockIndicatorHandle) {
        let log = Arc::new(Mutex::new(IndicatorLog {
            calls: Vec::new(),
            lit: LedColor::Off,
            last_color: LedColor::Green,
            released: false,
            failing: false,
        }));
        (
            Self {
                log: Arc::clone(&log),
            },
            MockIndicatorHandle { log },
        )
    }

    fn record(&self, call: IndicatorCall) -> Result<()> {
        let mut log = lock(&self.log);
        if log.released {
            return Err(HardwareError::disconnected("mock indicator released"));
        }
        log.calls.push(call);
        if log.failing {
            return Err(HardwareError::communication("mock indicator failure"));
        }
        match call {
            IndicatorCall::SetColor(color) => {
                log.lit = color;
                if !color.is_off() {
                    log.last_color = color;
                }
            }
            IndicatorCall::On => log.lit = log.last_color,
            IndicatorCall::Off => log.lit = LedColor::Off,
            IndicatorCall::Release => {
                log.lit = LedColor::Off;
                log.released = true;
            }
        }
        Ok(())
    }
}

impl RgbIndicator for MockIndicator {
    async fn set_color(&mut self, color: LedColor) -> Result<()> {
        self.record(IndicatorCall::SetColor(color))
    }

    async fn on(&mut self) -> Result<()> {
        self.record(IndicatorCall::On)
    }

    async fn off(&mut self) -> Result<()> {
        self.record(IndicatorCall::Off)
    }

    async fn release(&mut self) -> Result<()> {
        self.record(IndicatorCall::Release)
    }
}

/// Handle for inspecting a [`MockIndicator`].
#[derive(Debug, Clone)]
pub struct MockIndicatorHandle {
    log: Arc<Mutex<IndicatorLog>>,
}

impl MockIndicatorHandle {
    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<IndicatorCall> {
        lock(&self.log).calls.clone()
    }

    /// Forget recorded calls. Device state is kept.
    pub fn clear(&self) {
        lock(&self.log).calls.clear();
    }

    /// Color currently shown.
    pub fn lit(&self) -> LedColor {
        lock(&self.log).lit
    }

    pub fn is_released(&self) -> bool {
        lock(&self.log).released
    }

    /// Number of times `color` was set.
    pub fn times_set(&self, color: LedColor) -> usize {
        lock(&self.log)
            .calls
            .iter()
            .filter(|call| **call == IndicatorCall::SetColor(color))
            .count()
    }

    /// Make every following call fail (it is still recorded).
    pub fn set_failing(&self, failing: bool) {
        lock(&self.log).failing = failing;
    }
}

/// Mock lamp bank recording every lamp change.
#[derive(Debug)]
pub struct MockLamps {
    log: Arc<Mutex<Vec<(u8, LampMode)>>>,
}

impl MockLamps {
    pub fn new() -> (Self, MockLampsHandle) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
            },
            MockLampsHandle { log },
        )
    }
}

impl LampBank for MockLamps {
    async fn set_lamp(&mut self, lamp: u8, mode: LampMode) -> Result<()> {
        lock(&self.log).push((lamp, mode));
        Ok(())
    }
}

/// Handle for inspecting a [`MockLamps`].
#[derive(Debug, Clone)]
pub struct MockLampsHandle {
    log: Arc<Mutex<Vec<(u8, LampMode)>>>,
}

impl MockLampsHandle {
    /// Every lamp change so far, in order.
    pub fn changes(&self) -> Vec<(u8, LampMode)> {
        lock(&self.log).clone()
    }

    /// Latest mode set on `lamp`, if any.
    pub fn mode_of(&self, lamp: u8) -> Option<LampMode> {
        lock(&self.log)
            .iter()
            .rev()
            .find(|(l, _)| *l == lamp)
            .map(|(_, mode)| *mode)
    }
}
