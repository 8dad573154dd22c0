//! Blink and flash control over a single RGB indicator.
//!
//! Every device call, whether from the authentication pipeline, the blink
//! task or a flash timer, goes through one async mutex around the device.
//!
//! Each explicit color change (`set_color`, `off`, `flash`) bumps a
//! generation counter. A flash timer only turns the LED off if no newer
//! change happened in the meantime, so a superseded flash never cuts a later
//! one short.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::devices::AnyIndicator;
use crate::traits::RgbIndicator;
use crate::types::LedColor;

#[derive(Debug)]
struct BlinkTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct State {
    device: AnyIndicator,
    generation: u64,
    blink: Option<BlinkTask>,
    closed: bool,
}

/// Shortest blink half-period; `tokio::time::interval` rejects zero.
const MIN_BLINK_INTERVAL: Duration = Duration::from_millis(1);

fn log_failure(operation: &str, result: crate::Result<()>) {
    if let Err(err) = result {
        warn!(operation, error = %err, "Indicator operation failed");
    }
}

/// Serialized blink/flash protocol over an [`AnyIndicator`].
///
/// Device failures are logged and otherwise ignored. Cloning yields another
/// handle to the same indicator.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use keycard_hardware::devices::AnyIndicator;
/// use keycard_hardware::indicator::IndicatorController;
/// use keycard_hardware::mock::MockIndicator;
/// use keycard_hardware::LedColor;
///
/// #[tokio::main]
/// async fn main() {
///     let (led, handle) = MockIndicator::new();
///     let indicator = IndicatorController::new(AnyIndicator::Mock(led));
///
///     indicator.flash(LedColor::Green, Duration::from_millis(10)).await;
///     assert_eq!(handle.lit(), LedColor::Green);
///
///     indicator.close().await;
///     assert!(handle.is_released());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct IndicatorController {
    state: Arc<Mutex<State>>,
}

impl IndicatorController {
    pub fn new(device: AnyIndicator) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                device,
                generation: 0,
                blink: None,
                closed: false,
            })),
        }
    }

    /// Show `color` until the next change.
    pub async fn set_color(&self, color: LedColor) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.generation += 1;
        log_failure("set_color", state.device.set_color(color).await);
    }

    /// Turn the indicator off.
    pub async fn off(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.generation += 1;
        log_failure("off", state.device.off().await);
    }

    /// Show `color` now and turn the indicator off after `duration`, unless
    /// another change happens first.
    pub async fn flash(&self, color: LedColor, duration: Duration) {
        let generation = {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            state.generation += 1;
            log_failure("flash", state.device.set_color(color).await);
            state.generation
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut state = state.lock().await;
            if state.closed || state.generation != generation {
                debug!(generation, "Flash superseded");
                return;
            }
            log_failure("flash_off", state.device.off().await);
        });
    }

    /// Start toggling the indicator every `interval`, using the last color
    /// shown. Does nothing if already blinking.
    pub async fn start_blink(&self, interval: Duration) {
        let interval = interval.max(MIN_BLINK_INTERVAL);
        let mut state = self.state.lock().await;
        if state.closed || state.blink.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(blink_loop(
            Arc::clone(&self.state),
            interval,
            cancel.clone(),
        ));
        state.blink = Some(BlinkTask { cancel, handle });
        debug!(interval_ms = interval.as_millis() as u64, "Blink started");
    }

    /// Stop blinking and leave the indicator off. Does nothing if not
    /// blinking.
    pub async fn stop_blink(&self) {
        let task = {
            let mut state = self.state.lock().await;
            let Some(task) = state.blink.take() else {
                return;
            };
            // Cancel while still holding the lock so the task cannot
            // toggle again once it gets the lock back.
            task.cancel.cancel();
            task
        };

        if let Err(err) = task.handle.await {
            warn!(error = %err, "Blink task ended abnormally");
        }

        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.generation += 1;
        log_failure("stop_blink", state.device.off().await);
        debug!("Blink stopped");
    }

    pub async fn is_blinking(&self) -> bool {
        self.state.lock().await.blink.is_some()
    }

    /// Stop any blink, turn the indicator off and release the device.
    /// Later calls on any clone are ignored.
    pub async fn close(&self) {
        self.stop_blink().await;

        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        log_failure("close", state.device.off().await);
        log_failure("release", state.device.release().await);
        debug!(backend = state.device.kind(), "Indicator released");
    }
}

async fn blink_loop(state: Arc<Mutex<State>>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; the first toggle is one
    // interval after the start.
    ticker.tick().await;

    let mut lit = false;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let mut state = state.lock().await;
                if cancel.is_cancelled() {
                    break;
                }
                lit = !lit;
                let result = if lit {
                    state.device.on().await
                } else {
                    state.device.off().await
                };
                log_failure("blink", result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{IndicatorCall, MockIndicator, MockIndicatorHandle};

    fn controller() -> (IndicatorController, MockIndicatorHandle) {
        let (led, handle) = MockIndicator::new();
        (IndicatorController::new(AnyIndicator::Mock(led)), handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_flash_turns_off_after_duration() {
        let (indicator, handle) = controller();

        indicator.flash(LedColor::Red, Duration::from_millis(500)).await;
        assert_eq!(handle.lit(), LedColor::Red);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(handle.lit(), LedColor::Red);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(handle.lit(), LedColor::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_flash_does_not_cut_newer_one() {
        let (indicator, handle) = controller();

        indicator.flash(LedColor::Red, Duration::from_millis(500)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        indicator.flash(LedColor::Green, Duration::from_millis(500)).await;

        // The first timer fires here but is stale.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(handle.lit(), LedColor::Green);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(handle.lit(), LedColor::Off);
        assert_eq!(
            handle.calls(),
            vec![
                IndicatorCall::SetColor(LedColor::Red),
                IndicatorCall::SetColor(LedColor::Green),
                IndicatorCall::Off,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_color_supersedes_pending_flash() {
        let (indicator, handle) = controller();

        indicator.flash(LedColor::Green, Duration::from_millis(500)).await;
        indicator.set_color(LedColor::Amber).await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.lit(), LedColor::Amber);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_toggles_and_stop_leaves_off() {
        let (indicator, handle) = controller();

        indicator.start_blink(Duration::from_millis(500)).await;
        assert!(indicator.is_blinking().await);
        assert_eq!(handle.lit(), LedColor::Off);

        tokio::time::sleep(Duration::from_millis(510)).await;
        assert_eq!(handle.lit(), LedColor::Green);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.lit(), LedColor::Off);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.lit(), LedColor::Green);

        indicator.stop_blink().await;
        assert!(!indicator.is_blinking().await);
        assert_eq!(handle.lit(), LedColor::Off);

        // No toggles after stop.
        handle.clear();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(handle.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_blink_is_idempotent() {
        let (indicator, handle) = controller();

        indicator.start_blink(Duration::from_millis(500)).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        indicator.start_blink(Duration::from_millis(100)).await;

        // Phase follows the first call: nothing yet at 400ms.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(handle.calls(), vec![IndicatorCall::On]);

        indicator.stop_blink().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_blink_interval_is_clamped() {
        let (indicator, handle) = controller();

        indicator.start_blink(Duration::ZERO).await;
        tokio::time::sleep(Duration::from_millis(3)).await;
        indicator.stop_blink().await;

        assert!(handle.calls().contains(&IndicatorCall::On));
        assert_eq!(handle.lit(), LedColor::Off);
    }

    #[tokio::test]
    async fn test_stop_blink_when_not_blinking_is_noop() {
        let (indicator, handle) = controller();
        indicator.stop_blink().await;
        assert!(handle.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_blink_and_releases() {
        let (indicator, handle) = controller();

        indicator.set_color(LedColor::Amber).await;
        indicator.start_blink(Duration::from_millis(500)).await;
        indicator.close().await;

        assert!(handle.is_released());
        assert_eq!(handle.lit(), LedColor::Off);
        assert!(!indicator.is_blinking().await);

        // Idempotent, and later calls are ignored.
        indicator.close().await;
        indicator.flash(LedColor::Red, Duration::from_millis(500)).await;
        indicator.start_blink(Duration::from_millis(500)).await;
        assert!(!indicator.is_blinking().await);
        assert_eq!(handle.times_set(LedColor::Red), 0);
        assert_eq!(
            handle
                .calls()
                .iter()
                .filter(|call| **call == IndicatorCall::Release)
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_suppresses_pending_flash_off() {
        let (indicator, handle) = controller();

        indicator.flash(LedColor::Green, Duration::from_millis(500)).await;
        indicator.close().await;
        handle.clear();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_device_failures_are_swallowed() {
        let (indicator, handle) = controller();
        handle.set_failing(true);

        indicator.set_color(LedColor::Red).await;
        indicator.off().await;
        indicator.close().await;

        assert_eq!(handle.calls().len(), 4);
    }
}
