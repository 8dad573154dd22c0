//! Indicator backends that shell out to the board's helper scripts.
//!
//! `greenled.sh 1|0` switches the single-color status LED and
//! `ledcontrol.sh <lamp> <mode>` drives the numbered lamps. This is the
//! fallback when the LP5662 cannot be initialized, so a script that is
//! missing or fails only produces an error for the caller to log.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use keycard_core::constants::{GREEN_LED_SCRIPT, LED_CONTROL_SCRIPT};
use tokio::process::Command;
use tracing::trace;

use crate::error::{HardwareError, Result};
use crate::traits::{LampBank, RgbIndicator};
use crate::types::{LampMode, LedColor};

async fn run_script(script: &Path, args: &[&str]) -> Result<()> {
    trace!(script = %script.display(), ?args, "Running indicator script");

    let status = Command::new(script)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|err| HardwareError::script_failed(script.display().to_string(), err.to_string()))?;

    if !status.success() {
        return Err(HardwareError::script_failed(
            script.display().to_string(),
            status.to_string(),
        ));
    }
    Ok(())
}

/// Status LED driven by `greenled.sh`.
///
/// The LED is green only. Green lights it; amber and red leave it dark so a
/// denied card never looks like a granted one.
#[derive(Debug, Clone)]
pub struct ScriptIndicator {
    script: PathBuf,
    color: LedColor,
}

impl ScriptIndicator {
    /// Use the board's default script.
    pub fn new() -> Self {
        Self::with_script(GREEN_LED_SCRIPT)
    }

    pub fn with_script(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            color: LedColor::Green,
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

impl Default for ScriptIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl RgbIndicator for ScriptIndicator {
    async fn set_color(&mut self, color: LedColor) -> Result<()> {
        if !color.is_off() {
            self.color = color;
        }
        run_script(&self.script, &[led_state(color)]).await
    }

    async fn on(&mut self) -> Result<()> {
        run_script(&self.script, &[led_state(self.color)]).await
    }

    async fn off(&mut self) -> Result<()> {
        run_script(&self.script, &["0"]).await
    }

    async fn release(&mut self) -> Result<()> {
        self.off().await
    }
}

fn led_state(color: LedColor) -> &'static str {
    match color {
        LedColor::Green => "1",
        LedColor::Off | LedColor::Red | LedColor::Amber => "0",
    }
}

/// Board lamps driven by `ledcontrol.sh`.
#[derive(Debug, Clone)]
pub struct ScriptLamps {
    script: PathBuf,
}

impl ScriptLamps {
    /// Use the board's default script.
    pub fn new() -> Self {
        Self::with_script(LED_CONTROL_SCRIPT)
    }

    pub fn with_script(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Default for ScriptLamps {
    fn default() -> Self {
        Self::new()
    }
}

impl LampBank for ScriptLamps {
    async fn set_lamp(&mut self, lamp: u8, mode: LampMode) -> Result<()> {
        let lamp = lamp.to_string();
        let mode = mode.code().to_string();
        run_script(&self.script, &[&lamp, &mode]).await
    }
}
