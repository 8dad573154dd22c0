//! TI LP5662 RGB LED driver over Linux I²C.
//!
//! The chip is addressed through an `i2c-dev` character device. Each
//! register write is a two byte `[register, value]` write after the slave
//! address has been forced with `I2C_SLAVE_FORCE`, since a kernel LED driver
//! may already have claimed the address.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{HardwareError, Result};
use crate::traits::RgbIndicator;
use crate::types::LedColor;

nix::ioctl_write_int_bad!(i2c_slave_force, 0x0706);

const REG_ENABLE: u8 = 0x00;
const REG_MISC_CONFIG: u8 = 0x01;
const REG_PWM_BASE: u8 = 0x02;
const REG_CURRENT_BASE: u8 = 0x05;
const REG_CLOCK_CONFIG: u8 = 0x08;
const REG_RESET: u8 = 0x0D;
const REG_PWM_CONFIG: u8 = 0x70;

const ENABLE_CHIP: u8 = 0x40;
const RESET_VALUE: u8 = 0xFF;
const PWM_DIRECT_CONTROL: u8 = 0x3F;
const PWM_OVER_I2C: u8 = 0x00;
const INTERNAL_CLOCK: u8 = 0x01;

/// About 10 mA per channel.
const DEFAULT_CURRENT: u8 = 0x14;

/// LP5662 driver bound to one I²C bus and address.
#[derive(Debug)]
pub struct Lp5662 {
    file: Option<File>,
    device: PathBuf,
    address: u8,
    color: LedColor,
}

impl Lp5662 {
    /// Open the bus device, claim `address` and initialize the chip with
    /// every channel dark.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InitializationFailed`] if the device cannot
    /// be opened, the address cannot be claimed or any init write fails.
    pub fn open(device: impl AsRef<Path>, address: u8) -> Result<Self> {
        let device = device.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device)
            .map_err(|err| {
                HardwareError::initialization_failed(format!(
                    "failed to open I2C device {}: {err}",
                    device.display()
                ))
            })?;

        // SAFETY: the descriptor belongs to `file`, which outlives the call,
        // and I2C_SLAVE_FORCE takes the address by value.
        let claimed = unsafe { i2c_slave_force(file.as_raw_fd(), i32::from(address)) };
        claimed.map_err(|errno| {
            HardwareError::initialization_failed(format!(
                "failed to set I2C address 0x{address:02X}: {errno}"
            ))
        })?;

        let mut led = Self {
            file: Some(file),
            device,
            address,
            color: LedColor::Green,
        };
        led.init()
            .map_err(|err| HardwareError::initialization_failed(format!("LP5662: {err}")))?;

        info!(
            device = %led.device.display(),
            address = format!("0x{:02X}", led.address),
            "LP5662 initialized"
        );
        Ok(led)
    }

    fn init(&mut self) -> Result<()> {
        self.write_reg(REG_RESET, RESET_VALUE)?;
        self.write_reg(REG_MISC_CONFIG, PWM_DIRECT_CONTROL)?;
        self.write_reg(REG_PWM_CONFIG, PWM_OVER_I2C)?;
        self.write_reg(REG_CLOCK_CONFIG, INTERNAL_CLOCK)?;
        self.write_reg(REG_ENABLE, ENABLE_CHIP)?;
        for channel in 0..3 {
            self.write_reg(REG_CURRENT_BASE + channel, DEFAULT_CURRENT)?;
        }
        self.write_rgb(LedColor::Off)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected(self.device.display().to_string()))?;

        // Blocking, but a two byte i2c-dev write returns in microseconds.
        let written = file.write(&[reg, value])?;
        if written != 2 {
            return Err(HardwareError::communication(format!(
                "short write to register 0x{reg:02X}: {written} bytes"
            )));
        }
        Ok(())
    }

    /// PWM channel order on the board is blue, green, red.
    fn write_rgb(&mut self, color: LedColor) -> Result<()> {
        let (r, g, b) = color.as_rgb();
        self.write_reg(REG_PWM_BASE, b)?;
        self.write_reg(REG_PWM_BASE + 1, g)?;
        self.write_reg(REG_PWM_BASE + 2, r)
    }
}

impl RgbIndicator for Lp5662 {
    async fn set_color(&mut self, color: LedColor) -> Result<()> {
        self.write_rgb(color)?;
        if !color.is_off() {
            self.color = color;
        }
        Ok(())
    }

    async fn on(&mut self) -> Result<()> {
        self.write_rgb(self.color)
    }

    async fn off(&mut self) -> Result<()> {
        self.write_rgb(LedColor::Off)
    }

    async fn release(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        let result = self.write_rgb(LedColor::Off);
        self.file = None;
        debug!(device = %self.device.display(), "LP5662 released");
        result
    }
}
