//! Defaults and fixed values for the keycard service.
//!
//! Timing values are in milliseconds so they can be fed straight into
//! `Duration::from_millis` and into CLI defaults.
//!
//! ```
//! use keycard_core::constants::*;
//! use std::time::Duration;
//!
//! let blink = Duration::from_millis(DEFAULT_BLINK_INTERVAL_MS);
//! assert_eq!(blink.as_millis(), 500);
//! assert_eq!(LEARNING_LAMPS, [3, 7]);
//! ```

// ============================================================================
// Identifiers
// ============================================================================

/// Maximum canonical identifier length (10-byte ISO 14443 UID as hex).
pub const MAX_IDENTIFIER_LENGTH: usize = 20;

// ============================================================================
// Credential files
// ============================================================================

/// File holding the single master identifier.
pub const MASTER_FILE_NAME: &str = "master_uids.txt";

/// File holding the newline-separated authorized identifiers.
pub const AUTHORIZED_FILE_NAME: &str = "authorized_uids.txt";

/// Default directory for credential files.
pub const DEFAULT_DATA_DIR: &str = "/data/keycard";

// ============================================================================
// Timing
// ============================================================================

/// Blink period of the RGB indicator while waiting for a master card.
pub const DEFAULT_BLINK_INTERVAL_MS: u64 = 500;

/// How long a grant/deny flash stays lit.
pub const DEFAULT_FLASH_DURATION_MS: u64 = 500;

/// Sleep between reader polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Back-off after a presence source error before waiting again.
pub const DEFAULT_PRESENCE_BACKOFF_MS: u64 = 250;

/// Consecutive empty polls before a seated card is considered gone.
pub const DEFAULT_DEPARTURE_THRESHOLD: u32 = 1;

// ============================================================================
// Devices
// ============================================================================

/// Default NFC controller device node.
pub const DEFAULT_NFC_DEVICE: &str = "/dev/pn5xx_i2c2";

/// Default I2C bus of the LP5662 RGB driver.
pub const DEFAULT_LP5662_DEVICE: &str = "/dev/i2c-2";

/// Default I2C address of the LP5662 RGB driver.
pub const DEFAULT_LP5662_ADDRESS: u8 = 0x30;

/// Script driving the green indicator (`1` on, `0` off).
pub const GREEN_LED_SCRIPT: &str = "/usr/bin/greenled.sh";

/// Script driving the linear lamps (`<lamp> <mode>`).
pub const LED_CONTROL_SCRIPT: &str = "/usr/bin/ledcontrol.sh";

/// Linear lamps lit while in card learning mode.
pub const LEARNING_LAMPS: [u8; 2] = [3, 7];

// ============================================================================
// Notification sink
// ============================================================================

/// Default Redis address.
pub const DEFAULT_REDIS_ADDR: &str = "localhost:6379";

/// Hash key and pub/sub channel announcing authentications.
pub const REDIS_KEYCARD_KEY: &str = "keycard";

/// Seconds before the published authentication hash expires.
pub const REDIS_KEYCARD_EXPIRY_SECS: u64 = 10;

/// Vehicle type reported alongside an authentication.
pub const REDIS_VEHICLE_TYPE: &str = "scooter";

/// Timeout for connecting to and talking with Redis.
pub const DEFAULT_REDIS_TIMEOUT_MS: u64 = 1000;
