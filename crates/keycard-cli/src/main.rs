//! keycard - proximity card authentication for the vehicle immobilizer
//!
//! Reads tag presence, checks cards against the stored allow-list, drives
//! the status LED and lamps, and announces successful authentications on
//! Redis.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use keycard_core::constants::{
    DEFAULT_DATA_DIR, DEFAULT_DEPARTURE_THRESHOLD, DEFAULT_LP5662_DEVICE, DEFAULT_NFC_DEVICE,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REDIS_ADDR, GREEN_LED_SCRIPT,
};
use keycard_hardware::IndicatorBackend;
use keycard_service::{KeycardService, Peripherals, PresenceBackend, ServiceConfig};
use keycard_storage::CredentialStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Indicator {
    /// LP5662 RGB driver on I²C
    Lp5662,
    /// Green status LED script
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Presence {
    /// `arrive <id>` / `depart` lines on stdin
    Stdin,
    /// PC/SC contactless reader (needs the hardware-pcsc feature)
    Pcsc,
}

#[derive(Parser, Debug)]
#[command(name = "keycard")]
#[command(about = "Proximity card authentication service", version)]
struct Args {
    /// NFC controller device
    #[arg(long, env = "KEYCARD_DEVICE", default_value = DEFAULT_NFC_DEVICE)]
    device: PathBuf,

    /// Directory holding master_uids.txt and authorized_uids.txt
    #[arg(long, env = "KEYCARD_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Redis address (host:port)
    #[arg(long, env = "KEYCARD_REDIS", default_value = DEFAULT_REDIS_ADDR)]
    redis: String,

    /// Log level: 0 error, 1 warn, 2 info, 3 debug (RUST_LOG overrides)
    #[arg(long, env = "KEYCARD_LOG", default_value_t = 2,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    log: u8,

    /// Status indicator backend
    #[arg(long, value_enum, default_value_t = Indicator::Lp5662)]
    indicator: Indicator,

    /// I²C bus of the LP5662
    #[arg(long, default_value = DEFAULT_LP5662_DEVICE)]
    led_device: PathBuf,

    /// I²C address of the LP5662 (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0x30", value_parser = parse_address)]
    led_address: u8,

    /// Status LED script for the script indicator
    #[arg(long, default_value = GREEN_LED_SCRIPT)]
    led_script: PathBuf,

    /// Tag presence backend
    #[arg(long, value_enum, env = "KEYCARD_PRESENCE", default_value_t = Presence::Stdin)]
    presence: Presence,

    /// Reader poll interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Empty polls before a card counts as removed
    #[arg(long, default_value_t = DEFAULT_DEPARTURE_THRESHOLD)]
    departure_threshold: u32,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn parse_address(text: &str) -> Result<u8, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid I²C address {text:?}: {err}"))
}

impl Args {
    fn to_config(&self) -> ServiceConfig {
        let indicator = match self.indicator {
            Indicator::Lp5662 => IndicatorBackend::Lp5662 {
                device: self.led_device.clone(),
                address: self.led_address,
            },
            Indicator::Script => IndicatorBackend::Script {
                script: self.led_script.clone(),
            },
        };
        let presence = match self.presence {
            Presence::Stdin => PresenceBackend::Stdin,
            Presence::Pcsc => PresenceBackend::Pcsc,
        };

        ServiceConfig::new(&self.data_dir)
            .device(&self.device)
            .redis_addr(&self.redis)
            .indicator(indicator)
            .presence(presence)
            .poll_interval_ms(self.poll_interval_ms)
            .departure_threshold(self.departure_threshold)
    }
}

fn log_directive(level: u8) -> &'static str {
    match level {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_directive(args.log))),
        )
        .init();

    let config = args.to_config();
    config.validate()?;

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let store = CredentialStore::open(&config.data_dir)
        .await
        .with_context(|| format!("opening credential store in {}", config.data_dir.display()))?;
    let peripherals = Peripherals::open(&config).context("opening peripherals")?;
    let service = KeycardService::new(&config, Arc::new(store), peripherals);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    service.run(shutdown).await?;
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
    shutdown.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["keycard"]).unwrap();
        let config = args.to_config();

        assert_eq!(args.log, 2);
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_script_indicator_and_pcsc() {
        let args = Args::try_parse_from([
            "keycard",
            "--indicator",
            "script",
            "--led-script",
            "/opt/led.sh",
            "--presence",
            "pcsc",
            "--departure-threshold",
            "3",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(
            config.indicator,
            IndicatorBackend::Script {
                script: PathBuf::from("/opt/led.sh")
            }
        );
        assert_eq!(config.presence, PresenceBackend::Pcsc);
        assert_eq!(config.departure_threshold, 3);
    }

    #[test]
    fn test_led_address_forms() {
        assert_eq!(parse_address("0x30"), Ok(0x30));
        assert_eq!(parse_address("48"), Ok(48));
        assert!(parse_address("0x130").is_err());
        assert!(parse_address("i2c").is_err());
    }

    #[test]
    fn test_log_level_range() {
        assert!(Args::try_parse_from(["keycard", "--log", "4"]).is_err());
        assert_eq!(log_directive(0), "error");
        assert_eq!(log_directive(3), "debug");
    }
}
