//! Shared fixtures for the service integration tests.
//!
//! Every fixture runs against mock peripherals and a temporary data
//! directory. Timing is shortened so flashes expire within a test.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use keycard_core::Identifier;
use keycard_hardware::IndicatorController;
use keycard_hardware::devices::{AnyIndicator, AnyLamps, AnyPresence};
use keycard_hardware::mock::{
    MockIndicator, MockIndicatorHandle, MockLamps, MockLampsHandle, MockPresence,
    MockPresenceHandle,
};
use keycard_network::{AnyNotifier, MockNotifier, MockNotifierHandle};
use keycard_service::{AuthStateMachine, Peripherals, ServiceConfig};
use keycard_storage::CredentialStore;
use tempfile::TempDir;

pub const BLINK: Duration = Duration::from_millis(20);
pub const FLASH: Duration = Duration::from_millis(40);

/// Comfortably longer than [`FLASH`].
pub const SETTLE: Duration = Duration::from_millis(150);

pub fn id(s: &str) -> Identifier {
    Identifier::parse(s).unwrap()
}

/// Handles onto the mock peripherals behind a machine or service.
pub struct Mocks {
    pub led: MockIndicatorHandle,
    pub lamps: MockLampsHandle,
    pub notifier: MockNotifierHandle,
}

/// A state machine over mocks and its own data directory.
pub struct Harness {
    pub dir: TempDir,
    pub machine: AuthStateMachine,
    pub mocks: Mocks,
}

impl Harness {
    pub fn data_dir(&self) -> PathBuf {
        data_dir(self.dir.path())
    }
}

pub fn data_dir(root: &Path) -> PathBuf {
    root.join("data")
}

fn mock_parts() -> (IndicatorController, AnyLamps, AnyNotifier, Mocks) {
    let (led, led_handle) = MockIndicator::new();
    let (lamps, lamps_handle) = MockLamps::new();
    let (notifier, notifier_handle) = MockNotifier::new();
    (
        IndicatorController::new(AnyIndicator::Mock(led)),
        AnyLamps::Mock(lamps),
        AnyNotifier::Mock(notifier),
        Mocks {
            led: led_handle,
            lamps: lamps_handle,
            notifier: notifier_handle,
        },
    )
}

/// Store with `master` enrolled and `authorized` cards granted.
pub async fn seed(root: &Path, master: &str, authorized: &[&str]) {
    let store = CredentialStore::open(data_dir(root)).await.unwrap();
    store.set_master(&id(master)).await.unwrap();
    for card in authorized {
        store.add_authorized(&id(card)).await.unwrap();
    }
}

/// Started machine over the data directory in `dir`.
pub async fn harness_in(dir: TempDir) -> Harness {
    let store = Arc::new(CredentialStore::open(data_dir(dir.path())).await.unwrap());
    let (indicator, lamps, notifier, mocks) = mock_parts();

    let mut machine =
        AuthStateMachine::new(store, indicator, lamps, notifier).with_timing(BLINK, FLASH);
    machine.start().await.unwrap();

    Harness {
        dir,
        machine,
        mocks,
    }
}

/// Started machine over an empty store.
pub async fn fresh_harness() -> Harness {
    harness_in(tempfile::tempdir().unwrap()).await
}

/// Started machine over a store seeded with a master and grants.
pub async fn seeded_harness(master: &str, authorized: &[&str]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path(), master, authorized).await;
    harness_in(dir).await
}

/// Service configuration with test timing.
pub fn config(root: &Path) -> ServiceConfig {
    ServiceConfig {
        blink_interval_ms: BLINK.as_millis() as u64,
        flash_duration_ms: FLASH.as_millis() as u64,
        presence_backoff_ms: 10,
        ..ServiceConfig::new(data_dir(root))
    }
}

/// Mock peripherals with an event-driven presence source.
pub fn peripherals() -> (Peripherals, MockPresenceHandle, Mocks) {
    let (led, led_handle) = MockIndicator::new();
    let (lamps, lamps_handle) = MockLamps::new();
    let (notifier, notifier_handle) = MockNotifier::new();
    let (presence, presence_handle) = MockPresence::new();

    (
        Peripherals {
            indicator: AnyIndicator::Mock(led),
            lamps: AnyLamps::Mock(lamps),
            presence: AnyPresence::Mock(presence),
            notifier: AnyNotifier::Mock(notifier),
        },
        presence_handle,
        Mocks {
            led: led_handle,
            lamps: lamps_handle,
            notifier: notifier_handle,
        },
    )
}
