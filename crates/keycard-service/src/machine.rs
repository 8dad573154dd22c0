//! Authentication state machine.
//!
//! Decides what a presented card means in the current [`Mode`] and drives
//! the credential store, indicator, lamps and notifier accordingly.
//!
//! # Transitions
//!
//! | mode           | card               | effect                             | next           |
//! |----------------|--------------------|------------------------------------|----------------|
//! | MasterLearning | any                | enroll as master, stop blink, flash| Normal         |
//! | Normal         | master             | learning lamps on                  | CardLearning   |
//! | Normal         | authorized         | flash green, publish               | Normal         |
//! | Normal         | unknown            | flash red                          | Normal         |
//! | CardLearning   | master             | learning lamps off                 | Normal         |
//! | CardLearning   | already authorized | log only                           | CardLearning   |
//! | CardLearning   | new                | authorize, flash green             | CardLearning   |
//!
//! Every arrival first lights the indicator amber while the card is looked
//! up. A persistence failure is logged and leaves the mode unchanged.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use keycard_core::{Identifier, Mode};
//! use keycard_hardware::devices::{AnyIndicator, AnyLamps};
//! use keycard_hardware::mock::{MockIndicator, MockLamps};
//! use keycard_hardware::IndicatorController;
//! use keycard_network::{AnyNotifier, MockNotifier};
//! use keycard_service::machine::{AuthStateMachine, Outcome};
//! use keycard_storage::CredentialStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let dir = tempfile::tempdir().unwrap();
//!     let store = Arc::new(CredentialStore::open(dir.path()).await.unwrap());
//!     let (led, _) = MockIndicator::new();
//!     let (lamps, _) = MockLamps::new();
//!     let (notifier, _) = MockNotifier::new();
//!
//!     let mut machine = AuthStateMachine::new(
//!         store,
//!         IndicatorController::new(AnyIndicator::Mock(led)),
//!         AnyLamps::Mock(lamps),
//!         AnyNotifier::Mock(notifier),
//!     );
//!
//!     assert_eq!(machine.start().await.unwrap(), Mode::MasterLearning);
//!
//!     let card = Identifier::parse("AABBCCDD").unwrap();
//!     assert_eq!(machine.on_arrival(&card).await.unwrap(), Outcome::MasterEnrolled);
//!     assert_eq!(machine.mode(), Mode::Normal);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use keycard_core::constants::{
    DEFAULT_BLINK_INTERVAL_MS, DEFAULT_FLASH_DURATION_MS, LEARNING_LAMPS,
};
use keycard_core::{Error, Identifier, Mode, Role};
use keycard_hardware::devices::AnyLamps;
use keycard_hardware::{IndicatorController, LampBank, LampMode, LedColor};
use keycard_network::{AnyNotifier, Notifier};
use keycard_storage::CredentialStore;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::ServiceResult;

/// What an arrival resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The card became the master.
    MasterEnrolled,
    /// The master card could not be persisted.
    EnrollmentFailed,
    /// The master card opened learning mode.
    LearningStarted,
    /// The master card closed learning mode.
    LearningEnded { added: usize },
    /// A card was added to the allow-list.
    Learned,
    /// A card presented during learning was already allowed.
    AlreadyAuthorized,
    /// A new card could not be persisted.
    LearnFailed,
    /// An authorized card was accepted.
    Granted,
    /// An unknown card was rejected.
    Denied,
}

/// Mode state machine owning the side effects of card arrivals.
pub struct AuthStateMachine {
    store: Arc<CredentialStore>,
    indicator: IndicatorController,
    lamps: AnyLamps,
    notifier: AnyNotifier,

    mode: Mode,

    /// Cards authorized during the current learning session.
    pending: Vec<Identifier>,

    blink_interval: Duration,
    flash_duration: Duration,
}

impl AuthStateMachine {
    /// Create a machine in [`Mode::NoMasterEnrolled`]. Call
    /// [`start`](Self::start) before feeding arrivals.
    pub fn new(
        store: Arc<CredentialStore>,
        indicator: IndicatorController,
        lamps: AnyLamps,
        notifier: AnyNotifier,
    ) -> Self {
        Self {
            store,
            indicator,
            lamps,
            notifier,
            mode: Mode::NoMasterEnrolled,
            pending: Vec::new(),
            blink_interval: Duration::from_millis(DEFAULT_BLINK_INTERVAL_MS),
            flash_duration: Duration::from_millis(DEFAULT_FLASH_DURATION_MS),
        }
    }

    /// Override the blink period and flash duration.
    pub fn with_timing(mut self, blink_interval: Duration, flash_duration: Duration) -> Self {
        self.blink_interval = blink_interval;
        self.flash_duration = flash_duration;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Cards authorized since learning mode was entered.
    pub fn pending(&self) -> &[Identifier] {
        &self.pending
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn indicator(&self) -> &IndicatorController {
        &self.indicator
    }

    /// Leave [`Mode::NoMasterEnrolled`].
    ///
    /// Without a stored master the machine enters
    /// [`Mode::MasterLearning`] and starts blinking; otherwise it goes
    /// straight to [`Mode::Normal`]. Calling it again is a no-op.
    pub async fn start(&mut self) -> ServiceResult<Mode> {
        if self.mode != Mode::NoMasterEnrolled {
            return Ok(self.mode);
        }

        if self.store.has_master().await {
            self.transition_to(Mode::Normal)?;
        } else {
            self.transition_to(Mode::MasterLearning)?;
            info!("No master card enrolled, present a card to enroll it");
            self.indicator.start_blink(self.blink_interval).await;
        }
        Ok(self.mode)
    }

    /// Handle a new card on the reader.
    ///
    /// # Errors
    ///
    /// Only internal bookkeeping errors are returned. Store, indicator and
    /// notifier failures are logged and reflected in the [`Outcome`].
    pub async fn on_arrival(&mut self, id: &Identifier) -> ServiceResult<Outcome> {
        self.start().await?;
        self.indicator.set_color(LedColor::Amber).await;

        let outcome = match self.mode {
            Mode::NoMasterEnrolled | Mode::MasterLearning => self.enroll_master(id).await?,
            Mode::Normal => match self.store.role_of(id).await {
                Role::Master => self.enter_learning().await?,
                Role::Authorized => self.grant(id).await,
                Role::Unknown => self.deny(id).await,
            },
            Mode::CardLearning => match self.store.role_of(id).await {
                Role::Master => self.exit_learning().await?,
                _ => self.learn(id).await,
            },
        };

        debug!(uid = %id, ?outcome, mode = %self.mode, "Arrival handled");
        Ok(outcome)
    }

    /// Handle the card leaving the reader. The mode does not change.
    pub async fn on_departure(&mut self, id: &Identifier) {
        debug!(uid = %id, mode = %self.mode, "Card removed");
    }

    /// Stop blinking, release the indicator and close the notifier.
    pub async fn shutdown(&mut self) {
        self.indicator.close().await;
        self.notifier.close().await;
        info!(mode = %self.mode, "Authentication stopped");
    }

    /// Move to `next`. Side effects belong to the caller.
    ///
    /// Returns [`Error::InvalidModeTransition`] if `next` is not reachable
    /// from the current mode; the mode is then unchanged.
    fn transition_to(&mut self, next: Mode) -> keycard_core::Result<()> {
        if !self.mode.can_transition_to(next) {
            return Err(Error::InvalidModeTransition {
                from: self.mode.to_string(),
                to: next.to_string(),
            });
        }

        debug!(from = %self.mode, to = %next, "Mode transition");
        self.mode = next;
        Ok(())
    }

    async fn enroll_master(&mut self, id: &Identifier) -> ServiceResult<Outcome> {
        if let Err(err) = self.store.set_master(id).await {
            error!(uid = %id, error = %err, "Failed to enroll master card");
            return Ok(Outcome::EnrollmentFailed);
        }

        self.indicator.stop_blink().await;
        self.indicator.flash(LedColor::Green, self.flash_duration).await;
        self.pending.clear();
        self.transition_to(Mode::Normal)?;
        info!(uid = %id, "Master card enrolled");
        Ok(Outcome::MasterEnrolled)
    }

    async fn enter_learning(&mut self) -> ServiceResult<Outcome> {
        self.transition_to(Mode::CardLearning)?;
        self.pending.clear();
        self.set_learning_lamps(LampMode::On).await;
        info!("Master card presented, entering card learning mode");
        Ok(Outcome::LearningStarted)
    }

    async fn exit_learning(&mut self) -> ServiceResult<Outcome> {
        let added = self.pending.len();
        let total_authorized = self.store.authorized_count().await;
        info!(
            added,
            total_authorized,
            "Master card presented, leaving card learning mode"
        );
        self.set_learning_lamps(LampMode::Off).await;
        self.pending.clear();
        self.transition_to(Mode::Normal)?;
        Ok(Outcome::LearningEnded { added })
    }

    async fn learn(&mut self, id: &Identifier) -> Outcome {
        match self.store.add_authorized(id).await {
            Ok(false) => {
                self.pending.push(id.clone());
                self.indicator.flash(LedColor::Green, self.flash_duration).await;
                info!(uid = %id, "UID authorized");
                Outcome::Learned
            }
            Ok(true) => {
                info!(uid = %id, "UID already authorized");
                Outcome::AlreadyAuthorized
            }
            Err(err) => {
                error!(uid = %id, error = %err, "Failed to authorize card");
                Outcome::LearnFailed
            }
        }
    }

    async fn grant(&mut self, id: &Identifier) -> Outcome {
        info!(uid = %id, "Authorized UID");
        self.indicator.flash(LedColor::Green, self.flash_duration).await;
        if let Err(err) = self.notifier.publish_auth(id).await {
            error!(uid = %id, error = %err, "Failed to publish authentication");
        }
        Outcome::Granted
    }

    async fn deny(&mut self, id: &Identifier) -> Outcome {
        warn!(uid = %id, "Unauthorized UID");
        self.indicator.flash(LedColor::Red, self.flash_duration).await;
        Outcome::Denied
    }

    async fn set_learning_lamps(&mut self, mode: LampMode) {
        for lamp in LEARNING_LAMPS {
            if let Err(err) = self.lamps.set_lamp(lamp, mode).await {
                warn!(lamp, ?mode, error = %err, "Failed to switch learning lamp");
            }
        }
    }
}

impl std::fmt::Debug for AuthStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStateMachine")
            .field("mode", &self.mode)
            .field("pending", &self.pending.len())
            .finish()
    }
}
