//! The keycard service loop.
//!
//! One task owns the whole pipeline: it waits for presence events, folds
//! them into arrivals and departures with the [`SessionTracker`] and feeds
//! those to the [`AuthStateMachine`]. Shutdown is requested through a
//! [`CancellationToken`] and interrupts any wait.

use std::sync::Arc;
use std::time::Duration;

use keycard_hardware::devices::{AnyIndicator, AnyLamps, AnyPresence};
use keycard_hardware::presence::LinePresence;
use keycard_hardware::script::ScriptLamps;
use keycard_hardware::{IndicatorController, PresenceEvent, PresenceSource};
use keycard_network::{AnyNotifier, RedisNotifier};
use keycard_storage::CredentialStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{PresenceBackend, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};
use crate::machine::AuthStateMachine;
use crate::session::{SessionChange, SessionTracker};

/// The devices and sinks the service drives.
#[derive(Debug)]
pub struct Peripherals {
    pub indicator: AnyIndicator,
    pub lamps: AnyLamps,
    pub presence: AnyPresence,
    pub notifier: AnyNotifier,
}

impl Peripherals {
    /// Open the backends selected in `config`.
    ///
    /// An LP5662 that fails to initialize falls back to the LED script.
    /// Redis is connected lazily on the first publication.
    ///
    /// # Errors
    ///
    /// Returns an error if the presence source cannot be opened.
    pub fn open(config: &ServiceConfig) -> ServiceResult<Self> {
        let indicator = AnyIndicator::open(&config.indicator);
        info!(backend = indicator.kind(), "Indicator ready");

        Ok(Self {
            indicator,
            lamps: AnyLamps::Script(ScriptLamps::new()),
            presence: open_presence(config)?,
            notifier: AnyNotifier::Redis(RedisNotifier::new(config.redis())),
        })
    }
}

fn open_presence(config: &ServiceConfig) -> ServiceResult<AnyPresence> {
    match config.presence {
        PresenceBackend::Stdin => {
            info!("Reading tag presence from stdin");
            Ok(AnyPresence::Lines(LinePresence::stdin()))
        }
        #[cfg(feature = "hardware-pcsc")]
        PresenceBackend::Pcsc => {
            use keycard_hardware::devices::AnyTagPoller;
            use keycard_hardware::pcsc_reader::PcscPoller;
            use keycard_hardware::presence::PollingPresence;

            let poller = PcscPoller::open()?;
            info!(
                interval_ms = config.poll_interval_ms,
                "Polling PC/SC reader for tags"
            );
            Ok(AnyPresence::Polling(PollingPresence::new(
                AnyTagPoller::Pcsc(poller),
                config.poll_interval(),
            )))
        }
        #[cfg(not(feature = "hardware-pcsc"))]
        PresenceBackend::Pcsc => Err(ServiceError::config(
            "PC/SC presence requires the hardware-pcsc feature",
        )),
    }
}

/// Keycard authentication service.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use keycard_service::{KeycardService, Peripherals, ServiceConfig};
/// use keycard_storage::CredentialStore;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), keycard_service::ServiceError> {
/// let config = ServiceConfig::default();
/// let store = Arc::new(CredentialStore::open(&config.data_dir).await?);
/// let peripherals = Peripherals::open(&config)?;
///
/// let service = KeycardService::new(&config, store, peripherals);
/// service.run(CancellationToken::new()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct KeycardService {
    machine: AuthStateMachine,
    tracker: SessionTracker,
    presence: AnyPresence,
    backoff: Duration,
    device: String,
}

impl KeycardService {
    pub fn new(
        config: &ServiceConfig,
        store: Arc<CredentialStore>,
        peripherals: Peripherals,
    ) -> Self {
        let Peripherals {
            indicator,
            lamps,
            presence,
            notifier,
        } = peripherals;

        let machine = AuthStateMachine::new(
            store,
            IndicatorController::new(indicator),
            lamps,
            notifier,
        )
        .with_timing(config.blink_interval(), config.flash_duration());

        Self {
            machine,
            tracker: SessionTracker::new(config.departure_threshold),
            presence,
            backoff: config.presence_backoff(),
            device: config.device.display().to_string(),
        }
    }

    pub fn machine(&self) -> &AuthStateMachine {
        &self.machine
    }

    /// Run until `shutdown` is cancelled or the presence source closes.
    ///
    /// The indicator and notifier are released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::PresenceClosed`] if the presence source
    /// disconnects. Transient presence errors are logged and retried after
    /// the configured back-off.
    pub async fn run(mut self, shutdown: CancellationToken) -> ServiceResult<()> {
        let result = self.serve(&shutdown).await;
        self.machine.shutdown().await;

        match &result {
            Ok(()) => info!("Keycard service stopped"),
            Err(err) => error!(error = %err, "Keycard service failed"),
        }
        result
    }

    async fn serve(&mut self, shutdown: &CancellationToken) -> ServiceResult<()> {
        // No awaits inside `info!`: its arguments are not Send.
        let store = Arc::clone(self.machine.store());
        let has_master = store.has_master().await;
        let authorized = store.authorized_count().await;
        info!(
            device = %self.device,
            data_dir = %store.data_dir().display(),
            has_master,
            authorized,
            "Keycard service starting"
        );

        let mode = self.machine.start().await?;
        info!(%mode, "Waiting for cards");

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                event = self.presence.next_event() => event,
            };

            match event {
                Ok(event) => self.handle_event(event).await?,
                Err(err) if err.is_disconnected() => {
                    return Err(ServiceError::PresenceClosed(err));
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Presence source error"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
    }

    /// Feed one presence event through the tracker and state machine.
    pub async fn handle_event(&mut self, event: PresenceEvent) -> ServiceResult<()> {
        match self.tracker.observe(event) {
            Some(SessionChange::Arrived(id)) => {
                let outcome = self.machine.on_arrival(&id).await?;
                debug!(uid = %id, ?outcome, "Card processed");
            }
            Some(SessionChange::Departed(id)) => self.machine.on_departure(&id).await,
            None => {}
        }
        Ok(())
    }
}
