//! Authentication event publication.
//!
//! On every granted card the service announces the identifier to the rest
//! of the vehicle through Redis:
//!
//! ```text
//! HSET    keycard authentication passed
//! HSET    keycard type scooter
//! HSET    keycard uid <id>
//! PUBLISH keycard authentication
//! EXPIRE  keycard 10
//! ```
//!
//! Publication is fire-and-forget. A failure is returned to the caller for
//! logging and the connection is reopened on the next publication.

#![allow(async_fn_in_trait)]

use std::sync::{Arc, Mutex, MutexGuard};

use keycard_core::Identifier;
use keycard_core::constants::{REDIS_KEYCARD_EXPIRY_SECS, REDIS_KEYCARD_KEY, REDIS_VEHICLE_TYPE};
use tracing::{debug, info};

use crate::client::{RedisClient, RedisClientConfig};
use crate::error::{NotifyError, NotifyResult};
use crate::resp::Command;

/// Sink for successful authentications.
pub trait Notifier: Send {
    /// Announce that `id` passed authentication.
    async fn publish_auth(&mut self, id: &Identifier) -> NotifyResult<()>;

    /// Release any connection held by the notifier.
    async fn close(&mut self) {}
}

/// The five commands announcing `id`.
pub fn auth_commands(id: &Identifier) -> Vec<Command> {
    vec![
        Command::new("HSET")
            .arg(REDIS_KEYCARD_KEY)
            .arg("authentication")
            .arg("passed"),
        Command::new("HSET")
            .arg(REDIS_KEYCARD_KEY)
            .arg("type")
            .arg(REDIS_VEHICLE_TYPE),
        Command::new("HSET")
            .arg(REDIS_KEYCARD_KEY)
            .arg("uid")
            .arg(id.as_str().to_owned()),
        Command::new("PUBLISH")
            .arg(REDIS_KEYCARD_KEY)
            .arg("authentication"),
        Command::new("EXPIRE")
            .arg(REDIS_KEYCARD_KEY)
            .arg(REDIS_KEYCARD_EXPIRY_SECS.to_string()),
    ]
}

/// Redis-backed notifier with lazy (re)connection.
#[derive(Debug)]
pub struct RedisNotifier {
    client: RedisClient,
}

impl RedisNotifier {
    /// Create the notifier. The connection is opened on first use.
    pub fn new(config: RedisClientConfig) -> Self {
        Self {
            client: RedisClient::new(config),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }
}

impl Notifier for RedisNotifier {
    async fn publish_auth(&mut self, id: &Identifier) -> NotifyResult<()> {
        if !self.client.is_connected() {
            self.client.connect().await?;
        }
        self.client.pipeline(auth_commands(id)).await?;
        info!(uid = %id, "Published authentication");
        Ok(())
    }

    async fn close(&mut self) {
        self.client.close().await;
    }
}

#[derive(Debug, Default)]
struct PublishLog {
    published: Vec<Identifier>,
    failing: bool,
    closed: bool,
}

fn lock(log: &Mutex<PublishLog>) -> MutexGuard<'_, PublishLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock notifier recording published identifiers.
///
/// # Examples
///
/// ```
/// use keycard_core::Identifier;
/// use keycard_network::{MockNotifier, Notifier};
///
/// #[tokio::main]
/// async fn main() {
///     let (mut notifier, handle) = MockNotifier::new();
///     let id = Identifier::parse("11223344").unwrap();
///
///     notifier.publish_auth(&id).await.unwrap();
///     assert_eq!(handle.published(), vec![id]);
/// }
/// ```
#[derive(Debug)]
pub struct MockNotifier {
    log: Arc<Mutex<PublishLog>>,
}

impl MockNotifier {
    pub fn new() -> (Self, MockNotifierHandle) {
        let log = Arc::new(Mutex::new(PublishLog::default()));
        (
            Self {
                log: Arc::clone(&log),
            },
            MockNotifierHandle { log },
        )
    }
}

impl Notifier for MockNotifier {
    async fn publish_auth(&mut self, id: &Identifier) -> NotifyResult<()> {
        let mut log = lock(&self.log);
        if log.failing {
            return Err(NotifyError::ConnectionLost("mock sink unavailable".to_string()));
        }
        log.published.push(id.clone());
        debug!(uid = %id, "Mock authentication published");
        Ok(())
    }

    async fn close(&mut self) {
        lock(&self.log).closed = true;
    }
}

/// Handle for inspecting a [`MockNotifier`].
#[derive(Debug, Clone)]
pub struct MockNotifierHandle {
    log: Arc<Mutex<PublishLog>>,
}

impl MockNotifierHandle {
    /// Identifiers published so far, in order.
    pub fn published(&self) -> Vec<Identifier> {
        lock(&self.log).published.clone()
    }

    /// Make publications fail until reset.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.log).failing = failing;
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.log).closed
    }
}

/// Enum wrapper for notifier dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyNotifier {
    Redis(RedisNotifier),
    Mock(MockNotifier),
}

impl Notifier for AnyNotifier {
    async fn publish_auth(&mut self, id: &Identifier) -> NotifyResult<()> {
        match self {
            Self::Redis(notifier) => notifier.publish_auth(id).await,
            Self::Mock(notifier) => notifier.publish_auth(id).await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Redis(notifier) => notifier.close().await,
            Self::Mock(notifier) => notifier.close().await,
        }
    }
}
