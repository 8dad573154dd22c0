//! Minimal Redis client over a framed TCP connection.
//!
//! The client speaks RESP2 through [`RespCodec`] and supports exactly what
//! the notifier needs: connecting with a timeout and running a pipeline of
//! commands, reading back one reply per command.
//!
//! # Design
//!
//! - **No automatic retry**: the caller decides when to reconnect
//! - **Single connection**: one service, one sink
//! - **Timeouts on every step**: connect, write, and each reply
//!
//! # Example
//!
//! ```no_run
//! use keycard_network::client::{RedisClient, RedisClientConfig};
//! use keycard_network::resp::Command;
//!
//! # async fn example() -> Result<(), keycard_network::NotifyError> {
//! let mut client = RedisClient::new(RedisClientConfig::default());
//! client.connect().await?;
//!
//! let replies = client
//!     .pipeline(vec![Command::new("PUBLISH").arg("keycard").arg("authentication")])
//!     .await?;
//! println!("{replies:?}");
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use keycard_core::constants::{DEFAULT_REDIS_ADDR, DEFAULT_REDIS_TIMEOUT_MS};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::error::{NotifyError, NotifyResult};
use crate::resp::{Command, RespCodec, RespValue};

/// Configuration for [`RedisClient`].
///
/// # Example
///
/// ```
/// use keycard_network::client::RedisClientConfig;
/// use std::time::Duration;
///
/// let config = RedisClientConfig {
///     addr: "10.0.0.2:6379".to_string(),
///     timeout: Duration::from_millis(500),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisClientConfig {
    /// `host:port` of the server; host names are resolved on connect.
    pub addr: String,

    /// Timeout for each I/O step (connect, write, each reply).
    pub timeout: Duration,
}

impl Default for RedisClientConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_REDIS_ADDR.to_string(),
            timeout: Duration::from_millis(DEFAULT_REDIS_TIMEOUT_MS),
        }
    }
}

/// Redis client holding at most one connection.
pub struct RedisClient {
    addr: String,
    framed: Option<Framed<TcpStream, RespCodec>>,
    timeout: Duration,
}

impl RedisClient {
    /// Create a client. No connection is made until [`connect`](Self::connect).
    pub fn new(config: RedisClientConfig) -> Self {
        debug!(addr = %config.addr, "Creating Redis client");
        Self {
            addr: config.addr,
            framed: None,
            timeout: config.timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection times out, is refused or the
    /// address does not resolve.
    pub async fn connect(&mut self) -> NotifyResult<()> {
        debug!(addr = %self.addr, "Connecting to Redis");

        let stream = match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(NotifyError::ConnectionTimeout(self.timeout_ms())),
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "Failed to set TCP_NODELAY");
        }

        self.framed = Some(Framed::new(stream, RespCodec::new()));
        info!(addr = %self.addr, "Connected to Redis");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Send `commands` in one write and read one reply per command.
    ///
    /// Every reply is read even if an earlier one is an error, so the
    /// connection stays in sync.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::NotConnected`] without a connection,
    /// a timeout or connection error on I/O failure (the connection is then
    /// dropped) and [`NotifyError::Server`] for the first error reply.
    pub async fn pipeline(&mut self, commands: Vec<Command>) -> NotifyResult<Vec<RespValue>> {
        let result = self.exchange(commands).await;
        if let Err(e) = &result
            && e.breaks_connection()
            && self.framed.take().is_some()
        {
            debug!(addr = %self.addr, error = %e, "Dropping Redis connection");
        }
        result
    }

    async fn exchange(&mut self, commands: Vec<Command>) -> NotifyResult<Vec<RespValue>> {
        let timeout = self.timeout;
        let timeout_ms = self.timeout_ms();
        let framed = self.framed.as_mut().ok_or(NotifyError::NotConnected)?;

        let count = commands.len();
        trace!(count, "Sending pipeline");

        let write = async {
            for command in commands {
                framed.feed(command.into_value()).await?;
            }
            framed.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result?,
            Err(_) => return Err(NotifyError::WriteTimeout(timeout_ms)),
        }

        let mut replies = Vec::with_capacity(count);
        for _ in 0..count {
            match tokio::time::timeout(timeout, framed.next()).await {
                Ok(Some(Ok(reply))) => replies.push(reply),
                Ok(Some(Err(e))) => return Err(e),
                Ok(None) => {
                    return Err(NotifyError::ConnectionLost(
                        "Server closed connection".to_string(),
                    ));
                }
                Err(_) => return Err(NotifyError::ReadTimeout(timeout_ms)),
            }
        }

        if let Some(RespValue::Error(message)) =
            replies.iter().find(|reply| matches!(reply, RespValue::Error(_)))
        {
            return Err(NotifyError::Server(message.clone()));
        }
        Ok(replies)
    }

    /// Close the connection. Idempotent.
    ///
    /// Flush and shutdown each get 500ms so a dead network cannot stall
    /// process exit.
    pub async fn close(&mut self) {
        let Some(mut framed) = self.framed.take() else {
            return;
        };

        let grace = Duration::from_millis(500);
        if !matches!(tokio::time::timeout(grace, framed.flush()).await, Ok(Ok(()))) {
            warn!(addr = %self.addr, "Flush failed during close");
        }

        let mut stream = framed.into_inner();
        if !matches!(tokio::time::timeout(grace, stream.shutdown()).await, Ok(Ok(()))) {
            debug!(addr = %self.addr, "Shutdown failed during close");
        }
        debug!(addr = %self.addr, "Redis connection closed");
    }
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("addr", &self.addr)
            .field("connected", &self.is_connected())
            .field("timeout", &self.timeout)
            .finish()
    }
}
