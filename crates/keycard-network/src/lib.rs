//! Network side of the keycard service: announcing successful
//! authentications to the vehicle's Redis instance.
//!
//! - [`resp`]: RESP2 framing for `tokio_util::codec::Framed`
//! - [`client`]: a single-connection client with per-step timeouts
//! - [`notifier`]: the [`Notifier`] seam and its Redis and mock backends

pub mod client;
pub mod error;
pub mod notifier;
pub mod resp;

pub use client::{RedisClient, RedisClientConfig};
pub use error::{NotifyError, NotifyResult};
pub use notifier::{AnyNotifier, MockNotifier, MockNotifierHandle, Notifier, RedisNotifier};
