//! Keycard authentication service.
//!
//! Ties the credential store, indicator, lamps, presence source and
//! notifier together:
//!
//! ```text
//! presence source ──▶ SessionTracker ──▶ AuthStateMachine ──▶ CredentialStore
//!                                                        ├──▶ IndicatorController / lamps
//!                                                        └──▶ Notifier
//! ```
//!
//! - [`session`]: collapses repeated presence reports into arrivals and
//!   departures
//! - [`machine`]: mode transitions and their side effects
//! - [`service`]: the cancellable event loop
//! - [`config`]: runtime configuration and defaults

pub mod config;
pub mod error;
pub mod machine;
pub mod service;
pub mod session;

pub use config::{PresenceBackend, ServiceConfig};
pub use error::{ServiceError, ServiceResult};
pub use machine::{AuthStateMachine, Outcome};
pub use service::{KeycardService, Peripherals};
pub use session::{SessionChange, SessionTracker};
