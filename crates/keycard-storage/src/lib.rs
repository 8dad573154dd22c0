//! Persisted credential store for the keycard service.
//!
//! The store keeps exactly one master card and a set of authorized cards in
//! two plain-text files under a data directory. It is loaded once at startup
//! and mutated only by the authentication state machine.
//!
//! # Invariants
//!
//! - Enrolling a new master clears the authorized set.
//! - The master is implicitly authorized and never listed in the set.
//! - A failed write leaves both memory and disk at the previous state.

pub mod error;
pub mod models;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use models::Credentials;
pub use store::CredentialStore;
