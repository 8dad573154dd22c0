//! Core types shared by the keycard crates.
//!
//! Holds the canonical card [`Identifier`], the [`Role`] a card resolves to,
//! the authentication [`Mode`] and the defaults every other crate builds on.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
