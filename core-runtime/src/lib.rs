//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the gapless playback core:
//! - [`config`]: `CoreConfig` builder with fail-fast bridge validation
//! - [`events`]: typed event bus shared by the player and the library
//! - [`logging`]: `tracing` subscriber setup, host log forwarding and
//!   redaction helpers
//!
//! Every other `core-*` crate depends on this one; it depends only on the
//! bridge traits and the async facade.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
