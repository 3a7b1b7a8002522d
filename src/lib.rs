//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`, `core-library`). Host applications
//! can depend on `gapless-workspace` and pick either the full service facade
//! (`desktop-shims`) or the bare playback engine (`playback-only`) without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "playback-only")]
pub use core_library;
#[cfg(feature = "playback-only")]
pub use core_playback;
