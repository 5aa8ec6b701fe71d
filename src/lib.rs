//! Cardinal Grip firmware library.
//!
//! Exposes the domain core and the adapters for integration testing on
//! the host.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod pins;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
