//! Remuxcode - automatic media conversion for Radarr/Sonarr libraries
//!
//! This library crate exposes the service internals for the binary and for
//! integration testing: configuration, the job queue and worker pool, the
//! conversion service, the Arr client and rename protocol, and the HTTP API.

pub mod arr;
pub mod classifier;
pub mod config;
pub mod conversion;
pub mod paths;
pub mod processor;
pub mod server;
pub mod state;
