//! Location-aware engine for accessible route guidance
//!
//! The engine acquires device positions with an explicit fallback
//! policy, persists user places, matches accessibility-tagged routes by
//! proximity, drives a navigation session state machine, and syncs the
//! device position to a remote document store.
//!
//! Module structure:
//! - `domain` - core data types (coordinates, routes, places, samples)
//! - `infra` - configuration, error taxonomy, logging setup
//! - `io` - external boundaries (geolocation, storage, realtime sync)
//! - `services` - place store, route catalog, matcher, sessions

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;

pub use infra::error::{EngineError, Result};
