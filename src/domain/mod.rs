//! Domain models - core types of the route engine
//!
//! This module contains the canonical data types used throughout the system:
//! - `Coordinate`, `Route`, `AccessibilityTag` - the route catalog vocabulary
//! - `PositionSample`, `FixSource` - geolocation readings
//! - `Place`, `PlaceKind` - persisted user places
//! - `RemotePositionRecord` - the remote sync document
//! - `SessionState` - navigation session states

pub mod place;
pub mod types;

pub use place::{Place, PlaceKind, PlaceRef};
pub use types::{
    epoch_ms, AccessibilityTag, Coordinate, FixSource, PositionSample, RemotePositionRecord,
    Route, SessionState,
};
