//! Service modules - engine logic above the IO boundaries
//!
//! This module contains the engine services:
//! - `place_store` - typed persistence for home/work/custom places
//! - `catalog` - accessibility-tagged route snapshots
//! - `matcher` - pure route filtering and proximity ranking
//! - `session` - navigation session state machine and guidance

pub mod catalog;
pub mod matcher;
pub mod place_store;
pub mod session;

// Re-export commonly used types
pub use catalog::{HttpRouteSource, RouteCatalog, RouteSource, StaticRouteSource};
pub use matcher::{match_routes, nearest_distance_m, RouteMatch};
pub use place_store::PlaceStore;
pub use session::{AdherenceReport, NavigationSession, SessionManager};
