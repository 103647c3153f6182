//! IO modules - external system interfaces
//!
//! This module contains all external IO boundaries:
//! - `geolocation` - platform position source with permission handling
//! - `storage` - durable string-keyed storage for saved places
//! - `realtime` - remote position document store (publish/subscribe)
//! - `subscription` - cancellable subscription handles

pub mod geolocation;
pub mod realtime;
pub mod storage;
pub mod subscription;

// Re-export commonly used types
pub use geolocation::{AccessDecision, GeolocationService, PositionSource, RawFix, WatchOptions};
pub use realtime::{DocumentStore, MemoryDocumentStore, RealtimeSyncChannel, RestDocumentStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use subscription::Subscription;
