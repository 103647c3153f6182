//! Saved place model: home, work, and user-defined custom places
//!
//! Places are the only position-derived values the engine persists.
//! Home and work are singletons; custom places are unbounded and keep
//! their creation order.

use crate::domain::types::{epoch_ms, Coordinate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage key for the home place
pub const HOME_KEY: &str = "homeLocation";
/// Storage key for the work place
pub const WORK_KEY: &str = "workLocation";
/// Key prefix for custom places, completed with the place id
pub const CUSTOM_KEY_PREFIX: &str = "customPlace:";
/// Key holding the creation-ordered list of custom place ids
pub const CUSTOM_INDEX_KEY: &str = "customPlaceIds";

/// Generate a new UUIDv7 (time-sortable) for a custom place
pub fn new_place_id() -> String {
    Uuid::now_v7().to_string()
}

/// Kind of saved place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Home,
    Work,
    Custom,
}

impl PlaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceKind::Home => "home",
            PlaceKind::Work => "work",
            PlaceKind::Custom => "custom",
        }
    }
}

/// Reference to a stored place: the singleton kinds by name, custom
/// places by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceRef {
    Home,
    Work,
    Custom(String),
}

impl PlaceRef {
    /// Storage key this reference resolves to
    pub fn key(&self) -> String {
        match self {
            PlaceRef::Home => HOME_KEY.to_string(),
            PlaceRef::Work => WORK_KEY.to_string(),
            PlaceRef::Custom(id) => format!("{CUSTOM_KEY_PREFIX}{id}"),
        }
    }
}

/// A user-saved place. Created on explicit save, overwritten on re-save
/// of the same kind (home/work) or id (custom), destroyed on explicit
/// clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub kind: PlaceKind,
    /// Unique id, present for custom places only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    pub coordinate: Coordinate,
    pub created_at_ms: u64,
}

impl Place {
    pub fn home(coordinate: Coordinate) -> Self {
        Self {
            kind: PlaceKind::Home,
            id: None,
            label: "Home".to_string(),
            coordinate,
            created_at_ms: epoch_ms(),
        }
    }

    pub fn work(coordinate: Coordinate) -> Self {
        Self {
            kind: PlaceKind::Work,
            id: None,
            label: "Work".to_string(),
            coordinate,
            created_at_ms: epoch_ms(),
        }
    }

    /// Create a new custom place with a fresh id
    pub fn custom(label: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            kind: PlaceKind::Custom,
            id: Some(new_place_id()),
            label: label.into(),
            coordinate,
            created_at_ms: epoch_ms(),
        }
    }

    /// Reference this place resolves to in storage
    pub fn place_ref(&self) -> Option<PlaceRef> {
        match self.kind {
            PlaceKind::Home => Some(PlaceRef::Home),
            PlaceKind::Work => Some(PlaceRef::Work),
            PlaceKind::Custom => self.id.clone().map(PlaceRef::Custom),
        }
    }

    /// Encode for the string-valued storage boundary
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a stored entry; `None` for unreadable values
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}
