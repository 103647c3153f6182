//! Shared types for the step-free route engine

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Mean earth radius in meters, used for haversine distance
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// A geographic point. Equality is exact value comparison; proximity
/// checks go through the matcher, never `==`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Straight-line (haversine) distance to another coordinate in meters
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_M * c
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Discrete accessibility attribute attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessibilityTag {
    StepFree,
    Ramp,
    TactilePaving,
    Elevator,
    PwdParking,
}

impl AccessibilityTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessibilityTag::StepFree => "step-free",
            AccessibilityTag::Ramp => "ramp",
            AccessibilityTag::TactilePaving => "tactile-paving",
            AccessibilityTag::Elevator => "elevator",
            AccessibilityTag::PwdParking => "pwd-parking",
        }
    }
}

/// An accessibility-tagged route. Immutable once loaded into a catalog
/// snapshot; catalogs are replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Human-readable travel time shown in route lists, e.g. "12 min"
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub tags: HashSet<AccessibilityTag>,
    /// Ordered geometry, one or more points
    pub geometry: SmallVec<[Coordinate; 8]>,
}

impl Route {
    /// Whether this route carries every required tag.
    /// An empty requirement set matches any route.
    pub fn satisfies(&self, required: &HashSet<AccessibilityTag>) -> bool {
        required.is_subset(&self.tags)
    }
}

/// Where a position sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixSource {
    /// Produced by the platform position source
    Live,
    /// Substituted default coordinate; accuracy claims must be discounted
    Fallback,
}

impl FixSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixSource::Live => "live",
            FixSource::Fallback => "fallback",
        }
    }
}

/// A single geolocation reading. Produced only by the geolocation
/// service and never persisted directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Estimated accuracy in meters; 0.0 for fallback samples, where it
    /// carries no meaning
    pub accuracy: f64,
    pub timestamp_ms: u64,
    pub source: FixSource,
}

impl PositionSample {
    pub fn fallback(coordinate: Coordinate) -> Self {
        Self { coordinate, accuracy: 0.0, timestamp_ms: epoch_ms(), source: FixSource::Fallback }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == FixSource::Fallback
    }
}

/// One remote position document per user id, last writer wins
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePositionRecord {
    pub user_id: String,
    pub coordinate: Coordinate,
    pub timestamp_ms: u64,
}

/// Wire shape of the remote document: a flat latitude/longitude/timestamp
/// object, with the user id carried by the document path instead.
#[derive(Debug, Serialize, Deserialize)]
struct RemotePositionWire {
    latitude: f64,
    longitude: f64,
    timestamp: u64,
}

impl RemotePositionRecord {
    pub fn new(user_id: impl Into<String>, coordinate: Coordinate, timestamp_ms: u64) -> Self {
        Self { user_id: user_id.into(), coordinate, timestamp_ms }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "latitude": self.coordinate.latitude,
            "longitude": self.coordinate.longitude,
            "timestamp": self.timestamp_ms,
        })
    }

    /// Decode a remote document received for `user_id`. Returns `None`
    /// for documents that do not carry the expected shape.
    pub fn from_value(user_id: &str, value: &serde_json::Value) -> Option<Self> {
        let wire: RemotePositionWire = serde_json::from_value(value.clone()).ok()?;
        Some(Self {
            user_id: user_id.to_string(),
            coordinate: Coordinate::new(wire.latitude, wire.longitude),
            timestamp_ms: wire.timestamp,
        })
    }
}

/// Navigation session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Selecting,
    Confirmed,
    Guiding,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Selecting => "selecting",
            SessionState::Confirmed => "confirmed",
            SessionState::Guiding => "guiding",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        }
    }

    /// Completed and Cancelled are terminal; a new session may begin
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_distance_zero_for_same_point() {
        let a = Coordinate::new(14.5995, 120.9842);
        assert!(a.distance_m(&a) < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Coordinate::new(14.55, 120.99);
        let b = Coordinate::new(14.58, 121.0);
        assert!((a.distance_m(&b) - b.distance_m(&a)).abs() < 1e-9);
    }

    #[test]
    fn test_distance_known_magnitude() {
        // One degree of latitude is roughly 111 km
        let a = Coordinate::new(14.0, 121.0);
        let b = Coordinate::new(15.0, 121.0);
        let d = a.distance_m(&b);
        assert!(d > 110_000.0 && d < 112_000.0, "got {}", d);
    }

    #[test]
    fn test_tag_wire_names() {
        let json = serde_json::to_string(&AccessibilityTag::StepFree).unwrap();
        assert_eq!(json, "\"step-free\"");
        let tag: AccessibilityTag = serde_json::from_str("\"pwd-parking\"").unwrap();
        assert_eq!(tag, AccessibilityTag::PwdParking);
    }

    #[test]
    fn test_route_satisfies() {
        let route = Route {
            id: "1".to_string(),
            name: "Station underpass".to_string(),
            description: "Step-free paths".to_string(),
            duration: "12 min".to_string(),
            tags: [AccessibilityTag::StepFree, AccessibilityTag::Ramp].into_iter().collect(),
            geometry: smallvec![Coordinate::new(14.55, 120.99)],
        };

        assert!(route.satisfies(&HashSet::new()));
        assert!(route.satisfies(&[AccessibilityTag::StepFree].into_iter().collect()));
        assert!(!route.satisfies(&[AccessibilityTag::Elevator].into_iter().collect()));
    }

    #[test]
    fn test_remote_record_round_trip() {
        let record =
            RemotePositionRecord::new("user-1", Coordinate::new(14.60, 120.98), 1736012345678);
        let value = record.to_value();
        assert_eq!(value["latitude"], 14.60);
        assert_eq!(value["timestamp"], 1736012345678_u64);

        let decoded = RemotePositionRecord::from_value("user-1", &value).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_remote_record_rejects_malformed() {
        assert!(RemotePositionRecord::from_value("u", &serde_json::json!({"lat": 1.0})).is_none());
        assert!(RemotePositionRecord::from_value("u", &serde_json::json!("nope")).is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Guiding.is_terminal());
    }
}
