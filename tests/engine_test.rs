//! End-to-end tests over the public engine surface: acquire a position,
//! load the catalog, run a session from query to completion, persist
//! places, and sync positions through the realtime channel.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use stepfree_engine::domain::{
    AccessibilityTag, Coordinate, FixSource, Place, PlaceRef, SessionState,
};
use stepfree_engine::infra::Config;
use stepfree_engine::io::geolocation::{GeolocationService, PositionSource, RawFix, WatchOptions};
use stepfree_engine::io::realtime::{MemoryDocumentStore, RealtimeSyncChannel};
use stepfree_engine::io::storage::{FileStore, MemoryStore};
use stepfree_engine::services::{
    PlaceStore, RouteCatalog, SessionManager, StaticRouteSource,
};
use stepfree_engine::EngineError;

/// Fixed-script platform source for end-to-end runs
struct FakeSource {
    granted: bool,
    fix: RawFix,
    watch_fixes: Vec<RawFix>,
}

impl FakeSource {
    fn granted(fix: RawFix, watch_fixes: Vec<RawFix>) -> Self {
        Self { granted: true, fix, watch_fixes }
    }

    fn denied() -> Self {
        Self {
            granted: false,
            fix: RawFix { latitude: 0.0, longitude: 0.0, accuracy: 0.0, timestamp_ms: 0 },
            watch_fixes: Vec::new(),
        }
    }
}

#[async_trait]
impl PositionSource for FakeSource {
    async fn request_access(&self) -> bool {
        self.granted
    }

    async fn current_position(&self) -> anyhow::Result<RawFix> {
        Ok(self.fix)
    }

    async fn watch(&self) -> anyhow::Result<mpsc::Receiver<RawFix>> {
        let (tx, rx) = mpsc::channel(32);
        let fixes = self.watch_fixes.clone();
        tokio::spawn(async move {
            for fix in fixes {
                if tx.send(fix).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn fix_at(latitude: f64, longitude: f64, timestamp_ms: u64) -> RawFix {
    RawFix { latitude, longitude, accuracy: 5.0, timestamp_ms }
}

#[tokio::test]
async fn test_denied_access_still_yields_a_usable_position() {
    let config = Config::default();
    let service = GeolocationService::new(Arc::new(FakeSource::denied()), &config);

    let sample = service.get_current_fix().await;
    assert_eq!(sample.source, FixSource::Fallback);
    // Manila fallback from the default config
    assert_eq!(sample.coordinate, Coordinate::new(14.5995, 120.9842));

    // The fallback position still matches against the bundled catalog
    let catalog = RouteCatalog::new();
    catalog.load(&StaticRouteSource::bundled()).await.unwrap();

    let manager = SessionManager::new(&config);
    let matches = manager.query(&sample.coordinate, &HashSet::new(), &catalog.all()).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].route.id, "1");
}

#[tokio::test]
async fn test_session_lifecycle_with_live_guidance() {
    let config = Config::default();
    let on_route = fix_at(14.55, 120.99, 1_000);
    let off_route = fix_at(14.70, 121.10, 2_000);
    let service = GeolocationService::new(
        Arc::new(FakeSource::granted(on_route, vec![on_route, off_route])),
        &config,
    );

    let catalog = RouteCatalog::new();
    catalog.load(&StaticRouteSource::bundled()).await.unwrap();

    let manager = Arc::new(SessionManager::new(&config));
    let position = service.get_current_fix().await;
    assert_eq!(position.source, FixSource::Live);

    let required: HashSet<_> = [AccessibilityTag::StepFree].into_iter().collect();
    let matches = manager.query(&position.coordinate, &required, &catalog.all()).unwrap();
    manager.select(&matches[0].route.id).unwrap();

    let options = WatchOptions { min_interval_ms: 0, min_distance_m: 0.0 };
    let (sub, mut reports) = manager.start_guidance(&service, options).await.unwrap();
    assert_eq!(manager.state(), SessionState::Guiding);

    let first = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!first.off_route);

    let second = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(second.off_route);
    assert!(second.distance_m > 50.0);

    sub.cancel();
    manager.finish().unwrap();
    assert_eq!(manager.state(), SessionState::Completed);

    // A fresh session is available again after completion
    manager.begin().unwrap();
    assert_eq!(manager.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_only_one_session_at_a_time() {
    let config = Config::default();
    let catalog = RouteCatalog::new();
    catalog.load(&StaticRouteSource::bundled()).await.unwrap();

    let manager = SessionManager::new(&config);
    manager.query(&Coordinate::new(14.5995, 120.9842), &HashSet::new(), &catalog.all()).unwrap();

    let err = manager.begin().expect_err("active session must block a new one");
    assert!(matches!(err, EngineError::SessionAlreadyActive));
}

#[tokio::test]
async fn test_query_with_unsatisfiable_requirement_is_no_route_found() {
    let config = Config::default();
    let catalog = RouteCatalog::new();
    catalog.load(&StaticRouteSource::bundled()).await.unwrap();

    let manager = SessionManager::new(&config);
    let required: HashSet<_> = [AccessibilityTag::TactilePaving].into_iter().collect();
    let err = manager
        .query(&Coordinate::new(14.5995, 120.9842), &required, &catalog.all())
        .expect_err("nothing satisfies tactile paving");
    assert!(matches!(err, EngineError::NoRouteFound));
    assert_eq!(manager.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_places_survive_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("places.json");

    {
        let places = PlaceStore::new(Arc::new(FileStore::new(&path)));
        places.save(&Place::home(Coordinate::new(14.60, 120.98))).await.unwrap();
        places.save(&Place::custom("Clinic", Coordinate::new(14.50, 120.95))).await.unwrap();
    }

    let places = PlaceStore::new(Arc::new(FileStore::new(&path)));
    let home = places.get(&PlaceRef::Home).await.unwrap().unwrap();
    assert_eq!(home.coordinate, Coordinate::new(14.60, 120.98));

    let all = places.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].label, "Clinic");
}

#[tokio::test]
async fn test_place_store_over_memory_backend() {
    let places = PlaceStore::new(Arc::new(MemoryStore::new()));
    places.save(&Place::work(Coordinate::new(14.55, 121.0))).await.unwrap();

    places.save(&Place::work(Coordinate::new(14.56, 121.01))).await.unwrap();
    let work = places.get(&PlaceRef::Work).await.unwrap().unwrap();
    assert_eq!(work.coordinate, Coordinate::new(14.56, 121.01));

    places.delete(&PlaceRef::Work).await.unwrap();
    assert!(places.get(&PlaceRef::Work).await.unwrap().is_none());
}

#[tokio::test]
async fn test_position_publish_reaches_subscriber() {
    let store = Arc::new(MemoryDocumentStore::new());
    let publisher = RealtimeSyncChannel::new(store.clone());
    let follower = RealtimeSyncChannel::new(store);

    let (tx, mut rx) = mpsc::channel(8);
    let sub = follower
        .subscribe("user-7", move |record| {
            let _ = tx.try_send(record);
        })
        .await
        .unwrap();

    publisher.publish("user-7", Coordinate::new(14.58, 121.0)).await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.user_id, "user-7");
    assert_eq!(record.coordinate, Coordinate::new(14.58, 121.0));

    sub.cancel();

    let last = publisher.last_published("user-7").await.unwrap().unwrap();
    assert_eq!(last.coordinate, Coordinate::new(14.58, 121.0));
}
