//! Route catalog: accessibility-tagged routes loaded as whole snapshots
//!
//! A load replaces the entire collection; there is no incremental
//! merge. When the backing source is unavailable the previous snapshot
//! stays active and the failure is surfaced so callers can log it at
//! warning level. Stale data beats none for route matching.

use crate::domain::{AccessibilityTag, Coordinate, Route};
use crate::infra::error::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use smallvec::smallvec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Backing data for a catalog snapshot: either an embedded list or a
/// network endpoint returning the full route list
#[async_trait]
pub trait RouteSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Route>>;
}

/// Embedded route list
pub struct StaticRouteSource {
    routes: Vec<Route>,
}

impl StaticRouteSource {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The route list shipped with the application
    pub fn bundled() -> Self {
        Self {
            routes: vec![Route {
                id: "1".to_string(),
                name: "Step-free route".to_string(),
                description: "PWD-Friendly, step-free paths".to_string(),
                duration: "12 min".to_string(),
                tags: [AccessibilityTag::StepFree].into_iter().collect(),
                geometry: smallvec![
                    Coordinate::new(14.55, 120.99),
                    Coordinate::new(14.56, 121.0),
                    Coordinate::new(14.58, 121.0),
                ],
            }],
        }
    }
}

#[async_trait]
impl RouteSource for StaticRouteSource {
    async fn fetch(&self) -> Result<Vec<Route>> {
        Ok(self.routes.clone())
    }
}

/// Network route source: a single GET returning the full list as JSON.
/// No authentication or pagination; every load is a full replace.
pub struct HttpRouteSource {
    url: String,
    client: reqwest::Client,
    fetch_timeout: Duration,
}

impl HttpRouteSource {
    pub fn new(url: impl Into<String>, fetch_timeout_ms: u64) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
        }
    }
}

#[async_trait]
impl RouteSource for HttpRouteSource {
    async fn fetch(&self) -> Result<Vec<Route>> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| EngineError::source_unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| EngineError::source_unavailable(e.to_string()))?;
        response.json().await.map_err(|e| EngineError::source_unavailable(e.to_string()))
    }
}

/// In-memory catalog of the current route snapshot
#[derive(Default)]
pub struct RouteCatalog {
    snapshot: RwLock<Arc<Vec<Route>>>,
}

impl RouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole snapshot from a source. On failure the
    /// previous snapshot remains active and the error is returned.
    pub async fn load(&self, source: &dyn RouteSource) -> Result<usize> {
        match source.fetch().await {
            Ok(routes) => {
                let count = routes.len();
                *self.snapshot.write() = Arc::new(routes);
                info!(route_count = %count, "catalog_loaded");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "catalog_load_failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Cheap read-only view of the current snapshot
    pub fn all(&self) -> Arc<Vec<Route>> {
        self.snapshot.read().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
