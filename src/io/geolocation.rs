//! Geolocation service wrapping the platform position source
//!
//! One subscription-based interface replaces the per-screen polling the
//! engine grew out of. Access is requested once and the decision cached
//! for the process lifetime; single fixes recover from denial and
//! timeout by substituting the configured fallback coordinate, while
//! continuous subscriptions surface the failure to the caller.

use crate::domain::{Coordinate, FixSource, PositionSample};
use crate::infra::config::Config;
use crate::infra::error::{EngineError, Result};
use crate::io::subscription::{Liveness, Subscription};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Raw reading from the platform position source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Estimated accuracy in meters
    pub accuracy: f64,
    pub timestamp_ms: u64,
}

/// Outcome of the platform permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied,
}

/// Platform boundary: permission prompt plus single and continuous
/// position readings. The engine assumes nothing about accuracy or
/// update cadence.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Prompt the platform permission system; `true` when granted
    async fn request_access(&self) -> bool;

    /// One position reading
    async fn current_position(&self) -> anyhow::Result<RawFix>;

    /// Continuous readings. The receiver closes when the platform
    /// stream ends.
    async fn watch(&self) -> anyhow::Result<mpsc::Receiver<RawFix>>;
}

/// Delivery constraints for a continuous subscription. Both must hold
/// before a new sample is emitted.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub min_interval_ms: u64,
    pub min_distance_m: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        // The shipped app watched with timeInterval 2000 / distanceInterval 10
        Self { min_interval_ms: 2_000, min_distance_m: 10.0 }
    }
}

/// Throttles watch deliveries: a sample is emitted only when both the
/// minimum interval and the minimum displacement have passed since the
/// last emitted sample. The first sample always passes.
struct FixThrottler {
    min_interval_ms: u64,
    min_distance_m: f64,
    last_emit_ts_ms: Option<u64>,
    last_coordinate: Option<Coordinate>,
}

impl FixThrottler {
    fn new(options: &WatchOptions) -> Self {
        Self {
            min_interval_ms: options.min_interval_ms,
            min_distance_m: options.min_distance_m,
            last_emit_ts_ms: None,
            last_coordinate: None,
        }
    }

    fn should_emit(&mut self, coordinate: Coordinate, timestamp_ms: u64) -> bool {
        if let Some(last_ts) = self.last_emit_ts_ms {
            if timestamp_ms.saturating_sub(last_ts) < self.min_interval_ms {
                return false;
            }
        }
        if let Some(last) = self.last_coordinate {
            if last.distance_m(&coordinate) < self.min_distance_m {
                return false;
            }
        }
        self.last_emit_ts_ms = Some(timestamp_ms);
        self.last_coordinate = Some(coordinate);
        true
    }
}

/// Location acquisition with permission handling and fallback policy
pub struct GeolocationService {
    source: Arc<dyn PositionSource>,
    fallback: Coordinate,
    request_timeout: Duration,
    fix_timeout: Duration,
    watch_defaults: WatchOptions,
    /// Permission decision, cached for the process lifetime
    decision: Mutex<Option<AccessDecision>>,
}

impl GeolocationService {
    pub fn new(source: Arc<dyn PositionSource>, config: &Config) -> Self {
        let geo = config.geolocation();
        Self {
            source,
            fallback: config.fallback_coordinate(),
            request_timeout: Duration::from_millis(geo.request_timeout_ms),
            fix_timeout: Duration::from_millis(geo.fix_timeout_ms),
            watch_defaults: WatchOptions {
                min_interval_ms: geo.watch_min_interval_ms,
                min_distance_m: geo.watch_min_distance_m,
            },
            decision: Mutex::new(None),
        }
    }

    /// Configured watch throttle defaults
    pub fn watch_defaults(&self) -> WatchOptions {
        self.watch_defaults
    }

    /// Configured fallback coordinate
    pub fn fallback_coordinate(&self) -> Coordinate {
        self.fallback
    }

    /// Prompt the platform permission system once; the decision is
    /// cached for the process lifetime. Fails with `TimedOut` when the
    /// prompt does not resolve within the configured bound.
    pub async fn request_access(&self) -> Result<AccessDecision> {
        if let Some(decision) = *self.decision.lock() {
            return Ok(decision);
        }

        let granted = timeout(self.request_timeout, self.source.request_access())
            .await
            .map_err(|_| EngineError::timed_out("the location permission prompt"))?;

        let decision = if granted { AccessDecision::Granted } else { AccessDecision::Denied };
        *self.decision.lock() = Some(decision);
        debug!(granted = %granted, "location_access_decided");
        Ok(decision)
    }

    /// Current decision, requesting access first if it was never asked
    async fn ensure_access(&self) -> Result<AccessDecision> {
        self.request_access().await
    }

    /// One position fix. Permission denial, source errors and timeouts
    /// are recovered locally by substituting the fallback coordinate,
    /// marked `source = fallback` so downstream accuracy claims can be
    /// discounted. Never fails.
    pub async fn get_current_fix(&self) -> PositionSample {
        match self.ensure_access().await {
            Ok(AccessDecision::Granted) => {}
            Ok(AccessDecision::Denied) => {
                warn!("location_access_denied, using fallback coordinate");
                return PositionSample::fallback(self.fallback);
            }
            Err(e) => {
                warn!(error = %e, "location_access_request_failed, using fallback coordinate");
                return PositionSample::fallback(self.fallback);
            }
        }

        match timeout(self.fix_timeout, self.source.current_position()).await {
            Ok(Ok(fix)) => PositionSample {
                coordinate: Coordinate::new(fix.latitude, fix.longitude),
                accuracy: fix.accuracy,
                timestamp_ms: fix.timestamp_ms,
                source: FixSource::Live,
            },
            Ok(Err(e)) => {
                warn!(error = %e, "position_fix_failed, using fallback coordinate");
                PositionSample::fallback(self.fallback)
            }
            Err(_) => {
                warn!("position_fix_timed_out, using fallback coordinate");
                PositionSample::fallback(self.fallback)
            }
        }
    }

    /// Continuous fixes, throttled by both minimum interval and minimum
    /// displacement. Unlike single fixes, a subscription that cannot
    /// start surfaces the failure: `PermissionDenied` when access is
    /// denied, `SourceUnavailable` when the platform stream cannot be
    /// opened.
    ///
    /// Sample timestamps are non-decreasing within one subscription;
    /// out-of-order fixes from the platform are dropped.
    pub async fn subscribe<F>(&self, options: WatchOptions, on_sample: F) -> Result<Subscription>
    where
        F: Fn(PositionSample) + Send + Sync + 'static,
    {
        match self.ensure_access().await? {
            AccessDecision::Granted => {}
            AccessDecision::Denied => return Err(EngineError::PermissionDenied),
        }

        let mut rx = self
            .source
            .watch()
            .await
            .map_err(|e| EngineError::source_unavailable(e.to_string()))?;

        let liveness = Liveness::new();
        let task_liveness = liveness.clone();
        let mut throttler = FixThrottler::new(&options);

        let handle = tokio::spawn(async move {
            let mut last_timestamp_ms: u64 = 0;
            while let Some(fix) = rx.recv().await {
                if !task_liveness.is_live() {
                    break;
                }
                if fix.timestamp_ms < last_timestamp_ms {
                    debug!(
                        timestamp_ms = %fix.timestamp_ms,
                        "out_of_order_fix_dropped"
                    );
                    continue;
                }
                let coordinate = Coordinate::new(fix.latitude, fix.longitude);
                if !throttler.should_emit(coordinate, fix.timestamp_ms) {
                    continue;
                }
                last_timestamp_ms = fix.timestamp_ms;
                let sample = PositionSample {
                    coordinate,
                    accuracy: fix.accuracy,
                    timestamp_ms: fix.timestamp_ms,
                    source: FixSource::Live,
                };
                // Liveness check immediately before delivery
                if !task_liveness.is_live() {
                    break;
                }
                on_sample(sample);
            }
        });

        Ok(Subscription::new(liveness, handle))
    }
}
