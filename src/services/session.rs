//! Navigation session lifecycle
//!
//! One session per device walks the machine
//! `Idle -> Selecting -> Confirmed -> Guiding -> {Completed, Cancelled}`.
//! Events arriving in a state that does not accept them are rejected
//! with `InvalidTransition`, never silently ignored, so callers and
//! tests can assert on the rejection.

use crate::domain::{
    epoch_ms, AccessibilityTag, Coordinate, PositionSample, Route, SessionState,
};
use crate::infra::config::Config;
use crate::infra::error::{EngineError, Result};
use crate::io::geolocation::{GeolocationService, WatchOptions};
use crate::io::subscription::Subscription;
use crate::services::matcher::{self, RouteMatch};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-sample adherence check during guidance: straight-line distance
/// from the chosen route's geometry, no snapping or interpolation
#[derive(Debug, Clone, PartialEq)]
pub struct AdherenceReport {
    pub route_id: String,
    pub distance_m: f64,
    pub off_route: bool,
    /// Set when the sample came from the fallback coordinate; guidance
    /// accuracy claims must be discounted
    pub discounted: bool,
    pub timestamp_ms: u64,
}

/// One attempt, from query to completion or cancellation, at following
/// a selected route
pub struct NavigationSession {
    state: SessionState,
    matches: Vec<RouteMatch>,
    selected: Option<Route>,
    started_at_ms: Option<u64>,
    off_route_threshold_m: f64,
}

impl NavigationSession {
    fn new(off_route_threshold_m: f64) -> Self {
        Self {
            state: SessionState::Idle,
            matches: Vec::new(),
            selected: None,
            started_at_ms: None,
            off_route_threshold_m,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected_route(&self) -> Option<&Route> {
        self.selected.as_ref()
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Match result of the last successful query
    pub fn matches(&self) -> &[RouteMatch] {
        &self.matches
    }

    /// `Idle -> Selecting`. An empty match result reverts to `Idle` and
    /// signals `NoRouteFound`, which is not a fatal error.
    pub fn query(
        &mut self,
        position: &Coordinate,
        required_tags: &HashSet<AccessibilityTag>,
        routes: &[Route],
    ) -> Result<&[RouteMatch]> {
        if self.state != SessionState::Idle {
            return Err(EngineError::invalid_transition(self.state, "query"));
        }

        let matches = matcher::match_routes(position, required_tags, routes);
        if matches.is_empty() {
            debug!(position = %position, "route_query_empty");
            return Err(EngineError::NoRouteFound);
        }

        info!(match_count = %matches.len(), "route_query_matched");
        self.matches = matches;
        self.state = SessionState::Selecting;
        Ok(&self.matches)
    }

    /// `Selecting -> Confirmed`. The id must come from the last match
    /// result; an unknown id fails with `InvalidSelection` and the
    /// state does not change.
    pub fn select(&mut self, route_id: &str) -> Result<()> {
        if self.state != SessionState::Selecting {
            return Err(EngineError::invalid_transition(self.state, "select"));
        }

        let Some(found) = self.matches.iter().find(|m| m.route.id == route_id) else {
            return Err(EngineError::InvalidSelection { route_id: route_id.to_string() });
        };

        self.selected = Some(found.route.clone());
        self.state = SessionState::Confirmed;
        info!(route_id = %route_id, "route_selected");
        Ok(())
    }

    /// `Confirmed -> Guiding`; records the start time
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Confirmed {
            return Err(EngineError::invalid_transition(self.state, "start"));
        }
        self.started_at_ms = Some(epoch_ms());
        self.state = SessionState::Guiding;
        info!("guidance_started");
        Ok(())
    }

    /// `Guiding -> Completed`
    pub fn finish(&mut self) -> Result<()> {
        if self.state != SessionState::Guiding {
            return Err(EngineError::invalid_transition(self.state, "finish"));
        }
        self.state = SessionState::Completed;
        info!("guidance_completed");
        Ok(())
    }

    /// `Guiding/Confirmed -> Cancelled`; `Selecting -> Idle`
    pub fn cancel(&mut self) -> Result<()> {
        match self.state {
            SessionState::Guiding | SessionState::Confirmed => {
                self.state = SessionState::Cancelled;
                info!("session_cancelled");
                Ok(())
            }
            SessionState::Selecting => {
                self.matches.clear();
                self.state = SessionState::Idle;
                debug!("selection_abandoned");
                Ok(())
            }
            other => Err(EngineError::invalid_transition(other, "cancel")),
        }
    }

    /// Adherence check for one incoming sample. Only meaningful while
    /// guiding; returns `None` in any other state.
    pub fn check_adherence(&self, sample: &PositionSample) -> Option<AdherenceReport> {
        if self.state != SessionState::Guiding {
            return None;
        }
        let route = self.selected.as_ref()?;
        let distance_m = matcher::nearest_distance_m(&sample.coordinate, route);
        Some(AdherenceReport {
            route_id: route.id.clone(),
            distance_m,
            off_route: distance_m > self.off_route_threshold_m,
            discounted: sample.is_fallback(),
            timestamp_ms: sample.timestamp_ms,
        })
    }
}

/// Single-instance session owner: at most one concurrently active
/// session per device
pub struct SessionManager {
    inner: Mutex<NavigationSession>,
    off_route_threshold_m: f64,
}

impl SessionManager {
    pub fn new(config: &Config) -> Self {
        let threshold = config.guidance().off_route_threshold_m;
        Self {
            inner: Mutex::new(NavigationSession::new(threshold)),
            off_route_threshold_m: threshold,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state()
    }

    /// Prepare a fresh session. Fails with `SessionAlreadyActive` while
    /// a session is in progress; a terminal session is reset to `Idle`.
    pub fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let state = inner.state();
        if state != SessionState::Idle && !state.is_terminal() {
            return Err(EngineError::SessionAlreadyActive);
        }
        *inner = NavigationSession::new(self.off_route_threshold_m);
        Ok(())
    }

    pub fn query(
        &self,
        position: &Coordinate,
        required_tags: &HashSet<AccessibilityTag>,
        routes: &[Route],
    ) -> Result<Vec<RouteMatch>> {
        self.inner.lock().query(position, required_tags, routes).map(<[RouteMatch]>::to_vec)
    }

    pub fn select(&self, route_id: &str) -> Result<()> {
        self.inner.lock().select(route_id)
    }

    pub fn finish(&self) -> Result<()> {
        self.inner.lock().finish()
    }

    pub fn cancel(&self) -> Result<()> {
        self.inner.lock().cancel()
    }

    pub fn selected_route(&self) -> Option<Route> {
        self.inner.lock().selected_route().cloned()
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.inner.lock().started_at_ms()
    }

    pub fn check_adherence(&self, sample: &PositionSample) -> Option<AdherenceReport> {
        self.inner.lock().check_adherence(sample)
    }

    /// `Confirmed -> Guiding`, consuming a geolocation subscription to
    /// track adherence to the chosen route. Each delivered sample
    /// produces one `AdherenceReport`; off-route reports are also
    /// logged. The caller owns the subscription and cancels it when
    /// guidance ends.
    pub async fn start_guidance(
        self: &Arc<Self>,
        geolocation: &GeolocationService,
        options: WatchOptions,
    ) -> Result<(Subscription, mpsc::Receiver<AdherenceReport>)> {
        self.inner.lock().start()?;

        let (report_tx, report_rx) = mpsc::channel(64);
        let manager = self.clone();
        let subscription = geolocation
            .subscribe(options, move |sample| {
                if let Some(report) = manager.check_adherence(&sample) {
                    if report.off_route {
                        warn!(
                            route_id = %report.route_id,
                            distance_m = %format!("{:.1}", report.distance_m),
                            discounted = %report.discounted,
                            "off_route"
                        );
                    }
                    let _ = report_tx.try_send(report);
                }
            })
            .await?;

        Ok((subscription, report_rx))
    }
}
