//! Real-time position sync channel
//!
//! Publishes the device position to a remote document keyed by user id
//! and lets other components follow remote updates. Writers overwrite
//! the whole document and last write wins; no ordering is enforced
//! beyond the publisher's own call order, so consumers needing strict
//! ordering must compare the attached timestamps themselves.

use crate::domain::{epoch_ms, Coordinate, RemotePositionRecord};
use crate::infra::error::{EngineError, Result};
use crate::io::subscription::{Liveness, Subscription};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Remote document store boundary: whole-document writes with
/// set-and-notify semantics, addressed by slash-separated paths
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn set(&self, path: &str, value: serde_json::Value) -> Result<()>;

    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>>;

    /// Full-document update stream for one path. Subscribers receive
    /// the current document first (when one exists), then every change.
    async fn watch(&self, path: &str) -> Result<mpsc::Receiver<serde_json::Value>>;
}

/// In-process document store for tests and local runs
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<FxHashMap<String, serde_json::Value>>,
    watchers: Mutex<FxHashMap<String, Vec<mpsc::Sender<serde_json::Value>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set(&self, path: &str, value: serde_json::Value) -> Result<()> {
        self.documents.lock().insert(path.to_string(), value.clone());

        let mut watchers = self.watchers.lock();
        if let Some(senders) = watchers.get_mut(path) {
            // Only a closed receiver unsubscribes a watcher. A full
            // backlog drops this update but keeps the subscription;
            // the watcher catches up from later writes.
            senders.retain(|tx| match tx.try_send(value.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(path = %path, "watcher_backlog_full, update dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.documents.lock().get(path).cloned())
    }

    async fn watch(&self, path: &str) -> Result<mpsc::Receiver<serde_json::Value>> {
        let (tx, rx) = mpsc::channel(32);
        if let Some(current) = self.documents.lock().get(path) {
            let _ = tx.try_send(current.clone());
        }
        self.watchers.lock().entry(path.to_string()).or_default().push(tx);
        Ok(rx)
    }
}

/// REST document store: whole-document PUT/GET against a Firebase-style
/// endpoint, with subscriptions approximated by polling
pub struct RestDocumentStore {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl RestDocumentStore {
    pub fn new(base_url: impl Into<String>, poll_interval_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    fn document_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url.trim_end_matches('/'), path)
    }

    async fn fetch(client: &reqwest::Client, url: &str) -> Result<Option<serde_json::Value>> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::source_unavailable(e.to_string()))?;
        let value: serde_json::Value =
            response.json().await.map_err(|e| EngineError::source_unavailable(e.to_string()))?;
        // An absent document comes back as JSON null
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn set(&self, path: &str, value: serde_json::Value) -> Result<()> {
        let url = self.document_url(path);
        self.client
            .put(&url)
            .json(&value)
            .send()
            .await
            .map_err(|e| EngineError::source_unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| EngineError::source_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>> {
        Self::fetch(&self.client, &self.document_url(path)).await
    }

    async fn watch(&self, path: &str) -> Result<mpsc::Receiver<serde_json::Value>> {
        let (tx, rx) = mpsc::channel(32);
        let client = self.client.clone();
        let url = self.document_url(path);
        let interval = self.poll_interval;

        tokio::spawn(async move {
            let mut last_seen: Option<serde_json::Value> = None;
            loop {
                match Self::fetch(&client, &url).await {
                    Ok(Some(value)) => {
                        if last_seen.as_ref() != Some(&value) {
                            last_seen = Some(value.clone());
                            if tx.send(value).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(url = %url, error = %e, "remote_poll_failed");
                    }
                }
                tokio::time::sleep(interval).await;
                if tx.is_closed() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

/// Publishes device positions to `locations/<userId>` and follows
/// remote updates for one user
pub struct RealtimeSyncChannel {
    store: Arc<dyn DocumentStore>,
}

impl RealtimeSyncChannel {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn path_for(user_id: &str) -> String {
        format!("locations/{user_id}")
    }

    /// Overwrite the single position record for this user; last write
    /// wins. A timestamp is attached so consumers can discard stale
    /// out-of-order records.
    pub async fn publish(&self, user_id: &str, coordinate: Coordinate) -> Result<()> {
        let record = RemotePositionRecord::new(user_id, coordinate, epoch_ms());
        debug!(user_id = %user_id, coordinate = %coordinate, "position_published");
        self.store.set(&Self::path_for(user_id), record.to_value()).await
    }

    /// Read the last published record for a user
    pub async fn last_published(&self, user_id: &str) -> Result<Option<RemotePositionRecord>> {
        let value = self.store.get(&Self::path_for(user_id)).await?;
        Ok(value.and_then(|v| RemotePositionRecord::from_value(user_id, &v)))
    }

    /// Follow position updates for one user. Malformed documents are
    /// skipped with a warning; delivery checks liveness before every
    /// callback and `cancel` is idempotent.
    pub async fn subscribe<F>(&self, user_id: &str, on_update: F) -> Result<Subscription>
    where
        F: Fn(RemotePositionRecord) + Send + Sync + 'static,
    {
        let mut rx = self.store.watch(&Self::path_for(user_id)).await?;
        let user_id = user_id.to_string();
        let liveness = Liveness::new();
        let task_liveness = liveness.clone();

        let handle = tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                if !task_liveness.is_live() {
                    break;
                }
                let Some(record) = RemotePositionRecord::from_value(&user_id, &value) else {
                    warn!(user_id = %user_id, "remote_record_malformed");
                    continue;
                };
                if !task_liveness.is_live() {
                    break;
                }
                on_update(record);
            }
        });

        Ok(Subscription::new(liveness, handle))
    }
}
