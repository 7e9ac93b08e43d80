//! Background task feeding remote snapshots into the cache.

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::ReplicaCache;
use crate::error::StoreError;

/// An open subscription. Dropping it tears the subscription down.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stops delivering snapshots. In-flight creates and deletes are not
    /// affected.
    pub fn close(self) {}

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct SyncTask {
    cache: ReplicaCache,
}

impl SyncTask {
    pub fn new(cache: ReplicaCache) -> Self {
        Self { cache }
    }

    /// Applies snapshots in delivery order until the subscription fails.
    ///
    /// A failure is reported to the cache once and ends the task; there is
    /// no reconnect.
    pub async fn run(self) {
        self.cache.begin_loading();

        let mut stream = match self.cache.store().subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                self.cache.ingest_error(&e);
                return;
            }
        };

        while let Some(result) = stream.next().await {
            match result {
                Ok(records) => self.cache.ingest_snapshot(records),
                Err(e) => {
                    self.cache.ingest_error(&e);
                    return;
                }
            }
        }

        debug!("snapshot stream ended");
        self.cache.ingest_error(&StoreError::ConnectionClosed);
    }
}

impl ReplicaCache {
    /// Opens the store subscription on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sync(&self) -> Subscription {
        let task = SyncTask::new(self.clone());
        Subscription {
            handle: tokio::spawn(task.run()),
        }
    }
}
