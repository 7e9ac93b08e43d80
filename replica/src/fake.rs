//! In-process store double for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures_util::StreamExt;
use tokio::sync::{Notify, mpsc, oneshot};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::record::{CaseRecord, NewCase};
use crate::store::{RemoteStore, SnapshotStream};

pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

pub type SnapshotSender = mpsc::UnboundedSender<Result<Vec<CaseRecord>, StoreError>>;

#[derive(Default)]
pub struct FakeStore {
    creates: Mutex<Vec<NewCase>>,
    deletes: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    refuse_subscribe: AtomicBool,
    delete_gate: Mutex<Option<oneshot::Receiver<Result<(), StoreError>>>>,
    delete_started: Notify,
    feed: Mutex<Option<mpsc::UnboundedReceiver<Result<Vec<CaseRecord>, StoreError>>>>,
}

impl FakeStore {
    pub fn creates(&self) -> Vec<NewCase> {
        self.creates.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn fail_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn refuse_subscribe(&self) {
        self.refuse_subscribe.store(true, Ordering::SeqCst);
    }

    /// The next delete waits for `gate` and returns what it yields.
    pub fn hold_next_delete(&self, gate: oneshot::Receiver<Result<(), StoreError>>) {
        *self.delete_gate.lock().unwrap() = Some(gate);
    }

    pub async fn delete_started(&self) {
        self.delete_started.notified().await;
    }

    /// Hands out the sending side of the next subscription.
    pub fn feed(&self) -> SnapshotSender {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(rx);
        tx
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn subscribe(&self) -> Result<SnapshotStream, StoreError> {
        if self.refuse_subscribe.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionClosed);
        }
        let rx = self
            .feed
            .lock()
            .unwrap()
            .take()
            .ok_or(StoreError::ConnectionClosed)?;
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }

    async fn create(&self, case: NewCase) -> Result<String, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionClosed);
        }
        self.creates.lock().unwrap().push(case);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("generated-{n}"))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.deletes.lock().unwrap().push(id.to_string());
        let gate = self.delete_gate.lock().unwrap().take();
        self.delete_started.notify_one();
        match gate {
            Some(gate) => gate.await.unwrap_or(Err(StoreError::ConnectionClosed)),
            None => Ok(()),
        }
    }
}
