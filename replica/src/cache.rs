//! The local replica of the case collection.
//!
//! [`ReplicaCache`] owns the only mutable copy of the local record set. Remote
//! snapshots replace it wholesale through [`ReplicaCache::ingest_snapshot`];
//! local mutations go out to the [`RemoteStore`] and come back through the
//! next snapshot. Readers get an immutable [`CaseView`] that is rebuilt on
//! every change, so a read never sorts or copies.
//!
//! # Deletes
//!
//! A delete removes the record from the view before the store is called. If
//! the store then fails, the record is put back at its old position unless a
//! snapshot arrived in between: snapshots are authoritative, and one that
//! landed mid-delete already decided whether the record exists. Dropping
//! the delete future before the store answers rolls back the same way.
//!
//! # Observers
//!
//! Every change stamps the new view with a revision while the state lock is
//! held. Observer calls are funnelled through one delivery loop at a time, so
//! observers never see an older revision after a newer one. When changes race
//! across threads, intermediate revisions may be skipped, but the last call
//! always carries the newest view.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::clock::{Clock, DateStyle, SystemClock};
use crate::error::{Error, StoreError};
use crate::record::{CaseInput, CaseRecord, MAX_IMPROVEMENT};
use crate::store::RemoteStore;

/// An ordered, read-only listing of the replica, newest first.
pub type CaseView = Arc<[CaseRecord]>;

type Observer = Arc<dyn Fn(&CaseView) + Send + Sync>;

/// Where the replica is in its subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No subscription has been opened yet.
    Uninitialized,
    /// Subscribed, waiting for the first delivery.
    Loading,
    /// At least one snapshot or subscription error has been delivered.
    Synced,
}

/// Handle returned by [`ReplicaCache::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Shared handle to the replica. Clones refer to the same state.
#[derive(Clone)]
pub struct ReplicaCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    dates: DateStyle,
    state: Mutex<State>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
    delivery: Mutex<Delivery>,
    view_tx: watch::Sender<CaseView>,
}

/// A view as of one state change.
struct Published {
    revision: u64,
    view: CaseView,
}

#[derive(Default)]
struct Delivery {
    /// Newest revision handed to observers.
    delivered: u64,
    pending: Option<Published>,
    /// Set while some caller is running the delivery loop.
    running: bool,
}

/// Clears `running` if an observer panics mid-delivery.
struct DeliveryRun<'a>(&'a ReplicaCache);

impl Drop for DeliveryRun<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.delivery().running = false;
        }
    }
}

/// A record removed ahead of its remote delete.
///
/// Unless confirmed, the record is restored when this is rolled back or
/// dropped, provided no snapshot arrived since the removal.
struct PendingDelete<'a> {
    cache: &'a ReplicaCache,
    entry: Option<Entry>,
    epoch: u64,
}

impl PendingDelete<'_> {
    fn confirm(mut self) {
        self.entry = None;
    }

    /// Returns whether the record went back into the view.
    fn roll_back(&mut self) -> bool {
        let Some(entry) = self.entry.take() else {
            return false;
        };
        let published = {
            let mut state = self.cache.state();
            if state.epoch != self.epoch || state.position(&entry.record.id).is_some() {
                return false;
            }
            let key = entry.order_key();
            let pos = state.entries.partition_point(|e| e.order_key() < key);
            state.entries.insert(pos, entry);
            state.rebuild_view();
            self.cache.publish(&mut state)
        };
        self.cache.notify(published);
        true
    }
}

impl Drop for PendingDelete<'_> {
    fn drop(&mut self) {
        if let Some(entry) = &self.entry {
            let id = entry.record.id.clone();
            if self.roll_back() {
                warn!(%id, "delete abandoned, record restored");
            }
        }
    }
}

struct Entry {
    /// Position in the snapshot that delivered the record.
    seq: usize,
    record: CaseRecord,
}

impl Entry {
    fn order_key(&self) -> (Reverse<i64>, usize) {
        (Reverse(self.record.created_at_or_zero()), self.seq)
    }
}

struct State {
    sync: SyncState,
    entries: Vec<Entry>,
    view: CaseView,
    /// Bumped by every snapshot.
    epoch: u64,
    /// Bumped by every published view.
    revision: u64,
    last_error: Option<String>,
}

impl State {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.record.id == id)
    }

    fn rebuild_view(&mut self) {
        self.view = self.entries.iter().map(|e| e.record.clone()).collect();
    }
}

/// Builder for a [`ReplicaCache`] with a non-default clock or date style.
pub struct ReplicaCacheBuilder {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    dates: DateStyle,
}

impl ReplicaCacheBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn date_style(mut self, dates: DateStyle) -> Self {
        self.dates = dates;
        self
    }

    pub fn build(self) -> ReplicaCache {
        let view: CaseView = Arc::from(Vec::new());
        let (view_tx, _) = watch::channel(Arc::clone(&view));
        ReplicaCache {
            inner: Arc::new(CacheInner {
                store: self.store,
                clock: self.clock,
                dates: self.dates,
                state: Mutex::new(State {
                    sync: SyncState::Uninitialized,
                    entries: Vec::new(),
                    view,
                    epoch: 0,
                    revision: 0,
                    last_error: None,
                }),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
                delivery: Mutex::new(Delivery::default()),
                view_tx,
            }),
        }
    }
}

impl ReplicaCache {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: Arc<dyn RemoteStore>) -> ReplicaCacheBuilder {
        ReplicaCacheBuilder {
            store,
            clock: Arc::new(SystemClock),
            dates: DateStyle::default(),
        }
    }

    pub(crate) fn store(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.inner.store)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, Vec<(ObserverId, Observer)>> {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn delivery(&self) -> MutexGuard<'_, Delivery> {
        self.inner
            .delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps the current view with the next revision. Call with the state
    /// lock held so revisions follow the order of state changes.
    fn publish(&self, state: &mut State) -> Published {
        state.revision += 1;
        self.inner.view_tx.send_replace(Arc::clone(&state.view));
        Published {
            revision: state.revision,
            view: Arc::clone(&state.view),
        }
    }

    /// Marks the subscription as opened. Only the first call has an effect.
    pub fn begin_loading(&self) {
        let mut state = self.state();
        if state.sync == SyncState::Uninitialized {
            state.sync = SyncState::Loading;
        }
    }

    /// Replaces the whole local set with `records`.
    ///
    /// Duplicate ids keep their last occurrence. The result is ordered by
    /// `created_at` descending, ties in delivery order. Observers are
    /// notified once per call, even when nothing changed, unless a newer
    /// view from a concurrent call supersedes it.
    pub fn ingest_snapshot(&self, records: Vec<CaseRecord>) {
        let mut slots: Vec<Option<CaseRecord>> = Vec::with_capacity(records.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for mut record in records {
            record.improvement = record.improvement.min(MAX_IMPROVEMENT);
            if let Some(previous) = index.insert(record.id.clone(), slots.len()) {
                slots[previous] = None;
            }
            slots.push(Some(record));
        }

        let mut entries: Vec<Entry> = slots
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(seq, record)| Entry { seq, record })
            .collect();
        entries.sort_by_key(|e| Reverse(e.record.created_at_or_zero()));

        let published = {
            let mut state = self.state();
            state.entries = entries;
            state.sync = SyncState::Synced;
            state.epoch += 1;
            state.last_error = None;
            state.rebuild_view();
            self.publish(&mut state)
        };
        debug!(records = published.view.len(), "ingested snapshot");
        self.notify(published);
    }

    /// Records a subscription failure.
    ///
    /// Loading ends with whatever was last known, so callers can show a
    /// degraded view instead of waiting forever.
    pub fn ingest_error(&self, error: &StoreError) {
        let published = {
            let mut state = self.state();
            state.sync = SyncState::Synced;
            state.last_error = Some(error.to_string());
            self.publish(&mut state)
        };
        warn!(%error, "subscription failed");
        self.notify(published);
    }

    /// Validates `input` and writes it to the store.
    ///
    /// Nothing is inserted locally; the new record shows up with the next
    /// snapshot. Returns the id assigned by the store.
    pub async fn request_create(&self, input: CaseInput) -> Result<String, Error> {
        input.validate()?;
        let now = self.inner.clock.now();
        let case = input.into_new_case(now.timestamp_millis(), self.inner.dates.format(&now));
        let id = self.inner.store.create(case).await?;
        debug!(%id, "case created");
        Ok(id)
    }

    /// Removes `id` from the view, then deletes it in the store.
    ///
    /// If the store fails, or the returned future is dropped before the
    /// store answers, the record is restored unless a snapshot has been
    /// ingested since the removal.
    pub async fn request_delete(&self, id: &str) -> Result<(), Error> {
        let (mut pending, published) = {
            let mut state = self.state();
            let pos = state
                .position(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let entry = state.entries.remove(pos);
            state.rebuild_view();
            let published = self.publish(&mut state);
            let pending = PendingDelete {
                cache: self,
                entry: Some(entry),
                epoch: state.epoch,
            };
            (pending, published)
        };
        self.notify(published);

        match self.inner.store.delete(id).await {
            Ok(()) => {
                pending.confirm();
                debug!(%id, "case deleted");
                Ok(())
            }
            Err(error) => {
                if pending.roll_back() {
                    warn!(%id, %error, "delete failed, record restored");
                } else {
                    warn!(%id, %error, "delete failed after a newer snapshot, not restoring");
                }
                Err(Error::Io(error))
            }
        }
    }

    /// The current ordered view.
    pub fn view(&self) -> CaseView {
        Arc::clone(&self.state().view)
    }

    pub fn get(&self, id: &str) -> Option<CaseRecord> {
        let state = self.state();
        state.position(id).map(|pos| state.entries[pos].record.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().entries.is_empty()
    }

    /// True until the first snapshot or subscription error arrives.
    pub fn is_loading(&self) -> bool {
        self.state().sync != SyncState::Synced
    }

    pub fn sync_state(&self) -> SyncState {
        self.state().sync
    }

    /// The subscription error reported since the last good snapshot, if any.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// Calls `observer` with the new view after every change.
    ///
    /// Observers run without any cache lock held and may read or mutate the
    /// cache; a change made from inside an observer is delivered after the
    /// current call returns.
    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&CaseView) + Send + Sync + 'static,
    {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers().push((id, Arc::new(observer)));
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.observers();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// A receiver that always holds the latest view.
    pub fn watch(&self) -> watch::Receiver<CaseView> {
        self.inner.view_tx.subscribe()
    }

    fn notify(&self, published: Published) {
        {
            let mut delivery = self.delivery();
            if published.revision <= delivery.delivered {
                return;
            }
            if delivery
                .pending
                .as_ref()
                .is_none_or(|p| p.revision < published.revision)
            {
                delivery.pending = Some(published);
            }
            if delivery.running {
                return;
            }
            delivery.running = true;
        }

        let _run = DeliveryRun(self);
        loop {
            let next = {
                let mut delivery = self.delivery();
                match delivery.pending.take() {
                    Some(next) if next.revision > delivery.delivered => {
                        delivery.delivered = next.revision;
                        next
                    }
                    _ => {
                        delivery.running = false;
                        return;
                    }
                }
            };
            let observers: Vec<Observer> = self
                .observers()
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            for observer in observers {
                observer(&next.view);
            }
        }
    }
}
