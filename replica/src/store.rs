//! The boundary between the replica and the remote document store.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::StoreError;
use crate::record::{CaseRecord, NewCase};

/// Complete listings of the collection, in delivery order.
pub type SnapshotStream =
    Pin<Box<dyn Stream<Item = Result<Vec<CaseRecord>, StoreError>> + Send + 'static>>;

/// A remote collection of cases.
///
/// Implementations deliver whole snapshots, never deltas. The first item of
/// a subscription should arrive promptly, then one item per remote change.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    async fn subscribe(&self) -> Result<SnapshotStream, StoreError>;

    /// Writes a new case and returns the id the store assigned.
    async fn create(&self, case: NewCase) -> Result<String, StoreError>;

    /// Deleting an id the store does not have succeeds.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
