//! A local replica of a shared collection of patient treatment cases.
//!
//! `case-replica` subscribes to a remote case store, keeps an ordered,
//! de-duplicated snapshot of the collection in memory, and forwards creates
//! and deletes to the store.
//!
//! # Features
//!
//! - Whole-collection snapshots applied in delivery order, newest case first
//! - Validation of new cases before anything reaches the network
//! - Optimistic delete with rollback when the store rejects it
//! - Observer callbacks and a `watch` channel for view changes
//! - Case-insensitive name search over any view
//!
//! # Example
//!
//! ```no_run
//! use case_replica::{CaseReplica, ReplicaConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let replica = CaseReplica::connect(ReplicaConfig::default()).await?;
//!     let mut views = replica.cache().watch();
//!
//!     views.changed().await?;
//!     for case in views.borrow().iter() {
//!         println!("{} {}%", case.name, case.improvement);
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod clock;
mod config;
mod error;
#[cfg(test)]
mod fake;
pub mod filter;
mod grpc;
mod record;
mod replica;
mod store;
mod sync;

pub use cache::{CaseView, ObserverId, ReplicaCache, ReplicaCacheBuilder, SyncState};
pub use clock::{Clock, DateStyle, SystemClock};
pub use config::{ConfigError, ReplicaConfig};
pub use error::{Error, StoreError};
pub use grpc::GrpcStore;
pub use record::{CaseInput, CaseRecord, MAX_IMPROVEMENT, NewCase, clamp_improvement};
pub use replica::CaseReplica;
pub use store::{RemoteStore, SnapshotStream};
pub use sync::{Subscription, SyncTask};
