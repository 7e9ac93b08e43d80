//! A small document store for case collections.
//!
//! Collections live in SQLite and are served over the `cases.CaseStore`
//! gRPC service. Subscribers receive the full collection on subscribe and
//! again after every change to it.

pub mod db;
pub mod grpc;
pub mod models;
pub mod storage;
