//! A replica connected to a case store server.

use std::sync::Arc;

use crate::cache::ReplicaCache;
use crate::config::ReplicaConfig;
use crate::error::Error;
use crate::grpc::GrpcStore;
use crate::store::RemoteStore;
use crate::sync::Subscription;

/// A [`ReplicaCache`] kept in sync with a case store over gRPC.
///
/// # Example
///
/// ```no_run
/// use case_replica::{CaseInput, CaseReplica, ReplicaConfig, filter};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let replica = CaseReplica::connect(ReplicaConfig::default().with_env()?).await?;
///     let cache = replica.cache();
///
///     cache.request_create(CaseInput::new("Sara")).await?;
///     let matches = filter::apply(&cache.view(), "sa");
///     println!("{} matching cases", matches.len());
///
///     replica.shutdown();
///     Ok(())
/// }
/// ```
pub struct CaseReplica {
    cache: ReplicaCache,
    subscription: Subscription,
}

impl CaseReplica {
    /// Connects to the store named in `config` and starts syncing.
    pub async fn connect(config: ReplicaConfig) -> Result<Self, Error> {
        config.validate()?;
        let store = GrpcStore::connect(&config).await?;
        let cache = ReplicaCache::builder(Arc::new(store) as Arc<dyn RemoteStore>)
            .date_style(config.date_style.clone())
            .build();
        let subscription = cache.spawn_sync();
        Ok(Self {
            cache,
            subscription,
        })
    }

    pub fn cache(&self) -> &ReplicaCache {
        &self.cache
    }

    /// Closes the subscription. The cache keeps its last view.
    pub fn shutdown(self) -> ReplicaCache {
        self.subscription.close();
        self.cache
    }
}
