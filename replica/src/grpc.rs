//! [`RemoteStore`] backed by the case store gRPC service.

use std::time::Duration;

use async_trait::async_trait;
use case_store_types::cases;
use case_store_types::cases::case_store_client::CaseStoreClient;
use futures_util::StreamExt;
use tonic::Request;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};

use crate::config::ReplicaConfig;
use crate::error::StoreError;
use crate::record::{CaseRecord, NewCase, clamp_improvement};
use crate::store::{RemoteStore, SnapshotStream};

/// Client for one collection on a case store server.
///
/// Cloning is cheap; clones share the underlying channel.
#[derive(Clone)]
pub struct GrpcStore {
    client: CaseStoreClient<Channel>,
    collection: String,
    token: Option<MetadataValue<Ascii>>,
    request_timeout: Duration,
}

impl GrpcStore {
    /// Connects to the endpoint named in `config`.
    pub async fn connect(config: &ReplicaConfig) -> Result<Self, StoreError> {
        let endpoint = Endpoint::from_shared(config.endpoint_uri())
            .map_err(|_| StoreError::InvalidEndpoint(config.endpoint.clone()))?
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms));
        let channel = endpoint.connect().await?;
        Self::from_channel(channel, config)
    }

    /// Wraps an existing channel, e.g. a lazily connected one.
    pub fn from_channel(channel: Channel, config: &ReplicaConfig) -> Result<Self, StoreError> {
        let token = config
            .auth_token
            .as_deref()
            .map(|t| {
                MetadataValue::try_from(format!("Bearer {t}")).map_err(|_| StoreError::InvalidToken)
            })
            .transpose()?;

        Ok(Self {
            client: CaseStoreClient::new(channel),
            collection: config.collection_path(),
            token,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(token) = &self.token {
            request.metadata_mut().insert("authorization", token.clone());
        }
        request
    }
}

#[async_trait]
impl RemoteStore for GrpcStore {
    async fn subscribe(&self) -> Result<SnapshotStream, StoreError> {
        let request = self.request(cases::SubscribeRequest {
            collection: self.collection.clone(),
        });
        let stream = self.client.clone().subscribe(request).await?.into_inner();

        Ok(stream
            .map(|snapshot| {
                snapshot
                    .map(|s| s.records.into_iter().map(CaseRecord::from).collect())
                    .map_err(StoreError::from)
            })
            .boxed())
    }

    async fn create(&self, case: NewCase) -> Result<String, StoreError> {
        let mut request = self.request(cases::CreateRequest {
            collection: self.collection.clone(),
            fields: Some(case.into()),
        });
        request.set_timeout(self.request_timeout);
        let response = self.client.clone().create(request).await?;
        Ok(response.into_inner().id)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut request = self.request(cases::DeleteRequest {
            collection: self.collection.clone(),
            id: id.to_string(),
        });
        request.set_timeout(self.request_timeout);
        self.client.clone().delete(request).await?;
        Ok(())
    }
}

impl From<cases::CaseRecord> for CaseRecord {
    fn from(record: cases::CaseRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.unwrap_or_default(),
            issue: record.issue,
            treatment: record.treatment,
            routine: record.routine,
            result: record.result,
            improvement: clamp_improvement(record.improvement),
            created_at: record.created_at,
            date_str: record.date_str,
        }
    }
}

impl From<NewCase> for cases::NewCase {
    fn from(case: NewCase) -> Self {
        Self {
            name: case.name,
            issue: case.issue,
            treatment: case.treatment,
            routine: case.routine,
            improvement: i64::from(case.improvement),
            result: case.result,
            created_at: case.created_at,
            date_str: case.date_str,
        }
    }
}
