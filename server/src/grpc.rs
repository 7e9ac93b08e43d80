use crate::models::StoredCase;
use crate::storage::Storage;
use case_store_types::cases::{
    case_store_server::{CaseStore, CaseStoreServer},
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, Snapshot, SubscribeRequest,
};
use futures_util::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

#[derive(Clone)]
pub struct CaseStoreService {
    storage: Arc<Storage>,
    token: Option<String>,
}

impl CaseStoreService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            token: None,
        }
    }

    /// Requires `authorization: Bearer <token>` on every call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorize<T>(&self, request: &Request<T>) -> Result<(), Status> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        let provided = request
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match provided {
            Some(token) if token == expected => Ok(()),
            _ => Err(Status::unauthenticated("missing or invalid token")),
        }
    }
}

fn require(value: &str, what: &str) -> Result<(), Status> {
    if value.is_empty() {
        return Err(Status::invalid_argument(format!("{} must not be empty", what)));
    }
    Ok(())
}

type SubscribeStream = Pin<Box<dyn Stream<Item = Result<Snapshot, Status>> + Send>>;

#[tonic::async_trait]
impl CaseStore for CaseStoreService {
    type SubscribeStream = SubscribeStream;

    async fn subscribe(
        &self,
        request: Request<SubscribeRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        self.authorize(&request)?;
        let req = request.into_inner();
        require(&req.collection, "collection")?;
        info!(collection = %req.collection, "subscriber attached");

        let output = self.storage.subscribe(&req.collection).map(|snapshot| {
            snapshot
                .map(|s| Snapshot {
                    version: s.version,
                    records: s.records.into_iter().map(Into::into).collect(),
                })
                .map_err(|e| {
                    warn!(error = %e, "snapshot read failed");
                    Status::internal(e.to_string())
                })
        });

        Ok(Response::new(Box::pin(output)))
    }

    async fn create(
        &self,
        request: Request<CreateRequest>,
    ) -> Result<Response<CreateResponse>, Status> {
        self.authorize(&request)?;
        let req = request.into_inner();
        require(&req.collection, "collection")?;
        let fields = req
            .fields
            .ok_or_else(|| Status::invalid_argument("fields are required"))?;

        let id = self
            .storage
            .create(&req.collection, StoredCase::new(fields))
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        info!(collection = %req.collection, %id, "case created");

        Ok(Response::new(CreateResponse { id }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        self.authorize(&request)?;
        let req = request.into_inner();
        require(&req.collection, "collection")?;
        require(&req.id, "id")?;

        let removed = self
            .storage
            .delete(&req.collection, &req.id)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        info!(collection = %req.collection, id = %req.id, removed, "case deleted");

        Ok(Response::new(DeleteResponse {}))
    }
}

pub fn create_server(service: CaseStoreService) -> CaseStoreServer<CaseStoreService> {
    CaseStoreServer::new(service)
}
