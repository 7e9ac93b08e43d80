use case_store_server::grpc::{create_server, CaseStoreService};
use case_store_types::cases::case_store_client::CaseStoreClient;
use case_store_types::cases::{CreateRequest, DeleteRequest, NewCase, SubscribeRequest};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Channel;
use tonic::{Code, Request};

const COLLECTION: &str = "artifacts/test/public/data/patients";

async fn start_test_server(token: Option<&str>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pool = case_store_server::db::init_pool("sqlite::memory:").await.unwrap();
    let storage = Arc::new(case_store_server::storage::Storage::new(pool));
    let mut service = CaseStoreService::new(storage);
    if let Some(token) = token {
        service = service.with_token(token);
    }

    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(create_server(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    (addr, handle)
}

async fn connect(addr: SocketAddr) -> CaseStoreClient<Channel> {
    CaseStoreClient::connect(format!("http://{}", addr)).await.unwrap()
}

fn new_case(name: &str, created_at: i64) -> NewCase {
    NewCase {
        name: name.to_string(),
        improvement: 50,
        created_at,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_subscribe_receives_initial_snapshot() {
    let (addr, _handle) = start_test_server(None).await;
    let mut client = connect(addr).await;

    let mut stream = client
        .subscribe(SubscribeRequest {
            collection: COLLECTION.to_string(),
        })
        .await
        .unwrap()
        .into_inner();

    let snapshot = stream.next().await.unwrap().unwrap();
    assert!(snapshot.records.is_empty());
}

#[tokio::test]
async fn test_create_and_delete_push_snapshots() {
    let (addr, _handle) = start_test_server(None).await;
    let mut client = connect(addr).await;
    let mut stream = client
        .subscribe(SubscribeRequest {
            collection: COLLECTION.to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    stream.next().await.unwrap().unwrap();

    let id = client
        .create(CreateRequest {
            collection: COLLECTION.to_string(),
            fields: Some(new_case("Ali", 100)),
        })
        .await
        .unwrap()
        .into_inner()
        .id;

    let snapshot = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.records[0].id, id);
    assert_eq!(snapshot.records[0].name.as_deref(), Some("Ali"));
    assert_eq!(snapshot.records[0].created_at, Some(100));

    client
        .delete(DeleteRequest {
            collection: COLLECTION.to_string(),
            id: id.clone(),
        })
        .await
        .unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(snapshot.records.is_empty());

    // Deleting again is still a success.
    client
        .delete(DeleteRequest {
            collection: COLLECTION.to_string(),
            id,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_collection_is_rejected() {
    let (addr, _handle) = start_test_server(None).await;
    let mut client = connect(addr).await;

    let status = client
        .create(CreateRequest {
            collection: String::new(),
            fields: Some(new_case("Ali", 1)),
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_token_is_required_when_configured() {
    let (addr, _handle) = start_test_server(Some("s3cret")).await;
    let mut client = connect(addr).await;

    let status = client
        .delete(DeleteRequest {
            collection: COLLECTION.to_string(),
            id: "x".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let mut request = Request::new(DeleteRequest {
        collection: COLLECTION.to_string(),
        id: "x".to_string(),
    });
    request
        .metadata_mut()
        .insert("authorization", "Bearer s3cret".parse().unwrap());
    assert!(client.delete(request).await.is_ok());
}
