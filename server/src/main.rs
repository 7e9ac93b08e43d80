use std::env;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::info;

use case_store_server::{db, grpc, storage};

const DEFAULT_ADDR: &str = "127.0.0.1:50051";
const DEFAULT_DATABASE: &str = "sqlite::memory:";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = env::var("CASE_STORE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let database = env::var("CASE_STORE_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

    let pool = db::init_pool(&database).await?;
    let storage = Arc::new(storage::Storage::new(pool));
    let mut service = grpc::CaseStoreService::new(storage);
    if let Ok(token) = env::var("CASE_STORE_TOKEN") {
        if !token.is_empty() {
            service = service.with_token(token);
        }
    }

    let addr = addr.parse()?;
    info!(%addr, %database, "case store listening");
    Server::builder()
        .add_service(grpc::create_server(service))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
