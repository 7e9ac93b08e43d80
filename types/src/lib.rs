//! Wire types for the case store gRPC API.

pub mod cases {
    tonic::include_proto!("cases");
}
