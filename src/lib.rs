//! Document Storage Gateway Library
//!
//! Stores and retrieves JSON documents in an object store, with every
//! operation traced, logged and counted.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod operation;
pub mod storage;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
pub use operation::OperationExecutor;
