//! AWS-oriented adapters and handlers for publication ingest.
//!
//! This crate owns runtime integration details (Lambda handlers, EventBridge,
//! DynamoDB and S3 adapters). Emission, key derivation and projection live in
//! `publication_ingest_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
