//! Shared publication ingest domain primitives.
//!
//! This crate owns the batched event emitter, the single-table key scheme and the
//! storage projection built on it. It intentionally excludes AWS SDK and Lambda
//! runtime concerns; those live in `publication_ingest_lambda`.

pub mod batching;
pub mod config;
pub mod emitter;
pub mod entry;
pub mod event;
pub mod identifier;
pub mod keys;
pub mod pipeline;
pub mod projection;
pub mod record;
pub mod report_keys;
pub mod schema;
pub mod store;
