//! AWS-oriented runtime for the remote update function.
//!
//! This crate owns Lambda integration details (the update handler and the
//! storage adapter boundary) and the zip package surgery it performs. The
//! wire contract and the storage key layout live in `fastdeploy_core`.

pub mod adapters;
pub mod handlers;
pub mod packages;
