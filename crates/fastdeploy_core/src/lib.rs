//! Shared fast-deploy domain primitives.
//!
//! This crate owns the update wire contract, inclusion resolution, storage
//! key derivation, and service configuration. It intentionally excludes AWS
//! SDK and Lambda runtime concerns.

pub mod config;
pub mod contract;
pub mod include;
pub mod storage_keys;
