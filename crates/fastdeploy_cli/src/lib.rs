//! Client half of the fast deploy workflow.
//!
//! Builds the update artifact from the configured inclusion rules, ships it
//! to the updater function through one synchronous invoke, and fans
//! `UpdateFunctionCode` out across the service's functions. AWS adapter
//! implementations live in the `fastdeploy` binary; everything here works
//! against the trait seams in `adapters`.

pub mod adapters;
pub mod archive;
pub mod commands;
pub mod error;
pub mod fanout;
pub mod ship;
pub mod stub;
