//! wo - provision and drive Azure workload-orchestration resources.
//!
//! The library holds everything the `wo` binary does: the credential chain,
//! a blocking ARM client with long-running-operation polling, capability
//! reconciliation, the persisted version counter, dynamic configuration and
//! the end-to-end provisioning workflow.

pub mod app;
pub mod arm;
pub mod auth;
pub mod capability;
pub mod cli;
pub mod config;
pub mod dynconfig;
pub mod error;
pub mod retry;
pub mod test_utils;
pub mod version;
pub mod workflow;

pub use error::{Result, WoError};
