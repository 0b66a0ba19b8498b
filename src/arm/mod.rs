//! Azure Resource Manager access for the `Microsoft.Edge` provider.

pub mod client;
pub mod workload;

pub use client::{ArmClient, ArmResponse, PollSettings};
pub use workload::WorkloadApi;
