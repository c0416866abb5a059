#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod operation;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::{ManagementClient, Submission};
pub use error::{ManagementError, ManagementResult};
pub use operation::{OperationId, OperationState, OperationStatus};
