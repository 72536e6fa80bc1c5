//! mindnet: per-identity associative memory.
//!
//! The engine lives in [`mindnet_core`]. This crate adds configuration,
//! logging, the per-identity service that serializes writes, and the CLI.

pub mod config;
pub mod config_cli;
pub mod failure;
pub mod memory_cli;
pub mod mindmap_cli;
pub mod observability;
pub mod service;

pub use config::{Config, LockConfig};
pub use failure::Failure;
pub use service::{IdentityGuard, MemoryService};
