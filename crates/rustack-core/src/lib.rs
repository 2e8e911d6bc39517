//! Core types, configuration, and state management for Rustack.
//!
//! This crate provides the foundational building blocks shared by the
//! Rustack service implementations: multi-account/multi-region state
//! partitioning, environment-driven configuration, ARN construction, and
//! common AWS type definitions.

mod arn;
mod config;
mod error;
mod state;
mod types;

pub use arn::{Arn, short_uid};
pub use config::RustackConfig;
pub use error::{RustackError, RustackResult};
pub use state::AccountRegionStore;
pub use types::{AccountId, AwsRegion};
