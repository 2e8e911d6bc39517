//! CloudFormation core business logic for Rustack.
//!
//! Stacks, change sets, and the export directory live in a per-region
//! [`state::CloudFormationRegionState`]. Provisioning is delegated to a
//! [`engine::DeploymentEngine`]; the bundled [`engine::LocalDeploymentEngine`]
//! only records resource states.
#![allow(missing_docs, clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod provider;
pub mod state;
pub mod template;
