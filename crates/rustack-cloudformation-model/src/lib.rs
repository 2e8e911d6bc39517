//! CloudFormation model types for Rustack.
//!
//! CloudFormation speaks the `awsQuery` protocol: requests are flat
//! form-urlencoded key/value pairs and responses are XML. The types here are
//! plain Rust structs; decoding from form parameters lives in the HTTP crate
//! and XML encoding lives next to it.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use error::{CloudFormationError, CloudFormationErrorCode};
pub use operations::CloudFormationOperation;
