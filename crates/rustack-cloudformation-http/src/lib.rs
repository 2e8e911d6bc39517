//! CloudFormation HTTP service layer for Rustack.
//!
//! This crate implements the `awsQuery` protocol for CloudFormation, providing:
//!
//! - **Request decoding**: form-urlencoded parameters and indexed `member.N` lists
//! - **Router**: Extracts the operation from the `Action` parameter
//! - **Handler trait**: Defines the boundary between HTTP and business logic
//! - **XML**: Result and error document serialization
//! - **Service**: Hyper `Service` implementation for the CloudFormation protocol
#![allow(missing_docs)]

pub mod body;
pub mod dispatch;
pub mod request;
pub mod response;
pub mod router;
pub mod service;
pub mod xml;

pub use body::CloudFormationResponseBody;
pub use dispatch::{CloudFormationHandler, NotImplementedHandler, RequestContext};
pub use request::{FromQueryParams, QueryParams};
pub use service::{CloudFormationHttpConfig, CloudFormationHttpService};
