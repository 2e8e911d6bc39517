//! Integration tests for the Rustack CloudFormation server.
//!
//! These tests require a running Rustack server at `localhost:4566`.
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p rustack-integration -- --ignored
//! ```

use std::sync::Once;

use aws_sdk_cloudformation::config::{BehaviorVersion, Credentials, Region};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    std::env::var("RUSTACK_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Create a configured CloudFormation client pointing at the local server.
#[must_use]
pub fn cloudformation_client() -> aws_sdk_cloudformation::Client {
    cloudformation_client_in("us-east-1")
}

/// Create a CloudFormation client whose requests are scoped to `region`.
#[must_use]
pub fn cloudformation_client_in(region: &'static str) -> aws_sdk_cloudformation::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_cloudformation::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .build();

    aws_sdk_cloudformation::Client::from_conf(config)
}

/// Generate a unique stack or change set name for a test.
#[must_use]
pub fn test_stack_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Delete a stack, ignoring errors. Deleting an unknown stack is a no-op.
pub async fn cleanup_stack(client: &aws_sdk_cloudformation::Client, stack_name: &str) {
    let _ = client.delete_stack().stack_name(stack_name).send().await;
}

mod test_cloudformation;
