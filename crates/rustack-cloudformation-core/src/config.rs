//! CloudFormation configuration.

use std::env;

use rustack_core::{AccountId, AwsRegion};

/// CloudFormation service configuration.
#[derive(Debug, Clone)]
pub struct CloudFormationConfig {
    /// Region used when a request carries no credential scope.
    pub default_region: AwsRegion,
    /// Account every stack is created under.
    pub default_account: AccountId,
    /// Fail output and property resolution on references the engine cannot
    /// resolve instead of leaving the intrinsic in place.
    pub fail_on_unresolved_refs: bool,
}

impl CloudFormationConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            default_region: env::var("DEFAULT_REGION")
                .map_or_else(|_| AwsRegion::default(), AwsRegion::new),
            default_account: env::var("DEFAULT_ACCOUNT")
                .ok()
                .and_then(|v| AccountId::new(v).ok())
                .unwrap_or_default(),
            fail_on_unresolved_refs: env_bool("CLOUDFORMATION_FAIL_ON_UNRESOLVED_REFS", false),
        }
    }
}

impl Default for CloudFormationConfig {
    fn default() -> Self {
        Self {
            default_region: AwsRegion::default(),
            default_account: AccountId::default(),
            fail_on_unresolved_refs: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
