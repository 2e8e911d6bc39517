//! ARN construction helpers.

use std::fmt;

use crate::types::{AccountId, AwsRegion};

/// An Amazon Resource Name in the `aws` partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    service: String,
    region: AwsRegion,
    account: AccountId,
    resource: String,
}

impl Arn {
    /// Build an ARN from its components.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        region: &AwsRegion,
        account: &AccountId,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            region: region.clone(),
            account: account.clone(),
            resource: resource.into(),
        }
    }

    /// The region component.
    #[must_use]
    pub fn region(&self) -> &AwsRegion {
        &self.region
    }

    /// The resource component (everything after the account).
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:aws:{}:{}:{}:{}",
            self.service, self.region, self.account, self.resource
        )
    }
}

/// Generate a short random identifier (the first 8 hex digits of a UUID v4).
#[must_use]
pub fn short_uid() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
