//! CloudFormation operation enum.

use std::fmt;

/// All supported CloudFormation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudFormationOperation {
    // Stack lifecycle
    CreateStack,
    UpdateStack,
    DeleteStack,
    DescribeStacks,
    ListStacks,
    GetTemplate,

    // Resources and history
    DescribeStackResource,
    DescribeStackResources,
    /// Same data as `DescribeStackResources`, under a different result field.
    ListStackResources,
    DescribeStackEvents,

    // Change sets
    CreateChangeSet,
    ExecuteChangeSet,
    DescribeChangeSet,
    DeleteChangeSet,
    ListChangeSets,

    // Exports and templates
    ListExports,
    ValidateTemplate,
}

impl CloudFormationOperation {
    /// Every supported operation.
    pub const ALL: [Self; 17] = [
        Self::CreateStack,
        Self::UpdateStack,
        Self::DeleteStack,
        Self::DescribeStacks,
        Self::ListStacks,
        Self::GetTemplate,
        Self::DescribeStackResource,
        Self::DescribeStackResources,
        Self::ListStackResources,
        Self::DescribeStackEvents,
        Self::CreateChangeSet,
        Self::ExecuteChangeSet,
        Self::DescribeChangeSet,
        Self::DeleteChangeSet,
        Self::ListChangeSets,
        Self::ListExports,
        Self::ValidateTemplate,
    ];

    /// Returns the AWS action name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateStack => "CreateStack",
            Self::UpdateStack => "UpdateStack",
            Self::DeleteStack => "DeleteStack",
            Self::DescribeStacks => "DescribeStacks",
            Self::ListStacks => "ListStacks",
            Self::GetTemplate => "GetTemplate",
            Self::DescribeStackResource => "DescribeStackResource",
            Self::DescribeStackResources => "DescribeStackResources",
            Self::ListStackResources => "ListStackResources",
            Self::DescribeStackEvents => "DescribeStackEvents",
            Self::CreateChangeSet => "CreateChangeSet",
            Self::ExecuteChangeSet => "ExecuteChangeSet",
            Self::DescribeChangeSet => "DescribeChangeSet",
            Self::DeleteChangeSet => "DeleteChangeSet",
            Self::ListChangeSets => "ListChangeSets",
            Self::ListExports => "ListExports",
            Self::ValidateTemplate => "ValidateTemplate",
        }
    }

    /// Parse an action name into a `CloudFormationOperation`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for CloudFormationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
