//! `awsQuery` request decoding.
//!
//! CloudFormation requests are flat form-urlencoded key/value pairs. Lists
//! use 1-based indexed members:
//!
//! ```text
//! Parameters.member.1.ParameterKey=Env&Parameters.member.1.ParameterValue=prod
//! Capabilities.member.1=CAPABILITY_IAM
//! ```
//!
//! Index scanning stops at the first missing index, so gaps truncate the
//! list, and never goes beyond [`MAX_MEMBER_INDEX`].

use std::collections::HashMap;

use rustack_cloudformation_model::error::CloudFormationError;
use rustack_cloudformation_model::input::{
    ChangeSetRefInput, CreateChangeSetInput, CreateStackInput, DeleteStackInput,
    DescribeStackEventsInput, DescribeStackResourceInput, DescribeStackResourcesInput,
    DescribeStacksInput, GetTemplateInput, ListChangeSetsInput, ListExportsInput, ListStacksInput,
    UpdateStackInput, ValidateTemplateInput,
};
use rustack_cloudformation_model::types::{ChangeSetType, Parameter, StackStatus, Tag};

/// Highest member index that is ever read.
pub const MAX_MEMBER_INDEX: usize = 99;

/// Decoded form parameters of one request.
///
/// When a key repeats, the last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    inner: HashMap<String, String>,
}

impl QueryParams {
    /// Decode a form-urlencoded body.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        Self {
            inner: form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    /// Merge pairs from a URI query string, without overriding body values.
    pub fn merge_query(&mut self, query: &str) {
        for (k, v) in form_urlencoded::parse(query.as_bytes()).into_owned() {
            self.inner.entry(k).or_insert(v);
        }
    }

    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Look up a value, treating an empty string as absent.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).map(ToOwned::to_owned)
    }

    /// Look up a required value.
    pub fn require(&self, key: &str) -> Result<String, CloudFormationError> {
        self.get_non_empty(key)
            .ok_or_else(|| CloudFormationError::missing_parameter(key))
    }

    /// Look up a boolean flag (`true`, case-insensitive). Absent means `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Collect a list of scalar members: `<prefix>.member.N`.
    #[must_use]
    pub fn members(&self, prefix: &str) -> Vec<String> {
        (1..=MAX_MEMBER_INDEX)
            .map_while(|i| self.get(&format!("{prefix}.member.{i}")))
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Collect a list of structured members, one per index.
    ///
    /// `read` receives a field lookup scoped to `<prefix>.member.N.` and
    /// returns `None` when the index is absent, which ends the list.
    pub fn structured_members<T>(
        &self,
        prefix: &str,
        mut read: impl FnMut(&dyn Fn(&str) -> Option<String>) -> Option<T>,
    ) -> Vec<T> {
        let mut out = Vec::new();
        for i in 1..=MAX_MEMBER_INDEX {
            let scope = format!("{prefix}.member.{i}.");
            let field = |name: &str| self.get(&format!("{scope}{name}")).map(ToOwned::to_owned);
            match read(&field) {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }

    /// Decode `Parameters.member.N.{ParameterKey,ParameterValue,UsePreviousValue}`.
    #[must_use]
    pub fn parameters(&self) -> Vec<Parameter> {
        self.structured_members("Parameters", |field| {
            let key = field("ParameterKey").filter(|k| !k.is_empty())?;
            Some(Parameter {
                parameter_key: key,
                parameter_value: field("ParameterValue"),
                use_previous_value: field("UsePreviousValue")
                    .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            })
        })
    }

    /// Decode `Tags.member.N.{Key,Value}`.
    #[must_use]
    pub fn tags(&self) -> Vec<Tag> {
        self.structured_members("Tags", |field| {
            Some(Tag {
                key: field("Key")?,
                value: field("Value").unwrap_or_default(),
            })
        })
    }
}

/// Decode an operation input from form parameters.
pub trait FromQueryParams: Sized {
    /// Build the input, failing on missing or malformed members.
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError>;
}

impl FromQueryParams for CreateStackInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.require("StackName")?,
            template_body: params.get_non_empty("TemplateBody"),
            template_url: params.get_non_empty("TemplateURL"),
            parameters: params.parameters(),
            capabilities: params.members("Capabilities"),
            notification_arns: params.members("NotificationARNs"),
            tags: params.tags(),
            role_arn: params.get_non_empty("RoleARN"),
            disable_rollback: params.flag("DisableRollback"),
        })
    }
}

impl FromQueryParams for UpdateStackInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.require("StackName")?,
            template_body: params.get_non_empty("TemplateBody"),
            template_url: params.get_non_empty("TemplateURL"),
            use_previous_template: params.flag("UsePreviousTemplate"),
            parameters: params.parameters(),
            capabilities: params.members("Capabilities"),
            notification_arns: params.members("NotificationARNs"),
            tags: params.tags(),
            role_arn: params.get_non_empty("RoleARN"),
        })
    }
}

impl FromQueryParams for DeleteStackInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.require("StackName")?,
        })
    }
}

impl FromQueryParams for DescribeStacksInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.get_non_empty("StackName"),
        })
    }
}

impl FromQueryParams for ListStacksInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        let mut raw = params.members("StackStatusFilter");
        if let Some(single) = params.get_non_empty("StackStatusFilter") {
            raw.push(single);
        }
        let stack_status_filter = raw
            .iter()
            .map(|s| {
                StackStatus::from_name(s).ok_or_else(|| {
                    CloudFormationError::validation(format!(
                        "1 validation error detected: Value '{s}' at 'stackStatusFilter' \
                         failed to satisfy constraint: Member must satisfy enum value set"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            stack_status_filter,
        })
    }
}

impl FromQueryParams for GetTemplateInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.get_non_empty("StackName"),
            change_set_name: params.get_non_empty("ChangeSetName"),
        })
    }
}

impl FromQueryParams for DescribeStackResourceInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.require("StackName")?,
            logical_resource_id: params.require("LogicalResourceId")?,
        })
    }
}

impl FromQueryParams for DescribeStackResourcesInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.get_non_empty("StackName"),
            logical_resource_id: params.get_non_empty("LogicalResourceId"),
            physical_resource_id: params.get_non_empty("PhysicalResourceId"),
        })
    }
}

impl FromQueryParams for DescribeStackEventsInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.get_non_empty("StackName"),
        })
    }
}

impl FromQueryParams for CreateChangeSetInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        let change_set_type = params
            .get_non_empty("ChangeSetType")
            .map(|t| {
                ChangeSetType::from_name(&t).ok_or_else(|| {
                    CloudFormationError::validation(format!("Invalid ChangeSetType: {t}"))
                })
            })
            .transpose()?;
        Ok(Self {
            stack_name: params.require("StackName")?,
            change_set_name: params.require("ChangeSetName")?,
            template_body: params.get_non_empty("TemplateBody"),
            template_url: params.get_non_empty("TemplateURL"),
            use_previous_template: params.flag("UsePreviousTemplate"),
            parameters: params.parameters(),
            capabilities: params.members("Capabilities"),
            notification_arns: params.members("NotificationARNs"),
            tags: params.tags(),
            role_arn: params.get_non_empty("RoleARN"),
            description: params.get_non_empty("Description"),
            change_set_type,
        })
    }
}

impl FromQueryParams for ChangeSetRefInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            change_set_name: params.require("ChangeSetName")?,
            stack_name: params.get_non_empty("StackName"),
        })
    }
}

impl FromQueryParams for ListChangeSetsInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            stack_name: params.require("StackName")?,
        })
    }
}

impl FromQueryParams for ListExportsInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            next_token: params.get_non_empty("NextToken"),
        })
    }
}

impl FromQueryParams for ValidateTemplateInput {
    fn from_params(params: &QueryParams) -> Result<Self, CloudFormationError> {
        Ok(Self {
            template_body: params.get_non_empty("TemplateBody"),
            template_url: params.get_non_empty("TemplateURL"),
        })
    }
}
