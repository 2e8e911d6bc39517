//! Template documents.
//!
//! Templates are kept as ordered JSON maps so that `Outputs` and `Resources`
//! come back in declaration order. YAML templates are converted to the same
//! representation, with short-form intrinsic tags (`!Ref`, `!GetAtt`, `!Sub`,
//! ...) expanded to their long form.

use rustack_cloudformation_model::types::TemplateParameter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Errors raised while reading a template document.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The body is neither valid JSON nor valid YAML.
    #[error("{0}")]
    Syntax(String),
    /// The body parsed, but not to a mapping.
    #[error("Template body must be a JSON or YAML object")]
    NotAnObject,
    /// A resource declaration is malformed.
    #[error("Invalid resource \"{logical_id}\": {reason}")]
    InvalidResource { logical_id: String, reason: String },
}

/// A parsed template document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Free-form template description.
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared parameters by name.
    #[serde(rename = "Parameters", default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    /// Static lookup tables.
    #[serde(rename = "Mappings", default, skip_serializing_if = "Map::is_empty")]
    pub mappings: Map<String, Value>,
    /// Named condition expressions.
    #[serde(rename = "Conditions", default, skip_serializing_if = "Map::is_empty")]
    pub conditions: Map<String, Value>,
    /// Declared resources by logical id.
    #[serde(rename = "Resources", default)]
    pub resources: Map<String, Value>,
    /// Declared outputs by key.
    #[serde(rename = "Outputs", default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
    /// Sections this crate does not interpret (`AWSTemplateFormatVersion`,
    /// `Metadata`, `Transform`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Template {
    /// Parse a template body, trying JSON first and YAML second.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the body is malformed.
    pub fn parse(body: &str) -> Result<Self, TemplateError> {
        let value = match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(json_err) => {
                let yaml: serde_yaml::Value = serde_yaml::from_str(body).map_err(|yaml_err| {
                    // Report the error of the format the body most likely is.
                    if body.trim_start().starts_with('{') {
                        TemplateError::Syntax(json_err.to_string())
                    } else {
                        TemplateError::Syntax(yaml_err.to_string())
                    }
                })?;
                yaml_to_json(yaml)?
            }
        };
        Self::from_value(value)
    }

    /// Build a template from an already decoded JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the document is not an object or a
    /// section has the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, TemplateError> {
        if !value.is_object() {
            return Err(TemplateError::NotAnObject);
        }
        let mut template: Self =
            serde_json::from_value(value).map_err(|e| TemplateError::Syntax(e.to_string()))?;
        template.normalize_logical_ids();
        Ok(template)
    }

    /// Give every resource a `LogicalResourceId` equal to its key unless it
    /// already carries a non-empty one.
    pub fn normalize_logical_ids(&mut self) {
        for (key, resource) in &mut self.resources {
            let Some(obj) = resource.as_object_mut() else {
                continue;
            };
            let present = obj
                .get("LogicalResourceId")
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty());
            if !present {
                obj.insert("LogicalResourceId".to_owned(), Value::String(key.clone()));
            }
        }
    }

    /// A copy of this template with no resources, used for placeholder stacks.
    #[must_use]
    pub fn without_resources(&self) -> Self {
        Self {
            resources: Map::new(),
            ..self.clone()
        }
    }

    /// The template as the client declared it, without the bookkeeping
    /// fields added while the stack was provisioned.
    #[must_use]
    pub fn declared(&self) -> Self {
        let mut template = self.clone();
        for (key, resource) in &mut template.resources {
            let Some(obj) = resource.as_object_mut() else {
                continue;
            };
            obj.remove("PhysicalResourceId");
            if obj.get("LogicalResourceId").and_then(Value::as_str) == Some(key.as_str()) {
                obj.remove("LogicalResourceId");
            }
        }
        template
    }

    /// Check that every resource is an object with a string `Type`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidResource`] for the first offender.
    pub fn validate_resources(&self) -> Result<(), TemplateError> {
        for (logical_id, resource) in &self.resources {
            let invalid = |reason: &str| TemplateError::InvalidResource {
                logical_id: logical_id.clone(),
                reason: reason.to_owned(),
            };
            let obj = resource
                .as_object()
                .ok_or_else(|| invalid("declaration must be an object"))?;
            match obj.get("Type") {
                Some(Value::String(t)) if !t.is_empty() => {}
                _ => return Err(invalid("missing required field Type")),
            }
        }
        Ok(())
    }

    /// The declared `Type` of a resource.
    #[must_use]
    pub fn resource_type(&self, logical_id: &str) -> Option<&str> {
        self.resources.get(logical_id)?.get("Type")?.as_str()
    }

    /// The template-declared default of a parameter, as a string.
    #[must_use]
    pub fn parameter_default(&self, key: &str) -> Option<String> {
        self.parameters
            .get(key)?
            .get("Default")
            .map(scalar_to_string)
    }

    /// Declared parameters, as reported by `ValidateTemplate`.
    #[must_use]
    pub fn template_parameters(&self) -> Vec<TemplateParameter> {
        self.parameters
            .iter()
            .map(|(key, decl)| TemplateParameter {
                parameter_key: key.clone(),
                default_value: decl.get("Default").map(scalar_to_string),
                no_echo: decl.get("NoEcho").is_some_and(is_truthy),
                description: decl
                    .get("Description")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            })
            .collect()
    }

    /// Render the template as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, TemplateError> {
        serde_json::to_string_pretty(self).map_err(|e| TemplateError::Syntax(e.to_string()))
    }
}

/// Render a JSON value the way CloudFormation reports scalar values:
/// strings verbatim, other scalars in their JSON form, compound values as
/// compact JSON.
#[must_use]
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Convert a YAML document to JSON, expanding short-form intrinsic tags.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, TemplateError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            serde_json::to_value(&n).map_err(|e| TemplateError::Syntax(e.to_string()))?
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(
            seq.into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = scalar_to_string(&yaml_to_json(k)?);
                out.insert(key, yaml_to_json(v)?);
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let inner = yaml_to_json(tagged.value)?;
            expand_short_form(name, inner)
        }
    })
}

fn expand_short_form(name: &str, inner: Value) -> Value {
    let (key, arg) = match name {
        "Ref" | "Condition" => (name.to_owned(), inner),
        "GetAtt" => {
            // `!GetAtt Resource.Attribute` splits on the first dot.
            let arg = match inner {
                Value::String(s) => match s.split_once('.') {
                    Some((res, attr)) => Value::Array(vec![res.into(), attr.into()]),
                    None => Value::String(s),
                },
                other => other,
            };
            ("Fn::GetAtt".to_owned(), arg)
        }
        other => (format!("Fn::{other}"), inner),
    };
    let mut obj = Map::new();
    obj.insert(key, arg);
    Value::Object(obj)
}
