//! CloudFormation XML serialization.
//!
//! `awsQuery` responses wrap the operation result in two elements and append
//! the request metadata:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <CreateStackResponse xmlns="http://cloudformation.amazonaws.com/doc/2010-05-15/">
//!   <CreateStackResult><StackId>arn:...</StackId></CreateStackResult>
//!   <ResponseMetadata><RequestId>...</RequestId></ResponseMetadata>
//! </CreateStackResponse>
//! ```
//!
//! Lists are rendered as repeated `<member>` children of the list element.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use rustack_cloudformation_model::output::{
    CreateChangeSetOutput, CreateStackOutput, DeleteChangeSetOutput, DeleteStackOutput,
    DescribeChangeSetOutput, DescribeStackEventsOutput, DescribeStackResourceOutput,
    DescribeStackResourcesOutput, DescribeStacksOutput, ExecuteChangeSetOutput, GetTemplateOutput,
    ListChangeSetsOutput, ListExportsOutput, ListStackResourcesOutput, ListStacksOutput,
    UpdateStackOutput, ValidateTemplateOutput,
};
use rustack_cloudformation_model::types::{
    Parameter, StackDescription, StackEvent, StackResourceDetail, Tag,
};

/// The CloudFormation XML namespace.
pub const CLOUDFORMATION_NAMESPACE: &str = "http://cloudformation.amazonaws.com/doc/2010-05-15/";

/// Trait for operation outputs that render as the body of `<{Action}Result>`.
pub trait XmlResult {
    /// Write the result's child elements.
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a complete `<{action}Response>` document.
pub fn to_result_xml<T: XmlResult>(
    action: &str,
    value: &T,
    request_id: &str,
) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io::Error::other)?;

    writer
        .create_element(format!("{action}Response").as_str())
        .with_attribute(("xmlns", CLOUDFORMATION_NAMESPACE))
        .write_inner_content(|w| {
            w.create_element(format!("{action}Result").as_str())
                .write_inner_content(|w| value.write_result(w))?;
            w.create_element("ResponseMetadata")
                .write_inner_content(|w| write_text(w, "RequestId", request_id))?;
            Ok(())
        })?;

    Ok(buf)
}

/// Serialize an `awsQuery` `<ErrorResponse>` document.
pub fn to_error_xml(fault: &str, code: &str, message: &str, request_id: &str) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    let mut writer = Writer::new(&mut buf);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io::Error::other)?;

    writer
        .create_element("ErrorResponse")
        .with_attribute(("xmlns", CLOUDFORMATION_NAMESPACE))
        .write_inner_content(|w| {
            w.create_element("Error").write_inner_content(|w| {
                write_text(w, "Type", fault)?;
                write_text(w, "Code", code)?;
                write_text(w, "Message", message)
            })?;
            write_text(w, "RequestId", request_id)
        })?;

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    match value {
        Some(v) => write_text(writer, tag, v),
        None => Ok(()),
    }
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text(writer, tag, if value { "true" } else { "false" })
}

fn write_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &DateTime<Utc>,
) -> io::Result<()> {
    write_text(writer, tag, &format_timestamp(value))
}

fn write_optional_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&DateTime<Utc>>,
) -> io::Result<()> {
    match value {
        Some(v) => write_timestamp(writer, tag, v),
        None => Ok(()),
    }
}

/// Format a timestamp as ISO 8601 with milliseconds and a `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Write `<tag><member>..</member>...</tag>`, one member per item.
fn write_members<W: Write, T>(
    writer: &mut Writer<W>,
    tag: &str,
    items: &[T],
    mut write_item: impl FnMut(&mut Writer<W>, &T) -> io::Result<()>,
) -> io::Result<()> {
    writer.create_element(tag).write_inner_content(|w| {
        for item in items {
            w.create_element("member")
                .write_inner_content(|w| write_item(w, item))?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Write a list of plain strings as `<tag><member>text</member>...</tag>`.
fn write_string_members<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    items: &[String],
) -> io::Result<()> {
    writer.create_element(tag).write_inner_content(|w| {
        for item in items {
            write_text(w, "member", item)?;
        }
        Ok(())
    })?;
    Ok(())
}

fn write_parameter<W: Write>(writer: &mut Writer<W>, p: &Parameter) -> io::Result<()> {
    write_text(writer, "ParameterKey", &p.parameter_key)?;
    write_optional(writer, "ParameterValue", p.parameter_value.as_deref())
}

fn write_tag<W: Write>(writer: &mut Writer<W>, tag: &Tag) -> io::Result<()> {
    write_text(writer, "Key", &tag.key)?;
    write_text(writer, "Value", &tag.value)
}

fn write_stack<W: Write>(writer: &mut Writer<W>, s: &StackDescription) -> io::Result<()> {
    write_text(writer, "StackId", &s.stack_id)?;
    write_text(writer, "StackName", &s.stack_name)?;
    write_optional(writer, "ChangeSetId", s.change_set_id.as_deref())?;
    write_optional(writer, "Description", s.description.as_deref())?;
    write_members(writer, "Parameters", &s.parameters, write_parameter)?;
    write_timestamp(writer, "CreationTime", &s.creation_time)?;
    write_optional_timestamp(writer, "LastUpdatedTime", s.last_updated_time.as_ref())?;
    write_optional_timestamp(writer, "DeletionTime", s.deletion_time.as_ref())?;
    write_text(writer, "StackStatus", s.stack_status.as_str())?;
    write_optional(writer, "StackStatusReason", s.stack_status_reason.as_deref())?;
    write_bool(writer, "DisableRollback", s.disable_rollback)?;
    write_string_members(writer, "NotificationARNs", &s.notification_arns)?;
    write_string_members(writer, "Capabilities", &s.capabilities)?;
    write_members(writer, "Outputs", &s.outputs, |w, o| {
        write_text(w, "OutputKey", &o.output_key)?;
        write_text(w, "OutputValue", &o.output_value)?;
        write_optional(w, "Description", o.description.as_deref())?;
        write_optional(w, "ExportName", o.export_name.as_deref())
    })?;
    write_optional(writer, "RoleARN", s.role_arn.as_deref())?;
    write_members(writer, "Tags", &s.tags, write_tag)
}

fn write_event<W: Write>(writer: &mut Writer<W>, e: &StackEvent) -> io::Result<()> {
    write_text(writer, "EventId", &e.event_id)?;
    write_text(writer, "StackId", &e.stack_id)?;
    write_text(writer, "StackName", &e.stack_name)?;
    write_text(writer, "LogicalResourceId", &e.logical_resource_id)?;
    write_optional(writer, "PhysicalResourceId", e.physical_resource_id.as_deref())?;
    write_text(writer, "ResourceType", &e.resource_type)?;
    write_timestamp(writer, "Timestamp", &e.timestamp)?;
    write_text(writer, "ResourceStatus", &e.resource_status)?;
    write_optional(
        writer,
        "ResourceStatusReason",
        e.resource_status_reason.as_deref(),
    )
}

/// Which shape of resource record to write; the three resource actions
/// expose slightly different field sets.
#[derive(Clone, Copy)]
enum ResourceView {
    Detail,
    Member,
    Summary,
}

fn write_resource<W: Write>(
    writer: &mut Writer<W>,
    r: &StackResourceDetail,
    view: ResourceView,
) -> io::Result<()> {
    if !matches!(view, ResourceView::Summary) {
        write_text(writer, "StackName", &r.stack_name)?;
        write_text(writer, "StackId", &r.stack_id)?;
    }
    write_text(writer, "LogicalResourceId", &r.logical_resource_id)?;
    write_optional(writer, "PhysicalResourceId", r.physical_resource_id.as_deref())?;
    write_text(writer, "ResourceType", &r.resource_type)?;
    let time_tag = match view {
        ResourceView::Member => "Timestamp",
        ResourceView::Detail | ResourceView::Summary => "LastUpdatedTimestamp",
    };
    write_timestamp(writer, time_tag, &r.last_updated_timestamp)?;
    write_text(writer, "ResourceStatus", r.resource_status.as_str())?;
    write_optional(
        writer,
        "ResourceStatusReason",
        r.resource_status_reason.as_deref(),
    )
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

impl XmlResult for CreateStackOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "StackId", &self.stack_id)
    }
}

impl XmlResult for UpdateStackOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "StackId", &self.stack_id)
    }
}

/// Outputs whose result element is empty.
macro_rules! impl_empty_result {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl XmlResult for $ty {
                fn write_result<W: Write>(&self, _writer: &mut Writer<W>) -> io::Result<()> {
                    Ok(())
                }
            }
        )+
    };
}

impl_empty_result!(DeleteStackOutput, ExecuteChangeSetOutput, DeleteChangeSetOutput);

impl XmlResult for DescribeStacksOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "Stacks", &self.stacks, write_stack)
    }
}

impl XmlResult for ListStacksOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "StackSummaries", &self.stack_summaries, |w, s| {
            write_text(w, "StackId", &s.stack_id)?;
            write_text(w, "StackName", &s.stack_name)?;
            write_optional(w, "TemplateDescription", s.template_description.as_deref())?;
            write_timestamp(w, "CreationTime", &s.creation_time)?;
            write_optional_timestamp(w, "LastUpdatedTime", s.last_updated_time.as_ref())?;
            write_optional_timestamp(w, "DeletionTime", s.deletion_time.as_ref())?;
            write_text(w, "StackStatus", s.stack_status.as_str())?;
            write_optional(w, "StackStatusReason", s.stack_status_reason.as_deref())
        })
    }
}

impl XmlResult for GetTemplateOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "TemplateBody", &self.template_body)?;
        write_string_members(
            writer,
            "StagesAvailable",
            &["Original".to_owned(), "Processed".to_owned()],
        )
    }
}

impl XmlResult for DescribeStackResourceOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer
            .create_element("StackResourceDetail")
            .write_inner_content(|w| {
                write_resource(w, &self.stack_resource_detail, ResourceView::Detail)
            })?;
        Ok(())
    }
}

impl XmlResult for DescribeStackResourcesOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "StackResources", &self.stack_resources, |w, r| {
            write_resource(w, r, ResourceView::Member)
        })
    }
}

impl XmlResult for ListStackResourcesOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(
            writer,
            "StackResourceSummaries",
            &self.stack_resource_summaries,
            |w, r| write_resource(w, r, ResourceView::Summary),
        )
    }
}

impl XmlResult for DescribeStackEventsOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "StackEvents", &self.stack_events, write_event)
    }
}

impl XmlResult for CreateChangeSetOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Id", &self.id)?;
        write_text(writer, "StackId", &self.stack_id)
    }
}

impl XmlResult for DescribeChangeSetOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "ChangeSetName", &self.change_set_name)?;
        write_text(writer, "ChangeSetId", &self.change_set_id)?;
        write_text(writer, "StackId", &self.stack_id)?;
        write_text(writer, "StackName", &self.stack_name)?;
        write_optional(writer, "Description", self.description.as_deref())?;
        write_members(writer, "Parameters", &self.parameters, write_parameter)?;
        write_timestamp(writer, "CreationTime", &self.creation_time)?;
        write_text(writer, "ExecutionStatus", self.execution_status.as_str())?;
        write_text(writer, "Status", self.status.as_str())?;
        write_optional(writer, "StatusReason", self.status_reason.as_deref())?;
        write_string_members(writer, "NotificationARNs", &self.notification_arns)?;
        write_string_members(writer, "Capabilities", &self.capabilities)?;
        write_members(writer, "Tags", &self.tags, write_tag)?;
        write_string_members(writer, "Changes", &[])
    }
}

impl XmlResult for ListChangeSetsOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "Summaries", &self.summaries, |w, s| {
            write_text(w, "StackId", &s.stack_id)?;
            write_text(w, "StackName", &s.stack_name)?;
            write_text(w, "ChangeSetId", &s.change_set_id)?;
            write_text(w, "ChangeSetName", &s.change_set_name)?;
            write_text(w, "ExecutionStatus", s.execution_status.as_str())?;
            write_text(w, "Status", s.status.as_str())?;
            write_timestamp(w, "CreationTime", &s.creation_time)?;
            write_optional(w, "Description", s.description.as_deref())
        })
    }
}

impl XmlResult for ListExportsOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "Exports", &self.exports, |w, e| {
            write_text(w, "ExportingStackId", &e.exporting_stack_id)?;
            write_text(w, "Name", &e.name)?;
            write_text(w, "Value", &e.value)
        })
    }
}

impl XmlResult for ValidateTemplateOutput {
    fn write_result<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_members(writer, "Parameters", &self.parameters, |w, p| {
            write_text(w, "ParameterKey", &p.parameter_key)?;
            write_optional(w, "DefaultValue", p.default_value.as_deref())?;
            write_bool(w, "NoEcho", p.no_echo)?;
            write_optional(w, "Description", p.description.as_deref())
        })?;
        write_optional(writer, "Description", self.description.as_deref())?;
        write_string_members(writer, "Capabilities", &self.capabilities)
    }
}
