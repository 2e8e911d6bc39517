//! CloudFormation response construction and error formatting.

use rustack_cloudformation_model::error::CloudFormationError;

use crate::body::CloudFormationResponseBody;
use crate::xml::{XmlResult, to_error_xml, to_result_xml};

/// Content type for CloudFormation XML responses.
pub const CONTENT_TYPE: &str = "text/xml";

/// Serialize a CloudFormation error into an `<ErrorResponse>` document.
///
/// ```xml
/// <ErrorResponse xmlns="http://cloudformation.amazonaws.com/doc/2010-05-15/">
///   <Error>
///     <Type>Sender</Type>
///     <Code>ValidationError</Code>
///     <Message>Stack with id demo does not exist</Message>
///   </Error>
///   <RequestId>...</RequestId>
/// </ErrorResponse>
/// ```
#[must_use]
pub fn error_to_xml(error: &CloudFormationError, request_id: &str) -> Vec<u8> {
    // Writing into a Vec cannot fail.
    to_error_xml(
        error.code.fault(),
        error.code.as_str(),
        &error.message,
        request_id,
    )
    .unwrap_or_default()
}

/// Convert a `CloudFormationError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(
    error: &CloudFormationError,
    request_id: &str,
) -> http::Response<CloudFormationResponseBody> {
    let body = CloudFormationResponseBody::from_xml(error_to_xml(error, request_id));
    build_response(error.status_code, body, request_id)
}

/// Build a `200 OK` response from an already serialized XML document.
#[must_use]
pub fn xml_response(xml: Vec<u8>, request_id: &str) -> http::Response<CloudFormationResponseBody> {
    build_response(
        http::StatusCode::OK,
        CloudFormationResponseBody::from_xml(xml),
        request_id,
    )
}

/// Serialize an operation result and wrap it in a `200 OK` response.
///
/// # Errors
///
/// Returns an internal error if the result cannot be serialized.
pub fn result_response<T: XmlResult>(
    action: &str,
    output: &T,
    request_id: &str,
) -> Result<http::Response<CloudFormationResponseBody>, CloudFormationError> {
    let xml = to_result_xml(action, output, request_id).map_err(|e| {
        CloudFormationError::internal_error(format!("Failed to serialize {action} result"))
            .with_source(e)
    })?;
    Ok(xml_response(xml, request_id))
}

fn build_response(
    status: http::StatusCode,
    body: CloudFormationResponseBody,
    request_id: &str,
) -> http::Response<CloudFormationResponseBody> {
    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(CONTENT_TYPE),
    );
    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.insert("x-amzn-requestid", hv);
    }
    response
}
