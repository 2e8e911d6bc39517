//! CloudFormation HTTP response body type.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Response body for CloudFormation HTTP responses.
///
/// Results and errors alike are small, fully buffered XML documents; the
/// empty variant is only used for responses with no payload.
#[derive(Debug, Default)]
pub enum CloudFormationResponseBody {
    /// A buffered XML document.
    Xml(Full<Bytes>),
    /// No payload.
    #[default]
    Empty,
}

impl CloudFormationResponseBody {
    /// Wrap a serialized XML document.
    #[must_use]
    pub fn from_xml(xml: impl Into<Bytes>) -> Self {
        Self::Xml(Full::new(xml.into()))
    }

    /// Create an empty response body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }
}

impl http_body::Body for CloudFormationResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Xml(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Xml(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Xml(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
