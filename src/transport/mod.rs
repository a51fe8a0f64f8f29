//! HTTP client capability and response classification.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use crate::error::{Error, Result};

pub(crate) mod blocking_transport;
#[cfg(feature = "rustls")]
pub(crate) mod tls;

pub use blocking_transport::UreqTransport;

/// A fully prepared request: signed headers, final URL, resolved body.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Whatever the server answered, any status.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends one HTTP request and returns the response without judging its status.
///
/// Returning `Err` means no response was obtained at all.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Successful (2xx) response body.
#[derive(Clone, Debug)]
pub enum ResponseBody {
    /// Bytes as received, for object downloads.
    Raw(Bytes),
    /// Text of an XML (or empty) document.
    Xml(String),
}

/// Successful response handed back by [`crate::Client::execute`].
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Document text; raw bodies are decoded lossily.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        match &self.body {
            ResponseBody::Xml(s) => std::borrow::Cow::Borrowed(s.as_str()),
            ResponseBody::Raw(b) => String::from_utf8_lossy(b),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self.body {
            ResponseBody::Raw(b) => b,
            ResponseBody::Xml(s) => Bytes::from(s),
        }
    }
}

/// Builds the API failure for a non-2xx response.
///
/// An XML `<Error>` document is tried first, then a JSON error object. If
/// neither carries a code, the whole body becomes the message and the
/// request path is reported as the resource.
pub(crate) fn response_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    request_uri: &str,
) -> Error {
    let header_request_id = crate::util::headers::request_id(headers);
    let text = String::from_utf8_lossy(body);

    let parsed = crate::util::xml::parse_error_xml(&text)
        .or_else(|| crate::util::xml::parse_error_json(&text));

    if let Some(parsed) = parsed {
        let status = parsed
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(status);
        return Error::Api {
            status,
            code: parsed.code,
            message: parsed.message,
            request_id: parsed.request_id.or(header_request_id),
            resource: parsed.resource,
        };
    }

    Error::Api {
        status,
        code: None,
        message: (!text.is_empty()).then(|| text.into_owned()),
        request_id: header_request_id,
        resource: Some(request_uri.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xml_error_fields() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-request-id", http::HeaderValue::from_static("req-outer"));

        let body = br#"
<Error>
  <Code>AccessDenied</Code>
  <Message>Access Denied</Message>
  <RequestId>req-inner</RequestId>
  <Resource>/bucket/key</Resource>
</Error>
"#;

        let err = response_error(StatusCode::FORBIDDEN, &headers, body, "/key");
        match err {
            Error::Api {
                status,
                code,
                message,
                request_id,
                resource,
            } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(code.as_deref(), Some("AccessDenied"));
                assert_eq!(message.as_deref(), Some("Access Denied"));
                assert_eq!(request_id.as_deref(), Some("req-inner"));
                assert_eq!(resource.as_deref(), Some("/bucket/key"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn xml_status_element_overrides_http_status() {
        let body = b"<Error><Code>Conflict</Code><Status>409</Status></Error>";
        let err = response_error(StatusCode::BAD_REQUEST, &HeaderMap::new(), body, "/");
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }

    #[test]
    fn parses_json_error_body() {
        let body = br#"{"code":"BucketNotFound","message":"bucket not found","status":404}"#;
        let err = response_error(StatusCode::NOT_FOUND, &HeaderMap::new(), body, "/b/");
        assert_eq!(err.code(), Some("BucketNotFound"));
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.api_message(), Some("bucket not found"));
    }

    #[test]
    fn unparseable_body_falls_back_to_raw_fields() {
        let mut headers = HeaderMap::new();
        headers.insert("x-amz-request-id", http::HeaderValue::from_static("req-2"));

        let err = response_error(
            StatusCode::BAD_GATEWAY,
            &headers,
            b"upstream exploded",
            "/bucket/key?uploads",
        );
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(err.code(), None);
        assert_eq!(err.api_message(), Some("upstream exploded"));
        assert_eq!(err.request_id(), Some("req-2"));
        assert_eq!(err.resource(), Some("/bucket/key?uploads"));
    }

    #[test]
    fn response_text_and_bytes() {
        let resp = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            ResponseBody::Xml("<a/>".to_string()),
        );
        assert_eq!(resp.text(), "<a/>");
        assert_eq!(resp.into_bytes(), Bytes::from_static(b"<a/>"));
    }
}
