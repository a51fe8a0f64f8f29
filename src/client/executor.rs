use std::io::Read;

use bytes::Bytes;
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use http::{HeaderMap, HeaderValue, Method, header};

use super::Client;
use crate::{
    error::{Error, Result},
    request::RequestDescriptor,
    transport::{HttpRequest, Response, ResponseBody, response_error},
    util,
};

const ACCEPT: &str = "*/*; q=0.5, application/xml";
const ACCEPT_ENCODING: &str = "gzip, deflate";
// Raw bodies are handed back byte for byte.
const ACCEPT_ENCODING_RAW: &str = "identity";
#[cfg(feature = "tracing")]
const DEBUG_SNIPPET_LEN: usize = 4096;

impl Client {
    /// Signs and sends one request.
    ///
    /// Only a 2xx status is a success; any other response becomes
    /// [`Error::Api`]. Credentials are checked before anything else.
    pub fn execute(&self, mut request: RequestDescriptor) -> Result<Response> {
        let credentials = self.credentials()?;
        ensure_supported_method(request.method())?;

        let endpoint = self.endpoint();
        let addressing = self.addressing();

        #[cfg(feature = "tracing")]
        let _guard = tracing::info_span!(
            "s3.request",
            method = %request.method(),
            bucket = request.bucket_name().unwrap_or(""),
            resource = request.resource(),
            multipart = request.is_multipart(),
        )
        .entered();

        let url = request.url(&endpoint, addressing);
        let authorization = request.authorization(&credentials, addressing)?;
        let host = util::url::host_header(&endpoint, request.bucket_name(), addressing);

        let mut headers = request.headers().clone();
        headers.insert(header::AUTHORIZATION, header_value(&authorization)?);
        headers.insert(header::DATE, header_value(request.date())?);
        headers.insert(header::HOST, header_value(&host)?);
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        let accept_encoding = if request.is_raw_body() {
            ACCEPT_ENCODING_RAW
        } else {
            ACCEPT_ENCODING
        };
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static(accept_encoding),
        );
        headers.insert(header::USER_AGENT, header_value(&self.inner.user_agent)?);
        if !headers.contains_key(header::CONTENT_TYPE)
            && let Some(content_type) = request.content_type_str()
        {
            headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
        }

        let body = request.take_payload()?;
        if !headers.contains_key(header::CONTENT_LENGTH) {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let mut response = self.inner.transport.send(HttpRequest {
            method: request.method().clone(),
            url,
            headers,
            body,
        })?;
        if !request.is_raw_body() {
            response.body = decode_content(&response.headers, response.body)?;
        }

        #[cfg(feature = "tracing")]
        if self.inner.debug {
            tracing::debug!(
                status = %response.status,
                body = %util::text::body_snippet(&response.body, DEBUG_SNIPPET_LEN),
                "response received"
            );
        }

        if !response.status.is_success() {
            return Err(response_error(
                response.status,
                &response.headers,
                &response.body,
                &request.request_uri(&endpoint, addressing),
            ));
        }

        let body = if request.is_raw_body() {
            ResponseBody::Raw(response.body)
        } else {
            let text = String::from_utf8(response.body.to_vec()).map_err(|e| {
                Error::decode("response body is not valid UTF-8", Some(Box::new(e)))
            })?;
            ResponseBody::Xml(text)
        };

        Ok(Response::new(response.status, response.headers, body))
    }
}

fn ensure_supported_method(method: &Method) -> Result<()> {
    match *method {
        Method::GET | Method::PUT | Method::POST | Method::DELETE => Ok(()),
        _ => Err(Error::invalid_config(format!(
            "unsupported HTTP method: {method}"
        ))),
    }
}

/// Undoes a `gzip` or `deflate` content coding; other bodies pass through.
fn decode_content(headers: &HeaderMap, body: Bytes) -> Result<Bytes> {
    let coding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase());

    let mut decoded = Vec::new();
    let read = match coding.as_deref() {
        Some("gzip") | Some("x-gzip") => {
            MultiGzDecoder::new(body.as_ref()).read_to_end(&mut decoded)
        }
        Some("deflate") => ZlibDecoder::new(body.as_ref()).read_to_end(&mut decoded),
        _ => return Ok(body),
    };
    read.map_err(|e| Error::decode("failed to decode response body", Some(Box::new(e))))?;
    Ok(Bytes::from(decoded))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::parameter_invalid(format!("invalid header value: {value}")))
}
