use std::{io::Read as _, time::Duration};

#[cfg(feature = "metrics")]
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::{
    error::{Error, Result},
    transport::{HttpRequest, HttpResponse, HttpTransport},
};

/// Default transport over a shared `ureq` agent.
///
/// Issues exactly one attempt per request; status codes are never turned
/// into errors here.
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UreqTransport {
    /// `timeout` bounds each whole call, connect to last body byte.
    pub fn new(timeout: Option<Duration>) -> Self {
        #[cfg(feature = "rustls")]
        crate::transport::tls::ensure_rustls_crypto_provider();

        // 3xx responses are returned to the caller, never followed.
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            timeout,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpTransport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        #[cfg(feature = "metrics")]
        metrics::counter!("s3_http_attempts_total", "method" => method_label(&method))
            .increment(1);
        #[cfg(feature = "tracing")]
        let _guard = tracing::debug_span!("s3.http", method = %method, url = %url).entered();
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = match method.as_str() {
            "GET" => apply_headers(self.agent.get(url.as_str()), &headers, self.timeout).call(),
            "DELETE" => {
                apply_headers(self.agent.delete(url.as_str()), &headers, self.timeout).call()
            }
            "PUT" => {
                let req = apply_headers(self.agent.put(url.as_str()), &headers, self.timeout);
                send_with_body(req, &body)
            }
            "POST" => {
                let req = apply_headers(self.agent.post(url.as_str()), &headers, self.timeout);
                send_with_body(req, &body)
            }
            _ => {
                return Err(Error::invalid_config(format!(
                    "unsupported HTTP method: {method}"
                )));
            }
        };

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                #[cfg(feature = "metrics")]
                metrics::counter!(
                    "s3_http_errors_total",
                    "method" => method_label(&method),
                    "kind" => "transport"
                )
                .increment(1);

                return Err(Error::transport(
                    format!("request failed: {}", request_context(&method, &url)),
                    Some(Box::new(err)),
                ));
            }
        };

        let status = resp.status();
        let headers = resp.headers().clone();

        let mut buf = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| Error::transport("failed to read response body", Some(Box::new(e))))?;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!(
                "s3_http_responses_total",
                "method" => method_label(&method),
                "class" => status_class(status),
            )
            .increment(1);
            metrics::histogram!(
                "s3_http_request_duration_seconds",
                "method" => method_label(&method),
            )
            .record(start.elapsed().as_secs_f64());
        }

        Ok(HttpResponse {
            status,
            headers,
            body: Bytes::from(buf),
        })
    }
}

fn send_with_body(
    req: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: &Bytes,
) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    if body.is_empty() {
        req.send_empty()
    } else {
        req.send(body.as_ref())
    }
}

fn request_context(method: &Method, url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!(
            "{method} {}{}",
            crate::util::url::authority(&parsed),
            parsed.path()
        ),
        Err(_) => format!("{method} {url}"),
    }
}

#[cfg(feature = "metrics")]
fn status_class(status: http::StatusCode) -> &'static str {
    if status.is_success() {
        "2xx"
    } else if status.is_redirection() {
        "3xx"
    } else if status.is_client_error() {
        "4xx"
    } else if status.is_server_error() {
        "5xx"
    } else {
        "other"
    }
}

#[cfg(feature = "metrics")]
fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "POST" => "POST",
        _ => "OTHER",
    }
}

// ureq derives Content-Length from the body itself.
fn apply_headers<B>(
    mut req: ureq::RequestBuilder<B>,
    headers: &HeaderMap,
    timeout: Option<Duration>,
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers.iter() {
        if name == http::header::CONTENT_LENGTH {
            continue;
        }
        let Ok(value_str) = value.to_str() else {
            continue;
        };
        req = req.header(name.as_str(), value_str);
    }

    if let Some(timeout) = timeout {
        req = req.config().timeout_global(Some(timeout)).build();
    }

    req
}
