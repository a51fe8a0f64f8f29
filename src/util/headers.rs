use http::{HeaderMap, header::AsHeaderName};

pub(crate) fn header_string<N>(headers: &HeaderMap, name: N) -> Option<String>
where
    N: AsHeaderName,
{
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

pub(crate) fn etag(headers: &HeaderMap) -> Option<String> {
    header_string(headers, http::header::ETAG).filter(|v| !v.is_empty())
}

pub(crate) fn request_id(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "x-amz-request-id")
}

/// Content type implied by the key's extension, `application/octet-stream` otherwise.
pub(crate) fn content_type_for_key(key: &str) -> String {
    mime_guess::from_path(key)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn reads_etag_and_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert("x-amz-request-id", HeaderValue::from_static("req-9"));

        assert_eq!(etag(&headers).as_deref(), Some("\"abc\""));
        assert_eq!(request_id(&headers).as_deref(), Some("req-9"));
        assert_eq!(etag(&HeaderMap::new()), None);
    }

    #[test]
    fn content_type_is_guessed_from_key() {
        assert_eq!(content_type_for_key("photos/cat.png"), "image/png");
        assert_eq!(content_type_for_key("data.json"), "application/json");
        assert_eq!(content_type_for_key("movie.mp4"), "video/mp4");
        assert_eq!(content_type_for_key("blob"), "application/octet-stream");
    }
}
