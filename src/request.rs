//! Immutable description of one signed REST call.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use time::OffsetDateTime;
use url::Url;

use crate::{
    auth::{AddressingStyle, Credentials},
    error::{Error, Result},
    util,
};

/// Producer for a body that is only built if the request actually needs it.
pub type DeferredBody = Box<dyn FnOnce() -> Result<Bytes> + Send>;

/// Request body source.
///
/// At dispatch an explicit body wins, then a forced blank body, then the
/// deferred producer. The producer runs at most once.
#[derive(Default)]
pub enum Payload {
    Explicit(Bytes),
    Deferred(DeferredBody),
    #[default]
    Empty,
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(b) => f.debug_tuple("Explicit").field(&b.len()).finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// A single S3 REST request: what to call, how to sign it, what to send.
///
/// Built with consuming setters, then handed to [`crate::Client::execute`].
/// The date is sampled once when the descriptor is created so the `Date`
/// header and the signature always agree.
#[derive(Debug)]
pub struct RequestDescriptor {
    method: Method,
    resource: String,
    bucket: Option<String>,
    sub_resource: Option<String>,
    query_params: Vec<(String, String)>,
    headers: HeaderMap,
    content_type: Option<String>,
    raw_body: bool,
    force_blank_body: bool,
    multipart: bool,
    payload: Payload,
    date: String,
}

impl RequestDescriptor {
    /// An empty `resource` is treated as `/`.
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        let resource = resource.into();
        let resource = if resource.is_empty() {
            "/".to_string()
        } else {
            resource
        };

        Self {
            method,
            resource,
            bucket: None,
            sub_resource: None,
            query_params: Vec::new(),
            headers: HeaderMap::new(),
            content_type: None,
            raw_body: false,
            force_blank_body: false,
            multipart: false,
            payload: Payload::Empty,
            date: util::signing::http_date(OffsetDateTime::now_utc()),
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        self.bucket = (!bucket.is_empty()).then_some(bucket);
        self
    }

    /// Signed query fragment such as `uploads` or `partNumber=1&uploadId=X`.
    pub fn sub_resource(mut self, sub_resource: impl Into<String>) -> Self {
        let sub_resource = sub_resource.into();
        self.sub_resource = (!sub_resource.is_empty()).then_some(sub_resource);
        self
    }

    /// Unsigned query parameter, serialized in insertion order.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.content_type = (!content_type.is_empty()).then_some(content_type);
        self
    }

    /// Adds a caller header. Invalid names or values are rejected.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::parameter_invalid(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::parameter_invalid(format!("invalid header value for {name}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Keep the response body as bytes instead of decoding it as text.
    pub fn raw_body(mut self) -> Self {
        self.raw_body = true;
        self
    }

    /// Send an empty body even if a deferred producer is present.
    pub fn force_blank_body(mut self) -> Self {
        self.force_blank_body = true;
        self
    }

    /// Marks the request as one step of a multipart upload.
    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.payload(Payload::Explicit(body.into()))
    }

    pub fn deferred_body<F>(self, producer: F) -> Self
    where
        F: FnOnce() -> Result<Bytes> + Send + 'static,
    {
        self.payload(Payload::Deferred(Box::new(producer)))
    }

    /// Pins the request date.
    pub fn with_date(mut self, date: OffsetDateTime) -> Self {
        self.date = util::signing::http_date(date);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn bucket_name(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn sub_resource_str(&self) -> Option<&str> {
        self.sub_resource.as_deref()
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type_str(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn is_raw_body(&self) -> bool {
        self.raw_body
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    /// Resource term of the string to sign.
    ///
    /// Virtual-hosted requests prefix `/{bucket}`; path-style requests sign
    /// the resource alone. The sub-resource is appended verbatim and query
    /// parameters never appear.
    pub fn canonicalized_resource(&self, addressing: AddressingStyle) -> String {
        let base = match self.bucket.as_deref() {
            Some(bucket) if !addressing.is_path() => format!("/{bucket}/"),
            _ => String::new(),
        };

        let mut out = util::url::join_path(&base, &self.resource);
        if let Some(sub) = self.sub_resource.as_deref() {
            out.push('?');
            out.push_str(sub);
        }
        out
    }

    pub fn string_to_sign(&self, addressing: AddressingStyle) -> String {
        format!(
            "{}\n\n{}\n{}\n{}",
            self.method.as_str(),
            self.content_type.as_deref().unwrap_or_default(),
            self.date,
            self.canonicalized_resource(addressing)
        )
    }

    pub fn signature(&self, secret_access_key: &str, addressing: AddressingStyle) -> Result<String> {
        util::signing::sign(secret_access_key, &self.string_to_sign(addressing))
    }

    /// `AWS {access_key_id}:{signature}`.
    pub fn authorization(
        &self,
        credentials: &Credentials,
        addressing: AddressingStyle,
    ) -> Result<String> {
        let signature = self.signature(&credentials.secret_access_key, addressing)?;
        Ok(util::signing::authorization(
            &credentials.access_key_id,
            &signature,
        ))
    }

    /// Absolute request URL against `endpoint`.
    pub fn url(&self, endpoint: &Url, addressing: AddressingStyle) -> String {
        let host = util::url::host_header(endpoint, self.bucket.as_deref(), addressing);

        let path = match self.bucket.as_deref() {
            Some(bucket) if addressing.is_path() => {
                let root = format!("/{bucket}");
                if self.resource == "/" {
                    format!("{root}/")
                } else {
                    util::url::join_path(&root, &self.resource)
                }
            }
            _ => util::url::join_path("", &self.resource),
        };

        let mut url = format!("{}://{host}{path}", endpoint.scheme());

        let query = util::encode::query_string(&self.query_params);
        match (self.sub_resource.as_deref(), query.is_empty()) {
            (Some(sub), true) => {
                url.push('?');
                url.push_str(sub);
            }
            (Some(sub), false) => {
                url.push('?');
                url.push_str(sub);
                url.push('&');
                url.push_str(&query);
            }
            (None, false) => {
                url.push('?');
                url.push_str(&query);
            }
            (None, true) => {}
        }
        url
    }

    /// Path and query as sent, used when an error body names no resource.
    pub(crate) fn request_uri(&self, endpoint: &Url, addressing: AddressingStyle) -> String {
        let url = self.url(endpoint, addressing);
        match Url::parse(&url) {
            Ok(parsed) => match parsed.query() {
                Some(q) => format!("{}?{q}", parsed.path()),
                None => parsed.path().to_string(),
            },
            Err(_) => self.resource.clone(),
        }
    }

    /// Chooses the body to send: explicit, then forced blank, then deferred.
    pub(crate) fn take_payload(&mut self) -> Result<Bytes> {
        match std::mem::take(&mut self.payload) {
            Payload::Explicit(bytes) => Ok(bytes),
            Payload::Deferred(_) if self.force_blank_body => Ok(Bytes::new()),
            Payload::Deferred(producer) => producer(),
            Payload::Empty => Ok(Bytes::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    const SECRET: &str = "secret_access_key";

    fn endpoint() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    fn at(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    fn hoge() -> RequestDescriptor {
        RequestDescriptor::new(Method::GET, "/hoge")
            .sub_resource("storageManagement")
            .query_param("abc", "def")
    }

    #[test]
    fn url_without_bucket() {
        assert_eq!(
            hoge().url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://localhost:3000/hoge?storageManagement&abc=def"
        );
    }

    #[test]
    fn url_with_bucket_follows_addressing() {
        let req = hoge().bucket("bucket");
        assert_eq!(
            req.url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://bucket.localhost:3000/hoge?storageManagement&abc=def"
        );
        assert_eq!(
            req.url(&endpoint(), AddressingStyle::Path),
            "http://localhost:3000/bucket/hoge?storageManagement&abc=def"
        );
    }

    #[test]
    fn url_query_separator_only_when_needed() {
        let req = RequestDescriptor::new(Method::GET, "/hoge").query_param("abc", "def");
        assert_eq!(
            req.url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://localhost:3000/hoge?abc=def"
        );

        let req = RequestDescriptor::new(Method::GET, "/hoge").sub_resource("uploads");
        assert_eq!(
            req.url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://localhost:3000/hoge?uploads"
        );
    }

    #[test]
    fn url_root_resource_boundaries() {
        let root = RequestDescriptor::new(Method::GET, "/");
        assert_eq!(
            root.url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://localhost:3000/"
        );

        let bucket_root = RequestDescriptor::new(Method::GET, "/").bucket("bucket");
        assert_eq!(
            bucket_root.url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://bucket.localhost:3000/"
        );
        assert_eq!(
            bucket_root.url(&endpoint(), AddressingStyle::Path),
            "http://localhost:3000/bucket/"
        );

        let object = RequestDescriptor::new(Method::GET, "/object").bucket("bucket");
        assert_eq!(
            object.url(&endpoint(), AddressingStyle::VirtualHosted),
            "http://bucket.localhost:3000/object"
        );
        assert_eq!(
            object.url(&endpoint(), AddressingStyle::Path),
            "http://localhost:3000/bucket/object"
        );
    }

    #[test]
    fn url_drops_default_ports() {
        let ep = Url::parse("https://s3.example.com").unwrap();
        let req = RequestDescriptor::new(Method::GET, "/k").bucket("b");
        assert_eq!(
            req.url(&ep, AddressingStyle::VirtualHosted),
            "https://b.s3.example.com/k"
        );
    }

    #[test]
    fn canonicalized_resource_cases() {
        assert_eq!(
            hoge().canonicalized_resource(AddressingStyle::VirtualHosted),
            "/hoge?storageManagement"
        );
        assert_eq!(
            hoge()
                .bucket("bucket")
                .canonicalized_resource(AddressingStyle::VirtualHosted),
            "/bucket/hoge?storageManagement"
        );
        assert_eq!(
            hoge()
                .bucket("bucket")
                .canonicalized_resource(AddressingStyle::Path),
            "/hoge?storageManagement"
        );

        let root = RequestDescriptor::new(Method::GET, "/");
        assert_eq!(root.canonicalized_resource(AddressingStyle::VirtualHosted), "/");
        let root = root.bucket("bucket");
        assert_eq!(
            root.canonicalized_resource(AddressingStyle::VirtualHosted),
            "/bucket/"
        );
    }

    #[test]
    fn empty_bucket_is_absent() {
        let req = RequestDescriptor::new(Method::GET, "").bucket("");
        assert_eq!(req.bucket_name(), None);
        assert_eq!(req.resource(), "/");
        assert_eq!(req.canonicalized_resource(AddressingStyle::VirtualHosted), "/");
    }

    #[test]
    fn pure_functions_are_repeatable() {
        let req = hoge().bucket("bucket");
        let first = req.url(&endpoint(), AddressingStyle::VirtualHosted);
        let second = req.url(&endpoint(), AddressingStyle::VirtualHosted);
        assert_eq!(first, second);
        assert_eq!(
            req.canonicalized_resource(AddressingStyle::Path),
            req.canonicalized_resource(AddressingStyle::Path)
        );
    }

    #[test]
    fn golden_signatures() {
        // 2014-08-21T14:00:00Z
        let get = RequestDescriptor::new(Method::GET, "/hoge")
            .sub_resource("storageManagement")
            .with_date(at(1_408_629_600));
        assert_eq!(get.date(), "Thu, 21 Aug 2014 14:00:00 GMT");
        assert_eq!(
            get.signature(SECRET, AddressingStyle::VirtualHosted).unwrap(),
            "D5/3gQyKzCzFUNmcvEH0mFWDQHo="
        );

        let post = RequestDescriptor::new(Method::POST, "/hoge")
            .sub_resource("storageManagement")
            .content_type("application/json")
            .with_date(at(1_408_629_600));
        assert_eq!(
            post.string_to_sign(AddressingStyle::VirtualHosted),
            "POST\n\napplication/json\nThu, 21 Aug 2014 14:00:00 GMT\n/hoge?storageManagement"
        );
        assert_eq!(
            post.signature(SECRET, AddressingStyle::VirtualHosted).unwrap(),
            "coZhnfDAlQEgKBAAJR0I1wzkNGE="
        );
    }

    #[test]
    fn query_params_are_not_signed() {
        let plain = RequestDescriptor::new(Method::GET, "/hoge").with_date(at(1_408_629_600));
        let with_query = RequestDescriptor::new(Method::GET, "/hoge")
            .query_param("abc", "def")
            .with_date(at(1_408_629_600));
        assert_eq!(
            plain.string_to_sign(AddressingStyle::VirtualHosted),
            with_query.string_to_sign(AddressingStyle::VirtualHosted)
        );
    }

    #[test]
    fn date_is_sampled_once() {
        let req = hoge();
        let first = req.signature(SECRET, AddressingStyle::VirtualHosted).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = req.signature(SECRET, AddressingStyle::VirtualHosted).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn authorization_uses_access_key() {
        let creds = Credentials::new("access_key_id", SECRET).unwrap();
        let req = RequestDescriptor::new(Method::GET, "/hoge")
            .sub_resource("storageManagement")
            .with_date(at(1_408_629_600));
        assert_eq!(
            req.authorization(&creds, AddressingStyle::VirtualHosted)
                .unwrap(),
            "AWS access_key_id:D5/3gQyKzCzFUNmcvEH0mFWDQHo="
        );
    }

    #[test]
    fn payload_precedence() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let mut req = RequestDescriptor::new(Method::PUT, "/k")
            .deferred_body(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from_static(b"deferred"))
            })
            .force_blank_body();
        assert!(req.take_payload().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let counter = calls.clone();
        let mut req = RequestDescriptor::new(Method::PUT, "/k").deferred_body(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"deferred"))
        });
        assert_eq!(req.take_payload().unwrap(), Bytes::from_static(b"deferred"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let mut req = RequestDescriptor::new(Method::PUT, "/k")
            .body(Bytes::from_static(b"explicit"))
            .force_blank_body();
        assert_eq!(req.take_payload().unwrap(), Bytes::from_static(b"explicit"));
    }

    #[test]
    fn request_uri_has_path_and_query() {
        let req = hoge().bucket("bucket");
        assert_eq!(
            req.request_uri(&endpoint(), AddressingStyle::Path),
            "/bucket/hoge?storageManagement&abc=def"
        );
    }

    #[test]
    fn rejects_invalid_headers() {
        assert!(RequestDescriptor::new(Method::GET, "/").header("bad name", "v").is_err());
        let req = RequestDescriptor::new(Method::GET, "/")
            .header("Range", "bytes=0-9")
            .unwrap();
        assert_eq!(req.headers().get("range").unwrap(), "bytes=0-9");
    }
}
