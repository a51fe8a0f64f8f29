//! Object operations.

use std::{collections::VecDeque, io::Read, path::Path, time::Duration};

use bytes::Bytes;
use http::Method;
use time::OffsetDateTime;

use crate::{
    client::Client,
    error::{Error, Result},
    multipart,
    request::RequestDescriptor,
    types::{
        CompleteMultipartUploadOutput, GetObjectOutput, ListObjectsPage, ObjectEntry,
        PresignedRequest, PutObjectOutput,
    },
    util,
};

/// Object operations service.
#[derive(Clone)]
pub struct ObjectsService {
    client: Client,
}

impl ObjectsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Starts a request to list objects in a bucket.
    pub fn list(&self, bucket: impl Into<String>) -> ListObjectsRequest {
        ListObjectsRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            prefix: None,
            max_keys: None,
            marker: None,
            delimiter: None,
        }
    }

    /// Starts a request to fetch an object.
    pub fn get(&self, bucket: impl Into<String>, key: impl Into<String>) -> GetObjectRequest {
        GetObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            range: None,
        }
    }

    /// Starts a request to upload an object in a single PUT.
    pub fn put(&self, bucket: impl Into<String>, key: impl Into<String>) -> PutObjectRequest {
        PutObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            body: PutBody::Empty,
        }
    }

    /// Starts a request to delete an object.
    pub fn delete(&self, bucket: impl Into<String>, key: impl Into<String>) -> DeleteObjectRequest {
        DeleteObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Starts a chunked multipart upload.
    pub fn multipart_upload(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> MultipartUploadRequest {
        MultipartUploadRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            chunk_size: multipart::DEFAULT_CHUNK_SIZE,
            workers: multipart::DEFAULT_WORKERS,
        }
    }

    /// Starts building a time-limited download URL.
    pub fn presign_get(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> PresignGetObjectRequest {
        PresignGetObjectRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            key: key.into(),
            expires_in: Duration::from_secs(900),
            expires_at: None,
        }
    }
}

/// Request builder for one page of a bucket listing.
#[derive(Clone)]
pub struct ListObjectsRequest {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    max_keys: Option<u32>,
    marker: Option<String>,
    delimiter: Option<String>,
}

impl ListObjectsRequest {
    /// Filters by key prefix.
    pub fn prefix(mut self, value: impl Into<String>) -> Self {
        self.prefix = Some(value.into());
        self
    }

    /// Sets the maximum number of keys per page.
    pub fn max_keys(mut self, value: u32) -> Self {
        self.max_keys = Some(value);
        self
    }

    /// Starts listing after the given key.
    pub fn marker(mut self, value: impl Into<String>) -> Self {
        self.marker = Some(value.into());
        self
    }

    /// Groups keys by delimiter.
    pub fn delimiter(mut self, value: impl Into<String>) -> Self {
        self.delimiter = Some(value.into());
        self
    }

    /// Lazily walks every page, starting from this request's marker.
    pub fn pager(self) -> ListObjectsPager {
        ListObjectsPager {
            request: self,
            state: PagerState::Ready,
        }
    }

    /// Lazily walks every entry of every page.
    pub fn entries(self) -> ObjectEntries {
        ObjectEntries {
            pager: self.pager(),
            buffer: VecDeque::new(),
        }
    }

    /// Fetches a single page.
    pub fn send(&self) -> Result<ListObjectsPage> {
        let mut req = RequestDescriptor::new(Method::GET, "/").bucket(self.bucket.as_str());
        if let Some(v) = &self.prefix {
            req = req.query_param("prefix", v.as_str());
        }
        if let Some(v) = self.max_keys {
            req = req.query_param("max-keys", v.to_string());
        }
        if let Some(v) = &self.marker {
            req = req.query_param("marker", v.as_str());
        }
        if let Some(v) = &self.delimiter {
            req = req.query_param("delimiter", v.as_str());
        }

        let resp = self.client.execute(req)?;
        util::xml::parse_list_objects(&resp.text())
    }
}

enum PagerState {
    Ready,
    Stalled,
    Done,
}

/// Forward-only iterator over listing pages.
///
/// Each page continues from `NextMarker`, or from the last key when the
/// service omits it. Iteration ends after the first untruncated page or
/// after yielding an error.
pub struct ListObjectsPager {
    request: ListObjectsRequest,
    state: PagerState,
}

impl Iterator for ListObjectsPager {
    type Item = Result<ListObjectsPage>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            PagerState::Done => return None,
            PagerState::Stalled => {
                self.state = PagerState::Done;
                return Some(Err(Error::decode(
                    "truncated listing page carries no marker to continue from",
                    None,
                )));
            }
            PagerState::Ready => {}
        }

        match self.request.send() {
            Ok(page) => {
                if !page.is_truncated {
                    self.state = PagerState::Done;
                } else if let Some(marker) = page.continuation_marker() {
                    self.request.marker = Some(marker.to_string());
                } else {
                    self.state = PagerState::Stalled;
                }
                Some(Ok(page))
            }
            Err(err) => {
                self.state = PagerState::Done;
                Some(Err(err))
            }
        }
    }
}

/// Entries of a listing, fetched page by page as needed.
pub struct ObjectEntries {
    pager: ListObjectsPager,
    buffer: VecDeque<ObjectEntry>,
}

impl Iterator for ObjectEntries {
    type Item = Result<ObjectEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            match self.pager.next()? {
                Ok(page) => self.buffer.extend(page.entries),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Request builder for fetching an object.
pub struct GetObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    range: Option<String>,
}

impl GetObjectRequest {
    /// Sets an inclusive byte range.
    pub fn range_bytes(mut self, start: u64, end_inclusive: u64) -> Self {
        self.range = Some(format!("bytes={start}-{end_inclusive}"));
        self
    }

    /// Reads from `start` to the end of the object.
    pub fn range_from(mut self, start: u64) -> Self {
        self.range = Some(format!("bytes={start}-"));
        self
    }

    pub fn send(self) -> Result<GetObjectOutput> {
        let mut req = RequestDescriptor::new(Method::GET, util::encode::object_resource(&self.key))
            .bucket(self.bucket)
            .raw_body();
        if let Some(range) = self.range.as_deref() {
            req = req.header("Range", range)?;
        }

        let resp = self.client.execute(req)?;
        let etag = util::headers::etag(resp.headers());
        let content_type =
            util::headers::header_string(resp.headers(), http::header::CONTENT_TYPE);

        Ok(GetObjectOutput {
            body: resp.into_bytes(),
            content_type,
            etag,
        })
    }
}

enum PutBody {
    Empty,
    Bytes(Bytes),
    Deferred(crate::request::DeferredBody),
}

/// Request builder for uploading an object.
pub struct PutObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    body: PutBody,
}

impl PutObjectRequest {
    /// Overrides the content type guessed from the key.
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = PutBody::Bytes(body.into());
        self
    }

    /// Builds the body only when the request is dispatched.
    pub fn body_with<F>(mut self, producer: F) -> Self
    where
        F: FnOnce() -> Result<Bytes> + Send + 'static,
    {
        self.body = PutBody::Deferred(Box::new(producer));
        self
    }

    pub fn send(self) -> Result<PutObjectOutput> {
        let content_type = self
            .content_type
            .unwrap_or_else(|| util::headers::content_type_for_key(&self.key));

        let req = RequestDescriptor::new(Method::PUT, util::encode::object_resource(&self.key))
            .bucket(self.bucket)
            .content_type(content_type);
        let req = match self.body {
            PutBody::Empty => req,
            PutBody::Bytes(bytes) => req.body(bytes),
            PutBody::Deferred(producer) => req.payload(crate::request::Payload::Deferred(producer)),
        };

        let resp = self.client.execute(req)?;
        Ok(PutObjectOutput {
            etag: util::headers::etag(resp.headers()),
        })
    }
}

/// Request builder for deleting an object.
pub struct DeleteObjectRequest {
    client: Client,
    bucket: String,
    key: String,
}

impl DeleteObjectRequest {
    pub fn send(self) -> Result<()> {
        let req = RequestDescriptor::new(Method::DELETE, util::encode::object_resource(&self.key))
            .bucket(self.bucket)
            .content_type("application/json");
        self.client.execute(req)?;
        Ok(())
    }
}

/// Request builder for a chunked multipart upload.
pub struct MultipartUploadRequest {
    client: Client,
    bucket: String,
    key: String,
    chunk_size: usize,
    workers: usize,
}

impl MultipartUploadRequest {
    /// Part size in bytes; at least 5 MiB.
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Number of parts uploaded concurrently.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Uploads everything `reader` yields.
    pub fn send_reader<R: Read>(self, reader: R) -> Result<CompleteMultipartUploadOutput> {
        multipart::upload(
            &self.client,
            multipart::MultipartOptions {
                bucket: self.bucket,
                key: self.key,
                chunk_size: self.chunk_size,
                workers: self.workers,
            },
            reader,
        )
    }

    /// Uploads the file at `path`.
    pub fn send_path(self, path: impl AsRef<Path>) -> Result<CompleteMultipartUploadOutput> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::parameter_invalid(format!("cannot open {}: {e}", path.display()))
        })?;
        self.send_reader(file)
    }

    pub fn send_bytes(self, bytes: impl Into<Bytes>) -> Result<CompleteMultipartUploadOutput> {
        let bytes = bytes.into();
        self.send_reader(bytes.as_ref())
    }
}

/// Request builder for a presigned download URL.
pub struct PresignGetObjectRequest {
    client: Client,
    bucket: String,
    key: String,
    expires_in: Duration,
    expires_at: Option<OffsetDateTime>,
}

impl PresignGetObjectRequest {
    /// Validity measured from now. Defaults to 15 minutes.
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = duration;
        self.expires_at = None;
        self
    }

    /// Absolute expiry instant.
    pub fn expires_at(mut self, at: OffsetDateTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn build(self) -> Result<PresignedRequest> {
        let credentials = self.client.credentials()?;
        let expires_at = match self.expires_at {
            Some(at) => at,
            None => {
                if self.expires_in.is_zero() {
                    return Err(Error::parameter_invalid("expires_in must be non-zero"));
                }
                OffsetDateTime::now_utc() + self.expires_in
            }
        };

        util::signing::presign_download(
            &self.client.endpoint(),
            &self.bucket,
            &self.key,
            &credentials,
            expires_at,
            self.client.addressing(),
        )
    }
}
