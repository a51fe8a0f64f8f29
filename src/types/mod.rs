//! Shared request and response types.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::Method;
use serde::Deserialize;
use url::Url;

/// Fully resolved presigned request.
#[derive(Clone, Debug)]
pub struct PresignedRequest {
    /// HTTP method to use.
    pub method: Method,
    /// Fully signed request URL.
    pub url: Url,
}

/// Output from a GET object request.
#[derive(Clone, Debug)]
pub struct GetObjectOutput {
    /// Raw object bytes.
    pub body: Bytes,
    /// Content type, if provided.
    pub content_type: Option<String>,
    /// Entity tag, if provided.
    pub etag: Option<String>,
}

/// Output from a PUT object request.
#[derive(Clone, Debug)]
pub struct PutObjectOutput {
    /// Entity tag, if provided.
    pub etag: Option<String>,
}

/// One page of a bucket listing (`ListBucketResult`).
#[derive(Clone, Debug, Default)]
pub struct ListObjectsPage {
    /// Bucket name.
    pub name: String,
    /// Prefix filter, if any.
    pub prefix: Option<String>,
    /// Marker this page started after, if any.
    pub marker: Option<String>,
    /// Marker reported by the service for the next page, if any.
    pub next_marker: Option<String>,
    /// Maximum number of keys requested.
    pub max_keys: Option<u32>,
    /// Delimiter used for grouping, if any.
    pub delimiter: Option<String>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Listed objects in service order.
    pub entries: Vec<ObjectEntry>,
    /// Common prefixes when using delimiters.
    pub common_prefixes: Vec<String>,
}

impl ListObjectsPage {
    /// Keys of this page in service order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Marker for the following request: `NextMarker`, else the last key.
    pub fn continuation_marker(&self) -> Option<&str> {
        self.next_marker
            .as_deref()
            .or_else(|| self.entries.last().map(|e| e.key.as_str()))
    }
}

/// Object metadata returned by list operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Entity tag, if provided.
    pub etag: Option<String>,
    /// Last-modified timestamp, if provided.
    pub last_modified: Option<String>,
    /// Storage class, if provided.
    pub storage_class: Option<String>,
}

/// Output from listing buckets.
#[derive(Debug)]
pub struct ListBucketsOutput {
    /// Owner information, if provided.
    pub owner: Option<BucketOwner>,
    /// Buckets returned in the response.
    pub buckets: Vec<Bucket>,
}

/// Bucket owner metadata.
#[derive(Debug)]
pub struct BucketOwner {
    /// Owner id, if provided.
    pub id: Option<String>,
    /// Owner display name, if provided.
    pub display_name: Option<String>,
}

/// Bucket listing entry.
#[derive(Debug)]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// Creation date, if provided.
    pub creation_date: Option<String>,
}

/// A part acknowledged by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPart {
    pub part_number: u32,
    pub etag: String,
}

/// Lifecycle of a multipart upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultipartState {
    Initiated,
    Uploading,
    Completed,
    Aborted,
}

impl MultipartState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// An initiated multipart upload, alive until exactly one of complete or abort.
#[derive(Debug)]
pub struct MultipartSession {
    pub(crate) upload_id: String,
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) chunk_size: usize,
    pub(crate) workers: usize,
    pub(crate) state: MultipartState,
    pub(crate) parts: BTreeMap<u32, String>,
}

impl MultipartSession {
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn state(&self) -> MultipartState {
        self.state
    }

    /// Recorded parts in ascending part-number order.
    pub fn parts(&self) -> Vec<UploadPart> {
        self.parts
            .iter()
            .map(|(n, etag)| UploadPart {
                part_number: *n,
                etag: etag.clone(),
            })
            .collect()
    }
}

/// Output from completing a multipart upload.
#[derive(Debug)]
pub struct CompleteMultipartUploadOutput {
    /// Upload id that was completed.
    pub upload_id: String,
    /// Number of parts in the manifest.
    pub parts: usize,
    /// Object location, if provided.
    pub location: Option<String>,
    /// Entity tag, if provided.
    pub etag: Option<String>,
}

/// Output from a bulk import.
#[derive(Debug, Default)]
pub struct ImportOutput {
    /// Created object labels (`/{database}/{table}/{label}_{n}.gz`) in suffix order.
    pub objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlError {
    #[serde(rename = "Code")]
    pub(crate) code: Option<String>,
    #[serde(rename = "Message")]
    pub(crate) message: Option<String>,
    #[serde(rename = "Status")]
    pub(crate) status: Option<String>,
    #[serde(rename = "RequestId")]
    pub(crate) request_id: Option<String>,
    #[serde(rename = "Resource")]
    pub(crate) resource: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonError {
    pub(crate) code: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) status: Option<serde_json::Value>,
    #[serde(rename = "requestId")]
    pub(crate) request_id: Option<String>,
    pub(crate) resource: Option<String>,
}

/// Error fields recovered from a response body, either dialect.
#[derive(Debug, Default)]
pub(crate) struct ParsedError {
    pub(crate) code: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) status: Option<u16>,
    pub(crate) request_id: Option<String>,
    pub(crate) resource: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListBucketResult {
    #[serde(rename = "Name")]
    pub(crate) name: String,
    #[serde(rename = "Prefix")]
    pub(crate) prefix: Option<String>,
    #[serde(rename = "Marker")]
    pub(crate) marker: Option<String>,
    #[serde(rename = "NextMarker")]
    pub(crate) next_marker: Option<String>,
    #[serde(rename = "MaxKeys")]
    pub(crate) max_keys: Option<u32>,
    #[serde(rename = "Delimiter")]
    pub(crate) delimiter: Option<String>,
    #[serde(rename = "IsTruncated")]
    pub(crate) is_truncated: Option<bool>,
    #[serde(rename = "Contents", default)]
    pub(crate) contents: Vec<XmlObject>,
    #[serde(rename = "CommonPrefixes", default)]
    pub(crate) common_prefixes: Vec<XmlCommonPrefixes>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlObject {
    #[serde(rename = "Key")]
    pub(crate) key: String,
    #[serde(rename = "LastModified")]
    pub(crate) last_modified: Option<String>,
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
    #[serde(rename = "Size", default)]
    pub(crate) size: u64,
    #[serde(rename = "StorageClass")]
    pub(crate) storage_class: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCommonPrefixes {
    #[serde(rename = "Prefix")]
    pub(crate) prefix: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlInitiateMultipartUploadResult {
    #[serde(rename = "UploadId")]
    pub(crate) upload_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlCompleteMultipartUploadResult {
    #[serde(rename = "Location")]
    pub(crate) location: Option<String>,
    #[serde(rename = "ETag")]
    pub(crate) etag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlListAllMyBucketsResult {
    #[serde(rename = "Owner")]
    pub(crate) owner: Option<XmlOwner>,
    #[serde(rename = "Buckets")]
    pub(crate) buckets: Option<XmlBuckets>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlOwner {
    #[serde(rename = "ID")]
    pub(crate) id: Option<String>,
    #[serde(rename = "DisplayName")]
    pub(crate) display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlBuckets {
    #[serde(rename = "Bucket", default)]
    pub(crate) buckets: Vec<XmlBucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct XmlBucket {
    #[serde(rename = "Name")]
    pub(crate) name: String,
    #[serde(rename = "CreationDate")]
    pub(crate) creation_date: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<XmlListBucketResult> for ListObjectsPage {
    fn from(value: XmlListBucketResult) -> Self {
        Self {
            name: value.name,
            prefix: non_empty(value.prefix),
            marker: non_empty(value.marker),
            next_marker: non_empty(value.next_marker),
            max_keys: value.max_keys,
            delimiter: non_empty(value.delimiter),
            is_truncated: value.is_truncated.unwrap_or(false),
            entries: value
                .contents
                .into_iter()
                .map(|o| ObjectEntry {
                    key: o.key,
                    size: o.size,
                    etag: non_empty(o.etag),
                    last_modified: non_empty(o.last_modified),
                    storage_class: non_empty(o.storage_class),
                })
                .collect(),
            common_prefixes: value
                .common_prefixes
                .into_iter()
                .map(|p| p.prefix)
                .collect(),
        }
    }
}

impl From<XmlListAllMyBucketsResult> for ListBucketsOutput {
    fn from(value: XmlListAllMyBucketsResult) -> Self {
        let buckets = value
            .buckets
            .map(|b| {
                b.buckets
                    .into_iter()
                    .map(|bucket| Bucket {
                        name: bucket.name,
                        creation_date: bucket.creation_date,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            owner: value.owner.map(|o| BucketOwner {
                id: o.id,
                display_name: o.display_name,
            }),
            buckets,
        }
    }
}

impl From<XmlError> for ParsedError {
    fn from(value: XmlError) -> Self {
        Self {
            code: non_empty(value.code),
            message: non_empty(value.message),
            status: value.status.and_then(|s| s.trim().parse().ok()),
            request_id: non_empty(value.request_id),
            resource: non_empty(value.resource),
        }
    }
}

impl From<JsonError> for ParsedError {
    fn from(value: JsonError) -> Self {
        let status = match value.status {
            Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        Self {
            code: non_empty(value.code),
            message: non_empty(value.message),
            status,
            request_id: non_empty(value.request_id),
            resource: non_empty(value.resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> ObjectEntry {
        ObjectEntry {
            key: key.to_string(),
            size: 0,
            etag: None,
            last_modified: None,
            storage_class: None,
        }
    }

    #[test]
    fn continuation_prefers_next_marker() {
        let page = ListObjectsPage {
            next_marker: Some("m".to_string()),
            entries: vec![entry("a"), entry("z")],
            ..Default::default()
        };
        assert_eq!(page.continuation_marker(), Some("m"));
    }

    #[test]
    fn continuation_falls_back_to_last_key() {
        let page = ListObjectsPage {
            entries: vec![entry("a"), entry("z")],
            ..Default::default()
        };
        assert_eq!(page.continuation_marker(), Some("z"));
        assert_eq!(ListObjectsPage::default().continuation_marker(), None);
    }

    #[test]
    fn terminal_states() {
        assert!(MultipartState::Completed.is_terminal());
        assert!(MultipartState::Aborted.is_terminal());
        assert!(!MultipartState::Uploading.is_terminal());
    }
}
