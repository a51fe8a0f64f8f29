//! Chunked multipart upload: initiate, parallel parts, then complete or abort.

use std::{collections::BTreeMap, io::Read};

use bytes::Bytes;
use http::Method;

use crate::{
    client::Client,
    error::{Error, Result},
    pool::{self, Chunks},
    request::RequestDescriptor,
    types::{CompleteMultipartUploadOutput, MultipartSession, MultipartState, UploadPart},
    util,
};

/// Smallest part size the service accepts (except for the last part).
pub const MIN_CHUNK_SIZE: usize = 5 * 1024 * 1024;
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 100 * 1024 * 1024;
pub(crate) const DEFAULT_WORKERS: usize = 1;

pub(crate) struct MultipartOptions {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) chunk_size: usize,
    pub(crate) workers: usize,
}

/// Runs a whole upload. Any failure after initiate aborts the upload and
/// returns the original error; a failing abort is only logged.
pub(crate) fn upload<R: Read>(
    client: &Client,
    options: MultipartOptions,
    reader: R,
) -> Result<CompleteMultipartUploadOutput> {
    let mut session = MultipartSession::initiate(
        client,
        options.bucket,
        options.key,
        options.chunk_size,
        options.workers,
    )?;

    let result = session
        .upload_parts(client, reader)
        .and_then(|()| session.complete(client));

    match result {
        Ok(output) => Ok(output),
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::info!(
                upload_id = session.upload_id(),
                error = %err,
                "aborting multipart upload"
            );
            if let Err(_abort_err) = session.abort(client) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    upload_id = session.upload_id(),
                    error = %_abort_err,
                    "abort multipart upload failed"
                );
            }
            Err(err)
        }
    }
}

fn validate(chunk_size: usize, workers: usize) -> Result<()> {
    if chunk_size < MIN_CHUNK_SIZE {
        return Err(Error::parameter_invalid(format!(
            "split size is invalid: below lower limit of {MIN_CHUNK_SIZE} bytes"
        )));
    }
    if workers == 0 {
        return Err(Error::parameter_invalid("workers must be at least 1"));
    }
    Ok(())
}

struct PartTarget<'a> {
    bucket: &'a str,
    resource: &'a str,
    upload_id: &'a str,
    content_type: &'a str,
}

impl PartTarget<'_> {
    fn request(&self, method: Method, sub_resource: String) -> RequestDescriptor {
        RequestDescriptor::new(method, self.resource)
            .bucket(self.bucket)
            .sub_resource(sub_resource)
            .content_type(self.content_type)
            .multipart()
    }

    fn upload(&self, client: &Client, part_number: u32, bytes: Bytes) -> Result<UploadPart> {
        #[cfg(feature = "tracing")]
        tracing::debug!(part_number, len = bytes.len(), "uploading part");

        let req = self
            .request(
                Method::PUT,
                format!("partNumber={part_number}&uploadId={}", self.upload_id),
            )
            .body(bytes);
        let resp = client.execute(req)?;

        let etag = util::headers::etag(resp.headers()).ok_or_else(|| {
            Error::decode(
                format!("upload part {part_number} response has no ETag header"),
                None,
            )
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(part_number, etag = %etag, "uploaded part");

        Ok(UploadPart { part_number, etag })
    }
}

impl MultipartSession {
    /// Starts an upload with `POST /{key}?uploads`.
    ///
    /// Part size and worker count are checked before anything is sent.
    pub fn initiate(
        client: &Client,
        bucket: impl Into<String>,
        key: impl Into<String>,
        chunk_size: usize,
        workers: usize,
    ) -> Result<Self> {
        validate(chunk_size, workers)?;
        let bucket = bucket.into();
        let key = key.into();

        #[cfg(feature = "tracing")]
        tracing::info!(
            bucket = %bucket,
            key = %key,
            chunk_size,
            workers,
            "initiating multipart upload"
        );

        let req = RequestDescriptor::new(Method::POST, util::encode::object_resource(&key))
            .bucket(bucket.as_str())
            .sub_resource("uploads")
            .content_type(util::headers::content_type_for_key(&key))
            .multipart();
        let resp = client.execute(req)?;
        let upload_id = util::xml::parse_initiate_multipart_upload(&resp.text())?;

        Ok(Self {
            upload_id,
            bucket,
            key,
            chunk_size,
            workers,
            state: MultipartState::Initiated,
            parts: BTreeMap::new(),
        })
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::parameter_invalid(format!(
                "cannot {action} multipart upload {}: already {:?}",
                self.upload_id, self.state
            )));
        }
        Ok(())
    }

    /// Reads `reader` in `chunk_size` parts and uploads them on the worker pool.
    ///
    /// Part numbers start at 1. An empty source still uploads one empty part.
    /// Only allowed once, straight after initiate.
    pub fn upload_parts<R: Read>(&mut self, client: &Client, reader: R) -> Result<()> {
        if self.state != MultipartState::Initiated {
            return Err(Error::parameter_invalid(format!(
                "cannot upload parts to multipart upload {}: already {:?}",
                self.upload_id, self.state
            )));
        }
        self.state = MultipartState::Uploading;

        let resource = util::encode::object_resource(&self.key);
        let content_type = util::headers::content_type_for_key(&self.key);
        let target = PartTarget {
            bucket: &self.bucket,
            resource: &resource,
            upload_id: &self.upload_id,
            content_type: &content_type,
        };

        let chunks = Chunks::new(reader, self.chunk_size, 1)
            .emit_empty()
            .map(|chunk| -> Result<(u32, Bytes)> {
                let (index, bytes) = chunk?;
                let part_number = u32::try_from(index)
                    .map_err(|_| Error::parameter_invalid("too many parts for one upload"))?;
                Ok((part_number, bytes))
            });

        let uploaded = pool::run_bounded(self.workers, chunks, |(part_number, bytes)| {
            target.upload(client, part_number, bytes)
        })?;

        for part in uploaded {
            self.parts.insert(part.part_number, part.etag);
        }
        Ok(())
    }

    /// Finishes the upload with the recorded parts in ascending order.
    pub fn complete(&mut self, client: &Client) -> Result<CompleteMultipartUploadOutput> {
        self.ensure_open("complete")?;
        let manifest = util::xml::encode_complete_multipart_upload(&self.parts())?;

        let resource = util::encode::object_resource(&self.key);
        let content_type = util::headers::content_type_for_key(&self.key);
        let target = PartTarget {
            bucket: &self.bucket,
            resource: &resource,
            upload_id: &self.upload_id,
            content_type: &content_type,
        };
        let req = target
            .request(Method::POST, format!("uploadId={}", self.upload_id))
            .body(manifest);
        let resp = client.execute(req)?;
        self.state = MultipartState::Completed;

        let parsed = util::xml::parse_complete_multipart_upload(&resp.text());
        let (location, etag) = match parsed {
            Some(parsed) => (parsed.location, parsed.etag),
            None => (None, None),
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            upload_id = %self.upload_id,
            parts = self.parts.len(),
            "completed multipart upload"
        );

        Ok(CompleteMultipartUploadOutput {
            upload_id: self.upload_id.clone(),
            parts: self.parts.len(),
            location,
            etag,
        })
    }

    /// Discards the upload and its parts with `DELETE /{key}?uploadId=..`.
    pub fn abort(&mut self, client: &Client) -> Result<()> {
        self.ensure_open("abort")?;
        // Terminal either way: a second abort would not help.
        self.state = MultipartState::Aborted;

        let resource = util::encode::object_resource(&self.key);
        let content_type = util::headers::content_type_for_key(&self.key);
        let target = PartTarget {
            bucket: &self.bucket,
            resource: &resource,
            upload_id: &self.upload_id,
            content_type: &content_type,
        };
        client.execute(
            target
                .request(Method::DELETE, format!("uploadId={}", self.upload_id))
                .force_blank_body(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_floor() {
        assert!(validate(MIN_CHUNK_SIZE, 1).is_ok());
        let err = validate(MIN_CHUNK_SIZE - 1, 1).unwrap_err();
        assert!(matches!(err, Error::ParameterInvalid { .. }));
        assert!(validate(MIN_CHUNK_SIZE, 0).is_err());
    }
}
