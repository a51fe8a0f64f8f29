//! Bucket operations.

use http::Method;

use crate::{
    client::Client,
    error::Result,
    request::RequestDescriptor,
    types::ListBucketsOutput,
};

/// Bucket operations service.
#[derive(Clone)]
pub struct BucketsService {
    client: Client,
}

impl BucketsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Starts a request to list buckets.
    pub fn list(&self) -> ListBucketsRequest {
        ListBucketsRequest {
            client: self.client.clone(),
        }
    }

    /// Starts a request to create a bucket in the client's configured location.
    pub fn create(&self, bucket: impl Into<String>) -> CreateBucketRequest {
        CreateBucketRequest {
            location: self.client.location().map(str::to_string),
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    /// Starts a request to delete a bucket.
    pub fn delete(&self, bucket: impl Into<String>) -> DeleteBucketRequest {
        DeleteBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }
}

/// Request builder for listing buckets.
pub struct ListBucketsRequest {
    client: Client,
}

impl ListBucketsRequest {
    pub fn send(self) -> Result<ListBucketsOutput> {
        let resp = self
            .client
            .execute(RequestDescriptor::new(Method::GET, "/"))?;
        crate::util::xml::parse_list_buckets(&resp.text())
    }
}

/// Request builder for creating a bucket.
pub struct CreateBucketRequest {
    client: Client,
    bucket: String,
    location: Option<String>,
}

impl CreateBucketRequest {
    /// Overrides the location constraint for this bucket.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn send(self) -> Result<()> {
        let mut req = RequestDescriptor::new(Method::PUT, "/")
            .bucket(self.bucket)
            .content_type("application/xml");

        // Without a location the service default applies and no body is sent.
        if let Some(location) = self.location.as_deref() {
            req = req.body(crate::util::xml::encode_create_bucket_configuration(location)?);
        }

        self.client.execute(req)?;
        Ok(())
    }
}

/// Request builder for deleting a bucket.
pub struct DeleteBucketRequest {
    client: Client,
    bucket: String,
}

impl DeleteBucketRequest {
    pub fn send(self) -> Result<()> {
        self.client
            .execute(RequestDescriptor::new(Method::DELETE, "/").bucket(self.bucket))?;
        Ok(())
    }
}
