mod buckets;
mod imports;
mod objects;

pub use buckets::{BucketsService, CreateBucketRequest, DeleteBucketRequest, ListBucketsRequest};
pub use imports::{BulkImportRequest, ImportsService};
pub use objects::{
    DeleteObjectRequest, GetObjectRequest, ListObjectsPager, ListObjectsRequest,
    MultipartUploadRequest, ObjectEntries, ObjectsService, PresignGetObjectRequest, PutObjectRequest,
};
