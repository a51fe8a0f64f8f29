//! A blocking S3 client speaking signature version 2.
//!
//! ## Quick start
//!
//! ```no_run
//! # fn demo() -> Result<(), s3_client::Error> {
//! use s3_client::{Client, Credentials};
//!
//! let client = Client::builder("https://s3.example.com")?
//!     .credentials(Credentials::from_env()?)
//!     .build()?;
//!
//! for entry in client.objects().list("my-bucket").prefix("logs/").entries() {
//!     let entry = entry?;
//!     println!("{} {}", entry.key, entry.size);
//! }
//!
//! let out = client
//!     .objects()
//!     .multipart_upload("my-bucket", "backup.tar")
//!     .chunk_size(16 * 1024 * 1024)
//!     .workers(4)
//!     .send_path("backup.tar")?;
//! println!("{} parts", out.parts);
//! # Ok(())
//! # }
//! ```
//!
//! ## Low-level requests
//!
//! Every call goes through a [`RequestDescriptor`], which can also be built
//! and executed directly:
//!
//! ```no_run
//! # fn demo(client: &s3_client::Client) -> Result<(), s3_client::Error> {
//! use s3_client::{Method, RequestDescriptor};
//!
//! let req = RequestDescriptor::new(Method::GET, "/").bucket("hoge").sub_resource("acl");
//! let resp = client.execute(req)?;
//! println!("{}", resp.text());
//! # Ok(())
//! # }
//! ```

#[cfg(all(
    feature = "rustls",
    feature = "native-tls",
    not(feature = "allow-both-tls")
))]
compile_error!("Enable only one of: rustls, native-tls.");

/// Service entry points and request builders.
pub mod api;
/// Shared request/response types.
pub mod types;

mod auth;
mod client;
mod error;
mod import;
mod multipart;
mod pool;
mod request;
mod transport;
mod util;

pub use auth::{AddressingStyle, Credentials};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use http::Method;
pub use import::{ImportConfig, ImportSource};
pub use multipart::MIN_CHUNK_SIZE;
pub use request::{DeferredBody, Payload, RequestDescriptor};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Response, ResponseBody, UreqTransport,
};
