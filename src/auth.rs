use std::fmt;

use url::Url;

use crate::error::Error;

/// Static access key pair used for signature v2 requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, Error> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();

        if access_key_id.trim().is_empty() {
            return Err(Error::parameter_invalid("access_key_id must not be empty"));
        }
        if secret_access_key.trim().is_empty() {
            return Err(Error::parameter_invalid(
                "secret_access_key must not be empty",
            ));
        }

        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// Reads `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env() -> Result<Self, Error> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::invalid_config("missing AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::invalid_config("missing AWS_SECRET_ACCESS_KEY"))?;

        Self::new(access_key_id, secret_access_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How the bucket is addressed in the request URL and Host header.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressingStyle {
    /// `http://host/bucket/key`
    Path,
    /// `http://bucket.host/key`
    VirtualHosted,
}

impl AddressingStyle {
    /// Resolves the effective style for an endpoint.
    ///
    /// A literal IP endpoint always uses path style: a bucket cannot be
    /// prepended to an address.
    pub fn resolve(endpoint: &Url, force_path_style: bool) -> Self {
        if force_path_style || is_ip_host(endpoint) {
            Self::Path
        } else {
            Self::VirtualHosted
        }
    }

    pub fn is_path(self) -> bool {
        matches!(self, Self::Path)
    }
}

fn redact(value: &str) -> String {
    let visible = value.trim().chars().take(4).collect::<String>();
    if visible.chars().count() * 2 >= value.trim().chars().count() {
        return "<redacted>".to_string();
    }
    format!("{visible}****")
}

fn is_ip_host(endpoint: &Url) -> bool {
    matches!(
        endpoint.host(),
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_))
    )
}
