use std::{
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use url::Url;

use crate::{
    api,
    auth::{AddressingStyle, Credentials},
    error::{Error, Result},
    transport::{HttpTransport, UreqTransport},
};

/// Blocking S3 client.
///
/// Cheap to clone; clones share configuration, credentials, and transport.
#[derive(Clone)]
pub struct Client {
    pub(super) inner: Arc<Inner>,
}

pub struct ClientBuilder {
    endpoint: Url,
    force_path_style: bool,
    location: Option<String>,
    debug: bool,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    transport: Option<Arc<dyn HttpTransport>>,
}

#[derive(Default)]
pub(super) struct CredentialSlots {
    pub(super) access_key_id: Option<String>,
    pub(super) secret_access_key: Option<String>,
}

pub(super) struct Inner {
    pub(super) endpoint: RwLock<Url>,
    pub(super) force_path_style: bool,
    pub(super) location: Option<String>,
    pub(super) debug: bool,
    pub(super) credentials: RwLock<CredentialSlots>,
    pub(super) user_agent: String,
    pub(super) transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint().as_str())
            .field("force_path_style", &self.inner.force_path_style)
            .field("location", &self.inner.location)
            .field("debug", &self.inner.debug)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("endpoint", &self.endpoint.as_str())
            .field("force_path_style", &self.force_path_style)
            .field("location", &self.location)
            .field("debug", &self.debug)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout", &self.timeout)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(endpoint: impl AsRef<str>) -> Result<ClientBuilder> {
        ClientBuilder::new(endpoint.as_ref())
    }

    pub fn objects(&self) -> api::ObjectsService {
        api::ObjectsService::new(self.clone())
    }

    pub fn buckets(&self) -> api::BucketsService {
        api::BucketsService::new(self.clone())
    }

    pub fn imports(&self) -> api::ImportsService {
        api::ImportsService::new(self.clone())
    }

    pub fn endpoint(&self) -> Url {
        read(&self.inner.endpoint).clone()
    }

    /// Points the client at another endpoint; subject to the builder's checks.
    pub fn set_endpoint(&self, endpoint: impl AsRef<str>) -> Result<()> {
        let endpoint = parse_endpoint(endpoint.as_ref())?;
        *write(&self.inner.endpoint) = endpoint;
        Ok(())
    }

    pub fn force_path_style(&self) -> bool {
        self.inner.force_path_style
    }

    /// Addressing actually used; IP endpoints are always path style.
    pub fn addressing(&self) -> AddressingStyle {
        AddressingStyle::resolve(&self.endpoint(), self.inner.force_path_style)
    }

    pub fn location(&self) -> Option<&str> {
        self.inner.location.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.inner.debug
    }

    pub fn access_key_id(&self) -> Option<String> {
        read(&self.inner.credentials).access_key_id.clone()
    }

    pub fn set_access_key_id(&self, access_key_id: impl Into<String>) {
        write(&self.inner.credentials).access_key_id = non_blank(access_key_id.into());
    }

    pub fn secret_access_key(&self) -> Option<String> {
        read(&self.inner.credentials).secret_access_key.clone()
    }

    pub fn set_secret_access_key(&self, secret_access_key: impl Into<String>) {
        write(&self.inner.credentials).secret_access_key = non_blank(secret_access_key.into());
    }

    /// Current credentials, or `ParameterInvalid` naming the missing half.
    pub fn credentials(&self) -> Result<Credentials> {
        let slots = read(&self.inner.credentials);
        let access_key_id = slots
            .access_key_id
            .clone()
            .ok_or_else(|| Error::parameter_invalid("missing access_key_id"))?;
        let secret_access_key = slots
            .secret_access_key
            .clone()
            .ok_or_else(|| Error::parameter_invalid("missing secret_access_key"))?;
        Ok(Credentials {
            access_key_id,
            secret_access_key,
        })
    }
}

impl ClientBuilder {
    fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            force_path_style: false,
            location: None,
            debug: false,
            access_key_id: None,
            secret_access_key: None,
            timeout: None,
            user_agent: None,
            transport: None,
        })
    }

    /// Always put the bucket in the path instead of the host name.
    pub fn force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// Location constraint sent when creating buckets.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = non_blank(location.into());
        self
    }

    /// Log a snippet of every response body at debug level.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.access_key_id = Some(credentials.access_key_id);
        self.secret_access_key = Some(credentials.secret_access_key);
        self
    }

    pub fn access_key_id(mut self, access_key_id: impl Into<String>) -> Self {
        self.access_key_id = non_blank(access_key_id.into());
        self
    }

    pub fn secret_access_key(mut self, secret_access_key: impl Into<String>) -> Self {
        self.secret_access_key = non_blank(secret_access_key.into());
        self
    }

    /// Applies string options: `endpoint`, `force_path_style`, `location`, `debug`.
    ///
    /// Unknown keys and non-boolean flag values are configuration errors.
    pub fn options<I, K, V>(mut self, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "endpoint" => self.endpoint = parse_endpoint(value)?,
                "force_path_style" => self.force_path_style = parse_flag(key, value)?,
                "location" => self.location = non_blank(value.to_string()),
                "debug" => self.debug = parse_flag(key, value)?,
                other => {
                    return Err(Error::invalid_config(format!("unknown option: {other}")));
                }
            }
        }
        Ok(self)
    }

    /// Global timeout for each call made by the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replaces the default `ureq` transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(UreqTransport::new(self.timeout)),
        };

        Ok(Client {
            inner: Arc::new(Inner {
                endpoint: RwLock::new(self.endpoint),
                force_path_style: self.force_path_style,
                location: self.location,
                debug: self.debug,
                credentials: RwLock::new(CredentialSlots {
                    access_key_id: self.access_key_id,
                    secret_access_key: self.secret_access_key,
                }),
                user_agent: self.user_agent.unwrap_or_else(default_user_agent),
                transport,
            }),
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = Url::parse(endpoint)
        .map_err(|_| Error::invalid_config("endpoint must be a valid absolute URL"))?;

    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(Error::invalid_config(
            "endpoint scheme must be http or https",
        ));
    }
    if endpoint.host_str().is_none() {
        return Err(Error::invalid_config("endpoint must include host"));
    }
    if endpoint.query().is_some() || endpoint.fragment().is_some() {
        return Err(Error::invalid_config(
            "endpoint must not include query or fragment",
        ));
    }
    if endpoint.path() != "/" && !endpoint.path().is_empty() {
        return Err(Error::invalid_config("endpoint must not include a path"));
    }
    Ok(endpoint)
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::invalid_config(format!(
            "{key} is not boolean: {other}"
        ))),
    }
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn default_user_agent() -> String {
    format!("s3-client/{}", env!("CARGO_PKG_VERSION"))
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
