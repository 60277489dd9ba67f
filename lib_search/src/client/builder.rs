//! # Client Configuration Builder
//!
//! A mutable builder that accumulates everything needed to construct an
//! [`HttpSearchClient`](super::http::HttpSearchClient). Autoconfiguration
//! seeds it from properties, customizers then get a `&mut` to it, and
//! `build()` freezes the result into a [`ClientConfig`].
//!
//! Every setter overwrites the previous value, so the last writer wins.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::serializer::{default_serializer, JsonSerializer};

/// Connection and read timeout applied when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// A proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHost {
    pub host: String,
    pub port: u16,
}

impl HttpHost {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The proxy as an `http://host:port` URL.
    pub fn to_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for HttpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Basic authentication credentials sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Mutable intermediate state for a client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    servers: Vec<String>,
    serializer: Option<Arc<dyn JsonSerializer>>,
    multi_threaded: bool,
    connection_timeout: Duration,
    read_timeout: Duration,
    max_connections_per_route: Option<usize>,
    max_retries: u32,
    proxy: Option<HttpHost>,
    credentials: Option<Credentials>,
    default_headers: Vec<(String, String)>,
}

impl ClientConfigBuilder {
    /// Starts a builder targeting the given server URIs.
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            serializer: None,
            multi_threaded: true,
            connection_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            max_connections_per_route: None,
            max_retries: 0,
            proxy: None,
            credentials: None,
            default_headers: Vec::new(),
        }
    }

    /// Replaces the server list.
    pub fn servers<I, S>(&mut self, servers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one server to the list.
    pub fn add_server(&mut self, server: impl Into<String>) -> &mut Self {
        self.servers.push(server.into());
        self
    }

    pub fn serializer(&mut self, serializer: Arc<dyn JsonSerializer>) -> &mut Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn multi_threaded(&mut self, multi_threaded: bool) -> &mut Self {
        self.multi_threaded = multi_threaded;
        self
    }

    pub fn connection_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn read_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.read_timeout = timeout;
        self
    }

    pub fn max_connections_per_route(&mut self, max: usize) -> &mut Self {
        self.max_connections_per_route = Some(max);
        self
    }

    pub fn max_retries(&mut self, retries: u32) -> &mut Self {
        self.max_retries = retries;
        self
    }

    pub fn proxy(&mut self, proxy: HttpHost) -> &mut Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn default_credentials(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Adds a header sent with every request. A later value for the same name wins.
    pub fn default_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The serializer currently set on the builder, if any.
    pub fn current_serializer(&self) -> Option<&Arc<dyn JsonSerializer>> {
        self.serializer.as_ref()
    }

    pub fn current_servers(&self) -> &[String] {
        &self.servers
    }

    /// Validates the accumulated state and freezes it.
    ///
    /// # Errors
    /// Fails when a server URI is not an absolute http(s) URL, when no
    /// server is configured, or when a default header is malformed.
    pub fn build(&self) -> Result<ClientConfig, ConfigurationError> {
        if self.servers.is_empty() {
            return Err(ConfigurationError::InvalidUri {
                uri: String::new(),
                reason: "at least one server URI is required".to_string(),
            });
        }

        let servers = self
            .servers
            .iter()
            .map(|s| parse_server_uri(s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let invalid = || ConfigurationError::InvalidProperty {
                key: name.clone(),
                value: value.clone(),
            };
            let h_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let h_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(h_name, h_value);
        }

        Ok(ClientConfig {
            servers,
            serializer: self.serializer.clone().unwrap_or_else(default_serializer),
            multi_threaded: self.multi_threaded,
            connection_timeout: self.connection_timeout,
            read_timeout: self.read_timeout,
            max_connections_per_route: self.max_connections_per_route,
            max_retries: self.max_retries,
            proxy: self.proxy.clone(),
            credentials: self.credentials.clone(),
            default_headers: headers,
        })
    }
}

fn parse_server_uri(uri: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(uri.trim()).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

/// Immutable client configuration produced by [`ClientConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    servers: Vec<Url>,
    serializer: Arc<dyn JsonSerializer>,
    multi_threaded: bool,
    connection_timeout: Duration,
    read_timeout: Duration,
    max_connections_per_route: Option<usize>,
    max_retries: u32,
    proxy: Option<HttpHost>,
    credentials: Option<Credentials>,
    default_headers: HeaderMap,
}

impl ClientConfig {
    pub fn servers(&self) -> &[Url] {
        &self.servers
    }

    pub fn serializer(&self) -> &Arc<dyn JsonSerializer> {
        &self.serializer
    }

    pub fn is_multi_threaded(&self) -> bool {
        self.multi_threaded
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn max_connections_per_route(&self) -> Option<usize> {
        self.max_connections_per_route
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn proxy(&self) -> Option<&HttpHost> {
        self.proxy.as_ref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }
}
