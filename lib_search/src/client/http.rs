//! # HTTP Search Client
//!
//! The reqwest-backed implementation of [`SearchClient`]. Requests are sent
//! through `reqwest-middleware` so transient failures can be retried with
//! exponential backoff, and rotate round-robin over the configured servers.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Proxy, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::action::{Action, SearchResult};
use super::builder::ClientConfig;
use crate::error::{ClientError, ConfigurationError};
use crate::serializer::JsonSerializer;

/// A client able to execute search actions.
///
/// Callers may register their own implementation in the registry; the
/// autoconfiguration then leaves it alone.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Sends the action to one of the configured servers.
    async fn execute(&self, action: &dyn Action) -> Result<SearchResult, ClientError>;

    /// Releases resources. Called when the owning registry is closed.
    fn shutdown(&self) {}

    /// Access to the concrete type, e.g. to inspect an [`HttpSearchClient`].
    fn as_any(&self) -> &dyn Any;
}

/// A JSON-over-HTTP client built from a [`ClientConfig`].
pub struct HttpSearchClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    config: ClientConfig,
    /// Precomputed `Authorization` header for default credentials.
    auth_header: Option<HeaderValue>,
    next_server: AtomicUsize,
    closed: AtomicBool,
}

impl std::fmt::Debug for HttpSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSearchClient")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl HttpSearchClient {
    /// Creates the client described by `config`.
    ///
    /// No connection is opened here; servers are only contacted by `execute`.
    ///
    /// # Errors
    /// Returns `ConfigurationError::HttpClient` if reqwest rejects the
    /// proxy or TLS setup.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigurationError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connection_timeout())
            .timeout(config.read_timeout())
            .default_headers(config.default_headers().clone());

        if !config.is_multi_threaded() {
            builder = builder.pool_max_idle_per_host(1);
        } else if let Some(max) = config.max_connections_per_route() {
            builder = builder.pool_max_idle_per_host(max);
        }

        if let Some(proxy) = config.proxy() {
            let proxy = Proxy::all(proxy.to_url())
                .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
            builder = builder.proxy(proxy);
        } else {
            // Only an explicitly configured proxy is used, never the environment's.
            builder = builder.no_proxy();
        }

        let http = builder
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries());
        let inner = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let auth_header = match config.credentials() {
            Some(c) => {
                let token = general_purpose::STANDARD.encode(format!("{}:{}", c.username, c.password));
                let mut value = HeaderValue::from_str(&format!("Basic {}", token))
                    .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        debug!(
            servers = ?config.servers().iter().map(Url::as_str).collect::<Vec<_>>(),
            proxy = ?config.proxy().map(ToString::to_string),
            multi_threaded = config.is_multi_threaded(),
            "search client created"
        );

        Ok(Self {
            inner,
            config,
            auth_header,
            next_server: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Server URIs in rotation order.
    pub fn servers(&self) -> &[Url] {
        self.config.servers()
    }

    /// The serializer used for request and response bodies.
    pub fn serializer(&self) -> &Arc<dyn JsonSerializer> {
        self.config.serializer()
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn next_server(&self) -> Result<&Url, ClientError> {
        let servers = self.config.servers();
        if servers.is_empty() {
            return Err(ClientError::NoServers);
        }
        let idx = self.next_server.fetch_add(1, Ordering::Relaxed) % servers.len();
        Ok(&servers[idx])
    }

    fn request_url(&self, action: &dyn Action) -> Result<Url, ClientError> {
        let mut url = self.next_server()?.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(action.path_segments());
        url.set_query(action.query().as_deref());
        Ok(url)
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn execute(&self, action: &dyn Action) -> Result<SearchResult, ClientError> {
        if self.is_shutdown() {
            warn!(action = action.name(), "rejecting action on a client that was shut down");
            return Err(ClientError::Shutdown);
        }

        // 1. Resolve the target URL on the next server in rotation
        let url = self.request_url(action)?;
        debug!(action = action.name(), method = %action.method(), %url, "executing search action");

        let mut req = self.inner.request(action.method(), url);

        // 2. Inject Basic Authentication if credentials are configured
        if let Some(auth) = &self.auth_header {
            req = req.header(AUTHORIZATION, auth.clone());
        }

        // 3. Attach the JSON body
        if let Some(body) = action.payload(self.serializer().as_ref())? {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        // 4. Execute and decode with the configured serializer
        let response: reqwest::Response = req.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let json = self.serializer().deserialize(&bytes)?;

        let result = SearchResult::from_response(status, json);
        if !result.succeeded {
            debug!(
                action = action.name(),
                status,
                error = result.error_message.as_deref().unwrap_or_default(),
                "search action failed"
            );
        }
        Ok(result)
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        debug!("search client shut down");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
