//! # Autoconfiguration
//!
//! Wires a search client into a [`Registry`] from [`SearchProperties`]:
//!
//! 1. a default JSON serializer is registered unless one already is,
//! 2. a lazy client factory is registered unless a client already is,
//! 3. on first resolution the factory seeds a [`ClientConfigBuilder`] from
//!    the properties, sets the registry's serializer (if unique), runs every
//!    registered customizer in order and builds the client.
//!
//! Beans supplied by the caller must be registered before [`configure`]
//! runs; an existing client or serializer always wins.

use std::sync::Arc;
use tracing::{debug, info};

use crate::client::builder::ClientConfigBuilder;
use crate::client::http::{HttpSearchClient, SearchClient};
use crate::configs::loader::{load_search_properties, PropertySources};
use crate::configs::properties::{SearchProperties, DEFAULT_PREFIX};
use crate::core::registry::Registry;
use crate::error::{ConfigurationError, RegistryError};
use crate::serializer::{default_serializer, JsonSerializer};

/// Builder customizer hooks.
pub mod customizer;

pub use customizer::{customizer, ClientConfigBuilderCustomizer};

/// Name under which the autoconfigured client is registered.
pub const CLIENT_BEAN: &str = "searchClient";
/// Name under which the default serializer is registered.
pub const SERIALIZER_BEAN: &str = "jsonSerializer";

/// Registry key for clients.
pub type SharedClient = Arc<dyn SearchClient>;
/// Registry key for serializers.
pub type SharedSerializer = Arc<dyn JsonSerializer>;
/// Registry key for customizers.
pub type SharedCustomizer = Arc<dyn ClientConfigBuilderCustomizer>;

/// Builds clients from properties, an optional serializer and customizers.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    properties: SearchProperties,
}

impl ClientFactory {
    pub fn new(properties: SearchProperties) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &SearchProperties {
        &self.properties
    }

    /// Seeds a builder from the properties, then applies `serializer` and
    /// each customizer in order.
    ///
    /// # Errors
    /// `ConfigurationError::ProxyPortMissing` when a proxy host has no port.
    pub fn create_config_builder(
        &self,
        serializer: Option<SharedSerializer>,
        customizers: &[SharedCustomizer],
    ) -> Result<ClientConfigBuilder, ConfigurationError> {
        let props = &self.properties;
        let mut builder = ClientConfigBuilder::new(props.uris.iter().cloned());
        builder
            .multi_threaded(props.multi_threaded)
            .connection_timeout(props.connection_timeout)
            .read_timeout(props.read_timeout)
            .max_retries(props.max_retries);

        if let Some(proxy) = props.proxy_host()? {
            debug!(%proxy, "using proxy");
            builder.proxy(proxy);
        }
        if let Some((username, password)) = props.credentials() {
            builder.default_credentials(username, password);
        }
        if let Some(serializer) = serializer {
            builder.serializer(serializer);
        }

        for (idx, customizer) in customizers.iter().enumerate() {
            debug!(customizer = idx, "applying builder customizer");
            customizer.customize(&mut builder);
        }
        Ok(builder)
    }

    /// Builds the client.
    ///
    /// # Errors
    /// Any configuration error from the properties, the builder or reqwest.
    pub fn build(
        &self,
        serializer: Option<SharedSerializer>,
        customizers: &[SharedCustomizer],
    ) -> Result<HttpSearchClient, ConfigurationError> {
        let config = self.create_config_builder(serializer, customizers)?.build()?;
        HttpSearchClient::new(config)
    }
}

/// Builds a client directly, without a registry.
pub fn build(
    properties: &SearchProperties,
    serializer: Option<SharedSerializer>,
    customizers: &[SharedCustomizer],
) -> Result<HttpSearchClient, ConfigurationError> {
    ClientFactory::new(properties.clone()).build(serializer, customizers)
}

/// Registers the default serializer unless one is present.
pub fn configure_serializer(registry: &Registry) -> bool {
    registry.register_if_absent::<SharedSerializer, _>(SERIALIZER_BEAN, |_| Ok(default_serializer()))
}

/// Registers the lazy client factory unless a client is present.
pub fn configure_client(registry: &Registry, properties: SearchProperties) -> bool {
    registry.register_if_absent::<SharedClient, _>(CLIENT_BEAN, move |ctx| {
        let serializer = ctx.get_if_unique::<SharedSerializer>()?;
        let customizers = ctx.get_all::<SharedCustomizer>()?;

        let client = Arc::new(ClientFactory::new(properties).build(serializer, &customizers)?);
        let closing = client.clone();
        ctx.on_close(move || closing.shutdown());

        info!(
            servers = client.servers().len(),
            customizers = customizers.len(),
            "search client configured"
        );
        Ok(client as SharedClient)
    })
}

/// Applies serializer and client autoconfiguration.
pub fn configure(registry: &Registry, properties: SearchProperties) {
    configure_serializer(registry);
    configure_client(registry, properties);
}

/// Creates a registry, lets the caller register their own beans, binds the
/// properties from `sources`, applies autoconfiguration and refreshes.
///
/// # Errors
/// Fails fast with the first binding or bean creation error.
pub fn bootstrap<F>(sources: &PropertySources, user_beans: F) -> Result<Registry, RegistryError>
where
    F: FnOnce(&Registry),
{
    let registry = Registry::new();
    user_beans(&registry);
    let properties = load_search_properties(sources, DEFAULT_PREFIX)?;
    configure(&registry, properties);
    registry.refresh()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::action::{Action, Get, SearchResult};
    use crate::client::builder::HttpHost;
    use crate::error::ClientError;
    use crate::serializer::SerdeJsonSerializer;
    use async_trait::async_trait;
    use std::any::Any;

    struct MockSearchClient;

    #[async_trait]
    impl SearchClient for MockSearchClient {
        async fn execute(&self, _action: &dyn Action) -> Result<SearchResult, ClientError> {
            Ok(SearchResult::from_response(200, serde_json::Value::Null))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn same_instance<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
        Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
    }

    fn load(pairs: &[&str], user_beans: impl FnOnce(&Registry)) -> Result<Registry, RegistryError> {
        let sources = PropertySources::new().pairs(pairs.iter().copied())?;
        bootstrap(&sources, user_beans)
    }

    fn http_client(registry: &Registry) -> SharedClient {
        registry.get::<SharedClient>().unwrap()
    }

    fn as_http(client: &SharedClient) -> &HttpSearchClient {
        client
            .as_any()
            .downcast_ref::<HttpSearchClient>()
            .expect("autoconfigured client")
    }

    #[test]
    fn client_on_localhost_by_default() {
        let registry = load(&[], |_| {}).unwrap();

        assert_eq!(registry.count::<SharedClient>(), 1);
        let client = http_client(&registry);
        let servers: Vec<&str> = as_http(&client).servers().iter().map(|u| u.as_str()).collect();
        assert_eq!(servers, vec!["http://localhost:9200/"]);
    }

    #[test]
    fn custom_client_short_circuits_the_factory() {
        let mine: SharedClient = Arc::new(MockSearchClient);
        let registered = mine.clone();

        let registry = load(&["search.client.uris[0]=http://localhost:9200"], move |r| {
            r.register("customSearchClient", registered)
        })
        .unwrap();

        assert_eq!(registry.count::<SharedClient>(), 1);
        assert_eq!(registry.names_for::<SharedClient>(), vec!["customSearchClient".to_string()]);
        assert!(same_instance(&http_client(&registry), &mine));
    }

    #[test]
    fn custom_serializer_is_injected() {
        let mine: SharedSerializer = Arc::new(SerdeJsonSerializer::new());
        let registered = mine.clone();

        let registry = load(&["search.client.uris=http://localhost:9200"], move |r| {
            r.register("customSerializer", registered)
        })
        .unwrap();

        assert_eq!(registry.names_for::<SharedSerializer>(), vec!["customSerializer".to_string()]);
        let client = http_client(&registry);
        assert!(same_instance(as_http(&client).serializer(), &mine));
    }

    #[test]
    fn customizer_overrides_autoconfig() {
        let from_registry: SharedSerializer = Arc::new(SerdeJsonSerializer::new());
        let from_customizer: SharedSerializer = Arc::new(SerdeJsonSerializer::pretty());
        let (registered, captured) = (from_registry.clone(), from_customizer.clone());

        let registry = load(&["search.client.uris=http://localhost:9200"], move |r| {
            r.register("customSerializer", registered);
            r.register(
                "customizer",
                customizer(move |builder| {
                    builder.serializer(captured.clone());
                }),
            );
        })
        .unwrap();

        let client = http_client(&registry);
        let used = as_http(&client).serializer();
        assert!(same_instance(used, &from_customizer));
        assert!(!same_instance(used, &from_registry));
    }

    #[test]
    fn proxy_host_without_port_fails_startup() {
        let err = load(
            &[
                "search.client.uris=http://localhost:9200",
                "search.client.proxy.host=proxy.example.com",
            ],
            |_| {},
        )
        .unwrap_err();

        assert!(matches!(err, RegistryError::Creation { ref bean, .. } if bean == CLIENT_BEAN));
        let cause = err.root_cause_configuration().expect("configuration error");
        assert_eq!(cause.to_string(), "Proxy port must not be null");
    }

    #[test]
    fn factory_reports_missing_proxy_port_directly() {
        let mut props = SearchProperties::default();
        props.proxy.host = Some("proxy.example.com".to_string());

        let err = build(&props, None, &[]).unwrap_err();

        assert_eq!(err, ConfigurationError::ProxyPortMissing);
        assert_eq!(err.to_string(), "Proxy port must not be null");
    }

    #[test]
    fn proxy_and_credentials_reach_the_client() {
        let registry = load(
            &[
                "search.client.proxy.host=proxy.example.com",
                "search.client.proxy.port=3128",
                "search.client.username=elastic",
                "search.client.password=changeme",
                "search.client.read-timeout=7s",
            ],
            |_| {},
        )
        .unwrap();

        let client = http_client(&registry);
        let config = as_http(&client).config();
        assert_eq!(config.proxy(), Some(&HttpHost::new("proxy.example.com", 3128)));
        assert_eq!(config.credentials().map(|c| c.username.as_str()), Some("elastic"));
        assert_eq!(config.read_timeout(), std::time::Duration::from_secs(7));
    }

    #[test]
    fn customizers_run_in_registration_order_and_last_writer_wins() {
        let registry = load(&["search.client.uris=http://from-properties:9200"], |r| {
            r.register(
                "first",
                customizer(|builder| {
                    builder.servers(["http://first:9200"]);
                }),
            );
            r.register(
                "second",
                customizer(|builder| {
                    assert_eq!(builder.current_servers(), ["http://first:9200".to_string()]);
                    builder.servers(["http://second:9200"]);
                }),
            );
        })
        .unwrap();

        let client = http_client(&registry);
        assert_eq!(as_http(&client).servers()[0].host_str(), Some("second"));
    }

    #[test]
    fn client_is_created_lazily_and_only_once() {
        let registry = Registry::new();
        let mut props = SearchProperties::default();
        props.proxy.host = Some("proxy.example.com".to_string());
        configure(&registry, props);

        // Nothing is built until someone asks for the client.
        assert_eq!(registry.count::<SharedClient>(), 1);
        assert!(registry.get::<SharedClient>().is_err());

        let registry = Registry::new();
        configure(&registry, SearchProperties::default());
        let a = http_client(&registry);
        let b = http_client(&registry);
        assert!(same_instance(&a, &b));
    }

    #[tokio::test]
    async fn closing_the_registry_shuts_the_client_down() {
        let registry = load(&[], |_| {}).unwrap();
        let client = http_client(&registry);
        assert!(!as_http(&client).is_shutdown());

        registry.close();

        assert!(as_http(&client).is_shutdown());
        assert!(!registry.contains::<SharedClient>());
        let result = client.execute(&Get::new("foo", "1")).await;
        assert!(matches!(result, Err(ClientError::Shutdown)), "{:?}", result);
    }

    #[test]
    fn invalid_property_fails_before_any_bean_is_created() {
        let err = load(&["search.client.max-retries=many"], |_| {}).unwrap_err();
        assert!(matches!(
            err.root_cause_configuration(),
            Some(ConfigurationError::InvalidProperty { .. })
        ));
    }
}
