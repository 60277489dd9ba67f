//! # Error Types
//!
//! Errors raised while binding properties, wiring the registry and talking
//! to a search endpoint.

use thiserror::Error;

/// Errors raised while turning configuration into a client.
///
/// These are construction-time failures: they surface synchronously while
/// the registry is being refreshed, never while a request is in flight.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A proxy host was configured without a matching port.
    #[error("Proxy port must not be null")]
    ProxyPortMissing,

    /// A server URI could not be parsed as an absolute http(s) URL.
    #[error("Invalid server URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// A property value could not be converted to its target type.
    #[error("Invalid value '{value}' for property '{key}'")]
    InvalidProperty { key: String, value: String },

    /// A configuration source (file, environment) failed to load.
    #[error("Configuration source error: {0}")]
    Source(String),

    /// The underlying HTTP client rejected its configuration.
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Errors raised by the singleton registry.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    /// No bean of the requested type (or name) is registered.
    #[error("No bean of type '{0}' is registered")]
    NoSuchBean(String),

    /// A single bean was requested but several are registered.
    #[error("Expected a single bean of type '{type_name}' but found {count}: {names:?}")]
    NotUnique {
        type_name: String,
        count: usize,
        names: Vec<String>,
    },

    /// A stored bean could not be downcast to the requested type.
    #[error("Bean '{0}' is not of the requested type")]
    TypeMismatch(String),

    /// The bean is being created and was requested again from its own factory.
    #[error("Bean '{0}' is currently in creation")]
    CurrentlyInCreation(String),

    /// A factory failed; the cause is kept as the source.
    #[error("Error creating bean '{bean}': {source}")]
    Creation {
        bean: String,
        #[source]
        source: Box<RegistryError>,
    },

    /// A configuration failure raised from inside a factory.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl RegistryError {
    /// Walks nested creation failures down to the configuration error that caused them.
    pub fn root_cause_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            RegistryError::Configuration(e) => Some(e),
            RegistryError::Creation { source, .. } => source.root_cause_configuration(),
            _ => None,
        }
    }
}

/// Errors raised while executing an action against a search endpoint.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure from reqwest.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport failure raised by the retry middleware.
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Request or response body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request URL could not be built.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    /// The client has no server to send the request to.
    #[error("No server URI is configured")]
    NoServers,

    /// The client was shut down, normally by closing its registry.
    #[error("Search client has been shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_port_message_is_fixed() {
        assert_eq!(
            ConfigurationError::ProxyPortMissing.to_string(),
            "Proxy port must not be null"
        );
    }

    #[test]
    fn root_cause_unwraps_nested_creation_errors() {
        let err = RegistryError::Creation {
            bean: "searchClient".to_string(),
            source: Box::new(RegistryError::Creation {
                bean: "inner".to_string(),
                source: Box::new(ConfigurationError::ProxyPortMissing.into()),
            }),
        };

        assert_eq!(
            err.root_cause_configuration(),
            Some(&ConfigurationError::ProxyPortMissing)
        );
        assert!(err.to_string().contains("Proxy port must not be null"));
        assert!(RegistryError::NoSuchBean("x".into())
            .root_cause_configuration()
            .is_none());
    }
}
