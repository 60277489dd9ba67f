//! # lib_search
//!
//! Autoconfiguration for a JSON-over-HTTP search client (Elasticsearch REST
//! conventions). Properties are loaded from JSON files, the environment and
//! explicit overrides; a client is built from them, adjusted by any
//! registered builder customizers, and kept as a singleton in a [`Registry`].
//!
//! ```no_run
//! use lib_search::autoconfig::{self, SharedClient};
//! use lib_search::configs::PropertySources;
//!
//! let sources = PropertySources::new().pairs(["search.client.uris=http://localhost:9200"])?;
//! let registry = autoconfig::bootstrap(&sources, |_| {})?;
//! let client: SharedClient = registry.get()?;
//! # Ok::<(), lib_search::RegistryError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod autoconfig;
pub mod client;
pub mod configs;
pub mod core;
pub mod error;
#[cfg(feature = "loggers")]
pub mod loggers;
pub mod serializer;

// Re-export the everyday surface
pub use autoconfig::{
    bootstrap, configure, customizer, ClientConfigBuilderCustomizer, ClientFactory, SharedClient,
    SharedCustomizer, SharedSerializer,
};
pub use client::{
    Action, ClientConfig, ClientConfigBuilder, Delete, Get, HttpHost, HttpSearchClient, Index,
    Search, SearchClient, SearchResult,
};
pub use configs::{PropertySources, SearchProperties};
pub use crate::core::Registry;
pub use error::{ClientError, ConfigurationError, RegistryError};
pub use serializer::{JsonSerializer, SerdeJsonSerializer};
