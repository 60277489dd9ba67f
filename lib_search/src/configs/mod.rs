//! # Configuration Modules
//!
//! Typed search client properties and the sources they are loaded from.

/// Typed, relaxed-binding view of the client properties.
pub mod properties;

/// JSON file, environment and in-memory property sources.
pub mod loader;

pub use loader::{load_search_properties, PropertySources};
pub use properties::{ProxyProperties, SearchProperties, DEFAULT_PREFIX, DEFAULT_URI};
