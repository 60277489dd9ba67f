//! # Search Client Module
//!
//! Everything needed to talk to a JSON-over-HTTP search endpoint:
//!
//! - **`builder`**: `ClientConfigBuilder`, the mutable configuration handed to
//!   customizers, and the immutable `ClientConfig` it produces.
//! - **`action`**: index, search, get and delete requests plus `SearchResult`.
//! - **`http`**: the `SearchClient` trait and its reqwest-backed implementation.

/// Mutable builder and immutable client configuration.
pub mod builder;
/// REST actions and their results.
pub mod action;
/// The client trait and the HTTP implementation.
pub mod http;

pub use action::{Action, Delete, Get, Index, Search, SearchResult};
pub use builder::{ClientConfig, ClientConfigBuilder, Credentials, HttpHost};
pub use http::{HttpSearchClient, SearchClient};
