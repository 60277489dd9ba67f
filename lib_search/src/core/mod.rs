//! # Core Module
//!
//! - **`registry`**: the type-keyed singleton container that holds the
//!   client, the serializer and the customizers for the process lifetime.

/// Type-keyed singleton registry with lazy factories.
pub mod registry;

pub use registry::Registry;
