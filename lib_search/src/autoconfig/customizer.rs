use std::sync::Arc;

use crate::client::builder::ClientConfigBuilder;

/// Hook allowed to adjust the client configuration before the client is built.
///
/// Customizers run in registration order after the properties have been
/// applied, so they can override anything the properties set.
pub trait ClientConfigBuilderCustomizer: Send + Sync {
    fn customize(&self, builder: &mut ClientConfigBuilder);
}

impl<F> ClientConfigBuilderCustomizer for F
where
    F: Fn(&mut ClientConfigBuilder) + Send + Sync,
{
    fn customize(&self, builder: &mut ClientConfigBuilder) {
        self(builder)
    }
}

/// Wraps a closure as a shareable customizer, ready to be registered.
pub fn customizer<F>(f: F) -> Arc<dyn ClientConfigBuilderCustomizer>
where
    F: Fn(&mut ClientConfigBuilder) + Send + Sync + 'static,
{
    Arc::new(f)
}
