//! Debug configuration provider: the entry point a host calls when a debug
//! session starts.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::attach::AttachConfiguration;
use crate::error::AttachError;
use crate::resolver::DebugConfigResolver;
use crate::store::LaunchContextStore;

/// Reads the current launch context and resolves it.
///
/// The store is read once, at the start of the call. A launch recorded
/// while discovery is in flight does not affect the running resolve.
#[derive(Clone)]
pub struct DebugConfigurationProvider {
    store: Arc<dyn LaunchContextStore>,
    resolver: DebugConfigResolver,
}

impl std::fmt::Debug for DebugConfigurationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugConfigurationProvider")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl DebugConfigurationProvider {
    pub fn new(store: Arc<dyn LaunchContextStore>, resolver: DebugConfigResolver) -> Self {
        Self { store, resolver }
    }

    pub fn resolver(&self) -> &DebugConfigResolver {
        &self.resolver
    }

    /// Resolve the attach configuration for the most recent launch.
    pub async fn resolve_debug_configuration(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AttachConfiguration, AttachError> {
        let context = self.store.load()?;
        self.resolver.resolve(context.as_ref(), cancel).await
    }
}
