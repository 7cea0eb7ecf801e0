//! `tether resolve` command: print the attach configuration for the most
//! recent launch in a workspace.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use tether_core::discovery::DevicectlLister;
use tether_core::{
    AttachConfiguration, DebugConfigResolver, DebugConfigurationProvider, LaunchContextStore,
    ResolverConfig,
};

/// Run the resolve command against `store` and print the configuration as
/// JSON on stdout.
pub async fn run_resolve(
    store: Arc<dyn LaunchContextStore>,
    config: ResolverConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let resolver = DebugConfigResolver::with_lister(config, Arc::new(DevicectlLister::new()));
    let resolved = resolve_with(store, resolver, cancel).await?;

    let json =
        serde_json::to_string_pretty(&resolved).context("failed to serialize attach configuration")?;
    println!("{json}");
    Ok(())
}

/// Resolve through the provider facade. Split out so tests can supply their
/// own resolver.
pub async fn resolve_with(
    store: Arc<dyn LaunchContextStore>,
    resolver: DebugConfigResolver,
    cancel: &CancellationToken,
) -> Result<AttachConfiguration> {
    let provider = DebugConfigurationProvider::new(store, resolver);
    provider
        .resolve_debug_configuration(cancel)
        .await
        .context("failed to resolve attach configuration")
}

/// Log where the configuration will be resolved from.
pub fn log_workspace(workspace: &Path, config: &ResolverConfig) {
    tracing::debug!(
        workspace = %workspace.display(),
        debugger_root = %config.debugger_root.display(),
        debug_port = config.debug_port,
        timeout_ms = config.discovery_timeout.as_millis() as u64,
        continue_on_attach = config.continue_on_attach,
        use_cached_pid = config.use_cached_pid,
        "resolve settings"
    );
}
