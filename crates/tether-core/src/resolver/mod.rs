//! Debug config resolver: turns a launch context into an attach
//! configuration.
//!
//! Host and simulator launches run on the debugger's machine, so the
//! debugger can wait for the process itself. Toolchain simulator launches
//! already have a debug stub listening. Device launches need the pid and
//! on-device executable location first, which only process discovery can
//! provide.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::attach::{AttachCommands, AttachConfiguration};
use crate::context::{self, LaunchContext};
use crate::discovery::{DeviceDiscovery, DeviceProcessLister, ProcessDescriptor};
use crate::error::AttachError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options that shape the produced attach configuration.
///
/// Use [`ResolverConfig::new`] for the defaults, then chain setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Forward the attach stop signal to the app instead of stopping.
    pub continue_on_attach: bool,
    /// Port of the debug stub for toolchain simulator launches.
    pub debug_port: u16,
    /// Root the debugger resolves relative source paths against.
    pub debugger_root: PathBuf,
    /// How long device discovery may wait for the process.
    pub discovery_timeout: Duration,
    /// Attach toolchain device launches to the pid recorded at launch
    /// instead of waiting for the process by name.
    pub use_cached_pid: bool,
}

impl ResolverConfig {
    pub const DEFAULT_DEBUG_PORT: u16 = 6667;

    /// Defaults, with the debugger root set to `workspace_root`:
    /// - `continue_on_attach`: `true`
    /// - `debug_port`: `6667`
    /// - `discovery_timeout`: 15 s
    /// - `use_cached_pid`: `false`
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            continue_on_attach: true,
            debug_port: Self::DEFAULT_DEBUG_PORT,
            debugger_root: workspace_root.into(),
            discovery_timeout: DeviceDiscovery::DEFAULT_TIMEOUT,
            use_cached_pid: false,
        }
    }

    pub fn continue_on_attach(mut self, value: bool) -> Self {
        self.continue_on_attach = value;
        self
    }

    pub fn debug_port(mut self, port: u16) -> Self {
        self.debug_port = port;
        self
    }

    pub fn debugger_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.debugger_root = root.into();
        self
    }

    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn use_cached_pid(mut self, value: bool) -> Self {
        self.use_cached_pid = value;
        self
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves the attach configuration for a launch context.
#[derive(Debug, Clone)]
pub struct DebugConfigResolver {
    config: ResolverConfig,
    device: DeviceDiscovery,
}

impl DebugConfigResolver {
    pub fn new(config: ResolverConfig, device: DeviceDiscovery) -> Self {
        Self { config, device }
    }

    /// Resolver using `lister` with the default device poll interval.
    pub fn with_lister(config: ResolverConfig, lister: Arc<dyn DeviceProcessLister>) -> Self {
        Self::new(config, DeviceDiscovery::new(lister))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the attach configuration for `context`.
    ///
    /// `None` means nothing has been launched yet. Device launches block on
    /// process discovery until the process appears, the discovery timeout
    /// elapses, or `cancel` fires.
    pub async fn resolve(
        &self,
        context: Option<&LaunchContext>,
        cancel: &CancellationToken,
    ) -> Result<AttachConfiguration, AttachError> {
        let context = context.ok_or(AttachError::MissingLaunchContext)?;

        info!(
            kind = %context.kind(),
            app_path = context.app_path(),
            "resolving attach configuration"
        );

        let resolved = match context {
            LaunchContext::HostProcess { app_path } | LaunchContext::SimulatorProcess { app_path } => {
                AttachConfiguration::local(app_path.as_str())
            }

            LaunchContext::ToolchainSimulatorProcess { target_label, .. } => {
                debug!(
                    target_label = %target_label,
                    port = self.config.debug_port,
                    "attaching through debug stub"
                );
                AttachConfiguration::port(
                    self.config.debug_port,
                    self.config.debugger_root.to_string_lossy(),
                )
            }

            LaunchContext::DeviceProcess {
                app_path,
                app_name,
                destination_id,
            } => {
                let descriptor = self
                    .device
                    .wait_for_process(
                        destination_id,
                        app_name,
                        self.config.discovery_timeout,
                        cancel,
                    )
                    .await?;
                self.remote_attach(destination_id, app_path, &descriptor, app_name)?
            }

            LaunchContext::ToolchainDeviceProcess {
                app_path,
                target_name,
                destination_id,
                pid,
            } => {
                let descriptor = if self.config.use_cached_pid {
                    let pid = pid.ok_or_else(|| AttachError::MissingPid {
                        target: target_name.clone(),
                    })?;
                    self.device
                        .find_process_by_pid(
                            destination_id,
                            pid,
                            self.config.discovery_timeout,
                            cancel,
                        )
                        .await?
                } else {
                    self.device
                        .wait_for_process(
                            destination_id,
                            &context::bundle_name(target_name),
                            self.config.discovery_timeout,
                            cancel,
                        )
                        .await?
                };
                self.remote_attach(destination_id, app_path, &descriptor, target_name)?
            }
        };

        info!(
            kind = %context.kind(),
            config_type = resolved.type_name(),
            "resolved attach configuration"
        );
        Ok(resolved)
    }

    fn remote_attach(
        &self,
        device_id: &str,
        app_path: &str,
        descriptor: &ProcessDescriptor,
        label: &str,
    ) -> Result<AttachConfiguration, AttachError> {
        let pid = descriptor.process_id;
        let remote_path = descriptor
            .remote_path()
            .ok_or(AttachError::NoExecutablePath { pid })?;

        let commands = AttachCommands::build(
            device_id,
            app_path,
            &remote_path,
            pid,
            label,
            self.config.continue_on_attach,
        );
        Ok(AttachConfiguration::remote_device(app_path, pid, commands))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ResolverConfig::new("/work");
        assert!(config.continue_on_attach);
        assert_eq!(config.debug_port, 6667);
        assert_eq!(config.debugger_root, PathBuf::from("/work"));
        assert_eq!(config.discovery_timeout, Duration::from_millis(15_000));
        assert!(!config.use_cached_pid);
    }

    #[test]
    fn config_builder_sets_fields() {
        let config = ResolverConfig::new("/work")
            .continue_on_attach(false)
            .debug_port(7000)
            .debugger_root("/src")
            .discovery_timeout(Duration::from_secs(3))
            .use_cached_pid(true);
        assert!(!config.continue_on_attach);
        assert_eq!(config.debug_port, 7000);
        assert_eq!(config.debugger_root, PathBuf::from("/src"));
        assert_eq!(config.discovery_timeout, Duration::from_secs(3));
        assert!(config.use_cached_pid);
    }
}
