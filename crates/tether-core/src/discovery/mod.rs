//! Process discovery for launches the debugger cannot wait for by itself.
//!
//! Two poll loops live here, with deliberately different failure policies:
//!
//! - [`DeviceDiscovery`] polls a physical device's process list. It fails
//!   fast: a listing error or an empty list ends the wait immediately.
//! - [`SimulatorDiscovery`] polls a simulator's launch registry and then
//!   looks up the pid. Errors from either query are swallowed and the loop
//!   keeps going until its deadline.
//!
//! Both loops are bound to a deadline and a [`CancellationToken`]; a
//! cancelled token aborts the wait without waiting for the next tick.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod device;
pub mod devicectl;
pub mod simctl;
pub mod simulator;
mod tool;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use device::DeviceDiscovery;
pub use devicectl::DevicectlLister;
pub use simctl::SimctlQuery;
pub use simulator::SimulatorDiscovery;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One entry of a device's running-process list, as the device reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProcess {
    /// URI of the executable on the device. Some system processes omit it.
    #[serde(default)]
    pub executable: Option<String>,
    pub process_identifier: u32,
}

/// A discovered process: its pid and on-device executable location.
///
/// Recomputed for every resolve and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescriptor {
    pub process_id: u32,
    /// URI-like executable location, e.g. `file:///private/var/.../MyApp.app/MyApp`.
    pub executable_path: String,
}

impl ProcessDescriptor {
    /// Filesystem path of the executable on the device.
    ///
    /// Accepts `file://` URIs (percent-decoded) and plain absolute paths.
    /// Returns `None` for anything else, including an empty location.
    pub fn remote_path(&self) -> Option<String> {
        let raw = self.executable_path.trim();
        if raw.is_empty() {
            return None;
        }
        match url::Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .ok()
                .map(|path| path.to_string_lossy().into_owned()),
            Ok(_) => None,
            Err(url::ParseError::RelativeUrlWithoutBase) if raw.starts_with('/') => {
                Some(raw.to_owned())
            }
            Err(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// External capabilities
// ---------------------------------------------------------------------------

/// Lists the processes running on a physical device.
#[async_trait]
pub trait DeviceProcessLister: Send + Sync {
    /// Short name of the backend, for logs.
    fn name(&self) -> &str;

    /// Return the device's running processes in device-reported order.
    async fn list_processes(&self, device_id: &str) -> Result<Vec<DeviceProcess>>;
}

/// Queries a simulator for launched apps.
#[async_trait]
pub trait SimulatorQuery: Send + Sync {
    /// Short name of the backend, for logs.
    fn name(&self) -> &str;

    /// Raw launch registry listing; contains the bundle identifiers of
    /// apps the simulator has launched.
    async fn launch_registry(&self, simulator_id: &str) -> Result<String>;

    /// Pid of the app with `bundle_id`, if it is running.
    async fn find_pid(&self, simulator_id: &str, bundle_id: &str) -> Result<Option<u32>>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn DeviceProcessLister, _: &dyn SimulatorQuery) {}
};
