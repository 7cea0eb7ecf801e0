//! `tether wait-device` and `tether wait-simulator`: block until an app's
//! process shows up, then print what was found.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use tether_core::discovery::{DeviceDiscovery, DevicectlLister, SimctlQuery, SimulatorDiscovery};
use tether_core::ProcessDescriptor;

/// JSON printed by `wait-device`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceProcessReport<'a> {
    #[serde(flatten)]
    process: &'a ProcessDescriptor,
    remote_path: Option<String>,
}

/// JSON printed by `wait-simulator`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulatorProcessReport<'a> {
    simulator_id: &'a str,
    bundle_id: &'a str,
    pid: u32,
}

pub async fn run_wait_device(
    device_id: &str,
    app_name: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let discovery = DeviceDiscovery::new(Arc::new(DevicectlLister::new()));
    let process = discovery
        .wait_for_process(device_id, app_name, timeout, cancel)
        .await
        .with_context(|| format!("{app_name} did not start on device {device_id}"))?;

    let report = DeviceProcessReport {
        remote_path: process.remote_path(),
        process: &process,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize process")?
    );
    Ok(())
}

pub async fn run_wait_simulator(
    simulator_id: &str,
    bundle_id: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let discovery = SimulatorDiscovery::new(Arc::new(SimctlQuery::new()));
    let pid = discovery
        .wait_for_simulator_process_to_launch(simulator_id, bundle_id, timeout, cancel)
        .await
        .with_context(|| format!("{bundle_id} did not launch in simulator {simulator_id}"))?;

    let report = SimulatorProcessReport {
        simulator_id,
        bundle_id,
        pid,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize process")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_report_flattens_descriptor() {
        let process = ProcessDescriptor {
            process_id: 812,
            executable_path: "file:///private/var/Bundle/A/MyApp.app/MyApp".into(),
        };
        let report = DeviceProcessReport {
            remote_path: process.remote_path(),
            process: &process,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["processId"], 812);
        assert_eq!(
            value["executablePath"],
            "file:///private/var/Bundle/A/MyApp.app/MyApp"
        );
        assert_eq!(value["remotePath"], "/private/var/Bundle/A/MyApp.app/MyApp");
    }
}
