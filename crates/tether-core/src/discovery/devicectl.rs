//! Device process listing through `xcrun devicectl`.
//!
//! `devicectl device info processes` only writes machine-readable output to
//! a file, so each listing goes through a temporary JSON file.

use std::ffi::OsStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::tool::ToolCommand;
use super::{DeviceProcess, DeviceProcessLister};

/// [`DeviceProcessLister`] backed by `xcrun devicectl`.
#[derive(Debug, Clone)]
pub struct DevicectlLister {
    tool: ToolCommand,
}

impl DevicectlLister {
    /// Use `xcrun` from `$PATH`.
    pub fn new() -> Self {
        Self::with_command("xcrun", Vec::new())
    }

    /// Use a custom program in place of `xcrun`, with `leading_args`
    /// inserted before the `devicectl ...` arguments.
    pub fn with_command(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            tool: ToolCommand::new(program, leading_args),
        }
    }
}

impl Default for DevicectlLister {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProcessLister for DevicectlLister {
    fn name(&self) -> &str {
        "devicectl"
    }

    async fn list_processes(&self, device_id: &str) -> Result<Vec<DeviceProcess>> {
        let output_file = tempfile::Builder::new()
            .prefix("tether-processes-")
            .suffix(".json")
            .tempfile()
            .context("failed to create devicectl output file")?;

        let mut args: Vec<&OsStr> = [
            "devicectl",
            "device",
            "info",
            "processes",
            "--device",
            device_id,
            "--json-output",
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();
        args.push(output_file.path().as_os_str());

        self.tool.run(args).await?;

        let contents = tokio::fs::read_to_string(output_file.path())
            .await
            .context("failed to read devicectl output file")?;
        parse_process_listing(&contents)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    result: ListingResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingResult {
    #[serde(default)]
    running_processes: Vec<DeviceProcess>,
}

/// Parse the JSON document written by `devicectl device info processes`.
pub fn parse_process_listing(json: &str) -> Result<Vec<DeviceProcess>> {
    let listing: Listing =
        serde_json::from_str(json).context("malformed devicectl process listing")?;
    Ok(listing.result.running_processes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "info": {"arguments": ["devicectl"], "outcome": "success"},
        "result": {
            "deviceIdentifier": "00008110-000A",
            "runningProcesses": [
                {"executable": "file:///usr/libexec/backboardd", "processIdentifier": 33},
                {"processIdentifier": 34},
                {"executable": "file:///private/var/containers/Bundle/Application/ABC/MyApp.app/MyApp", "processIdentifier": 812}
            ]
        }
    }"#;

    #[test]
    fn parses_running_processes_in_order() {
        let processes = parse_process_listing(LISTING).unwrap();
        assert_eq!(processes.len(), 3);
        assert_eq!(processes[0].process_identifier, 33);
        assert!(processes[1].executable.is_none());
        assert_eq!(processes[2].process_identifier, 812);
    }

    #[test]
    fn missing_process_array_is_empty() {
        let processes = parse_process_listing(r#"{"result": {}}"#).unwrap();
        assert!(processes.is_empty());
    }

    #[test]
    fn malformed_listing_is_an_error() {
        let err = parse_process_listing("not json").unwrap_err();
        assert!(err.to_string().contains("malformed devicectl process listing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lists_processes_through_tool() {
        let tmp = tempfile::TempDir::new().unwrap();
        let script = tmp.path().join("fake-xcrun.sh");
        std::fs::write(
            &script,
            format!(
                "out=\"\"\n\
                 while [ $# -gt 0 ]; do\n\
                   if [ \"$1\" = \"--json-output\" ]; then out=\"$2\"; fi\n\
                   shift\n\
                 done\n\
                 cat > \"$out\" <<'JSON'\n{LISTING}\nJSON\n"
            ),
        )
        .unwrap();

        let lister =
            DevicectlLister::with_command("sh", vec![script.to_string_lossy().into_owned()]);
        let processes = lister.list_processes("00008110-000A").await.unwrap();
        assert_eq!(processes.len(), 3);
        assert_eq!(processes[2].process_identifier, 812);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_failure_carries_stderr() {
        let tmp = tempfile::TempDir::new().unwrap();
        let script = tmp.path().join("failing-xcrun.sh");
        std::fs::write(&script, "echo 'device not paired' >&2\nexit 1\n").unwrap();

        let lister =
            DevicectlLister::with_command("sh", vec![script.to_string_lossy().into_owned()]);
        let err = lister.list_processes("dev").await.unwrap_err();
        assert!(
            err.to_string().contains("device not paired"),
            "unexpected error: {err}"
        );
    }
}
