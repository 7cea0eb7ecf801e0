//! Simulator queries through `xcrun simctl`.
//!
//! Both queries read `launchctl list` inside the simulator. Its rows look
//! like `<pid>\t<status>\t<label>`, with `-` as the pid of jobs that are
//! registered but not running, and app jobs labelled
//! `UIKitApplication:<bundle id>[<suffix>]`.

use anyhow::Result;
use async_trait::async_trait;

use super::SimulatorQuery;
use super::tool::ToolCommand;

/// [`SimulatorQuery`] backed by `xcrun simctl spawn <udid> launchctl list`.
#[derive(Debug, Clone)]
pub struct SimctlQuery {
    tool: ToolCommand,
}

impl SimctlQuery {
    /// Use `xcrun` from `$PATH`.
    pub fn new() -> Self {
        Self::with_command("xcrun", Vec::new())
    }

    /// Use a custom program in place of `xcrun`, with `leading_args`
    /// inserted before the `simctl ...` arguments.
    pub fn with_command(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            tool: ToolCommand::new(program, leading_args),
        }
    }

    async fn launchctl_list(&self, simulator_id: &str) -> Result<String> {
        self.tool
            .run(["simctl", "spawn", simulator_id, "launchctl", "list"])
            .await
    }
}

impl Default for SimctlQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimulatorQuery for SimctlQuery {
    fn name(&self) -> &str {
        "simctl"
    }

    async fn launch_registry(&self, simulator_id: &str) -> Result<String> {
        self.launchctl_list(simulator_id).await
    }

    async fn find_pid(&self, simulator_id: &str, bundle_id: &str) -> Result<Option<u32>> {
        let listing = self.launchctl_list(simulator_id).await?;
        Ok(pid_for_bundle(&listing, bundle_id))
    }
}

/// Pid column of the app row for `bundle_id` in a `launchctl list` listing.
pub fn pid_for_bundle(listing: &str, bundle_id: &str) -> Option<u32> {
    let app_label = format!("UIKitApplication:{bundle_id}[");
    listing.lines().find_map(|line| {
        let mut columns = line.split_whitespace();
        let pid = columns.next()?;
        let _status = columns.next()?;
        let label = columns.next()?;
        if label.starts_with(&app_label) || label == bundle_id {
            pid.parse().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "PID\tStatus\tLabel\n\
        -\t0\tcom.apple.springboard.backgroundappservices\n\
        4821\t0\tUIKitApplication:com.example.MyApp[2f1c][rb-legacy]\n\
        4822\t0\tUIKitApplication:com.example.MyAppExtension[aa01][rb-legacy]\n";

    #[test]
    fn finds_pid_of_app_row() {
        assert_eq!(pid_for_bundle(LISTING, "com.example.MyApp"), Some(4821));
        assert_eq!(
            pid_for_bundle(LISTING, "com.example.MyAppExtension"),
            Some(4822)
        );
    }

    #[test]
    fn registered_but_not_running_has_no_pid() {
        let listing = "-\t0\tUIKitApplication:com.example.MyApp[2f1c][rb-legacy]\n";
        assert_eq!(pid_for_bundle(listing, "com.example.MyApp"), None);
    }

    #[test]
    fn absent_bundle_has_no_pid() {
        assert_eq!(pid_for_bundle(LISTING, "com.example.Other"), None);
        assert_eq!(pid_for_bundle("", "com.example.MyApp"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn queries_run_launchctl_inside_simulator() {
        let tmp = tempfile::TempDir::new().unwrap();
        let script = tmp.path().join("fake-xcrun.sh");
        std::fs::write(
            &script,
            "[ \"$1 $2 $3 $4 $5\" = \"simctl spawn SIM-1 launchctl list\" ] || exit 2\n\
             printf '4821\\t0\\tUIKitApplication:com.example.MyApp[2f1c]\\n'\n",
        )
        .unwrap();

        let query = SimctlQuery::with_command("sh", vec![script.to_string_lossy().into_owned()]);
        let registry = query.launch_registry("SIM-1").await.unwrap();
        assert!(registry.contains("com.example.MyApp"));
        assert_eq!(
            query.find_pid("SIM-1", "com.example.MyApp").await.unwrap(),
            Some(4821)
        );
        assert!(query.launch_registry("SIM-2").await.is_err());
    }
}
