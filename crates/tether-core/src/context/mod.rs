//! Launch contexts: what was launched, and where.
//!
//! A [`LaunchContext`] is written by the launch workflow after an app starts
//! and read back when a debug session begins. Exactly one variant is active;
//! the resolver matches on it exhaustively.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LaunchContext
// ---------------------------------------------------------------------------

/// Description of the most recently launched app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum LaunchContext {
    /// A macOS app running directly on the host.
    #[serde(rename = "host")]
    HostProcess { app_path: String },

    /// An app running in a simulator on the host.
    #[serde(rename = "simulator")]
    SimulatorProcess { app_path: String },

    /// An app installed and launched on a physical device.
    #[serde(rename = "device")]
    DeviceProcess {
        /// Host-side staged `.app` bundle.
        app_path: String,
        /// Bundle directory name, e.g. `MyApp.app`.
        app_name: String,
        /// Device identifier as understood by the device tooling.
        destination_id: String,
    },

    /// A toolchain-built app running in a simulator behind a debug stub.
    #[serde(rename = "toolchain-simulator")]
    ToolchainSimulatorProcess {
        app_path: String,
        target_label: String,
        target_name: String,
    },

    /// A toolchain-built app launched on a physical device.
    #[serde(rename = "toolchain-device")]
    ToolchainDeviceProcess {
        app_path: String,
        target_name: String,
        destination_id: String,
        /// Pid reported by the launch, when the launcher captured one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
    },
}

impl LaunchContext {
    /// The variant tag, as stored in the workspace state.
    pub fn kind(&self) -> LaunchKind {
        match self {
            Self::HostProcess { .. } => LaunchKind::Host,
            Self::SimulatorProcess { .. } => LaunchKind::Simulator,
            Self::DeviceProcess { .. } => LaunchKind::Device,
            Self::ToolchainSimulatorProcess { .. } => LaunchKind::ToolchainSimulator,
            Self::ToolchainDeviceProcess { .. } => LaunchKind::ToolchainDevice,
        }
    }

    /// Host-side path of the launched app.
    pub fn app_path(&self) -> &str {
        match self {
            Self::HostProcess { app_path }
            | Self::SimulatorProcess { app_path }
            | Self::DeviceProcess { app_path, .. }
            | Self::ToolchainSimulatorProcess { app_path, .. }
            | Self::ToolchainDeviceProcess { app_path, .. } => app_path,
        }
    }

    /// Device identifier for contexts that run on a physical device.
    pub fn destination_id(&self) -> Option<&str> {
        match self {
            Self::DeviceProcess { destination_id, .. }
            | Self::ToolchainDeviceProcess { destination_id, .. } => Some(destination_id),
            Self::HostProcess { .. }
            | Self::SimulatorProcess { .. }
            | Self::ToolchainSimulatorProcess { .. } => None,
        }
    }

    /// Name to search for in the device's process list.
    ///
    /// Toolchain device launches only know the target name, so the bundle
    /// directory name is derived by appending `.app`. A target name that
    /// already ends in `.app` is used as is rather than becoming
    /// `<name>.app.app`.
    pub fn device_app_name(&self) -> Option<String> {
        match self {
            Self::DeviceProcess { app_name, .. } => Some(app_name.clone()),
            Self::ToolchainDeviceProcess { target_name, .. } => Some(bundle_name(target_name)),
            Self::HostProcess { .. }
            | Self::SimulatorProcess { .. }
            | Self::ToolchainSimulatorProcess { .. } => None,
        }
    }
}

/// Bundle directory name for a toolchain target, e.g. `App` -> `App.app`.
pub(crate) fn bundle_name(target_name: &str) -> String {
    if target_name.ends_with(".app") {
        target_name.to_owned()
    } else {
        format!("{target_name}.app")
    }
}

// ---------------------------------------------------------------------------
// LaunchKind
// ---------------------------------------------------------------------------

/// The five launch context kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchKind {
    Host,
    Simulator,
    Device,
    ToolchainSimulator,
    ToolchainDevice,
}

impl LaunchKind {
    /// Every kind, in declaration order.
    pub const ALL: [LaunchKind; 5] = [
        Self::Host,
        Self::Simulator,
        Self::Device,
        Self::ToolchainSimulator,
        Self::ToolchainDevice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Simulator => "simulator",
            Self::Device => "device",
            Self::ToolchainSimulator => "toolchain-simulator",
            Self::ToolchainDevice => "toolchain-device",
        }
    }
}

impl fmt::Display for LaunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchKind {
    type Err = LaunchKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LaunchKindParseError(s.to_owned()))
    }
}

/// Error returned when parsing an unknown [`LaunchKind`] tag.
#[derive(Debug, Clone)]
pub struct LaunchKindParseError(pub String);

impl fmt::Display for LaunchKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown launch kind: {:?}", self.0)
    }
}

impl std::error::Error for LaunchKindParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device() -> LaunchContext {
        LaunchContext::DeviceProcess {
            app_path: "/build/Debug-iphoneos/MyApp.app".into(),
            app_name: "MyApp.app".into(),
            destination_id: "00008110-000A".into(),
        }
    }

    #[test]
    fn serializes_with_type_tag_and_camel_case_fields() {
        let value = serde_json::to_value(device()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "device",
                "appPath": "/build/Debug-iphoneos/MyApp.app",
                "appName": "MyApp.app",
                "destinationId": "00008110-000A",
            })
        );
    }

    #[test]
    fn toolchain_device_pid_is_optional() {
        let ctx: LaunchContext = serde_json::from_value(json!({
            "type": "toolchain-device",
            "appPath": "bazel-bin/app/App.ipa",
            "targetName": "App",
            "destinationId": "dev-1",
        }))
        .unwrap();
        assert_eq!(
            ctx,
            LaunchContext::ToolchainDeviceProcess {
                app_path: "bazel-bin/app/App.ipa".into(),
                target_name: "App".into(),
                destination_id: "dev-1".into(),
                pid: None,
            }
        );
    }

    #[test]
    fn kind_tags_match_serde_tags() {
        let contexts = [
            LaunchContext::HostProcess { app_path: "a".into() },
            LaunchContext::SimulatorProcess { app_path: "a".into() },
            device(),
            LaunchContext::ToolchainSimulatorProcess {
                app_path: "a".into(),
                target_label: "//app:App".into(),
                target_name: "App".into(),
            },
            LaunchContext::ToolchainDeviceProcess {
                app_path: "a".into(),
                target_name: "App".into(),
                destination_id: "d".into(),
                pid: Some(7),
            },
        ];
        for ctx in contexts {
            let value = serde_json::to_value(&ctx).unwrap();
            assert_eq!(value["type"], ctx.kind().as_str());
            assert_eq!(ctx.kind().as_str().parse::<LaunchKind>().unwrap(), ctx.kind());
        }
    }

    #[test]
    fn device_app_name_appends_bundle_suffix_for_toolchain() {
        let ctx = LaunchContext::ToolchainDeviceProcess {
            app_path: "a".into(),
            target_name: "App".into(),
            destination_id: "d".into(),
            pid: None,
        };
        assert_eq!(ctx.device_app_name().as_deref(), Some("App.app"));

        let ctx = LaunchContext::ToolchainDeviceProcess {
            app_path: "a".into(),
            target_name: "App.app".into(),
            destination_id: "d".into(),
            pid: None,
        };
        assert_eq!(ctx.device_app_name().as_deref(), Some("App.app"));
        assert_eq!(device().device_app_name().as_deref(), Some("MyApp.app"));
    }

    #[test]
    fn non_device_contexts_have_no_destination() {
        let ctx = LaunchContext::SimulatorProcess { app_path: "a".into() };
        assert!(ctx.destination_id().is_none());
        assert!(ctx.device_app_name().is_none());
        assert_eq!(device().destination_id(), Some("00008110-000A"));
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let err = "watch-device".parse::<LaunchKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown launch kind: \"watch-device\"");
    }
}
