//! Attach configurations handed to the debugger.

pub mod commands;

use serde::{Deserialize, Serialize};

pub use commands::AttachCommands;

/// Overall timeout (ms) the debugger gets to connect to a debug stub.
pub const PORT_ATTACH_TIMEOUT_MS: u64 = 100_000;

/// The finalized attach configuration for one debug session.
///
/// Produced once per resolve and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttachConfiguration {
    /// The debugger waits for the process to start on the local machine.
    #[serde(rename = "attach-local")]
    LocalAttach(LocalAttach),

    /// The debugger connects to a debug stub already listening on a port.
    #[serde(rename = "attach-port")]
    PortAttach(PortAttach),

    /// The debugger attaches to a discovered process on a physical device.
    #[serde(rename = "attach-remote")]
    RemoteDeviceAttach(RemoteDeviceAttach),
}

/// Debug adapter request kind. Every configuration here is an attach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachRequest {
    #[default]
    #[serde(rename = "attach")]
    Attach,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAttach {
    pub request: AttachRequest,
    pub program: String,
    pub wait_for: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAttach {
    pub request: AttachRequest,
    pub attach_commands: Vec<String>,
    pub debugger_root: String,
    /// Milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDeviceAttach {
    pub request: AttachRequest,
    pub program: String,
    pub pid: u32,
    pub init_commands: Vec<String>,
    pub pre_run_commands: Vec<String>,
    pub process_create_commands: Vec<String>,
    pub post_run_commands: Vec<String>,
}

impl AttachConfiguration {
    /// Attach by waiting for `program` to launch on this machine.
    pub fn local(program: impl Into<String>) -> Self {
        Self::LocalAttach(LocalAttach {
            request: AttachRequest::Attach,
            program: program.into(),
            wait_for: true,
        })
    }

    /// Attach through a debug stub listening on `localhost:<port>`.
    ///
    /// The single attach command is the full lldb command
    /// `process connect connect://localhost:<port>`, not the bare URL. A
    /// debugger runs `attachCommands` verbatim, and a bare URL is not a
    /// command lldb accepts.
    pub fn port(port: u16, debugger_root: impl Into<String>) -> Self {
        Self::PortAttach(PortAttach {
            request: AttachRequest::Attach,
            attach_commands: vec![format!("process connect connect://localhost:{port}")],
            debugger_root: debugger_root.into(),
            timeout: PORT_ATTACH_TIMEOUT_MS,
        })
    }

    /// Attach to `pid` on a device using pre-built command groups.
    pub fn remote_device(program: impl Into<String>, pid: u32, commands: AttachCommands) -> Self {
        let AttachCommands {
            init,
            pre_run,
            process_create,
            post_run,
        } = commands;
        Self::RemoteDeviceAttach(RemoteDeviceAttach {
            request: AttachRequest::Attach,
            program: program.into(),
            pid,
            init_commands: init,
            pre_run_commands: pre_run,
            process_create_commands: process_create,
            post_run_commands: post_run,
        })
    }

    /// The `type` tag of this configuration.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LocalAttach(_) => "attach-local",
            Self::PortAttach(_) => "attach-port",
            Self::RemoteDeviceAttach(_) => "attach-remote",
        }
    }
}
