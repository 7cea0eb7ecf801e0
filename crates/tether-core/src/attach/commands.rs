//! Debugger command groups for attaching to a process on a physical device.
//!
//! The groups run in a fixed order: init, pre-run, process-create,
//! post-run. The module file spec rewrite in pre-run must be in place
//! before process-create attaches, or breakpoints resolve against the
//! host build output instead of the binary actually running on the device.

use serde::Serialize;

/// Remote platform the debugger must select for iOS-family devices.
pub const REMOTE_PLATFORM: &str = "remote-ios";

/// Signal the device sends the debugger when the attach handshake completes.
pub const ATTACH_STOP_SIGNAL: &str = "SIGSTOP";

/// The four ordered command groups of a remote device attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachCommands {
    pub init: Vec<String>,
    pub pre_run: Vec<String>,
    pub process_create: Vec<String>,
    pub post_run: Vec<String>,
}

impl AttachCommands {
    /// Build the command groups for attaching to `pid` on `device_id`.
    ///
    /// `host_app_path` is the staged binary the debugger would otherwise
    /// load symbols for; the pre-run group points the primary module at
    /// `remote_executable_path` instead. With `continue_on_attach`, the
    /// attach stop signal is forwarded to the app without stopping the
    /// debugger or notifying the user.
    pub fn build(
        device_id: &str,
        host_app_path: &str,
        remote_executable_path: &str,
        pid: u32,
        label: &str,
        continue_on_attach: bool,
    ) -> Self {
        tracing::debug!(
            device_id,
            host_app_path,
            remote_executable_path,
            pid,
            continue_on_attach,
            "building remote attach commands"
        );

        let mut init = vec![format!("platform select {REMOTE_PLATFORM}")];
        if continue_on_attach {
            init.push(format!(
                "process handle {ATTACH_STOP_SIGNAL} --pass true --stop false --notify false"
            ));
        }

        let pre_run = vec![format!(
            "script lldb.target.module[0].SetPlatformFileSpec(lldb.SBFileSpec('{}'))",
            python_single_quoted(remote_executable_path)
        )];

        let process_create = vec![
            handle_command(&format!("device select {device_id}")),
            handle_command(&format!("device process attach --continue --pid {pid}")),
        ];

        let post_run = vec![format!(
            "script print(\"tether: attached to {}\")",
            python_double_quoted(label)
        )];

        Self {
            init,
            pre_run,
            process_create,
            post_run,
        }
    }

    /// The groups in execution order.
    pub fn ordered(&self) -> [(&'static str, &[String]); 4] {
        [
            ("init", self.init.as_slice()),
            ("preRun", self.pre_run.as_slice()),
            ("processCreate", self.process_create.as_slice()),
            ("postRun", self.post_run.as_slice()),
        ]
    }
}

/// Run a debugger command from the embedded interpreter.
///
/// The `device` command family is only reachable through the scripting
/// bridge from an attach configuration.
fn handle_command(command: &str) -> String {
    format!(
        "script lldb.debugger.HandleCommand(\"{}\")",
        python_double_quoted(command)
    )
}

fn python_single_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn python_double_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(continue_on_attach: bool) -> AttachCommands {
        AttachCommands::build(
            "00008110-000A",
            "/build/Debug-iphoneos/MyApp.app",
            "/private/var/containers/Bundle/Application/ABC/MyApp.app/MyApp",
            812,
            "MyApp.app",
            continue_on_attach,
        )
    }

    #[test]
    fn builds_all_four_groups() {
        let commands = build(true);
        assert_eq!(
            commands.init,
            vec![
                "platform select remote-ios",
                "process handle SIGSTOP --pass true --stop false --notify false",
            ]
        );
        assert_eq!(
            commands.pre_run,
            vec![
                "script lldb.target.module[0].SetPlatformFileSpec(lldb.SBFileSpec('/private/var/containers/Bundle/Application/ABC/MyApp.app/MyApp'))"
            ]
        );
        assert_eq!(
            commands.process_create,
            vec![
                "script lldb.debugger.HandleCommand(\"device select 00008110-000A\")",
                "script lldb.debugger.HandleCommand(\"device process attach --continue --pid 812\")",
            ]
        );
        assert_eq!(
            commands.post_run,
            vec!["script print(\"tether: attached to MyApp.app\")"]
        );
    }

    #[test]
    fn continue_on_attach_only_changes_init() {
        let with = build(true);
        let without = build(false);

        assert_eq!(without.init, vec!["platform select remote-ios"]);
        assert!(with.init.iter().any(|c| c.contains(ATTACH_STOP_SIGNAL)));
        assert!(!without.init.iter().any(|c| c.contains(ATTACH_STOP_SIGNAL)));
        assert_eq!(with.pre_run, without.pre_run);
        assert_eq!(with.process_create, without.process_create);
        assert_eq!(with.post_run, without.post_run);
    }

    #[test]
    fn ordered_puts_rewrite_before_attach() {
        let commands = build(true);
        let names: Vec<&str> = commands.ordered().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["init", "preRun", "processCreate", "postRun"]);

        let flat: Vec<&String> = commands
            .ordered()
            .into_iter()
            .flat_map(|(_, group)| group.iter())
            .collect();
        let rewrite = flat
            .iter()
            .position(|c| c.contains("SetPlatformFileSpec"))
            .unwrap();
        let attach = flat
            .iter()
            .position(|c| c.contains("device process attach"))
            .unwrap();
        assert!(rewrite < attach);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        assert_eq!(build(true), build(true));
        assert_eq!(build(false), build(false));
    }

    #[test]
    fn quotes_are_escaped() {
        let commands = AttachCommands::build(
            "dev",
            "/host/It's.app",
            "/private/var/Bundle/It's.app/It's",
            1,
            "Say \"hi\"",
            false,
        );
        assert_eq!(
            commands.pre_run[0],
            "script lldb.target.module[0].SetPlatformFileSpec(lldb.SBFileSpec('/private/var/Bundle/It\\'s.app/It\\'s'))"
        );
        assert_eq!(
            commands.post_run[0],
            "script print(\"tether: attached to Say \\\"hi\\\"\")"
        );
    }
}
