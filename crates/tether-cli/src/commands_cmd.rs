//! `tether commands`: print the debugger command groups for a remote device
//! attach without touching a device.

use anyhow::{Context, Result};

use tether_core::AttachCommands;

/// Arguments of `tether commands`.
#[derive(Debug, Clone)]
pub struct CommandsArgs {
    pub device_id: String,
    pub host_app_path: String,
    pub remote_path: String,
    pub pid: u32,
    pub label: String,
    pub continue_on_attach: bool,
    pub json: bool,
}

pub fn run_commands(args: &CommandsArgs) -> Result<()> {
    let commands = AttachCommands::build(
        &args.device_id,
        &args.host_app_path,
        &args.remote_path,
        args.pid,
        &args.label,
        args.continue_on_attach,
    );

    if args.json {
        let json = serde_json::to_string_pretty(&commands).context("failed to serialize commands")?;
        println!("{json}");
    } else {
        print!("{}", render(&commands));
    }
    Ok(())
}

/// Groups in execution order, each under a `# <group>` header.
fn render(commands: &AttachCommands) -> String {
    let mut out = String::new();
    for (group, lines) in commands.ordered() {
        out.push_str("# ");
        out.push_str(group);
        out.push('\n');
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_groups_in_order() {
        let commands = AttachCommands::build(
            "dev-1",
            "/build/MyApp.app",
            "/private/var/Bundle/A/MyApp.app/MyApp",
            812,
            "MyApp.app",
            false,
        );
        let text = render(&commands);

        let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("# ")).collect();
        assert_eq!(headers, ["# init", "# preRun", "# processCreate", "# postRun"]);
        assert!(text.contains("platform select remote-ios\n"));
        assert!(!text.contains("SIGSTOP"));
        assert!(text.ends_with("script print(\"tether: attached to MyApp.app\")\n"));
    }
}
