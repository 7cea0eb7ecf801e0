mod commands_cmd;
mod config;
mod context_cmds;
mod resolve_cmd;
mod wait_cmd;

#[cfg(test)]
mod test_util;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use tether_core::FileStore;

use commands_cmd::CommandsArgs;
use config::{CliOverrides, TetherConfig};

#[derive(Parser)]
#[command(
    name = "tether",
    about = "Resolve debugger attach configurations for launched apps"
)]
struct Cli {
    /// Workspace root holding `.tether/state.json` (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a tether config file with default settings
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Record, show, or clear the most recent launch
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },
    /// Print the attach configuration for the most recent launch as JSON
    Resolve {
        /// Debug stub port for toolchain simulator launches
        #[arg(long)]
        port: Option<u16>,
        /// Root the debugger resolves relative source paths against
        #[arg(long)]
        debugger_root: Option<PathBuf>,
        /// How long to wait for the app on a device, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Stop the app when the debugger attaches
        #[arg(long)]
        no_continue_on_attach: bool,
        /// Attach toolchain device launches to the pid recorded at launch
        #[arg(long)]
        use_cached_pid: bool,
    },
    /// Wait for an app to appear in a device's process list
    WaitDevice {
        /// Device identifier
        device_id: String,
        /// App bundle name to look for, e.g. MyApp.app
        app_name: String,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Wait for an app to launch in a simulator and print its pid
    WaitSimulator {
        /// Simulator UDID
        simulator_id: String,
        /// Bundle identifier, e.g. com.example.MyApp
        bundle_id: String,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print the debugger commands for attaching to a device process
    Commands {
        /// Device identifier
        device_id: String,
        /// Host-side app bundle
        host_app_path: String,
        /// Executable path on the device
        remote_path: String,
        /// Process id on the device
        pid: u32,
        /// Name shown once attached (defaults to the remote executable name)
        #[arg(long)]
        label: Option<String>,
        /// Stop the app when the debugger attaches
        #[arg(long)]
        no_continue_on_attach: bool,
        /// Print the groups as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ContextCommands {
    /// Record the most recent launch
    Set {
        #[command(subcommand)]
        kind: SetContext,
    },
    /// Show the recorded launch
    Show,
    /// Forget the recorded launch
    Clear,
}

#[derive(Subcommand)]
pub enum SetContext {
    /// A macOS app running on this machine
    Host {
        /// Path of the built app
        app_path: String,
    },
    /// An app running in a simulator
    Simulator {
        /// Path of the built app
        app_path: String,
    },
    /// An app installed and launched on a physical device
    Device {
        /// Path of the staged app bundle on this machine
        app_path: String,
        /// Bundle directory name (defaults to the last component of the app path)
        #[arg(long)]
        app_name: Option<String>,
        /// Device identifier
        #[arg(long)]
        device: String,
    },
    /// A toolchain-built app running in a simulator behind a debug stub
    ToolchainSimulator {
        /// Path of the built app
        app_path: String,
        /// Build target label, e.g. //app/ios:MyApp
        #[arg(long)]
        target_label: String,
        /// Target name (defaults to the name part of the label)
        #[arg(long)]
        target_name: Option<String>,
    },
    /// A toolchain-built app launched on a physical device
    ToolchainDevice {
        /// Path of the built app
        app_path: String,
        /// Target name; the app bundle is `<target-name>.app`
        #[arg(long)]
        target_name: String,
        /// Device identifier
        #[arg(long)]
        device: String,
        /// Pid reported by the launch
        #[arg(long)]
        pid: Option<u32>,
    },
}

/// Execute the `tether init` command: write config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  debug.port = {}", cfg.debug.port);
    println!("  debug.discovery_timeout_ms = {}", cfg.debug.discovery_timeout_ms);
    println!("  debug.continue_on_attach = {}", cfg.debug.continue_on_attach);

    Ok(())
}

/// Cancellation token wired to Ctrl+C: the first signal cancels, the second
/// force-exits.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = AtomicBool::new(false);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nCancelling (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    cancel
}

/// Wait timeout for the `wait-*` commands: `--timeout-ms`, else the
/// configured discovery timeout.
fn discovery_timeout(timeout_ms: Option<u64>) -> anyhow::Result<Duration> {
    let resolved = TetherConfig::resolve(&CliOverrides {
        discovery_timeout_ms: timeout_ms,
        ..CliOverrides::default()
    })?;
    Ok(resolved.discovery_timeout)
}

/// Label for `tether commands` when none is given: the executable name.
fn default_label(remote_path: &str) -> String {
    remote_path
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(remote_path)
        .to_owned()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("failed to get current directory")?,
    };

    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
        }
        Commands::Context { command } => {
            let store = FileStore::for_workspace(&workspace);
            context_cmds::run_context_command(command, &store)?;
        }
        Commands::Resolve {
            port,
            debugger_root,
            timeout_ms,
            no_continue_on_attach,
            use_cached_pid,
        } => {
            let resolved = TetherConfig::resolve(&CliOverrides {
                debug_port: port,
                discovery_timeout_ms: timeout_ms,
                continue_on_attach: no_continue_on_attach.then_some(false),
            })?;
            let config =
                resolved.resolver_config(&workspace, debugger_root.as_deref(), use_cached_pid);
            resolve_cmd::log_workspace(&workspace, &config);

            let store = Arc::new(FileStore::for_workspace(&workspace));
            resolve_cmd::run_resolve(store, config, &shutdown_token()).await?;
        }
        Commands::WaitDevice {
            device_id,
            app_name,
            timeout_ms,
        } => {
            let timeout = discovery_timeout(timeout_ms)?;
            wait_cmd::run_wait_device(&device_id, &app_name, timeout, &shutdown_token()).await?;
        }
        Commands::WaitSimulator {
            simulator_id,
            bundle_id,
            timeout_ms,
        } => {
            let timeout = discovery_timeout(timeout_ms)?;
            wait_cmd::run_wait_simulator(&simulator_id, &bundle_id, timeout, &shutdown_token())
                .await?;
        }
        Commands::Commands {
            device_id,
            host_app_path,
            remote_path,
            pid,
            label,
            no_continue_on_attach,
            json,
        } => {
            let label = label.unwrap_or_else(|| default_label(&remote_path));
            let continue_on_attach = if no_continue_on_attach {
                false
            } else {
                TetherConfig::resolve(&CliOverrides::default())?.continue_on_attach
            };
            commands_cmd::run_commands(&CommandsArgs {
                device_id,
                host_app_path,
                remote_path,
                pid,
                label,
                continue_on_attach,
                json,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn context_kinds_parse_with_launch_kind_names() {
        for kind in tether_core::LaunchKind::ALL {
            let name = kind.as_str();
            let args: Vec<&str> = match kind {
                tether_core::LaunchKind::Host | tether_core::LaunchKind::Simulator => {
                    vec!["tether", "context", "set", name, "/build/MyApp.app"]
                }
                tether_core::LaunchKind::Device => {
                    vec!["tether", "context", "set", name, "/build/MyApp.app", "--device", "d"]
                }
                tether_core::LaunchKind::ToolchainSimulator => vec![
                    "tether",
                    "context",
                    "set",
                    name,
                    "bazel-bin/app/App.app",
                    "--target-label",
                    "//app:App",
                ],
                tether_core::LaunchKind::ToolchainDevice => vec![
                    "tether",
                    "context",
                    "set",
                    name,
                    "bazel-bin/app/App.ipa",
                    "--target-name",
                    "App",
                    "--device",
                    "d",
                ],
            };
            let cli = Cli::try_parse_from(args).unwrap_or_else(|e| panic!("{name}: {e}"));
            let Commands::Context {
                command: ContextCommands::Set { kind: set },
            } = cli.command
            else {
                panic!("{name}: expected context set");
            };
            let context = context_cmds::build_context(set).unwrap();
            assert_eq!(context.kind(), kind);
        }
    }

    #[test]
    fn resolve_flags_parse() {
        let cli = Cli::try_parse_from([
            "tether",
            "--workspace",
            "/work",
            "resolve",
            "--port",
            "7001",
            "--no-continue-on-attach",
            "--use-cached-pid",
        ])
        .unwrap();
        assert_eq!(cli.workspace, Some(PathBuf::from("/work")));
        match cli.command {
            Commands::Resolve {
                port,
                no_continue_on_attach,
                use_cached_pid,
                timeout_ms,
                ..
            } => {
                assert_eq!(port, Some(7001));
                assert!(no_continue_on_attach);
                assert!(use_cached_pid);
                assert_eq!(timeout_ms, None);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn default_label_is_executable_name() {
        assert_eq!(default_label("/private/var/Bundle/A/MyApp.app/MyApp"), "MyApp");
        assert_eq!(default_label("MyApp"), "MyApp");
    }
}
