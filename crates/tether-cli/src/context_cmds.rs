//! CLI handlers for `tether context` subcommands.
//!
//! Implements:
//! - `tether context set <kind> ...` -- record the most recent launch
//! - `tether context show`           -- print the recorded launch as JSON
//! - `tether context clear`          -- forget the recorded launch

use std::path::Path;

use anyhow::{Context, Result, bail};

use tether_core::{LaunchContext, LaunchContextStore};

use crate::{ContextCommands, SetContext};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `ContextCommands` variant to the appropriate handler.
pub fn run_context_command(command: ContextCommands, store: &dyn LaunchContextStore) -> Result<()> {
    match command {
        ContextCommands::Set { kind } => cmd_set(store, kind),
        ContextCommands::Show => cmd_show(store),
        ContextCommands::Clear => cmd_clear(store),
    }
}

// -----------------------------------------------------------------------
// tether context set <kind>
// -----------------------------------------------------------------------

fn cmd_set(store: &dyn LaunchContextStore, kind: SetContext) -> Result<()> {
    let context = build_context(kind)?;
    store
        .save(&context)
        .context("failed to record launch context")?;

    tracing::info!(kind = %context.kind(), app_path = context.app_path(), "recorded launch");
    println!("Recorded {} launch of {}", context.kind(), context.app_path());
    Ok(())
}

/// Turn the parsed `context set` arguments into a launch context.
pub fn build_context(kind: SetContext) -> Result<LaunchContext> {
    let context = match kind {
        SetContext::Host { app_path } => LaunchContext::HostProcess { app_path },
        SetContext::Simulator { app_path } => LaunchContext::SimulatorProcess { app_path },
        SetContext::Device {
            app_path,
            app_name,
            device,
        } => {
            let app_name = match app_name {
                Some(name) => name,
                None => bundle_dir_name(&app_path)?,
            };
            LaunchContext::DeviceProcess {
                app_path,
                app_name,
                destination_id: device,
            }
        }
        SetContext::ToolchainSimulator {
            app_path,
            target_label,
            target_name,
        } => {
            let target_name = match target_name {
                Some(name) => name,
                None => target_name_from_label(&target_label)?,
            };
            LaunchContext::ToolchainSimulatorProcess {
                app_path,
                target_label,
                target_name,
            }
        }
        SetContext::ToolchainDevice {
            app_path,
            target_name,
            device,
            pid,
        } => LaunchContext::ToolchainDeviceProcess {
            app_path,
            target_name,
            destination_id: device,
            pid,
        },
    };
    Ok(context)
}

/// `/build/Debug-iphoneos/MyApp.app` -> `MyApp.app`.
fn bundle_dir_name(app_path: &str) -> Result<String> {
    let trimmed = app_path.trim_end_matches('/');
    match Path::new(trimmed).file_name() {
        Some(name) => Ok(name.to_string_lossy().into_owned()),
        None => bail!("cannot derive an app name from {app_path:?}; pass --app-name"),
    }
}

/// `//app/ios:MyApp` -> `MyApp`, `//app/ios/MyApp` -> `MyApp`.
fn target_name_from_label(label: &str) -> Result<String> {
    let name = match label.rsplit_once(':') {
        Some((_, name)) => name,
        None => label.rsplit('/').next().unwrap_or(label),
    };
    if name.is_empty() {
        bail!("cannot derive a target name from {label:?}; pass --target-name");
    }
    Ok(name.to_owned())
}

// -----------------------------------------------------------------------
// tether context show / clear
// -----------------------------------------------------------------------

fn cmd_show(store: &dyn LaunchContextStore) -> Result<()> {
    match store.load().context("failed to read launch context")? {
        Some(context) => {
            let json = serde_json::to_string_pretty(&context)
                .context("failed to serialize launch context")?;
            println!("{json}");
        }
        None => println!("No launch recorded."),
    }
    Ok(())
}

fn cmd_clear(store: &dyn LaunchContextStore) -> Result<()> {
    store.clear().context("failed to clear launch context")?;
    println!("Launch context cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{FileStore, MemoryStore};

    #[test]
    fn device_app_name_defaults_to_bundle_dir() {
        let context = build_context(SetContext::Device {
            app_path: "/build/Debug-iphoneos/MyApp.app/".into(),
            app_name: None,
            device: "00008110-000A".into(),
        })
        .unwrap();
        assert_eq!(context.device_app_name().as_deref(), Some("MyApp.app"));
        assert_eq!(context.destination_id(), Some("00008110-000A"));
    }

    #[test]
    fn explicit_app_name_wins() {
        let context = build_context(SetContext::Device {
            app_path: "/build/Debug-iphoneos/MyApp.app".into(),
            app_name: Some("Other.app".into()),
            device: "d".into(),
        })
        .unwrap();
        assert_eq!(context.device_app_name().as_deref(), Some("Other.app"));
    }

    #[test]
    fn toolchain_target_name_from_label() {
        assert_eq!(target_name_from_label("//app/ios:MyApp").unwrap(), "MyApp");
        assert_eq!(target_name_from_label("//app/ios/MyApp").unwrap(), "MyApp");
        assert!(target_name_from_label("//app:").is_err());
    }

    #[test]
    fn set_then_clear_through_store() {
        let store = MemoryStore::new();
        run_context_command(
            ContextCommands::Set {
                kind: SetContext::Simulator {
                    app_path: "/build/MyApp.app".into(),
                },
            },
            &store,
        )
        .unwrap();
        assert_eq!(
            store.load().unwrap(),
            Some(LaunchContext::SimulatorProcess {
                app_path: "/build/MyApp.app".into()
            })
        );

        run_context_command(ContextCommands::Clear, &store).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn set_overwrites_previous_launch() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FileStore::for_workspace(tmp.path());

        for kind in [
            SetContext::Host {
                app_path: "/build/Mac.app".into(),
            },
            SetContext::ToolchainDevice {
                app_path: "bazel-bin/app/App.ipa".into(),
                target_name: "App".into(),
                device: "d".into(),
                pid: Some(42),
            },
        ] {
            run_context_command(ContextCommands::Set { kind }, &store).unwrap();
        }

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.kind().as_str(), "toolchain-device");
    }
}
