//! Shared test utilities for tether integration tests.
//!
//! Provides scripted stand-ins for the external device and simulator
//! tooling. Each fake replays a fixed sequence of responses, repeating the
//! last one once the script runs out, and counts how often it was called.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use tether_core::{DeviceProcess, DeviceProcessLister, LaunchContext, SimulatorQuery};

/// Device identifier used throughout the tests.
pub const DEVICE_ID: &str = "00008110-000A1B2C3D4E";
/// Simulator identifier used throughout the tests.
pub const SIMULATOR_ID: &str = "5C3A0F2E-1D4B-4C8A-9E7F-0123456789AB";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A device process entry.
pub fn process(executable: &str, pid: u32) -> DeviceProcess {
    DeviceProcess {
        executable: Some(executable.to_string()),
        process_identifier: pid,
    }
}

/// On-device executable URI for an installed app bundle such as `MyApp.app`.
pub fn app_executable(app_name: &str) -> String {
    let binary = app_name.strip_suffix(".app").unwrap_or(app_name);
    format!("file:///private/var/containers/Bundle/Application/3F2A7C10/{app_name}/{binary}")
}

/// A process listing entry for an installed app bundle.
pub fn app_process(app_name: &str, pid: u32) -> DeviceProcess {
    process(&app_executable(app_name), pid)
}

/// A handful of system daemons that are always running on a device.
pub fn system_processes() -> Vec<DeviceProcess> {
    vec![
        process("file:///usr/libexec/backboardd", 33),
        DeviceProcess {
            executable: None,
            process_identifier: 34,
        },
        process("file:///System/Library/CoreServices/SpringBoard.app/SpringBoard", 57),
    ]
}

/// One launch context of every kind.
pub fn all_launch_contexts() -> Vec<LaunchContext> {
    vec![
        LaunchContext::HostProcess {
            app_path: "/build/Debug/MyMacApp.app".into(),
        },
        LaunchContext::SimulatorProcess {
            app_path: "/build/Debug-iphonesimulator/MyApp.app".into(),
        },
        LaunchContext::DeviceProcess {
            app_path: "/build/Debug-iphoneos/MyApp.app".into(),
            app_name: "MyApp.app".into(),
            destination_id: DEVICE_ID.into(),
        },
        LaunchContext::ToolchainSimulatorProcess {
            app_path: "bazel-bin/app/App.app".into(),
            target_label: "//app:App".into(),
            target_name: "App".into(),
        },
        LaunchContext::ToolchainDeviceProcess {
            app_path: "bazel-bin/app/App.ipa".into(),
            target_name: "App".into(),
            destination_id: DEVICE_ID.into(),
            pid: Some(901),
        },
    ]
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// A queue of responses that repeats its last entry forever.
struct Script<T> {
    steps: Mutex<VecDeque<T>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(steps: impl IntoIterator<Item = T>) -> Self {
        let steps: VecDeque<T> = steps.into_iter().collect();
        assert!(!steps.is_empty(), "a script needs at least one response");
        Self {
            steps: Mutex::new(steps),
            calls: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> T {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// ScriptedLister
// ---------------------------------------------------------------------------

/// One scripted response of a device process listing.
#[derive(Debug, Clone)]
pub enum Listing {
    Processes(Vec<DeviceProcess>),
    Fail(String),
}

/// [`DeviceProcessLister`] that replays scripted listings.
pub struct ScriptedLister {
    script: Script<Listing>,
}

impl ScriptedLister {
    pub fn new(steps: impl IntoIterator<Item = Listing>) -> Self {
        Self {
            script: Script::new(steps),
        }
    }

    /// Always return `processes`.
    pub fn always(processes: Vec<DeviceProcess>) -> Self {
        Self::new([Listing::Processes(processes)])
    }

    /// Number of listings requested so far.
    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl DeviceProcessLister for ScriptedLister {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_processes(&self, _device_id: &str) -> Result<Vec<DeviceProcess>> {
        match self.script.next() {
            Listing::Processes(processes) => Ok(processes),
            Listing::Fail(message) => Err(anyhow!(message)),
        }
    }
}

/// [`DeviceProcessLister`] whose listing never completes.
#[derive(Debug, Default)]
pub struct HangingLister;

#[async_trait]
impl DeviceProcessLister for HangingLister {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn list_processes(&self, _device_id: &str) -> Result<Vec<DeviceProcess>> {
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }
}

/// [`SimulatorQuery`] whose queries never complete.
#[derive(Debug, Default)]
pub struct HangingSimulator;

#[async_trait]
impl SimulatorQuery for HangingSimulator {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn launch_registry(&self, _simulator_id: &str) -> Result<String> {
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }

    async fn find_pid(&self, _simulator_id: &str, _bundle_id: &str) -> Result<Option<u32>> {
        std::future::pending::<()>().await;
        unreachable!("pending future never resolves")
    }
}

// ---------------------------------------------------------------------------
// ScriptedSimulator
// ---------------------------------------------------------------------------

/// [`SimulatorQuery`] that replays scripted registry listings and pid
/// lookups, each on its own script.
pub struct ScriptedSimulator {
    registry: Script<Result<String, String>>,
    pids: Script<Result<Option<u32>, String>>,
}

impl ScriptedSimulator {
    pub fn new(
        registry: impl IntoIterator<Item = Result<String, String>>,
        pids: impl IntoIterator<Item = Result<Option<u32>, String>>,
    ) -> Self {
        Self {
            registry: Script::new(registry),
            pids: Script::new(pids),
        }
    }

    /// Launch registry text listing `bundle_id` as a running app.
    pub fn registry_with(bundle_id: &str) -> String {
        format!("PID\tStatus\tLabel\n4821\t0\tUIKitApplication:{bundle_id}[2f1c][rb-legacy]\n")
    }

    pub fn registry_calls(&self) -> usize {
        self.registry.calls()
    }

    pub fn pid_calls(&self) -> usize {
        self.pids.calls()
    }
}

#[async_trait]
impl SimulatorQuery for ScriptedSimulator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn launch_registry(&self, _simulator_id: &str) -> Result<String> {
        self.registry.next().map_err(|message| anyhow!(message))
    }

    async fn find_pid(&self, _simulator_id: &str, _bundle_id: &str) -> Result<Option<u32>> {
        self.pids.next().map_err(|message| anyhow!(message))
    }
}
