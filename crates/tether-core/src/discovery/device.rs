//! Device process discovery: wait for an app to show up in a physical
//! device's process list.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{DeviceProcess, DeviceProcessLister, ProcessDescriptor};
use crate::error::AttachError;

/// Polls a device until a process matching an app name appears.
#[derive(Clone)]
pub struct DeviceDiscovery {
    lister: Arc<dyn DeviceProcessLister>,
    poll_interval: Duration,
}

impl std::fmt::Debug for DeviceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDiscovery")
            .field("lister", &self.lister.name())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl DeviceDiscovery {
    /// Interval between two process listings.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
    /// How long to wait for the process before giving up.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

    pub fn new(lister: Arc<dyn DeviceProcessLister>) -> Self {
        Self {
            lister,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until a process whose executable contains `app_name` is running
    /// on `device_id`.
    ///
    /// Matching is by substring, and the first match in device-reported
    /// order wins. That order is not guaranteed to be stable, so two
    /// processes matching the same name may be picked differently across
    /// calls.
    ///
    /// # Errors
    ///
    /// - [`AttachError::DeviceQuery`] as soon as a listing fails.
    /// - [`AttachError::NoProcessesFound`] as soon as the device returns an
    ///   empty list. Empty lists are not retried.
    /// - [`AttachError::Timeout`] once `timeout` has elapsed without a match,
    ///   including while a listing is still in flight.
    /// - [`AttachError::Cancelled`] if `cancel` fires.
    pub async fn wait_for_process(
        &self,
        device_id: &str,
        app_name: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessDescriptor, AttachError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempt: u32 = 0;

        info!(
            device_id,
            app_name,
            timeout_ms = timeout.as_millis() as u64,
            lister = self.lister.name(),
            "waiting for app process on device"
        );

        loop {
            attempt += 1;
            let processes = self.list(device_id, deadline, timeout, cancel).await?;

            if processes.is_empty() {
                return Err(AttachError::NoProcessesFound {
                    device_id: device_id.to_owned(),
                });
            }

            if let Some(found) = first_match(&processes, app_name) {
                info!(
                    device_id,
                    pid = found.process_id,
                    executable = %found.executable_path,
                    attempt,
                    "found app process on device"
                );
                return Ok(found);
            }

            if started.elapsed() > timeout {
                return Err(AttachError::Timeout { waited: timeout });
            }

            debug!(
                device_id,
                app_name,
                attempt,
                listed = processes.len(),
                "app process not running yet"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => return Err(AttachError::Cancelled),
            }
        }
    }

    /// Look up a known pid on `device_id` with a single listing.
    ///
    /// Used when a launch already recorded the pid, so there is nothing to
    /// wait for; only the executable location is needed. The listing is still
    /// bounded by `timeout`.
    pub async fn find_process_by_pid(
        &self,
        device_id: &str,
        pid: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessDescriptor, AttachError> {
        let deadline = Instant::now() + timeout;
        let processes = self.list(device_id, deadline, timeout, cancel).await?;
        if processes.is_empty() {
            return Err(AttachError::NoProcessesFound {
                device_id: device_id.to_owned(),
            });
        }

        processes
            .iter()
            .find(|p| p.process_identifier == pid)
            .and_then(|p| {
                p.executable.as_ref().map(|executable| ProcessDescriptor {
                    process_id: pid,
                    executable_path: executable.clone(),
                })
            })
            .ok_or(AttachError::NoExecutablePath { pid })
    }

    /// One listing, raced against the wait's deadline and the token.
    async fn list(
        &self,
        device_id: &str,
        deadline: Instant,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeviceProcess>, AttachError> {
        tokio::select! {
            result = self.lister.list_processes(device_id) => {
                result.map_err(|source| AttachError::DeviceQuery {
                    device_id: device_id.to_owned(),
                    source,
                })
            }
            _ = tokio::time::sleep_until(deadline) => {
                debug!(device_id, "process listing still running at deadline");
                Err(AttachError::Timeout { waited: timeout })
            }
            _ = cancel.cancelled() => Err(AttachError::Cancelled),
        }
    }
}

/// First process, in listing order, whose executable contains `app_name`.
fn first_match(processes: &[DeviceProcess], app_name: &str) -> Option<ProcessDescriptor> {
    processes.iter().find_map(|p| {
        p.executable
            .as_deref()
            .filter(|executable| executable.contains(app_name))
            .map(|executable| ProcessDescriptor {
                process_id: p.process_identifier,
                executable_path: executable.to_owned(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(executable: Option<&str>, pid: u32) -> DeviceProcess {
        DeviceProcess {
            executable: executable.map(str::to_owned),
            process_identifier: pid,
        }
    }

    #[test]
    fn first_match_uses_substring_and_listing_order() {
        let processes = vec![
            proc(Some("file:///usr/libexec/backboardd"), 10),
            proc(None, 11),
            proc(Some("file:///private/var/Bundle/A/MyApp.app/MyApp"), 12),
            proc(Some("file:///private/var/Bundle/B/MyApp.app/Extension"), 13),
        ];
        let found = first_match(&processes, "MyApp.app").unwrap();
        assert_eq!(found.process_id, 12);
        assert_eq!(
            found.executable_path,
            "file:///private/var/Bundle/A/MyApp.app/MyApp"
        );
    }

    #[test]
    fn first_match_skips_processes_without_executable() {
        let processes = vec![proc(None, 1), proc(None, 2)];
        assert!(first_match(&processes, "").is_none());
    }

    #[test]
    fn first_match_none_when_absent() {
        let processes = vec![proc(Some("file:///usr/libexec/backboardd"), 10)];
        assert!(first_match(&processes, "MyApp.app").is_none());
    }
}
