//! Simulator process discovery: wait for an app to be launched in a
//! simulator and resolve its pid.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SimulatorQuery;
use crate::error::AttachError;

/// Polls a simulator's launch registry until an app shows up, then looks
/// up its pid.
///
/// Unlike [`super::DeviceDiscovery`], query failures never end the wait:
/// the simulator tooling is flaky while an app is still booting, so every
/// error is logged and the next tick tries again.
#[derive(Clone)]
pub struct SimulatorDiscovery {
    query: Arc<dyn SimulatorQuery>,
    poll_interval: Duration,
}

impl std::fmt::Debug for SimulatorDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorDiscovery")
            .field("query", &self.query.name())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl SimulatorDiscovery {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(query: Arc<dyn SimulatorQuery>) -> Self {
        Self {
            query,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Wait until `bundle_id` is launched on `simulator_id` and return its pid.
    ///
    /// # Errors
    ///
    /// Only [`AttachError::Timeout`] and [`AttachError::Cancelled`]; query
    /// errors are retried until the deadline. A query still running at the
    /// deadline is abandoned.
    pub async fn wait_for_simulator_process_to_launch(
        &self,
        simulator_id: &str,
        bundle_id: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<u32, AttachError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempt: u32 = 0;

        info!(
            simulator_id,
            bundle_id,
            timeout_ms = timeout.as_millis() as u64,
            "waiting for app launch in simulator"
        );

        loop {
            attempt += 1;

            let registry = tokio::select! {
                result = self.query.launch_registry(simulator_id) => result,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(AttachError::Timeout { waited: timeout });
                }
                _ = cancel.cancelled() => return Err(AttachError::Cancelled),
            };

            match registry {
                Ok(listing) if listing.contains(bundle_id) => {
                    let pid = tokio::select! {
                        result = self.query.find_pid(simulator_id, bundle_id) => result,
                        _ = tokio::time::sleep_until(deadline) => {
                            return Err(AttachError::Timeout { waited: timeout });
                        }
                        _ = cancel.cancelled() => return Err(AttachError::Cancelled),
                    };
                    match pid {
                        Ok(Some(pid)) => {
                            info!(simulator_id, bundle_id, pid, attempt, "app launched in simulator");
                            return Ok(pid);
                        }
                        Ok(None) => {
                            debug!(simulator_id, bundle_id, attempt, "app registered but no pid yet");
                        }
                        Err(e) => {
                            debug!(simulator_id, bundle_id, attempt, error = %e, "pid lookup failed");
                        }
                    }
                }
                Ok(_) => {
                    debug!(simulator_id, bundle_id, attempt, "app not in launch registry yet");
                }
                Err(e) => {
                    debug!(simulator_id, attempt, error = %e, "launch registry query failed");
                }
            }

            if started.elapsed() > timeout {
                return Err(AttachError::Timeout { waited: timeout });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => return Err(AttachError::Cancelled),
            }
        }
    }
}
