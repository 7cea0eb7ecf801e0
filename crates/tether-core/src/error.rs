//! Error taxonomy for a single resolve call.

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Errors that terminate a resolve call.
///
/// None of these are retried automatically. The poll loops in
/// [`crate::discovery`] are the only retrying layer; once an error escapes
/// them, a fresh user action (relaunch, retry attach) is required.
#[derive(Debug, Error)]
pub enum AttachError {
    /// No launch has been recorded in this workspace yet.
    #[error("no launched app recorded; launch the app before starting a debug session")]
    MissingLaunchContext,

    /// Process discovery exceeded its deadline.
    #[error("timed out after {}ms waiting for the process to appear", waited.as_millis())]
    Timeout { waited: Duration },

    /// The device answered with an empty process list.
    #[error("device {device_id} reported no running processes")]
    NoProcessesFound { device_id: String },

    /// The matched process has no usable on-device executable location.
    #[error("process {pid} has no resolvable executable path")]
    NoExecutablePath { pid: u32 },

    /// Cached-pid attach was requested but the launch never recorded a pid.
    #[error("no pid recorded for {target}; relaunch the app and try again")]
    MissingPid { target: String },

    /// The stored launch context has a kind this build does not know about.
    #[error("unsupported launch context kind {0:?}")]
    UnsupportedVariant(String),

    /// The host cancelled the attach while discovery was in flight.
    #[error("attach cancelled")]
    Cancelled,

    /// Listing processes on the device failed.
    #[error("failed to list processes on device {device_id}")]
    DeviceQuery {
        device_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Reading the launch context from the workspace state failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AttachError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnsupportedVariant(tag) => Self::UnsupportedVariant(tag),
            other => Self::Store(other),
        }
    }
}
