//! Debug attach orchestration for launched Apple-platform apps.
//!
//! Given a description of what was just launched ([`LaunchContext`]), the
//! [`DebugConfigResolver`] decides how a native debugger should attach to
//! it. Device launches first go through process discovery, since the pid
//! of an app on a physical device is only known once the device reports it.
//!
//! ```text
//! LaunchContextStore --load()--> LaunchContext
//!                                     |
//!                                     v
//!                          DebugConfigResolver::resolve
//!                           |          |            |
//!                 local/port|   device |            |
//!                           v          v            v
//!                  AttachConfiguration  ProcessDiscovery --> AttachCommandBuilder
//! ```

pub mod attach;
pub mod context;
pub mod discovery;
pub mod error;
pub mod provider;
pub mod resolver;
pub mod store;

pub use attach::{AttachCommands, AttachConfiguration};
pub use context::{LaunchContext, LaunchKind};
pub use discovery::{DeviceProcess, DeviceProcessLister, ProcessDescriptor, SimulatorQuery};
pub use error::AttachError;
pub use provider::DebugConfigurationProvider;
pub use resolver::{DebugConfigResolver, ResolverConfig};
pub use store::{FileStore, LaunchContextStore, MemoryStore, StoreError};
