//! Single-slot storage for the most recently launched app.
//!
//! The launch workflow overwrites the slot wholesale on every launch (last
//! write wins, no history). The resolver never reads the store itself; the
//! [`crate::provider`] facade loads the current value and passes it in.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::{LaunchContext, LaunchKind};

/// Key of the launch context slot inside the workspace state.
pub const LAST_LAUNCHED_APP_KEY: &str = "lastLaunchedApp";

/// Errors raised while reading or writing workspace state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workspace state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("workspace state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The state file exists but its root is not a JSON object.
    #[error("workspace state at {0} is not a JSON object")]
    NotAnObject(PathBuf),

    /// The stored launch context carries a kind this build does not know.
    #[error("stored launch context has unsupported kind {0:?}")]
    UnsupportedVariant(String),
}

/// Read/write access to the single launch context slot.
pub trait LaunchContextStore: Send + Sync {
    /// Return the current launch context, or `None` if nothing was launched.
    fn load(&self) -> Result<Option<LaunchContext>, StoreError>;

    /// Replace the current launch context.
    fn save(&self, context: &LaunchContext) -> Result<(), StoreError>;

    /// Forget the current launch context.
    fn clear(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store, for tests and embedders that keep state themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<LaunchContext>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `context`.
    pub fn with_context(context: LaunchContext) -> Self {
        Self {
            slot: Mutex::new(Some(context)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<LaunchContext>> {
        // A poisoned slot still holds a whole value; writes replace it atomically.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LaunchContextStore for MemoryStore {
    fn load(&self) -> Result<Option<LaunchContext>, StoreError> {
        Ok(self.slot().clone())
    }

    fn save(&self, context: &LaunchContext) -> Result<(), StoreError> {
        *self.slot() = Some(context.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Workspace-scoped store backed by `<workspace>/.tether/state.json`.
///
/// The file holds a JSON object of keyed entries. Only
/// [`LAST_LAUNCHED_APP_KEY`] is managed here; other keys are preserved.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Directory (relative to the workspace root) holding tether state.
    pub const STATE_DIR: &str = ".tether";
    /// File name of the state file inside [`Self::STATE_DIR`].
    pub const STATE_FILE: &str = "state.json";

    /// Store for the given workspace root.
    pub fn for_workspace(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            path: workspace_root
                .as_ref()
                .join(Self::STATE_DIR)
                .join(Self::STATE_FILE),
        }
    }

    /// Store backed by an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    fn write_state(&self, state: &Map<String, Value>) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        // Write to a sibling temp file and rename so readers never see a
        // half-written state file.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl LaunchContextStore for FileStore {
    fn load(&self) -> Result<Option<LaunchContext>, StoreError> {
        let mut state = self.read_state()?;
        let Some(value) = state.remove(LAST_LAUNCHED_APP_KEY) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }

        if let Some(tag) = value.get("type").and_then(Value::as_str) {
            if LaunchKind::from_str(tag).is_err() {
                return Err(StoreError::UnsupportedVariant(tag.to_owned()));
            }
        }

        let context = serde_json::from_value(value)?;
        Ok(Some(context))
    }

    fn save(&self, context: &LaunchContext) -> Result<(), StoreError> {
        let mut state = self.read_state()?;
        state.insert(
            LAST_LAUNCHED_APP_KEY.to_owned(),
            serde_json::to_value(context)?,
        );
        self.write_state(&state)?;
        tracing::debug!(
            path = %self.path.display(),
            kind = %context.kind(),
            "recorded launch context"
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.read_state()?;
        if state.remove(LAST_LAUNCHED_APP_KEY).is_some() {
            self.write_state(&state)?;
        }
        Ok(())
    }
}
