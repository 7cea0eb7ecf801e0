//! Configuration file management for tether.
//!
//! Provides a TOML-based config file at `~/.config/tether/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use tether_core::ResolverConfig;
use tether_core::discovery::DeviceDiscovery;

pub const ENV_DEBUG_PORT: &str = "TETHER_DEBUG_PORT";
pub const ENV_DISCOVERY_TIMEOUT_MS: &str = "TETHER_DISCOVERY_TIMEOUT_MS";
pub const ENV_CONTINUE_ON_ATTACH: &str = "TETHER_CONTINUE_ON_ATTACH";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub debug: DebugSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    /// Debug stub port for toolchain simulator launches.
    pub port: u16,
    /// How long device discovery waits for the app, in milliseconds.
    pub discovery_timeout_ms: u64,
    /// Let the app keep running when the debugger attaches.
    pub continue_on_attach: bool,
}

impl Default for DebugSection {
    fn default() -> Self {
        Self {
            port: ResolverConfig::DEFAULT_DEBUG_PORT,
            discovery_timeout_ms: DeviceDiscovery::DEFAULT_TIMEOUT.as_millis() as u64,
            continue_on_attach: true,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the tether config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/tether` or `~/.config/tether`,
/// on macOS as well.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tether");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tether")
}

/// Return the path to the tether config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns `None` if it does not exist.
pub fn load_config() -> Result<Option<ConfigFile>> {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> Result<Option<ConfigFile>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("failed to read config file at {}", path.display()));
        }
    };
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` defers to the rest of the chain.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub debug_port: Option<u16>,
    pub discovery_timeout_ms: Option<u64>,
    pub continue_on_attach: Option<bool>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TetherConfig {
    pub debug_port: u16,
    pub discovery_timeout: Duration,
    pub continue_on_attach: bool,
}

impl TetherConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Port: `--port` > `TETHER_DEBUG_PORT` > `debug.port` > 6667
    /// - Timeout: `--timeout-ms` > `TETHER_DISCOVERY_TIMEOUT_MS` > `debug.discovery_timeout_ms` > 15000
    /// - Continue: `--no-continue-on-attach` > `TETHER_CONTINUE_ON_ATTACH` > `debug.continue_on_attach` > true
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config()?.unwrap_or_default().debug;
        Self::resolve_with(cli, file)
    }

    fn resolve_with(cli: &CliOverrides, file: DebugSection) -> Result<Self> {
        let debug_port = match cli.debug_port {
            Some(port) => port,
            None => env_value(ENV_DEBUG_PORT, |v| v.parse::<u16>().ok())?.unwrap_or(file.port),
        };

        let timeout_ms = match cli.discovery_timeout_ms {
            Some(ms) => ms,
            None => env_value(ENV_DISCOVERY_TIMEOUT_MS, |v| v.parse::<u64>().ok())?
                .unwrap_or(file.discovery_timeout_ms),
        };

        let continue_on_attach = match cli.continue_on_attach {
            Some(value) => value,
            None => env_value(ENV_CONTINUE_ON_ATTACH, parse_bool)?
                .unwrap_or(file.continue_on_attach),
        };

        Ok(Self {
            debug_port,
            discovery_timeout: Duration::from_millis(timeout_ms),
            continue_on_attach,
        })
    }

    /// Resolver options for a workspace. The debugger root defaults to the
    /// workspace root.
    pub fn resolver_config(
        &self,
        workspace_root: &Path,
        debugger_root: Option<&Path>,
        use_cached_pid: bool,
    ) -> ResolverConfig {
        ResolverConfig::new(workspace_root)
            .debugger_root(debugger_root.unwrap_or(workspace_root))
            .debug_port(self.debug_port)
            .discovery_timeout(self.discovery_timeout)
            .continue_on_attach(self.continue_on_attach)
            .use_cached_pid(use_cached_pid)
    }
}

/// Read and parse an env var. Unset or empty is `None`; unparseable is an error.
fn env_value<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => match parse(raw.trim()) {
            Some(value) => Ok(Some(value)),
            None => bail!("invalid value for {name}: {raw:?}"),
        },
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
