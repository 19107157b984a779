//! Bridge configuration: `sandbridge.toml` plus CLI overrides.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Name of the configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "sandbridge.toml";

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Port the sandbox peer connects to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Local directory to synchronize.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Path the definition artifact is written to on connect.
    /// `"skip"` disables the fetch.
    #[serde(default = "default_def_file")]
    pub def_file: String,

    /// Delay between sync cycles in milliseconds.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,

    /// Path prefixes excluded from sync on both sides.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Conflict policy for the first sync after each connect.
    #[serde(default)]
    pub on_mismatch: MismatchPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_dir: default_base_dir(),
            def_file: default_def_file(),
            poll_delay_ms: default_poll_delay_ms(),
            ignore: default_ignore(),
            on_mismatch: MismatchPolicy::default(),
        }
    }
}

fn default_port() -> u16 {
    12525
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./src")
}

fn default_def_file() -> String {
    "./types/definitions.d.ts".to_string()
}

fn default_poll_delay_ms() -> u64 {
    500
}

fn default_ignore() -> Vec<String> {
    vec!["tmp/".to_string()]
}

impl BridgeConfig {
    /// Load configuration from `sandbridge.toml` in `dir`, falling back to
    /// defaults when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self, BridgeError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| BridgeError::LocalIo {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|e| {
            BridgeError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Write this configuration to `sandbridge.toml` in `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, BridgeError> {
        let path = dir.join(CONFIG_FILE);
        let raw = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(&path, raw).map_err(|source| BridgeError::LocalIo {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Whether the definition-artifact fetch is disabled.
    pub fn skip_definitions(&self) -> bool {
        self.def_file.eq_ignore_ascii_case("skip")
    }

    /// Delay between sync cycles.
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }
}

/// How a same-path content disagreement discovered on the first sync after
/// connect is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// The local copy wins; the sandbox copy is overwritten.
    Upload,
    /// The sandbox copy wins; the local copy is overwritten.
    Download,
    /// Abort the run and let the user decide.
    #[default]
    Fail,
}

impl FromStr for MismatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upload" => Ok(MismatchPolicy::Upload),
            "download" => Ok(MismatchPolicy::Download),
            "fail" => Ok(MismatchPolicy::Fail),
            other => Err(format!(
                "invalid mismatch policy '{other}' (expected upload, download, or fail)"
            )),
        }
    }
}

impl std::fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MismatchPolicy::Upload => "upload",
            MismatchPolicy::Download => "download",
            MismatchPolicy::Fail => "fail",
        };
        f.write_str(s)
    }
}
