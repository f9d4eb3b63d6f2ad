//! Orchestrator configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. A file that exists but
//! does not parse or validate is an error. The CLI layers
//! environment variables and flags on top of what is loaded here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbyssConfig {
    /// How deep the controller descends.
    pub layers: LayerConfig,
    /// Where method scripts live and how they are run.
    pub methods: MethodConfig,
    /// Delays between attempts.
    pub pacing: PacingConfig,
    /// Audio cues. Never affects orchestration.
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Number of layers visited, 1..=count. Zero means no method ever runs.
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodConfig {
    /// Directory scanned for `layer<L>_method<M>.<ext>` files.
    pub dir: PathBuf,
    /// Script extension without the leading dot.
    pub extension: String,
    /// Program used to run each script (e.g. "python3"). Scripts are executed
    /// directly when unset.
    pub interpreter: Option<String>,
    /// Per-invocation time budget, measured from launch.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause after a live attempt that left the target alive.
    pub method_pause_ms: u64,
    /// Pause after each attempt in simulation mode.
    pub simulation_pause_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub enabled: bool,
    /// Directory holding music.wav, descend.wav, attack.wav, end.wav, kill.wav.
    pub sounds_dir: PathBuf,
    /// Player command, e.g. "aplay". Platform default when unset.
    pub player: Option<String>,
}

// ============================================================
// Defaults
// ============================================================

/// Script extension used when none is configured.
#[cfg(windows)]
pub const DEFAULT_EXTENSION: &str = "bat";
#[cfg(not(windows))]
pub const DEFAULT_EXTENSION: &str = "sh";

impl Default for LayerConfig {
    fn default() -> Self {
        Self { count: 3 }
    }
}

impl Default for MethodConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("methods"),
            extension: DEFAULT_EXTENSION.to_string(),
            interpreter: None,
            timeout_secs: 15,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { method_pause_ms: 100, simulation_pause_ms: 300 }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sounds_dir: PathBuf::from("sounds"),
            player: None,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl AbyssConfig {
    /// Load config from a TOML file. A missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content).map_err(|e| {
                    Error::Config(format!("{}: {}", path.display(), e))
                })?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {} - using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.methods.timeout_secs == 0 {
            return Err(Error::Config("methods.timeout_secs must be at least 1".into()));
        }
        let ext = self.methods.extension.trim();
        if ext.is_empty() || ext.contains('.') || ext.contains(std::path::MAIN_SEPARATOR) {
            return Err(Error::Config(format!(
                "methods.extension {:?} must be a bare extension such as \"sh\"",
                self.methods.extension
            )));
        }
        Ok(())
    }

    pub fn method_timeout(&self) -> Duration {
        Duration::from_secs(self.methods.timeout_secs)
    }

    pub fn method_pause(&self) -> Duration {
        Duration::from_millis(self.pacing.method_pause_ms)
    }

    pub fn simulation_pause(&self) -> Duration {
        Duration::from_millis(self.pacing.simulation_pause_ms)
    }

    /// Layers visited by a run, in order.
    pub fn layer_range(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.layers.count
    }
}
