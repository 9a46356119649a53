//! Configuration for the recorder and player
//!
//! All tunables live in [`DemoConfig`]. It is plain serde data, so hosts can
//! embed it in their own settings or keep it in a standalone TOML file:
//!
//! ```toml
//! max_frame_size = 2048
//! read_ahead_frames = 64
//! checkpoint_interval_seconds = 30.0
//! max_checkpoint_time_ms = 2.0
//! header_policy = "strict"
//! ```
//!
//! # Recordings Location
//!
//! [`default_recordings_dir`] resolves to `demos/` inside the platform data
//! directory under [`APP_ID`]:
//! - **Linux**: `~/.local/share/dev.hxyulin.netdemo-rs/demos/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.netdemo-rs/demos/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.netdemo-rs\demos\`

use crate::error::{DemoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.netdemo-rs";

/// Subdirectory of the data directory that holds recordings
pub const RECORDINGS_DIR: &str = "demos";

/// Largest frame payload accepted by the codec
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2048;

/// Largest checkpoint record accepted by the codec (64 MiB)
pub const DEFAULT_MAX_CHECKPOINT_SIZE: usize = 64 * 1024 * 1024;

/// Seconds between automatic checkpoints while recording
pub const DEFAULT_CHECKPOINT_INTERVAL_SECONDS: f64 = 30.0;

/// Get the default recordings directory path
pub fn default_recordings_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID).join(RECORDINGS_DIR))
}

/// What to do when a recording's build fields differ from the running build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderPolicy {
    /// Log a warning and play anyway
    #[default]
    Lenient,
    /// Refuse to open the recording
    Strict,
}

/// Recorder and player tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Largest frame payload in bytes; bigger claimed sizes are corrupt
    pub max_frame_size: usize,
    /// Largest checkpoint record in bytes
    pub max_checkpoint_size: usize,
    /// How many decoded frames the player keeps queued ahead of the clock
    pub read_ahead_frames: usize,
    /// Frames replayed per tick while fast-forwarding (0 = no limit)
    pub fast_forward_frames_per_tick: usize,
    /// Recording rate limit in Hz (0 = record every tick)
    pub record_hz: f64,
    /// Whether the recorder takes periodic checkpoints
    pub enable_checkpoints: bool,
    /// Seconds between automatic checkpoints
    pub checkpoint_interval_seconds: f64,
    /// Per-tick time budget for saving checkpoint objects (None or negative = unbounded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_checkpoint_time_ms: Option<f64>,
    /// Playback speed multiplier
    pub time_dilation: f64,
    /// Largest tick delta accepted before dilation
    pub max_delta_seconds: f64,
    /// Skip oversized frames during playback instead of stopping
    pub lossy_playback: bool,
    /// Handling of build mismatches in recording headers
    pub header_policy: HeaderPolicy,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_checkpoint_size: DEFAULT_MAX_CHECKPOINT_SIZE,
            read_ahead_frames: 64,
            fast_forward_frames_per_tick: 1024,
            record_hz: 0.0,
            enable_checkpoints: true,
            checkpoint_interval_seconds: DEFAULT_CHECKPOINT_INTERVAL_SECONDS,
            max_checkpoint_time_ms: None,
            time_dilation: 1.0,
            max_delta_seconds: 0.5,
            lossy_playback: false,
            header_policy: HeaderPolicy::Lenient,
        }
    }
}

impl DemoConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DemoError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DemoError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DemoError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load a configuration file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default demo config: {}", e);
                Self::default()
            }
        }
    }

    /// Save the configuration to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DemoError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .map_err(|e| DemoError::Config(format!("Failed to write config: {}", e)))
    }

    /// Check that every tunable is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(DemoError::Config("max_frame_size must be positive".into()));
        }
        if self.max_checkpoint_size == 0 {
            return Err(DemoError::Config(
                "max_checkpoint_size must be positive".into(),
            ));
        }
        if self.read_ahead_frames == 0 {
            return Err(DemoError::Config(
                "read_ahead_frames must be positive".into(),
            ));
        }
        if !self.record_hz.is_finite() || self.record_hz < 0.0 {
            return Err(DemoError::Config(format!(
                "record_hz must be a non-negative number, got {}",
                self.record_hz
            )));
        }
        if !self.checkpoint_interval_seconds.is_finite() || self.checkpoint_interval_seconds <= 0.0
        {
            return Err(DemoError::Config(format!(
                "checkpoint_interval_seconds must be positive, got {}",
                self.checkpoint_interval_seconds
            )));
        }
        if !self.time_dilation.is_finite() || self.time_dilation < 0.0 {
            return Err(DemoError::Config(format!(
                "time_dilation must be a non-negative number, got {}",
                self.time_dilation
            )));
        }
        if !self.max_delta_seconds.is_finite() || self.max_delta_seconds <= 0.0 {
            return Err(DemoError::Config(format!(
                "max_delta_seconds must be positive, got {}",
                self.max_delta_seconds
            )));
        }
        Ok(())
    }

    /// Checkpoint save budget, or `None` when unbounded
    pub fn checkpoint_budget_ms(&self) -> Option<f64> {
        self.max_checkpoint_time_ms.filter(|ms| *ms >= 0.0)
    }

    /// Minimum demo-time gap between recorded frames, or `None` when unthrottled
    pub fn record_interval_seconds(&self) -> Option<f64> {
        (self.record_hz > 0.0).then(|| 1.0 / self.record_hz)
    }
}
