//! Configuration loading and config-file resolution
//!
//! Bootstrap configuration is a single TOML file; every field has a built-in
//! default, so a missing file (or a missing section) never prevents startup.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VOXPUSH_CONFIG`)
//! 3. Platform config directory (`<config_dir>/voxpush/config.toml`)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VOXPUSH_CONFIG";

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stream: StreamSettings,

    #[serde(default)]
    pub speech: SpeakOptions,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Real-time delivery parameters handed to each streaming sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Engine output sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples rendered per delivery invocation
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
        }
    }
}

/// Per-utterance speech options (the batch path configuration surface)
///
/// `voice`, `rate` and `pitch` are forwarded to the synthesis engine verbatim;
/// only `volume`, `enhance` and `reverb` are interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakOptions {
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speaking rate in words per minute
    #[serde(default = "default_rate")]
    pub rate: u32,

    #[serde(default = "default_pitch")]
    pub pitch: u32,

    /// Normalization gain multiplier
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Run the four enhancement stages before normalization
    #[serde(default = "default_enhance")]
    pub enhance: bool,

    /// Add room warmth when playing a finished buffer
    #[serde(default)]
    pub reverb: bool,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
            enhance: default_enhance(),
            reverb: false,
        }
    }
}

/// Per-call overrides; `None` keeps the configured default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakOverrides {
    pub voice: Option<String>,
    pub rate: Option<u32>,
    pub pitch: Option<u32>,
    pub volume: Option<f32>,
    pub enhance: Option<bool>,
    pub reverb: Option<bool>,
}

impl SpeakOptions {
    /// Resolve overrides against these defaults, field by field
    pub fn with_overrides(&self, overrides: &SpeakOverrides) -> SpeakOptions {
        SpeakOptions {
            voice: overrides.voice.clone().unwrap_or_else(|| self.voice.clone()),
            rate: overrides.rate.unwrap_or(self.rate),
            pitch: overrides.pitch.unwrap_or(self.pitch),
            volume: overrides.volume.unwrap_or(self.volume),
            enhance: overrides.enhance.unwrap_or(self.enhance),
            reverb: overrides.reverb.unwrap_or(self.reverb),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_buffer_size() -> usize {
    4096
}

fn default_voice() -> String {
    "en-us".to_string()
}

fn default_rate() -> u32 {
    175
}

fn default_pitch() -> u32 {
    50
}

fn default_volume() -> f32 {
    1.0
}

fn default_enhance() -> bool {
    true
}

impl TomlConfig {
    /// Load and validate a TOML configuration file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, cannot be parsed, or holds
    /// values no sink could run with (zero sample rate or buffer size,
    /// negative or non-finite volume).
    pub fn load(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: TomlConfig = toml::from_str(&toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))?;

        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from the resolved path, or fall back to compiled defaults
    ///
    /// A path that does not exist is a warning, not an error. A file that
    /// exists but is malformed is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                warn!("Config file {:?} not found, using built-in defaults", path);
                Ok(Self::default())
            }
            None => {
                debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.sample_rate == 0 {
            return Err(Error::Config("stream.sample_rate must be > 0".to_string()));
        }
        if self.stream.buffer_size == 0 {
            return Err(Error::Config("stream.buffer_size must be > 0".to_string()));
        }
        if !self.speech.volume.is_finite() || self.speech.volume < 0.0 {
            return Err(Error::Config(format!(
                "speech.volume must be a non-negative number, got {}",
                self.speech.volume
            )));
        }
        Ok(())
    }
}

/// Resolve which config file to read
///
/// Returns `None` when neither an explicit path nor a platform config file
/// exists; callers then run on compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        debug!("Config path {:?} (from command line)", path);
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            debug!("Config path {} (from {})", path, CONFIG_ENV_VAR);
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    let platform = default_config_path()?;
    if platform.exists() {
        debug!("Config path {:?} (platform default)", platform);
        Some(platform)
    } else {
        None
    }
}

/// Platform config file location: `<config_dir>/voxpush/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voxpush").join("config.toml"))
}
