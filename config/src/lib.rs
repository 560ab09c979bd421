//! Configuration loading for Petriflow.
//!
//! The config file lives at `~/.petriflow/config.toml` unless overridden by
//! the `PETRIFLOW_CONFIG` environment variable. Every section is optional;
//! missing values fall back to the defaults documented on each field.
//!
//! ```toml
//! [service]
//! base_url = "${PETRIFLOW_SERVICE_URL}"
//! schema_version = "1.0"
//!
//! [animation]
//! speed = 2.0
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "PETRIFLOW_CONFIG";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/v1";
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";
pub const DEFAULT_HOVER_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PetriflowConfig {
    pub service: ServiceConfig,
    pub validate: ValidateConfig,
    pub simulate: SimulateConfig,
    pub animation: AnimationConfig,
    pub trace: TraceConfig,
    pub highlight: HighlightConfig,
}

/// Connection settings for the remote analysis service.
#[derive(Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL the stage endpoints are joined onto. Supports `${VAR}` expansion.
    pub base_url: String,
    pub schema_version: String,
    /// Bearer token sent with every request. Supports `${VAR}` expansion.
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Refuse plain-HTTP base URLs.
    pub require_https: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            api_token: None,
            request_timeout_secs: 120,
            max_retries: 2,
            require_https: false,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        expand_env_vars(&self.base_url)
    }

    #[must_use]
    pub fn resolved_api_token(&self) -> Option<String> {
        self.api_token
            .as_deref()
            .map(expand_env_vars)
            .filter(|token| !token.trim().is_empty())
    }
}

// Manual Debug impl to prevent leaking the token in logs.
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("schema_version", &self.schema_version)
            .field(
                "api_token",
                &if self.api_token.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("require_https", &self.require_https)
            .finish()
    }
}

/// Formal verifier settings sent with every validate request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidateConfig {
    pub k_bound: u32,
    pub max_millis: u64,
    pub enable_deadlock_check: bool,
    pub enable_reachability_check: bool,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            k_bound: 10,
            max_millis: 5000,
            enable_deadlock_check: true,
            enable_reachability_check: true,
        }
    }
}

/// Default simulator settings. Seed and step bound can be overridden per run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulateConfig {
    pub seed: Option<u64>,
    pub mode: String,
    pub max_steps: u32,
    pub enable_trace: bool,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            seed: None,
            mode: "random".to_string(),
            max_steps: 100,
            enable_trace: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Playback rate multiplier. Must lie within 0.01..=100.
    pub speed: f64,
    /// Window reserved for removals before additions of the same event start.
    pub removal_window_ms: u64,
    /// Pause between consecutive dispatch cycles.
    pub step_interval_ms: u64,
    /// How long a place/transition pulse lasts.
    pub pulse_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            removal_window_ms: 500,
            step_interval_ms: 300,
            pulse_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub max_events: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { max_events: 1000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub hover_timeout_ms: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            hover_timeout_ms: DEFAULT_HOVER_TIMEOUT_MS,
        }
    }
}

/// Replace `${VAR}` references with environment values. Unset variables
/// expand to the empty string; an unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl PetriflowConfig {
    /// Load the config from the default location.
    ///
    /// Returns `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(raw) = env::var(CONFIG_PATH_ENV)
        && !raw.trim().is_empty()
    {
        return Some(PathBuf::from(raw));
    }
    dirs::home_dir().map(|home| home.join(".petriflow").join("config.toml"))
}
