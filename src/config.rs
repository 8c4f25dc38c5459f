//! Service configuration.
//!
//! Settings are looked up by their deployment key (`workspace-url`,
//! `scratch`, ...). In a running process the keys come from the
//! environment, with `.env` loaded first: a key maps to its upper snake case
//! variable, so `workspace-url` is read from `WORKSPACE_URL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Poll interval used by the async job proxy when nothing overrides it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Interpreter used to launch the converter scripts.
pub const DEFAULT_CONVERTER_INTERPRETER: &str = "perl";

pub const KEY_WORKSPACE_URL: &str = "workspace-url";
pub const KEY_TRANSFORM_PLUGIN_PATH: &str = "transform-plugin-path";
pub const KEY_SCRATCH: &str = "scratch";
pub const KEY_CALLBACK_URL: &str = "sdk-callback-url";
pub const KEY_CONVERTER_INTERPRETER: &str = "converter-interpreter";
pub const KEY_POLL_INTERVAL_MS: &str = "async-job-check-time-ms";

/// Read-only configuration shared by every call.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Workspace service endpoint, handed to converters and used for lookups.
    pub workspace_url: String,
    /// Root of the external converter scripts.
    pub transform_plugin_path: PathBuf,
    /// Root under which each call gets its own scratch directory.
    pub scratch: PathBuf,
    /// DataFileUtil endpoint. Shock staging is unavailable without it.
    pub callback_url: Option<String>,
    pub converter_interpreter: String,
    /// Interval between `_check_job` calls.
    pub poll_interval: Duration,
}

impl ServiceConfig {
    /// Build the configuration from a key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_interval = match non_empty(&lookup, KEY_POLL_INTERVAL_MS) {
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|e| ConfigError::InvalidValue {
                    key: KEY_POLL_INTERVAL_MS.to_string(),
                    message: format!("'{}' is not a number of milliseconds: {}", raw, e),
                })?;
                if ms == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: KEY_POLL_INTERVAL_MS.to_string(),
                        message: "poll interval must be positive".to_string(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            workspace_url: required(&lookup, KEY_WORKSPACE_URL, "URL of the Workspace service")?,
            transform_plugin_path: PathBuf::from(required(
                &lookup,
                KEY_TRANSFORM_PLUGIN_PATH,
                "directory containing the converter scripts",
            )?),
            scratch: PathBuf::from(required(
                &lookup,
                KEY_SCRATCH,
                "directory for per-call scratch space",
            )?),
            callback_url: non_empty(&lookup, KEY_CALLBACK_URL),
            converter_interpreter: non_empty(&lookup, KEY_CONVERTER_INTERPRETER)
                .unwrap_or_else(|| DEFAULT_CONVERTER_INTERPRETER.to_string()),
            poll_interval,
        })
    }

    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(env_var_name(key)).ok())
    }

    /// Load settings from `env_file` when given, from `.env` otherwise.
    pub fn load(env_file: Option<&Path>) -> crate::Result<Self> {
        let config = match env_file {
            Some(path) => Self::from_env_file(path)?,
            None => Self::from_env()?,
        };
        Ok(config)
    }

    /// Load an explicit env file, then build from the environment.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::from_path(path).map_err(|e| ConfigError::EnvFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_env()
    }
}

/// `workspace-url` -> `WORKSPACE_URL`.
pub fn env_var_name(key: &str) -> String {
    key.replace('-', "_").to_uppercase()
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str, hint: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).ok_or_else(|| ConfigError::MissingRequired {
        key: key.to_string(),
        hint: format!("{} (set {})", hint, env_var_name(key)),
    })
}
