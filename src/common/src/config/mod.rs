use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vaultkeep.toml";

/// Prefix for environment overrides, e.g. `VAULTKEEP__ROTATION__MIN_COPIES`.
pub const ENV_PREFIX: &str = "VAULTKEEP__";

/// Where exports are written and how they are named.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory holding the export files. Also the rotation directory.
    pub dir: PathBuf,
    /// Filename prefix, e.g. `bitwarden_export`.
    pub prefix: String,
    /// Filename extension, with or without the leading dot.
    pub extension: String,
    /// Permissions applied to a fresh export (TOML accepts `0o640`).
    #[serde(default)]
    pub file_mode: Option<u32>,
}

/// Retention thresholds for the export directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Minimum number of exports that survive a rotation pass.
    pub min_copies: u32,
    /// Age in whole hours at which an export becomes eligible for deletion.
    pub ttl_hours: u32,
    /// Log deletions without performing them.
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BitwardenConfig {
    pub client_id: String,
    #[serde(serialize_with = "redacted")]
    pub client_secret: String,
    #[serde(serialize_with = "redacted")]
    pub password: String,
    /// Path to the `bw` executable.
    pub cli_path: PathBuf,
}

impl fmt::Debug for BitwardenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitwardenConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .field("password", &REDACTED)
            .field("cli_path", &self.cli_path)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Sentry-compatible DSN; failures are only logged when unset.
    #[serde(default, serialize_with = "redacted_if_set")]
    pub dsn: Option<String>,
}

impl fmt::Debug for ReportingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportingConfig")
            .field("dsn", &self.dsn.as_ref().map(|_| REDACTED))
            .finish()
    }
}

const REDACTED: &str = "********";

fn redacted<T, S: Serializer>(_: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(REDACTED)
}

fn redacted_if_set<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_str(REDACTED),
        None => serializer.serialize_none(),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub export: ExportConfig,
    pub rotation: RotationConfig,
    pub bitwarden: BitwardenConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("configuration file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

impl Configuration {
    /// Load from `vaultkeep.toml` (if present) and `VAULTKEEP__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Toml::file(DEFAULT_CONFIG_FILE)))
    }

    /// Load from an explicit file, which must exist, plus environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        Self::from_figment(Figment::new().merge(Toml::file(path)))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Configuration = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that deserialize fine but cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.export.dir.as_os_str().is_empty() {
            return Err(invalid("export.dir", "must not be empty"));
        }
        check_name_part("export.prefix", &self.export.prefix)?;
        check_name_part("export.extension", self.export.extension.trim_start_matches('.'))?;

        if let Some(mode) = self.export.file_mode.filter(|mode| *mode > 0o7777) {
            return Err(invalid(
                "export.file_mode",
                format!("{mode:o} is not a permission mode"),
            ));
        }

        if self.bitwarden.cli_path.as_os_str().is_empty() {
            return Err(invalid("bitwarden.cli_path", "must not be empty"));
        }
        if self.bitwarden.client_id.trim().is_empty() {
            return Err(invalid("bitwarden.client_id", "must not be empty"));
        }

        Ok(())
    }
}

fn check_name_part(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    if value.contains(['/', '\\']) {
        return Err(invalid(key, format!("`{value}` must not contain path separators")));
    }
    Ok(())
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}
