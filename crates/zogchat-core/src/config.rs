// Configuration loading and validation (chat.toml).

use std::path::{Path, PathBuf};

use directories::{ProjectDirs, UserDirs};
use serde::Deserialize;
use thiserror::Error;

use crate::files::DEFAULT_MAX_FILE_BYTES;
use crate::verify::DEFAULT_MAX_ATTEMPTS;

pub const CONFIG_FILE_NAME: &str = "chat.toml";

/// The file written on first run.
pub const DEFAULT_CONFIG: &str = include_str!("../../../defaults/chat.toml");

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to write default config to {path}: {message}")]
    DefaultsWriteError { path: PathBuf, message: String },

    #[error("could not determine a configuration directory for this platform")]
    NoConfigDir,
}

// ---------------------------------------------------------------------------
// chat.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub identity: IdentityConfig,
    pub transport: TransportConfig,
    pub share: ShareConfig,
    pub security: SecurityConfig,
    pub files: FilesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub default_username: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub listen_host: String,
    pub listen_port: u16,
    pub advertise_host: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            listen_host: "0.0.0.0".into(),
            listen_port: 9470,
            advertise_host: "127.0.0.1".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub base_url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        ShareConfig {
            base_url: "zogchat://join".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub max_attempts: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub max_file_bytes: u64,
    pub download_dir: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            download_dir: String::new(),
        }
    }
}

impl FilesConfig {
    /// The configured directory, else the user's download folder, else
    /// `./downloads`.
    pub fn resolve_download_dir(&self) -> PathBuf {
        if !self.download_dir.trim().is_empty() {
            return PathBuf::from(self.download_dir.trim());
        }
        UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "zogchat=info,warn".into(),
            dir: String::new(),
        }
    }
}

impl LoggingConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        if self.dir.trim().is_empty() {
            PathBuf::from("logs")
        } else {
            PathBuf::from(self.dir.trim())
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Platform configuration directory (e.g. `~/.config/zogchat`).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("org", "zogchat", "zogchat")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

/// Write the default `chat.toml` into `config_dir` unless one already exists.
/// Returns the path written, or `None` when the file was already there.
pub fn ensure_config_file(config_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = config_dir.join(CONFIG_FILE_NAME);
    let write_err = |message: String| ConfigError::DefaultsWriteError {
        path: target.clone(),
        message,
    };

    std::fs::create_dir_all(config_dir)
        .map_err(|e| write_err(format!("failed to create config directory: {e}")))?;

    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, DEFAULT_CONFIG.as_bytes())
                .map_err(|e| write_err(e.to_string()))?;
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(write_err(e.to_string())),
    }
}

/// Load and validate `chat.toml` from `config_dir` without creating anything.
pub fn load_config_from(config_dir: &Path) -> Result<Config, ConfigError> {
    let path = config_dir.join(CONFIG_FILE_NAME);
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
        path: path.clone(),
    })?;
    let config = parse_config(&text).map_err(|source| ConfigError::ParseError { path, source })?;
    validate(&config)?;
    Ok(config)
}

/// Load config from `dir` (or the platform directory), writing the default
/// file first if none exists.
pub fn load_config(dir: Option<&Path>) -> Result<Config, ConfigError> {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => default_config_dir()?,
    };
    ensure_config_file(&dir)?;
    load_config_from(&dir)
}

pub fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let non_empty: &[(&str, &str)] = &[
        ("transport.listen_host", config.transport.listen_host.as_str()),
        ("transport.advertise_host", config.transport.advertise_host.as_str()),
        ("share.base_url", config.share.base_url.as_str()),
    ];
    for (name, val) in non_empty {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    if config.share.base_url.contains('?') {
        return Err(ConfigError::ValidationError {
            field: "share.base_url".into(),
            message: "must not contain a query string".into(),
        });
    }

    if config.security.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            field: "security.max_attempts".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.files.max_file_bytes == 0 {
        return Err(ConfigError::ValidationError {
            field: "files.max_file_bytes".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
