//! TOML-based configuration for Tally.
//!
//! Supports a config file (tally.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [compiler]
//! dialect = "clickhouse"
//! pretty = false
//!
//! [schemas]
//! dir = "${TALLY_HOME}/schemas"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unterminated `${{` in: {0}")]
    UnterminatedVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub compiler: CompilerSettings,
    pub schemas: SchemaSettings,
}

/// Defaults applied to every compilation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Target SQL dialect.
    pub dialect: Dialect,

    /// Multi-line SQL output.
    pub pretty: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            pretty: true,
        }
    }
}

/// Where schema files live.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaSettings {
    /// Directory of `<name>.toml` schema files (supports ${ENV_VAR} expansion).
    pub dir: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TALLY_CONFIG`
    /// 2. `./tally.toml`
    /// 3. `~/.config/tally/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("TALLY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tally.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tally").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// The schema directory with environment variables expanded.
    pub fn schema_dir(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.schemas
            .dir
            .as_deref()
            .map(|dir| expand_env_vars(dir).map(PathBuf::from))
            .transpose()
    }

    /// Path of the schema file called `name` in the schema directory.
    pub fn schema_path(&self, name: &str) -> Result<Option<PathBuf>, SettingsError> {
        Ok(self
            .schema_dir()?
            .map(|dir| dir.join(format!("{name}.toml"))))
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let var_name = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(ch) => name.push(ch),
                    None => return Err(SettingsError::UnterminatedVar(s.to_string())),
                }
            }
            name
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                result.push('$');
                continue;
            }
            name
        };
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
