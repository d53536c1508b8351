//! Configuration management
//!
//! Settings come from a TOML file:
//!
//! ```toml
//! [bot]
//! token = "..."      # required
//! prefix = "!"       # default "!"
//!
//! [settings]
//! debug = false      # default false
//!
//! [plugins]
//! directory = "plugins"  # discovery root
//! storage = "config"     # per-plugin storage root
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::application::errors::ConfigError;

const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_TOKEN";

/// Immutable bot settings, created once at startup
#[derive(Clone)]
pub struct Settings {
    pub token: String,
    pub prefix: String,
    pub debug: bool,
    pub plugins: PluginPaths,
}

/// Where plugins are discovered and where their storage folders live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginPaths {
    pub directory: PathBuf,
    pub storage: PathBuf,
}

impl Default for PluginPaths {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("plugins"),
            storage: PathBuf::from("config"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    settings: RawSettings,
    #[serde(default)]
    plugins: RawPlugins,
}

#[derive(Debug, Default, Deserialize)]
struct RawBot {
    token: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    #[serde(default)]
    debug: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlugins {
    directory: Option<PathBuf>,
    storage: Option<PathBuf>,
}

impl Settings {
    /// Commented template written by `plugbot init-config`
    pub const TEMPLATE: &'static str = r#"# plugbot configuration

[bot]
# Gateway token of the bot account (required)
token = "YOUR_BOT_TOKEN"
# Text that marks a message as a command
prefix = "!"

[settings]
debug = false

[plugins]
directory = "plugins"
storage = "config"
"#;

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.message().to_string()))?;

        let token = raw
            .bot
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingField("token".to_string()))?;

        if token == PLACEHOLDER_TOKEN {
            return Err(ConfigError::InvalidValue(format!(
                "token is still the placeholder `{PLACEHOLDER_TOKEN}`"
            )));
        }

        let prefix = raw.bot.prefix.unwrap_or_else(|| "!".to_string());
        if prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("prefix must not be empty".to_string()));
        }

        let defaults = PluginPaths::default();
        Ok(Self {
            token,
            prefix,
            debug: raw.settings.debug,
            plugins: PluginPaths {
                directory: raw.plugins.directory.unwrap_or(defaults.directory),
                storage: raw.plugins.storage.unwrap_or(defaults.storage),
            },
        })
    }

    /// Write the template to `path`, never overwriting an existing file
    pub fn write_template(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(ConfigError::InvalidValue(format!(
                "{} already exists",
                path.display()
            )));
        }
        std::fs::write(path, Self::TEMPLATE).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &"<redacted>")
            .field("prefix", &self.prefix)
            .field("debug", &self.debug)
            .field("plugins", &self.plugins)
            .finish()
    }
}
