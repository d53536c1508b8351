//! Application layer errors

use std::path::PathBuf;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("missing {0}")]
    MissingField(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Per-plugin errors. These are reported and never abort startup,
/// except for [`PluginError::Io`] on the plugins root itself.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("invalid manifest {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("manifest {} does not declare `main`", .0.display())]
    MissingMain(PathBuf),

    #[error("entry file not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    #[error("unsupported entry file: {}", .0.display())]
    UnsupportedEntry(PathBuf),

    #[error("failed to load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("setup of plugin '{plugin}' failed: {message}")]
    Setup { plugin: String, message: String },

    #[error("plugin '{0}' already loaded")]
    Duplicate(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plugin source `{0}`, expected owner/repo or owner/repo@branch")]
    InvalidSource(String),

    #[error("plugin folder {} already exists", .0.display())]
    AlreadyInstalled(PathBuf),

    #[error("download failed: {0}")]
    Download(String),

    #[error("bad plugin archive: {0}")]
    Archive(String),
}

pub type PluginResult<T> = Result<T, PluginError>;
