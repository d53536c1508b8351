//! Plugin system
//!
//! Plugins are folders under the plugins root with a `plugin.toml` manifest.
//! The manifest's `main` entry is either a Rhai script or a shared library;
//! both may expose a `setup(bot, config_dir)` hook that adds commands.
//! Plugins can also be installed from a GitHub repository.

pub mod installer;
pub mod library;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod registry;
pub mod script;

pub use installer::{PluginInstaller, PluginSource};
pub use loader::{DiscoveredFolder, Discovery, LoadReport, PluginLoader};
pub use manifest::PluginManifest;
pub use module::{PluginHost, PluginModule};
pub use registry::{PluginRecord, PluginRegistry};
