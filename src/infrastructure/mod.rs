//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Logging: tracing subscriber setup
//! - Plugins: discovery and loading of plugin folders
//! - Adapters: Platform integrations (Discord, console)

pub mod adapters;
pub mod config;
pub mod logging;
pub mod plugins;
