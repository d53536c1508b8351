//! plugbot - a minimal chat bot shell
//!
//! Loads `config.toml`, registers the built-in `ping` and `hello` commands,
//! loads plugin folders from `plugins/`, then hands the resulting
//! [`BotRuntime`](application::services::BotRuntime) to a platform adapter.

pub mod application;
pub mod domain;
pub mod infrastructure;
