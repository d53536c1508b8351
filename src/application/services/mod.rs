//! Application services - Business logic orchestration

pub mod bot_runtime;
pub mod command_service;

pub use bot_runtime::BotRuntime;
pub use command_service::CommandService;
