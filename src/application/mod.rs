//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: command handling and the bot runtime
//! - Errors: Domain-specific errors
//! - Messaging: Message parsing

pub mod errors;
pub mod services;
pub mod messaging;
