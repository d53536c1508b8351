//! Domain layer - Core business objects
//!
//! This layer contains:
//! - Entities: User, Message, Command
//! - Traits: the chat platform abstraction (Bot)

pub mod entities;
pub mod traits;
