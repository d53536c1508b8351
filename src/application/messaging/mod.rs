//! Message handling - Turning raw chat text into commands

pub mod parser;

pub use parser::MessageParser;
