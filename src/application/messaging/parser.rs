//! Message parser - Parses raw text into structured messages

use crate::domain::entities::{Content, Message, User};

/// Parses incoming text into [`Message`] objects, recognising
/// prefix-triggered commands
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a text message
    pub fn parse(&self, chat_id: impl Into<String>, text: &str, sender: Option<User>) -> Message {
        let content = self.parse_content(text);
        Message::new(chat_id, content).with_sender_opt(sender)
    }

    fn parse_content(&self, text: &str) -> Content {
        let text = text.trim();
        if text.is_empty() {
            return Content::Empty;
        }

        let Some(cmd_text) = text.strip_prefix(self.command_prefix.as_str()) else {
            return Content::Text(text.to_string());
        };

        // "!" alone, or "! ping", is not a command
        if cmd_text.starts_with(char::is_whitespace) {
            return Content::Text(text.to_string());
        }

        let mut parts = cmd_text.split_whitespace();
        match parts.next() {
            Some(name) => Content::Command {
                name: name.to_string(),
                args: parts.map(str::to_string).collect(),
            },
            None => Content::Text(text.to_string()),
        }
    }
}
