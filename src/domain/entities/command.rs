use std::collections::HashMap;
use std::fmt;

use crate::application::errors::CommandError;
use crate::domain::entities::Message;

/// Represents a bot command
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub handler: Option<CommandHandler>,
    /// Plugin that registered the command, `None` for built-ins
    pub owner: Option<String>,
}

/// Command handler function type
pub type CommandHandler = Box<dyn Fn(&Message) -> Result<String, CommandError> + Send + Sync>;

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            handler: None,
            owner: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Message) -> Result<String, CommandError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Reply with the same text on every invocation
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        self.with_handler(move |_| Ok(reply.clone()))
    }

    pub fn matches(&self, input: &str) -> bool {
        self.name.eq_ignore_ascii_case(input)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(input))
    }

    pub fn run(&self, message: &Message) -> Result<String, CommandError> {
        match &self.handler {
            Some(handler) => handler(message),
            None => Err(CommandError::ExecutionFailed(format!(
                "command {} has no handler",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Command registry for managing available commands.
///
/// Names are case-insensitive. Registering a name that already exists
/// replaces the previous command and hands it back to the caller.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) -> Option<Command> {
        self.commands.insert(command.name.to_lowercase(), command)
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(&name.to_lowercase())
    }

    /// Look up by name first, then by alias
    pub fn find(&self, input: &str) -> Option<&Command> {
        self.get(input)
            .or_else(|| self.commands.values().find(|c| c.matches(input)))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_case_insensitive_and_follows_aliases() {
        let mut registry = CommandRegistry::new();
        registry.register(
            Command::new("ping")
                .with_aliases(vec!["p".to_string()])
                .with_reply("Pong!"),
        );

        assert!(registry.find("PING").is_some());
        assert_eq!(registry.find("p").map(|c| c.name.as_str()), Some("ping"));
        assert!(registry.find("pong").is_none());
    }

    #[test]
    fn register_replaces_and_returns_previous() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register(Command::new("ping").with_reply("a")).is_none());

        let replaced = registry.register(Command::new("Ping").with_reply("b").with_owner("x"));
        assert_eq!(replaced.map(|c| c.name), Some("ping".to_string()));
        assert_eq!(registry.len(), 1);

        let msg = Message::from_command("c", "ping", vec![]);
        assert_eq!(registry.find("ping").map(|c| c.run(&msg).ok()), Some(Some("b".to_string())));
    }

    #[test]
    fn command_without_handler_fails() {
        let msg = Message::from_command("c", "noop", vec![]);
        assert!(matches!(
            Command::new("noop").run(&msg),
            Err(CommandError::ExecutionFailed(_))
        ));
    }
}
