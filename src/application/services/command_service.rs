use crate::application::errors::CommandError;
use crate::domain::entities::{Command, CommandRegistry, Content, Message};
use crate::domain::traits::BotIdentity;

const HELP: &str = "help";
const HELP_DESCRIPTION: &str = "List available commands";

/// Service for managing and executing commands
pub struct CommandService {
    registry: CommandRegistry,
    prefix: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            prefix: prefix.into(),
        }
    }

    /// Register a command. A command with the same name is replaced.
    pub fn register(&mut self, command: Command) -> Option<Command> {
        let name = command.name.clone();
        let owner = command.owner.clone();
        let replaced = self.registry.register(command);

        if let Some(previous) = &replaced {
            tracing::warn!(
                "Command {}{} from {} replaced by {}",
                self.prefix,
                name,
                previous.owner.as_deref().unwrap_or("built-ins"),
                owner.as_deref().unwrap_or("built-ins"),
            );
        }
        replaced
    }

    pub fn register_builtins(&mut self, identity: &BotIdentity) {
        self.register(
            Command::new("ping")
                .with_description("Check that the bot is alive")
                .with_reply("Pong!"),
        );

        let identity = identity.clone();
        self.register(
            Command::new("hello")
                .with_description("Greet the caller")
                .with_handler(move |msg| {
                    Ok(format!("Hello {}! I am {}.", msg.author_name(), identity.name()))
                }),
        );
    }

    /// Run the command a message carries. `Ok(None)` for non-command messages.
    ///
    /// `help` is answered here unless a plugin registered its own.
    pub fn handle(&self, message: &Message) -> Result<Option<String>, CommandError> {
        let Content::Command { name, .. } = &message.content else {
            return Ok(None);
        };

        if name.eq_ignore_ascii_case(HELP) && self.registry.get(HELP).is_none() {
            return Ok(Some(self.help()));
        }

        let cmd = self
            .registry
            .find(name)
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        cmd.run(message).map(Some)
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.registry.get(name)
    }

    /// Command names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.all().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    /// One line per command with its description, sorted by name
    pub fn help(&self) -> String {
        let mut entries: Vec<(&str, Option<&str>)> = self
            .registry
            .all()
            .map(|c| (c.name.as_str(), c.description.as_deref()))
            .collect();
        if self.registry.get(HELP).is_none() {
            entries.push((HELP, Some(HELP_DESCRIPTION)));
        }
        entries.sort();

        let mut text = String::from("Commands:");
        for (name, description) in entries {
            match description {
                Some(description) => text.push_str(&format!("\n  {}{} - {}", self.prefix, name, description)),
                None => text.push_str(&format!("\n  {}{}", self.prefix, name)),
            }
        }
        text
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
