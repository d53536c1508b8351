//! Bot runtime - the command table, loaded plugins and bot identity that
//! platform adapters dispatch into

use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::MessageParser;
use crate::application::services::CommandService;
use crate::domain::entities::User;
use crate::domain::traits::BotIdentity;
use crate::infrastructure::config::Settings;
use crate::infrastructure::plugins::{LoadReport, PluginLoader, PluginRegistry};

/// Everything the bot serves. Built once at startup, shared read-only
/// with the adapter afterwards.
pub struct BotRuntime {
    commands: CommandService,
    parser: MessageParser,
    identity: BotIdentity,
    // Dropped after `commands`: library plugins must outlive their handlers
    plugins: PluginRegistry,
}

impl BotRuntime {
    /// A runtime with only the built-in commands
    pub fn new(prefix: &str) -> Self {
        let identity = BotIdentity::new();
        let mut commands = CommandService::new(prefix);
        commands.register_builtins(&identity);

        Self {
            commands,
            parser: MessageParser::new(prefix),
            identity,
            plugins: PluginRegistry::new(),
        }
    }

    /// Built-ins plus every plugin found under the configured plugins root
    pub fn start(settings: &Settings) -> Result<(Self, LoadReport), BotError> {
        let mut runtime = Self::new(&settings.prefix);
        let loader = PluginLoader::from_paths(&settings.plugins);
        let report = runtime.load_plugins(&loader)?;
        Ok((runtime, report))
    }

    pub fn load_plugins(&mut self, loader: &PluginLoader) -> Result<LoadReport, BotError> {
        let report = loader.load_all(&mut self.commands, &mut self.plugins)?;
        Ok(report)
    }

    /// Handle one incoming text message; `Some` is the reply to send.
    ///
    /// Runs plugin code synchronously, so async callers should move it off
    /// the executor. Messages from other bots are never answered.
    pub fn dispatch(&self, chat_id: impl Into<String>, text: &str, sender: Option<User>) -> Option<String> {
        if sender.as_ref().is_some_and(|user| user.is_bot) {
            return None;
        }

        let message = self.parser.parse(chat_id, text, sender);
        if !message.content.is_command() {
            return None;
        }

        tracing::debug!("[{}] {} from {}", message.chat_id, text, message.author_name());

        match self.commands.handle(&message) {
            Ok(Some(reply)) if !reply.is_empty() => Some(reply),
            Ok(_) => None,
            Err(CommandError::NotFound(name)) => {
                tracing::debug!("Unknown command {}{}", self.parser.prefix(), name);
                None
            }
            Err(e) => {
                tracing::warn!("[{}] {}", message.chat_id, e);
                None
            }
        }
    }

    pub fn commands(&self) -> &CommandService {
        &self.commands
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub fn prefix(&self) -> &str {
        self.parser.prefix()
    }
}
