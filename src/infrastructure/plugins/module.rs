//! Loaded plugin code and the handle it registers commands through

use std::path::Path;

use crate::application::errors::PluginResult;
use crate::application::services::CommandService;
use crate::domain::entities::Command;

/// A loaded plugin entry file.
///
/// The registration hook is optional: a module without one is still
/// loaded, it just adds nothing to the bot.
pub trait PluginModule: Send + Sync {
    /// Entry kind, for logs ("script", "library")
    fn kind(&self) -> &'static str;

    /// Whether the entry exposes a registration hook
    fn has_setup(&self) -> bool;

    /// Run the registration hook. Called at most once, during startup.
    fn setup(&self, host: &mut PluginHost<'_>, config_dir: &Path) -> PluginResult<()>;
}

/// The bot handle a plugin's hook receives. Plugins can add commands but
/// cannot remove or inspect what others registered.
///
/// Additions are staged and only reach the bot on [`PluginHost::commit`],
/// so a hook that fails halfway leaves nothing behind.
pub struct PluginHost<'a> {
    commands: &'a mut CommandService,
    plugin: String,
    staged: Vec<Command>,
}

impl<'a> PluginHost<'a> {
    pub fn new(commands: &'a mut CommandService, plugin: impl Into<String>) -> Self {
        Self {
            commands,
            plugin: plugin.into(),
            staged: Vec::new(),
        }
    }

    /// Name of the plugin being set up
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Command prefix the bot listens for
    pub fn prefix(&self) -> &str {
        self.commands.prefix()
    }

    pub fn add_command(&mut self, command: Command) {
        let command = command.with_owner(self.plugin.clone());
        self.staged.push(command);
    }

    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Hand staged commands to the bot; returns how many were added
    pub fn commit(self) -> usize {
        let count = self.staged.len();
        for command in self.staged {
            self.commands.register(command);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_reaches_the_bot_before_commit() {
        let mut commands = CommandService::new("!");
        {
            let mut host = PluginHost::new(&mut commands, "dice");
            host.add_command(Command::new("roll").with_reply("4"));
            assert_eq!(host.staged(), 1);
            // dropped without commit
        }
        assert!(commands.get("roll").is_none());

        let mut host = PluginHost::new(&mut commands, "dice");
        assert_eq!(host.prefix(), "!");
        host.add_command(Command::new("roll").with_reply("4"));
        assert_eq!(host.commit(), 1);

        let roll = commands.get("roll").unwrap();
        assert_eq!(roll.owner.as_deref(), Some("dice"));
    }
}
