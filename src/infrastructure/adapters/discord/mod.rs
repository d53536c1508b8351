//! Discord adapter - gateway connection via serenity
//!
//! Serenity owns the connection, reconnects and the per-event tasks. This
//! adapter only turns message events into [`BotRuntime::dispatch`] calls.

use async_trait::async_trait;
use serenity::all::{Context, EventHandler, GatewayIntents, Message, Ready};
use serenity::Client;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::services::BotRuntime;
use crate::domain::entities::User;
use crate::domain::traits::{Bot, BotInfo};

/// Discord bot adapter
pub struct DiscordAdapter {
    token: String,
}

impl DiscordAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    /// Things we want discord to tell us about
    fn intents() -> GatewayIntents {
        GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }
}

struct Handler {
    runtime: Arc<BotRuntime>,
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.runtime.identity().set(BotInfo {
            id: ready.user.id.to_string(),
            name: ready.user.name.clone(),
        });
        tracing::info!("{} has connected to Discord!", ready.user.name);
        tracing::info!("Bot is ready and using prefix: {}", self.runtime.prefix());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let mut sender = User::new(msg.author.id.to_string())
            .with_username(msg.author.name.clone())
            .with_nickname(msg.author.global_name.clone());
        if msg.author.bot {
            sender = sender.as_bot();
        }

        // Plugin handlers are synchronous and may be slow
        let runtime = Arc::clone(&self.runtime);
        let channel = msg.channel_id.to_string();
        let content = msg.content.clone();
        let dispatched =
            tokio::task::spawn_blocking(move || runtime.dispatch(channel, &content, Some(sender))).await;

        let reply = match dispatched {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Command handler in channel {} did not finish: {}", msg.channel_id, e);
                return;
            }
        };

        if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            tracing::warn!("Failed to reply in channel {}: {}", msg.channel_id, e);
        }
    }
}

#[async_trait]
impl Bot for DiscordAdapter {
    fn platform(&self) -> &'static str {
        "discord"
    }

    async fn run(&mut self, runtime: Arc<BotRuntime>) -> Result<(), BotError> {
        let mut client = Client::builder(&self.token, Self::intents())
            .event_handler(Handler { runtime })
            .await
            .map_err(|e| BotError::Network(format!("failed to create client: {}", e)))?;

        client
            .start()
            .await
            .map_err(|e| BotError::Network(e.to_string()))
    }
}
