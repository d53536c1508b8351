use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::services::BotRuntime;

/// Bot trait - abstraction for messaging platform adapters.
///
/// An adapter owns the connection lifecycle: it connects, feeds every
/// incoming text message to [`BotRuntime::dispatch`] and sends back the
/// reply, until the connection ends.
#[async_trait]
pub trait Bot: Send {
    /// Platform name used in logs and on parsed messages
    fn platform(&self) -> &'static str;

    /// Connect and serve until the connection closes
    async fn run(&mut self, runtime: Arc<BotRuntime>) -> Result<(), BotError>;
}

/// Bot information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
}

/// Who the bot is logged in as. Known only once the adapter has connected,
/// set at most once, readable from command handlers.
#[derive(Debug, Clone, Default)]
pub struct BotIdentity(Arc<OnceCell<BotInfo>>);

impl BotIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the identity was already set
    pub fn set(&self, info: BotInfo) -> bool {
        self.0.set(info).is_ok()
    }

    pub fn get(&self) -> Option<&BotInfo> {
        self.0.get()
    }

    pub fn name(&self) -> String {
        self.get()
            .map(|info| info.name.clone())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
    }
}
