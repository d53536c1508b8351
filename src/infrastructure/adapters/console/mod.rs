//! Console adapter for development/testing
//!
//! Reads one message per line and writes replies as `[BOT] <reply>`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::application::errors::BotError;
use crate::application::services::BotRuntime;
use crate::domain::entities::User;
use crate::domain::traits::{Bot, BotInfo};

const CHAT_ID: &str = "console";

/// Console bot adapter for local development
pub struct ConsoleAdapter<R, W> {
    reader: R,
    writer: W,
    user: User,
    info: BotInfo,
}

impl ConsoleAdapter<BufReader<Stdin>, Stdout> {
    /// Talk on stdin/stdout as the current OS user
    pub fn new() -> Self {
        let name = std::env::var("USER").unwrap_or_else(|_| "operator".to_string());
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .with_user(User::new(CHAT_ID).with_username(name))
    }
}

impl Default for ConsoleAdapter<BufReader<Stdin>, Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> ConsoleAdapter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            user: User::new(CHAT_ID),
            info: BotInfo {
                id: CHAT_ID.to_string(),
                name: env!("CARGO_PKG_NAME").to_string(),
            },
        }
    }

    /// Who the typed messages appear to come from
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> Bot for ConsoleAdapter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn platform(&self) -> &'static str {
        "console"
    }

    async fn run(&mut self, runtime: Arc<BotRuntime>) -> Result<(), BotError> {
        runtime.identity().set(self.info.clone());
        tracing::info!("Starting console bot (dev mode), prefix {}", runtime.prefix());

        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                break;
            }

            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            if let Some(reply) = runtime.dispatch(CHAT_ID, text, Some(self.user.clone())) {
                self.writer.write_all(format!("[BOT] {}\n", reply).as_bytes()).await?;
                self.writer.flush().await?;
            }
        }

        tracing::info!("Console closed");
        Ok(())
    }
}
