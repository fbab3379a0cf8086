//! Comandos de texto con prefijo: `_p`, `_l`, `_s`, `_d`.

use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    audio::{registry::SessionRegistry, session::DownloadRequest},
    sources::QueryResolver,
    ui::messages,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reproducir o encolar; `looped` repite el track hasta un skip
    Play { query: String, looped: bool },
    Skip,
    Disconnect,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no prompt supplied")]
    MissingQuery,
}

/// Interpreta un mensaje. `Ok(None)` si no es un comando conocido.
pub fn parse(content: &str, prefix: char) -> Result<Option<Command>, CommandError> {
    let Some(rest) = content.strip_prefix(prefix) else {
        return Ok(None);
    };

    let query = || {
        rest.split_once(' ')
            .map(|(_, query)| query.trim())
            .filter(|query| !query.is_empty())
            .map(str::to_string)
            .ok_or(CommandError::MissingQuery)
    };

    let command = match rest.chars().next() {
        Some('p') => Command::Play {
            query: query()?,
            looped: false,
        },
        Some('l') => Command::Play {
            query: query()?,
            looped: true,
        },
        Some('s') => Command::Skip,
        Some('d') => Command::Disconnect,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// Mensaje de chat ya despojado de los tipos de serenity
#[derive(Debug, Clone)]
pub struct Inbound<'a> {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub author: UserId,
    pub content: &'a str,
}

/// Traduce comandos en peticiones y señales sobre la sesión de la guild.
pub struct CommandRouter {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn QueryResolver>,
    prefix: char,
}

impl CommandRouter {
    pub fn new(registry: Arc<SessionRegistry>, resolver: Arc<dyn QueryResolver>, prefix: char) -> Self {
        Self {
            registry,
            resolver,
            prefix,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn route(&self, message: Inbound<'_>) {
        let command = match parse(message.content, self.prefix) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(e) => {
                self.report(message.guild, &e.to_string()).await;
                self.reply(message.channel, messages::MISSING_PROMPT).await;
                return;
            }
        };

        info!(
            "📝 Comando {:?} de {} en guild {}",
            command, message.author, message.guild
        );

        let session = self.registry.get_or_create(message.guild);
        match command {
            Command::Play { query, looped } => self.play(&message, &query, looped).await,
            Command::Skip => session.skip.raise(Some(message.channel)),
            Command::Disconnect => session.disconnect.raise(Some(message.channel)),
        }
    }

    async fn play(&self, message: &Inbound<'_>, query: &str, looped: bool) {
        let media_id = match self.resolver.resolve(query).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                self.reply(message.channel, messages::NOT_FOUND).await;
                return;
            }
            Err(e) => {
                self.report(message.guild, &format!("can't find video id {:#}", e))
                    .await;
                return;
            }
        };

        let request = DownloadRequest {
            requester: message.author,
            origin: message.channel,
            media_id,
            looped,
        };

        if let Err(request) = self.registry.submit_download(message.guild, request).await {
            self.report(
                message.guild,
                &format!("download of {} was not accepted", request.media_id),
            )
            .await;
        }
    }

    async fn reply(&self, channel: ChannelId, content: &str) {
        if let Err(e) = self
            .registry
            .services()
            .chat
            .send_message(channel, content, None)
            .await
        {
            warn!("No se pudo responder en {}: {:?}", channel, e);
        }
    }

    async fn report(&self, guild: GuildId, message: &str) {
        error!("❌ [guild {}] {}", guild, message);
        let report = format!("[guild {}] {}", guild, message);
        if let Err(e) = self.registry.services().chat.notify_operator(&report).await {
            warn!("No se pudo notificar al operador: {:?}", e);
        }
    }
}
