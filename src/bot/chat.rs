use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    builder::CreateMessage,
    cache::Cache,
    http::Http,
    model::id::{ChannelId, GuildId, MessageId, UserId},
};
use std::sync::Arc;
use tracing::debug;

use crate::{
    platform::{ChatPlatform, Notice},
    ui::embeds,
};

/// Discord limita el contenido de un mensaje a 2000 caracteres
const MESSAGE_LIMIT: usize = 2000;

/// Adaptador de chat sobre la API HTTP y la caché de serenity
pub struct SerenityChat {
    http: Arc<Http>,
    cache: Arc<Cache>,
    operator: Option<UserId>,
}

impl SerenityChat {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, operator: Option<UserId>) -> Self {
        Self {
            http,
            cache,
            operator,
        }
    }
}

#[async_trait]
impl ChatPlatform for SerenityChat {
    async fn send_message(&self, channel: ChannelId, content: &str, notice: Option<Notice>) -> Result<()> {
        let mut message = CreateMessage::new().content(truncate(content, MESSAGE_LIMIT));
        if let Some(notice) = &notice {
            message = message.embed(embeds::notice_embed(notice));
        }

        channel.send_message(&*self.http, message).await?;
        Ok(())
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        channel.delete_message(&*self.http, message).await?;
        Ok(())
    }

    async fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        let guild = guild.to_guild_cached(&self.cache)?;
        guild
            .voice_states
            .get(&user)
            .and_then(|voice_state| voice_state.channel_id)
    }

    async fn notify_operator(&self, message: &str) -> Result<()> {
        let Some(operator) = self.operator else {
            debug!("Sin operador configurado, reporte descartado");
            return Ok(());
        };

        let dm = operator.create_dm_channel(&*self.http).await?;
        dm.id
            .send_message(
                &*self.http,
                CreateMessage::new().content(truncate(message, MESSAGE_LIMIT)),
            )
            .await?;
        Ok(())
    }
}

/// Corta en un límite de carácter para no partir UTF-8
fn truncate(content: &str, limit: usize) -> &str {
    match content.char_indices().nth(limit) {
        Some((index, _)) => &content[..index],
        None => content,
    }
}
