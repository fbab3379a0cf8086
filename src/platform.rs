//! Puertos hacia la plataforma de chat y el transporte de voz.
//!
//! El pipeline de audio solo conoce estos traits; las implementaciones reales
//! (serenity + songbird) viven en [`crate::bot`].

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

use crate::sources::Thumbnail;

/// Contenido enriquecido que acompaña a una notificación
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub requested_by: UserId,
    pub image: Option<Thumbnail>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
        notice: Option<Notice>,
    ) -> Result<()>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    /// Canal de voz en el que está el usuario dentro de la guild
    async fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId>;

    /// Canal de reportes para el operador del bot
    async fn notify_operator(&self, message: &str) -> Result<()>;
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> Result<Box<dyn VoiceConnection>>;

    async fn is_connected(&self, guild: GuildId) -> bool;

    async fn disconnect(&self, guild: GuildId) -> Result<()>;
}

/// Conexión de voz activa
#[async_trait]
pub trait VoiceConnection: Send {
    async fn speaking(&mut self, on: bool) -> Result<()>;

    /// Envía un paquete ya codificado
    async fn send(&mut self, packet: Vec<u8>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chat_port_deletes_by_channel_and_message() {
        let mut chat = MockChatPlatform::new();
        chat.expect_delete_message()
            .withf(|channel, message| *channel == ChannelId::new(1) && *message == MessageId::new(2))
            .times(1)
            .returning(|_, _| Ok(()));

        let chat: Box<dyn ChatPlatform> = Box::new(chat);
        chat.delete_message(ChannelId::new(1), MessageId::new(2)).await.unwrap();
    }
}
