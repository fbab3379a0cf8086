use serenity::model::id::GuildId;
use std::{path::PathBuf, sync::Arc};
use tracing::{error, warn};

use super::{encoder::EncoderFactory, transcode::Transcoder};
use crate::{
    error::PipelineError,
    platform::{ChatPlatform, VoiceTransport},
    sources::MediaFetcher,
};

/// Parámetros del pipeline que salen de la configuración
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub assets_dir: PathBuf,
    pub play_queue_capacity: usize,
    pub artifact_slots: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            assets_dir: "assets".into(),
            play_queue_capacity: 10,
            artifact_slots: 10,
        }
    }
}

/// Colaboradores externos compartidos por todos los workers
pub struct Services {
    pub chat: Arc<dyn ChatPlatform>,
    pub voice: Arc<dyn VoiceTransport>,
    pub media: Arc<dyn MediaFetcher>,
    pub transcoder: Arc<dyn Transcoder>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub settings: PipelineSettings,
}

impl Services {
    /// Registra el fallo y lo reenvía al operador.
    pub async fn report(&self, guild: GuildId, err: &PipelineError) {
        error!("❌ [guild {}] {}", guild, err);

        let message = format!("[guild {}] {}", guild, err);
        if let Err(e) = self.chat.notify_operator(&message).await {
            warn!("No se pudo notificar al operador: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fakes::FakeServices;
    use crate::platform::MockChatPlatform;

    #[tokio::test]
    async fn report_reaches_operator() {
        let fakes = FakeServices::new(std::env::temp_dir());
        let services = fakes.services();

        services
            .report(GuildId::new(5), &PipelineError::QueueFull { capacity: 10 })
            .await;

        let reports = fakes.chat.operator_reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].starts_with("[guild 5]"));
    }

    #[tokio::test]
    async fn undeliverable_report_is_swallowed() {
        let mut chat = MockChatPlatform::new();
        chat.expect_notify_operator()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("dm closed")));

        let fakes = FakeServices::new(std::env::temp_dir());
        let mut services = fakes.services();
        services.chat = Arc::new(chat);

        services
            .report(GuildId::new(5), &PipelineError::NoAudioFormat("abc".into()))
            .await;
    }
}
