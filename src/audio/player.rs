use std::{path::Path, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    artifacts::remove_artifacts,
    frames::{load_frames, Frame},
    services::Services,
    session::{GuildSession, PlayRequest},
};
use crate::{error::PipelineError, platform::VoiceConnection, ui::messages};

/// Cómo terminó el streaming de un track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Finished,
    Skipped,
    Disconnected,
}

/// Playback Worker de una guild
pub struct Player {
    session: Arc<GuildSession>,
    services: Arc<Services>,
    queue: mpsc::Receiver<PlayRequest>,
}

impl Player {
    pub fn new(
        session: Arc<GuildSession>,
        services: Arc<Services>,
        queue: mpsc::Receiver<PlayRequest>,
    ) -> Self {
        Self {
            session,
            services,
            queue,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let guild = self.session.guild();
        debug!("▶️ Playback worker iniciado para guild {}", guild);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                request = self.queue.recv() => match request {
                    Some(request) => self.play(request).await,
                    None => break,
                },
                _ = self.session.disconnect.raised() => self.disconnect_while_idle().await,
            }
        }

        debug!("▶️ Playback worker detenido para guild {}", guild);
    }

    async fn play(&mut self, request: PlayRequest) {
        let guild = self.session.guild();

        // Señales emitidas para un track anterior no afectan a este
        self.session.skip.clear();
        self.session.disconnect.clear();
        self.session.set_busy(true);

        info!("🎵 Reproduciendo {} en guild {}", request.title, guild);
        let outcome = self.stream(&request).await;

        self.session.set_busy(false);
        self.session.touch();

        if let Err(e) = &outcome {
            self.services.report(guild, e).await;
        }
        if !matches!(outcome, Ok(Outcome::Disconnected)) && self.queue.is_empty() {
            // Nada más en cola: salir del canal de voz
            self.leave_voice().await;
        }

        self.release(&request.path).await;
    }

    async fn stream(&mut self, request: &PlayRequest) -> Result<Outcome, PipelineError> {
        let frames = load_frames(&request.path).await?;
        debug!("📦 {} frames cargados de {}", frames.len(), request.path.display());

        let guild = self.session.guild();
        let channel = self
            .services
            .chat
            .voice_channel_of(guild, request.requester)
            .await
            .ok_or(PipelineError::NotInVoice(request.requester))?;

        let mut connection = self
            .services
            .voice
            .join(guild, channel)
            .await
            .map_err(PipelineError::Connect)?;

        connection.speaking(true).await.map_err(PipelineError::Transport)?;
        let outcome = self.send_frames(request, &frames, connection.as_mut()).await;

        if !matches!(outcome, Ok(Outcome::Disconnected)) {
            if let Err(e) = connection.speaking(false).await {
                self.services.report(guild, &PipelineError::Transport(e)).await;
            }
        }
        outcome
    }

    async fn send_frames(
        &mut self,
        request: &PlayRequest,
        frames: &[Frame],
        connection: &mut dyn VoiceConnection,
    ) -> Result<Outcome, PipelineError> {
        let guild = self.session.guild();
        let mut encoder = self.services.encoders.create().map_err(PipelineError::Encode)?;
        let mut encode_failures = 0usize;

        let outcome = 'track: loop {
            for frame in frames {
                if let Some(origin) = self.session.skip.take() {
                    info!("⏭️ {} saltado en guild {}", request.title, guild);
                    if let Some(channel) = origin {
                        self.say(channel, &messages::skipped(&request.title)).await;
                    }
                    break 'track Outcome::Skipped;
                }

                if let Some(origin) = self.session.disconnect.take() {
                    self.disconnect_and_purge(origin).await;
                    break 'track Outcome::Disconnected;
                }

                match encoder.encode(frame) {
                    Ok(packet) => connection
                        .send(packet)
                        .await
                        .map_err(PipelineError::Transport)?,
                    Err(e) => {
                        // Solo el primero llega al operador; el resto se cuenta
                        if encode_failures == 0 {
                            self.services.report(guild, &PipelineError::Encode(e)).await;
                        }
                        encode_failures += 1;
                    }
                }
            }

            if !request.looped || frames.is_empty() {
                break 'track Outcome::Finished;
            }
            debug!("🔂 Repitiendo {}", request.title);
        };

        if encode_failures > 1 {
            warn!(
                "⚠️ {} frames de {} no se pudieron codificar",
                encode_failures, request.title
            );
        }
        Ok(outcome)
    }

    /// Desconecta la voz y vacía la cola de tracks que no empezaron.
    async fn disconnect_and_purge(&mut self, origin: Option<serenity::model::id::ChannelId>) {
        let guild = self.session.guild();
        info!("🔌 Desconectando guild {}", guild);

        self.leave_voice().await;

        let mut purged = 0;
        while let Ok(pending) = self.queue.try_recv() {
            self.release(&pending.path).await;
            purged += 1;
        }
        if purged > 0 {
            info!("🗑️ {} tracks descartados de la cola", purged);
        }

        if let Some(channel) = origin {
            self.say(channel, messages::DISCONNECTING).await;
        }
    }

    async fn disconnect_while_idle(&mut self) {
        // El permiso de Notify puede quedar de una señal ya consumida
        let Some(origin) = self.session.disconnect.take() else {
            return;
        };

        if self.services.voice.is_connected(self.session.guild()).await {
            self.disconnect_and_purge(origin).await;
        }
    }

    async fn leave_voice(&self) {
        let guild = self.session.guild();
        if !self.services.voice.is_connected(guild).await {
            return;
        }
        if let Err(e) = self.services.voice.disconnect(guild).await {
            self.services.report(guild, &PipelineError::Transport(e)).await;
        }
    }

    async fn release(&self, path: &Path) {
        for failure in remove_artifacts(path).await {
            self.services.report(self.session.guild(), &failure).await;
        }
        // Hasta aquí la ranura no puede volver a usarse
        self.session.artifacts.release(path);
    }

    async fn say(&self, channel: serenity::model::id::ChannelId, content: &str) {
        if let Err(e) = self.services.chat.send_message(channel, content, None).await {
            self.services
                .report(self.session.guild(), &PipelineError::Transport(e))
                .await;
        }
    }
}
