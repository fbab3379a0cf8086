//! # Bot Module
//!
//! Discord side of the jukebox.
//!
//! This module contains:
//! - The [`JukeboxBot`] event handler (ready, messages, voice state updates)
//! - [`commands`]: prefix command parsing and routing into guild sessions
//! - [`chat`] and [`voice`]: serenity/songbird implementations of the
//!   pipeline's collaborator ports
//!
//! ## Architecture
//!
//! The pipeline itself (sessions, workers) lives in [`crate::audio`] and only
//! knows the traits from [`crate::platform`]. The handler builds the real
//! collaborators once the gateway is ready, because serenity's `Http` and
//! `Cache` and the songbird manager only exist at that point.

use anyhow::{anyhow, Result};
use serenity::{
    all::{ActivityData, Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

pub mod chat;
pub mod commands;
pub mod voice;

use crate::{
    audio::{
        encoder::OpusEncoderFactory, registry::SessionRegistry, services::Services,
        transcode::FfmpegTranscoder,
    },
    config::Config,
    sources::{YouTubeSearch, YtDlpFetcher},
};
use chat::SerenityChat;
use commands::{CommandRouter, Inbound};
use voice::SongbirdTransport;

/// Main Discord event handler.
///
/// ## Fields
///
/// - `config`: bot configuration (token, prefix, pipeline limits)
/// - `router`: built on the first `ready`, shared by every later event
pub struct JukeboxBot {
    config: Arc<Config>,
    router: OnceCell<CommandRouter>,
}

impl JukeboxBot {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            router: OnceCell::new(),
        }
    }

    /// Builds the production collaborators and the session registry.
    async fn build_router(&self, ctx: &Context) -> Result<CommandRouter> {
        let config = &self.config;
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow!("Songbird no inicializado"))?;

        let media = YtDlpFetcher::new(config.ytdlp_path.clone())?;
        match media.verify().await {
            Ok(version) => info!("📦 yt-dlp {}", version),
            Err(e) => warn!("⚠️ yt-dlp no responde: {:?}", e),
        }

        let services = Services {
            chat: Arc::new(SerenityChat::new(
                ctx.http.clone(),
                ctx.cache.clone(),
                config.operator_id,
            )),
            voice: Arc::new(SongbirdTransport::new(manager, config.voice_buffer_frames)),
            media: Arc::new(media),
            transcoder: Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone())),
            encoders: Arc::new(OpusEncoderFactory),
            settings: config.pipeline_settings(),
        };

        let registry = Arc::new(SessionRegistry::new(Arc::new(services)));
        if let Some(timeout) = config.session_idle_timeout {
            registry.spawn_reaper(timeout);
            info!(
                "💤 Sesiones inactivas se desmontan tras {}",
                humantime::format_duration(timeout)
            );
        }

        let resolver = Arc::new(YouTubeSearch::new(config.youtube_api_key.clone())?);
        Ok(CommandRouter::new(registry, resolver, config.command_prefix))
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening(self.config.status_text.clone())));

        if self.router.initialized() {
            debug!("🔁 Reconexión, el pipeline ya está listo");
            return;
        }
        if let Err(e) = self.router.get_or_try_init(|| self.build_router(&ctx)).await {
            error!("❌ No se pudo iniciar el pipeline: {:?}", e);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let own_id = ctx.cache.current_user().id;
        if msg.author.id == own_id {
            return;
        }
        let Some(guild) = msg.guild_id else {
            return;
        };
        let Some(router) = self.router.get() else {
            warn!("Mensaje recibido antes de que el pipeline esté listo");
            return;
        };

        router
            .route(Inbound {
                guild,
                channel: msg.channel_id,
                author: msg.author.id,
                content: &msg.content,
            })
            .await;
    }

    /// Someone else disconnected the bot from voice: treat it like `_d`
    /// without a channel to answer in.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let own_id = ctx.cache.current_user().id;
        if new.user_id != own_id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        let Some(guild) = new.guild_id else {
            return;
        };

        // Cuando el propio bot sale, songbird ya no tiene la llamada
        let still_tracked = match songbird::get(&ctx).await {
            Some(manager) => manager.get(guild).is_some(),
            None => false,
        };
        if !still_tracked {
            return;
        }

        info!("🔌 Bot desconectado externamente en guild {}", guild);
        if let Some(session) = self.router.get().and_then(|r| r.registry().get(guild)) {
            session.disconnect.raise(None);
        }
    }
}
