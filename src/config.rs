use anyhow::{Context, Result};
use serenity::model::id::UserId;
use std::{num::NonZeroU64, path::PathBuf, time::Duration};

use crate::audio::services::PipelineSettings;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub operator_id: Option<UserId>,
    pub command_prefix: char,
    pub status_text: String,

    // Búsqueda
    pub youtube_api_key: Option<String>,

    // Pipeline
    pub assets_dir: PathBuf,
    pub play_queue_capacity: usize,
    pub artifact_slots: usize,
    pub session_idle_timeout: Option<Duration>,
    pub voice_buffer_frames: usize,

    // Binarios externos
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: PathBuf,

    // Rendimiento
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.assets_dir)
            .with_context(|| format!("creating {}", config.assets_dir.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables; las vacías cuentan como ausentes.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            operator_id: match var("OPERATOR_USER_ID") {
                Some(id) => Some(UserId::from(
                    id.parse::<NonZeroU64>()
                        .context("OPERATOR_USER_ID must be a non-zero id")?,
                )),
                None => None,
            },
            command_prefix: match var("COMMAND_PREFIX") {
                Some(prefix) => {
                    let mut chars = prefix.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => anyhow::bail!("COMMAND_PREFIX must be a single character, got: {}", prefix),
                    }
                }
                None => defaults.command_prefix,
            },
            status_text: var("STATUS_TEXT").unwrap_or(defaults.status_text),

            // Búsqueda
            youtube_api_key: var("YOUTUBE_API_KEY"),

            // Pipeline
            assets_dir: var("ASSETS_DIR").map(PathBuf::from).unwrap_or(defaults.assets_dir),
            play_queue_capacity: match var("PLAY_QUEUE_CAPACITY") {
                Some(v) => v.parse().context("PLAY_QUEUE_CAPACITY")?,
                None => defaults.play_queue_capacity,
            },
            artifact_slots: match var("ARTIFACT_SLOTS") {
                Some(v) => v.parse().context("ARTIFACT_SLOTS")?,
                None => defaults.artifact_slots,
            },
            session_idle_timeout: match var("SESSION_IDLE_TIMEOUT") {
                Some(v) => Some(humantime::parse_duration(&v).context("SESSION_IDLE_TIMEOUT")?),
                None => None,
            },
            voice_buffer_frames: match var("VOICE_BUFFER_FRAMES") {
                Some(v) => v.parse().context("VOICE_BUFFER_FRAMES")?,
                None => defaults.voice_buffer_frames,
            },

            // Binarios externos
            ytdlp_path: var("YTDLP_PATH").map(PathBuf::from).unwrap_or(defaults.ytdlp_path),
            ffmpeg_path: var("FFMPEG_PATH").map(PathBuf::from).unwrap_or(defaults.ffmpeg_path),

            // Rendimiento
            worker_threads: match var("WORKER_THREADS") {
                Some(v) => v.parse().context("WORKER_THREADS")?,
                None => defaults.worker_threads,
            },
        };

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Discord token must not be empty
    /// - Queue capacity, artifact slots and voice buffer must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.play_queue_capacity == 0 {
            anyhow::bail!("Play queue capacity must be greater than 0");
        }

        if self.artifact_slots == 0 {
            anyhow::bail!("Artifact slots must be greater than 0");
        }

        if self.voice_buffer_frames == 0 {
            anyhow::bail!("Voice buffer must hold at least one frame");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("Worker threads must be greater than 0");
        }

        if matches!(self.session_idle_timeout, Some(t) if t.is_zero()) {
            anyhow::bail!("Session idle timeout must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token and the API key.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: prefix '{}', operator {}\n  \
            Search: {}\n  \
            Pipeline: {} queue, {} slots, {} buffered frames, assets in {}\n  \
            Sessions: {}\n  \
            Tools: {} / {}\n  \
            Runtime: {} worker threads",
            self.command_prefix,
            self.operator_id.map_or("none".to_string(), |id| id.to_string()),
            if self.youtube_api_key.is_some() { "keyword search enabled" } else { "links only" },
            self.play_queue_capacity,
            self.artifact_slots,
            self.voice_buffer_frames,
            self.assets_dir.display(),
            self.session_idle_timeout.map_or("kept forever".to_string(), |t| {
                format!("torn down after {} idle", humantime::format_duration(t))
            }),
            self.ytdlp_path.display(),
            self.ffmpeg_path.display(),
            self.worker_threads,
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            assets_dir: self.assets_dir.clone(),
            play_queue_capacity: self.play_queue_capacity,
            artifact_slots: self.artifact_slots,
        }
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let pipeline = PipelineSettings::default();
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            operator_id: None,
            command_prefix: '_',
            status_text: "_p <link o búsqueda>".to_string(),

            youtube_api_key: None,

            assets_dir: pipeline.assets_dir,
            play_queue_capacity: pipeline.play_queue_capacity,
            artifact_slots: pipeline.artifact_slots,
            session_idle_timeout: None,
            voice_buffer_frames: 25, // 500ms de audio

            ytdlp_path: "yt-dlp".into(),
            ffmpeg_path: "ffmpeg".into(),

            worker_threads: num_cpus::get(),
        }
    }
}
