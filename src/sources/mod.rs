pub mod youtube_api_v3;
pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use youtube_api_v3::YouTubeSearch;
pub use ytdlp::YtDlpFetcher;

/// Flujo de bytes del medio tal como lo entrega la fuente.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Cliente que resuelve un identificador de medio y abre sus streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Obtiene título, formatos y miniaturas del medio
    async fn resolve(&self, media_id: &str) -> Result<MediaInfo>;

    /// Abre el stream de bytes de un formato concreto
    async fn open(&self, format: &MediaFormat) -> Result<ByteStream>;
}

/// Traduce lo que escribió el usuario (link o frase) a un identificador de medio.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryResolver: Send + Sync {
    /// `Ok(None)` cuando la búsqueda no encontró ningún medio.
    async fn resolve(&self, query: &str) -> Result<Option<String>>;
}

/// Metadata de un medio resuelto
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub formats: Vec<MediaFormat>,
    pub thumbnails: Vec<Thumbnail>,
}

impl MediaInfo {
    /// La miniatura de mayor resolución, si hay alguna.
    pub fn best_thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnails
            .iter()
            .max_by_key(|t| u64::from(t.width) * u64::from(t.height))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaFormat {
    pub id: String,
    pub url: String,
    /// Extensión del contenedor ("webm", "m4a", ...)
    pub extension: String,
    pub has_audio: bool,
    pub audio_quality: AudioQuality,
    pub video_quality: VideoQuality,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioQuality {
    High,
    Medium,
    Low,
    Unknown,
}

impl AudioQuality {
    /// Acepta tanto las etiquetas de YouTube (`AUDIO_QUALITY_HIGH`) como las
    /// notas cortas de yt-dlp (`medium`, `low, DRC`).
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        let label = label.trim_start_matches("audio_quality_");
        match label.split([',', ' ']).next().unwrap_or_default() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" | "ultralow" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Mayor es mejor
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Unknown => 0,
        }
    }
}

/// Clase de calidad de video, en el orden de preferencia del selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQuality {
    Hd1080,
    Hd720,
    P720,
    Large,
    Medium,
    Small,
    Tiny,
    Unknown,
}

impl VideoQuality {
    pub fn from_label(label: &str) -> Self {
        match label {
            "hd1080" => Self::Hd1080,
            "hd720" => Self::Hd720,
            "720p" => Self::P720,
            "large" => Self::Large,
            "medium" => Self::Medium,
            "small" => Self::Small,
            "tiny" => Self::Tiny,
            _ => Self::Unknown,
        }
    }

    /// Equivalencia de YouTube entre altura y etiqueta de calidad
    pub fn from_height(height: Option<u32>) -> Self {
        match height {
            Some(h) if h >= 1080 => Self::Hd1080,
            Some(h) if h >= 720 => Self::Hd720,
            Some(h) if h >= 480 => Self::Large,
            Some(h) if h >= 360 => Self::Medium,
            Some(h) if h >= 240 => Self::Small,
            Some(h) if h > 0 => Self::Tiny,
            _ => Self::Unknown,
        }
    }

    /// Menor es mejor; `Unknown` queda al final.
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Hd1080 => 1,
            Self::Hd720 => 2,
            Self::P720 => 3,
            Self::Large => 4,
            Self::Medium => 5,
            Self::Small => 6,
            Self::Tiny => 7,
            Self::Unknown => u8::MAX,
        }
    }
}
