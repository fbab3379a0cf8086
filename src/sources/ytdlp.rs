use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use super::{AudioQuality, ByteStream, MediaFetcher, MediaFormat, MediaInfo, Thumbnail, VideoQuality};

/// Cliente de medios basado en `yt-dlp -J` + descarga HTTP directa
pub struct YtDlpFetcher {
    binary: PathBuf,
    http: reqwest::Client,
}

impl YtDlpFetcher {
    pub fn new(binary: impl Into<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            binary: binary.into(),
            http,
        })
    }

    /// Verifica que yt-dlp responda
    pub async fn verify(&self) -> Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("{} no disponible", self.binary.display()))?;

        if !output.status.success() {
            anyhow::bail!("yt-dlp --version falló con {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Busca archivo de cookies disponible
    async fn find_cookies_file(&self) -> Option<PathBuf> {
        let home = std::env::var("HOME").unwrap_or_default();
        let candidates = [
            PathBuf::from(home).join(".config/yt-dlp/cookies.txt"),
            PathBuf::from("./cookies.txt"),
        ];

        for path in candidates {
            if tokio::fs::metadata(&path).await.is_ok() {
                debug!("🍪 Cookies encontradas en: {}", path.display());
                return Some(path);
            }
        }
        None
    }

    fn watch_url(media_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", media_id)
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn resolve(&self, media_id: &str) -> Result<MediaInfo> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args([
            "-J",
            "--no-playlist",
            "--no-warnings",
            "--socket-timeout",
            "30",
            "--retries",
            "3",
        ]);

        if let Some(cookies) = self.find_cookies_file().await {
            cmd.arg("--cookies").arg(cookies);
        }

        cmd.arg("--").arg(Self::watch_url(media_id));

        let output = cmd.output().await.context("yt-dlp process error")?;
        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp info failed: {}", error.trim());
        }

        let video: YtDlpVideo =
            serde_json::from_slice(&output.stdout).context("yt-dlp devolvió JSON inválido")?;
        let info = video.into_media_info(media_id);

        info!(
            "📋 {} resuelto: {} formatos, {} miniaturas",
            info.title,
            info.formats.len(),
            info.thumbnails.len()
        );
        Ok(info)
    }

    async fn open(&self, format: &MediaFormat) -> Result<ByteStream> {
        let response = self
            .http
            .get(&format.url)
            .send()
            .await?
            .error_for_status()?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(stream.boxed())
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpVideo {
    title: String,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
    #[serde(default)]
    thumbnails: Vec<YtDlpThumbnail>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    url: Option<String>,
    ext: String,
    protocol: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    format_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YtDlpThumbnail {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl YtDlpVideo {
    fn into_media_info(self, media_id: &str) -> MediaInfo {
        let formats = self
            .formats
            .into_iter()
            .filter(|f| matches!(f.protocol.as_deref(), None | Some("https") | Some("http")))
            .filter_map(|f| {
                let url = f.url?;
                let has_audio = f.acodec.as_deref().is_some_and(|codec| codec != "none");
                Some(MediaFormat {
                    id: f.format_id,
                    url,
                    extension: f.ext,
                    has_audio,
                    audio_quality: f
                        .format_note
                        .as_deref()
                        .map(AudioQuality::from_label)
                        .unwrap_or(AudioQuality::Unknown),
                    video_quality: VideoQuality::from_height(f.height),
                })
            })
            .collect();

        let thumbnails = self
            .thumbnails
            .into_iter()
            .map(|t| Thumbnail {
                url: t.url,
                width: t.width.unwrap_or(0),
                height: t.height.unwrap_or(0),
            })
            .collect();

        MediaInfo {
            id: media_id.to_string(),
            title: self.title,
            formats,
            thumbnails,
        }
    }
}
