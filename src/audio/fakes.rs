//! Colaboradores en memoria para probar los workers sin Discord, red ni ffmpeg.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Semaphore;

use super::{
    encoder::{EncoderFactory, FrameEncoder},
    services::{PipelineSettings, Services},
    transcode::Transcoder,
    FRAME_SAMPLES,
};
use crate::{
    error::PipelineError,
    platform::{ChatPlatform, Notice, VoiceConnection, VoiceTransport},
    sources::{AudioQuality, ByteStream, MediaFetcher, MediaFormat, MediaInfo, Thumbnail, VideoQuality},
};

/// PCM donde cada frame está relleno con su propio valor.
pub(crate) fn pcm_bytes(frames: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames.len() * FRAME_SAMPLES * 2);
    for value in frames {
        for _ in 0..FRAME_SAMPLES {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Espera (con tiempo real o pausado) hasta que se cumpla la condición.
pub(crate) async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {}", what);
}

#[derive(Debug, Clone)]
pub(crate) struct SentMessage {
    pub channel: ChannelId,
    pub content: String,
    pub notice: Option<Notice>,
}

pub(crate) struct FakeChat {
    messages: Mutex<Vec<SentMessage>>,
    reports: Mutex<Vec<String>>,
    voice_channel: Mutex<Option<ChannelId>>,
}

impl FakeChat {
    pub fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().clone()
    }

    pub fn contents(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.content.clone()).collect()
    }

    pub fn operator_reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn set_voice_channel(&self, channel: Option<ChannelId>) {
        *self.voice_channel.lock() = channel;
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn send_message(&self, channel: ChannelId, content: &str, notice: Option<Notice>) -> Result<()> {
        self.messages.lock().push(SentMessage {
            channel,
            content: content.to_string(),
            notice,
        });
        Ok(())
    }

    async fn delete_message(&self, _channel: ChannelId, _message: MessageId) -> Result<()> {
        Ok(())
    }

    async fn voice_channel_of(&self, _guild: GuildId, _user: UserId) -> Option<ChannelId> {
        *self.voice_channel.lock()
    }

    async fn notify_operator(&self, message: &str) -> Result<()> {
        self.reports.lock().push(message.to_string());
        Ok(())
    }
}

pub(crate) struct FakeVoice {
    connected: Mutex<HashSet<GuildId>>,
    joins: AtomicUsize,
    disconnects: AtomicUsize,
    fail_join: AtomicBool,
    packets: Arc<Mutex<Vec<Vec<u8>>>>,
    speaking: Arc<Mutex<Vec<bool>>>,
    gate: Arc<Semaphore>,
}

impl FakeVoice {
    fn with_permits(permits: usize) -> Self {
        Self {
            connected: Mutex::new(HashSet::new()),
            joins: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_join: AtomicBool::new(false),
            packets: Arc::new(Mutex::new(Vec::new())),
            speaking: Arc::new(Mutex::new(Vec::new())),
            gate: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Cada paquete enviado consume un permiso del gate.
    pub fn release(&self, packets: usize) {
        self.gate.add_permits(packets);
    }

    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets.lock().clone()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.lock().len()
    }

    /// Valor de relleno de cada frame enviado, en orden
    pub fn frame_markers(&self) -> Vec<i16> {
        self.packets
            .lock()
            .iter()
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect()
    }

    pub fn speaking_log(&self) -> Vec<bool> {
        self.speaking.lock().clone()
    }

    pub fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn connected_to(&self, guild: GuildId) -> bool {
        self.connected.lock().contains(&guild)
    }

    pub fn fail_joins(&self) {
        self.fail_join.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceTransport for FakeVoice {
    async fn join(&self, guild: GuildId, _channel: ChannelId) -> Result<Box<dyn VoiceConnection>> {
        if self.fail_join.load(Ordering::SeqCst) {
            anyhow::bail!("join timed out");
        }
        self.joins.fetch_add(1, Ordering::SeqCst);
        self.connected.lock().insert(guild);
        Ok(Box::new(FakeConnection {
            packets: self.packets.clone(),
            speaking: self.speaking.clone(),
            gate: self.gate.clone(),
        }))
    }

    async fn is_connected(&self, guild: GuildId) -> bool {
        self.connected_to(guild)
    }

    async fn disconnect(&self, guild: GuildId) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.lock().remove(&guild);
        Ok(())
    }
}

struct FakeConnection {
    packets: Arc<Mutex<Vec<Vec<u8>>>>,
    speaking: Arc<Mutex<Vec<bool>>>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn speaking(&mut self, on: bool) -> Result<()> {
        self.speaking.lock().push(on);
        Ok(())
    }

    async fn send(&mut self, packet: Vec<u8>) -> Result<()> {
        self.gate.acquire().await?.forget();
        self.packets.lock().push(packet);
        tokio::task::yield_now().await;
        Ok(())
    }
}

pub(crate) struct FakeMedia {
    catalog: Mutex<HashMap<String, (String, Vec<u8>)>>,
    resolved: AtomicUsize,
}

impl FakeMedia {
    pub fn add(&self, id: &str, title: &str, payload: Vec<u8>) {
        self.catalog
            .lock()
            .insert(id.to_string(), (title.to_string(), payload));
    }

    pub fn resolved(&self) -> usize {
        self.resolved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for FakeMedia {
    async fn resolve(&self, media_id: &str) -> Result<MediaInfo> {
        self.resolved.fetch_add(1, Ordering::SeqCst);
        let title = match self.catalog.lock().get(media_id) {
            Some((title, _)) => title.clone(),
            None => anyhow::bail!("video {} not found", media_id),
        };

        Ok(MediaInfo {
            id: media_id.to_string(),
            title,
            formats: vec![
                MediaFormat {
                    id: "video-only".into(),
                    url: format!("fake://{}", media_id),
                    extension: "mp4".into(),
                    has_audio: false,
                    audio_quality: AudioQuality::Unknown,
                    video_quality: VideoQuality::Hd1080,
                },
                MediaFormat {
                    id: "251".into(),
                    url: format!("fake://{}", media_id),
                    extension: "webm".into(),
                    has_audio: true,
                    audio_quality: AudioQuality::Medium,
                    video_quality: VideoQuality::Unknown,
                },
            ],
            thumbnails: vec![
                Thumbnail {
                    url: format!("https://img/{}/small.jpg", media_id),
                    width: 120,
                    height: 90,
                },
                Thumbnail {
                    url: format!("https://img/{}/large.jpg", media_id),
                    width: 1280,
                    height: 720,
                },
            ],
        })
    }

    async fn open(&self, format: &MediaFormat) -> Result<ByteStream> {
        let id = format.url.trim_start_matches("fake://");
        let payload = match self.catalog.lock().get(id) {
            Some((_, payload)) => payload.clone(),
            None => anyhow::bail!("no stream for {}", id),
        };

        let chunks: Vec<std::io::Result<Bytes>> = payload
            .chunks(1000)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// "Transcodifica" copiando: los payloads de prueba ya son PCM.
pub(crate) struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<(), PipelineError> {
        tokio::fs::copy(source, destination)
            .await
            .map_err(|e| PipelineError::io("copy", source, e))?;
        Ok(())
    }
}

/// El paquete es el primer sample del frame, suficiente para seguir el orden.
pub(crate) struct MarkerEncoders;

impl EncoderFactory for MarkerEncoders {
    fn create(&self) -> Result<Box<dyn FrameEncoder>> {
        Ok(Box::new(MarkerEncoder))
    }
}

struct MarkerEncoder;

impl FrameEncoder for MarkerEncoder {
    fn encode(&mut self, frame: &[i16]) -> Result<Vec<u8>> {
        Ok(frame[0].to_le_bytes().to_vec())
    }
}

pub(crate) struct FakeServices {
    pub chat: Arc<FakeChat>,
    pub voice: Arc<FakeVoice>,
    pub media: Arc<FakeMedia>,
    pub assets_dir: PathBuf,
}

impl FakeServices {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self {
            chat: Arc::new(FakeChat {
                messages: Mutex::new(Vec::new()),
                reports: Mutex::new(Vec::new()),
                voice_channel: Mutex::new(Some(ChannelId::new(500))),
            }),
            voice: Arc::new(FakeVoice::with_permits(Semaphore::MAX_PERMITS)),
            media: Arc::new(FakeMedia {
                catalog: Mutex::new(HashMap::new()),
                resolved: AtomicUsize::new(0),
            }),
            assets_dir,
        }
    }

    /// Igual que [`new`](Self::new) pero el transporte de voz no deja pasar
    /// paquetes hasta que se llame a [`FakeVoice::release`].
    pub fn gated(assets_dir: PathBuf) -> Self {
        let mut fakes = Self::new(assets_dir);
        fakes.voice = Arc::new(FakeVoice::with_permits(0));
        fakes
    }

    pub fn services(&self) -> Services {
        Services {
            chat: self.chat.clone(),
            voice: self.voice.clone(),
            media: self.media.clone(),
            transcoder: Arc::new(CopyTranscoder),
            encoders: Arc::new(MarkerEncoders),
            settings: PipelineSettings {
                assets_dir: self.assets_dir.clone(),
                ..PipelineSettings::default()
            },
        }
    }
}
