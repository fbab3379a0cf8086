//! Transporte de voz sobre songbird.
//!
//! Los paquetes Opus ya codificados se entregan a songbird como un stream DCA
//! en vivo: el canal `flume` acotado hace de tubería y frena al Playback
//! Worker al ritmo en que el mixer consume audio.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{AudioStream, Input, LiveInput},
    tracks::TrackHandle,
    Call, Songbird,
};
use std::{
    io::{self, Read, Seek, SeekFrom},
    sync::Arc,
};
use symphonia::core::{io::MediaSource, probe::Hint};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    audio::{CHANNELS, FRAME_SIZE, SAMPLE_RATE},
    platform::{VoiceConnection, VoiceTransport},
};

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    buffer_frames: usize,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, buffer_frames: usize) -> Self {
        Self {
            manager,
            buffer_frames,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> Result<Box<dyn VoiceConnection>> {
        let call = self.manager.join(guild, channel).await?;
        info!("🔊 Conectado al canal de voz {} en guild {}", channel, guild);

        Ok(Box::new(SongbirdConnection {
            call,
            buffer_frames: self.buffer_frames,
            packets: None,
            track: None,
        }))
    }

    async fn is_connected(&self, guild: GuildId) -> bool {
        match self.manager.get(guild) {
            Some(call) => call.lock().await.current_channel().is_some(),
            None => false,
        }
    }

    async fn disconnect(&self, guild: GuildId) -> Result<()> {
        self.manager.remove(guild).await?;
        info!("👋 Desconectado del canal de voz en guild {}", guild);
        Ok(())
    }
}

struct SongbirdConnection {
    call: Arc<Mutex<Call>>,
    buffer_frames: usize,
    packets: Option<flume::Sender<Vec<u8>>>,
    track: Option<TrackHandle>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn speaking(&mut self, on: bool) -> Result<()> {
        if !on {
            // Sin emisor el pipe llega a EOF y el track termina tras el buffer
            self.packets = None;
            self.track = None;
            return Ok(());
        }

        let (tx, rx) = flume::bounded(self.buffer_frames);
        let mut hint = Hint::new();
        hint.with_extension("dca");

        let input = Input::Live(
            LiveInput::Raw(AudioStream {
                input: Box::new(DcaPipe::new(rx)) as Box<dyn MediaSource>,
                hint: Some(hint),
            }),
            None,
        );

        let track = self.call.lock().await.play_only_input(input);
        debug!("🎙️ Track en vivo iniciado: {:?}", track.uuid());

        self.packets = Some(tx);
        self.track = Some(track);
        Ok(())
    }

    async fn send(&mut self, packet: Vec<u8>) -> Result<()> {
        let packets = self
            .packets
            .as_ref()
            .ok_or_else(|| anyhow!("not speaking"))?;

        packets
            .send_async(packet)
            .await
            .map_err(|_| anyhow!("voice track was closed"))
    }
}

/// Cabecera DCA1: magic, largo del JSON y metadatos del stream Opus
fn dca_header() -> Vec<u8> {
    let metadata = json!({
        "dca": {
            "version": 1,
            "tool": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "url": "",
                "author": "",
            },
        },
        "opus": {
            "mode": "music",
            "sample_rate": SAMPLE_RATE,
            "frame_size": FRAME_SIZE,
            "abr": null,
            "vbr": true,
            "channels": CHANNELS,
        },
    })
    .to_string();

    let mut header = Vec::with_capacity(8 + metadata.len());
    header.extend_from_slice(b"DCA1");
    header.extend_from_slice(&(metadata.len() as i32).to_le_bytes());
    header.extend_from_slice(metadata.as_bytes());
    header
}

/// Lado lector del pipe: emite la cabecera y después cada paquete
/// precedido de su largo (i16 LE).
struct DcaPipe {
    packets: flume::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
}

impl DcaPipe {
    fn new(packets: flume::Receiver<Vec<u8>>) -> Self {
        Self {
            packets,
            pending: dca_header(),
            offset: 0,
        }
    }
}

impl Read for DcaPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.pending.len() {
            let packet = match self.packets.recv() {
                Ok(packet) => packet,
                Err(flume::RecvError::Disconnected) => return Ok(0),
            };

            let len = i16::try_from(packet.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "opus packet too large"))?;
            self.pending.clear();
            self.pending.extend_from_slice(&len.to_le_bytes());
            self.pending.extend_from_slice(&packet);
            self.offset = 0;
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

impl Seek for DcaPipe {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "live voice pipe"))
    }
}

impl MediaSource for DcaPipe {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_describes_stereo_opus() {
        let header = dca_header();
        assert_eq!(&header[..4], b"DCA1");

        let len = i32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        assert_eq!(header.len(), 8 + len);

        let metadata: serde_json::Value = serde_json::from_slice(&header[8..]).unwrap();
        assert_eq!(metadata["opus"]["sample_rate"], 48_000);
        assert_eq!(metadata["opus"]["frame_size"], 960);
        assert_eq!(metadata["opus"]["channels"], 2);
    }

    #[test]
    fn pipe_frames_packets_until_sender_drops() {
        let (tx, rx) = flume::bounded(4);
        tx.send(vec![1, 2, 3]).unwrap();
        tx.send(vec![9]).unwrap();
        drop(tx);

        let mut pipe = DcaPipe::new(rx);
        let mut stream = Vec::new();
        pipe.read_to_end(&mut stream).unwrap();

        let body = &stream[dca_header().len()..];
        assert_eq!(body, &[3, 0, 1, 2, 3, 1, 0, 9]);
    }

    #[test]
    fn small_reads_split_packets() {
        let (tx, rx) = flume::bounded(1);
        tx.send(vec![7; 10]).unwrap();
        drop(tx);

        let mut pipe = DcaPipe::new(rx);
        let mut header = vec![0; dca_header().len()];
        pipe.read_exact(&mut header).unwrap();

        let mut chunk = [0u8; 4];
        assert_eq!(pipe.read(&mut chunk).unwrap(), 4);
        assert_eq!(chunk, [10, 0, 7, 7]);
        assert!(!pipe.is_seekable());
        assert!(pipe.seek(SeekFrom::Start(0)).is_err());
    }
}
