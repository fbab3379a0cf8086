use anyhow::Result;
use audiopus::{coder::Encoder, Application, Channels, SampleRate};

use super::FRAME_BYTES;

/// Codifica frames PCM en paquetes para el transporte de voz.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &[i16]) -> Result<Vec<u8>>;
}

/// Crea un encoder nuevo por cada sesión de reproducción.
pub trait EncoderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FrameEncoder>>;
}

pub struct OpusEncoderFactory;

impl EncoderFactory for OpusEncoderFactory {
    fn create(&self) -> Result<Box<dyn FrameEncoder>> {
        let encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)?;
        Ok(Box::new(OpusFrameEncoder {
            encoder,
            buffer: vec![0; FRAME_BYTES],
        }))
    }
}

struct OpusFrameEncoder {
    encoder: Encoder,
    buffer: Vec<u8>,
}

impl FrameEncoder for OpusFrameEncoder {
    fn encode(&mut self, frame: &[i16]) -> Result<Vec<u8>> {
        let written = self.encoder.encode(frame, &mut self.buffer)?;
        Ok(self.buffer[..written].to_vec())
    }
}
