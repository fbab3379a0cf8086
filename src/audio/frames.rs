use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use super::{FRAME_BYTES, FRAME_SAMPLES};
use crate::error::PipelineError;

/// Un frame de 20ms: 960 muestras por canal, estéreo intercalado.
pub type Frame = Box<[i16]>;

/// Carga un artefacto PCM completo en frames.
///
/// Un frame final incompleto termina la lectura sin error.
pub async fn load_frames(path: &Path) -> Result<Vec<Frame>, PipelineError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::io("open file", path, e))?;

    read_frames(BufReader::new(file))
        .await
        .map_err(|e| PipelineError::io("read pcm from", path, e))
}

async fn read_frames<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut raw = [0u8; FRAME_BYTES];

    loop {
        match reader.read_exact(&mut raw).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }

        let frame: Frame = raw
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        debug_assert_eq!(frame.len(), FRAME_SAMPLES);
        frames.push(frame);
    }

    Ok(frames)
}
