use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CHANNELS, SAMPLE_RATE};
use crate::error::PipelineError;

/// Convierte un archivo de medio en PCM s16le estéreo a 48kHz.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<(), PipelineError>;
}

pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, source: &Path, destination: &Path) -> Result<(), PipelineError> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-f", "s16le"])
            .args(["-ar", &SAMPLE_RATE.to_string()])
            .args(["-ac", &CHANNELS.to_string()])
            .arg(destination)
            .output()
            .await
            .map_err(|e| PipelineError::io("run ffmpeg on", source, e))?;

        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
            diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(PipelineError::Transcode {
                status: output.status.to_string(),
                output: diagnostics.trim().to_string(),
            });
        }

        debug!("🎚️ {} -> {}", source.display(), destination.display());
        Ok(())
    }
}
