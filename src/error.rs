use serenity::model::id::UserId;
use std::path::PathBuf;
use thiserror::Error;

/// Fallos de una etapa del pipeline de reproducción.
///
/// Ninguno es fatal para el worker que lo produce: se reporta al operador y
/// el worker sigue con la siguiente petición.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("queue is full ({capacity} tracks), dropping request")]
    QueueFull { capacity: usize },

    #[error("session was torn down, dropping {0}")]
    SessionClosed(String),

    #[error("couldn't get media {id}: {reason:#}")]
    Resolve { id: String, reason: anyhow::Error },

    #[error("media {0} has no format with audio")]
    NoAudioFormat(String),

    #[error("couldn't {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't get stream: {0:#}")]
    Stream(anyhow::Error),

    #[error("couldn't transcode into pcm ({status}), output: {output}")]
    Transcode { status: String, output: String },

    #[error("user {0} isn't in voice")]
    NotInVoice(UserId),

    #[error("can't connect to voice: {0:#}")]
    Connect(anyhow::Error),

    #[error("can't encode data: {0:#}")]
    Encode(anyhow::Error),

    #[error("voice transport failed: {0:#}")]
    Transport(anyhow::Error),

    #[error("can't delete {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
