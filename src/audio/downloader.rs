use futures::StreamExt;
use std::{cmp::Reverse, path::Path, sync::Arc};
use tokio::{
    io::AsyncWriteExt,
    sync::mpsc::{self, error::TrySendError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    artifacts::{remove_artifacts, ArtifactPaths, ArtifactSlots},
    services::Services,
    session::{DownloadRequest, GuildSession, PlayRequest},
};
use crate::{
    error::PipelineError,
    platform::Notice,
    sources::{MediaFormat, MediaInfo},
    ui::messages,
};

/// Elige el formato con mejor audio; a igual audio, el de mayor resolución.
pub fn select_format(formats: &[MediaFormat]) -> Option<&MediaFormat> {
    formats
        .iter()
        .filter(|f| f.has_audio)
        .min_by_key(|f| (Reverse(f.audio_quality.rank()), f.video_quality.ordinal()))
}

/// Download Worker de una guild
pub struct Downloader {
    session: Arc<GuildSession>,
    services: Arc<Services>,
    slots: ArtifactSlots,
}

impl Downloader {
    pub fn new(session: Arc<GuildSession>, services: Arc<Services>) -> Self {
        let slots = ArtifactSlots::new(
            &services.settings.assets_dir,
            session.guild(),
            services.settings.artifact_slots,
        );
        Self {
            session,
            services,
            slots,
        }
    }

    /// Atiende peticiones en orden de llegada hasta que la sesión se desmonte.
    pub async fn run(mut self, mut requests: mpsc::Receiver<DownloadRequest>, shutdown: CancellationToken) {
        let guild = self.session.guild();
        debug!("⬇️ Download worker iniciado para guild {}", guild);

        loop {
            let request = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.abandon(&mut requests).await;
                    break;
                }
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            self.session.set_downloading(true);
            let result = self.process(request).await;
            self.session.set_downloading(false);

            if let Err(e) = result {
                self.services.report(guild, &e).await;
            }
            self.session.touch();
        }

        debug!("⬇️ Download worker detenido para guild {}", guild);
    }

    /// Cierra la entrada y reporta lo que quedó sin atender; los envíos
    /// posteriores fallan y el registro los reintenta en otra sesión.
    async fn abandon(&self, requests: &mut mpsc::Receiver<DownloadRequest>) {
        requests.close();
        while let Ok(request) = requests.try_recv() {
            self.services
                .report(self.session.guild(), &PipelineError::SessionClosed(request.media_id))
                .await;
        }
    }

    async fn process(&mut self, request: DownloadRequest) -> Result<(), PipelineError> {
        let queue = self.session.play_queue();
        if queue.is_full() {
            return Err(PipelineError::QueueFull {
                capacity: queue.capacity(),
            });
        }

        let info = match self.services.media.resolve(&request.media_id).await {
            Ok(info) => info,
            Err(reason) => {
                self.tell(request.origin, messages::LOOKUP_FAILED, None).await;
                return Err(PipelineError::Resolve {
                    id: request.media_id,
                    reason,
                });
            }
        };

        let format = select_format(&info.formats)
            .ok_or_else(|| PipelineError::NoAudioFormat(info.id.clone()))?;
        info!(
            "🎼 {}: formato {} ({:?} / {:?})",
            info.title, format.id, format.audio_quality, format.video_quality
        );

        let paths = self.slots.next(&format.extension, &self.session.artifacts);
        if let Err(e) = self.materialize(format, &paths).await {
            self.discard(&paths.pcm).await;
            return Err(e);
        }

        self.announce(&request, &info).await;

        let play = PlayRequest {
            requester: request.requester,
            path: paths.pcm,
            title: info.title,
            looped: request.looped,
        };

        // La capacidad ya se verificó; solo falla si otro productor la llenó
        // o si la sesión se desmontó mientras tanto.
        match queue.try_push(play) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(rejected)) => {
                self.discard(&rejected.path).await;
                Err(PipelineError::QueueFull {
                    capacity: queue.capacity(),
                })
            }
            Err(TrySendError::Closed(rejected)) => {
                self.discard(&rejected.path).await;
                Err(PipelineError::SessionClosed(rejected.title))
            }
        }
    }

    /// Borra los archivos de una petición que no llegó a la cola.
    async fn discard(&self, pcm: &Path) {
        for failure in remove_artifacts(pcm).await {
            self.services.report(self.session.guild(), &failure).await;
        }
        self.session.artifacts.release(pcm);
    }

    /// Descarga el medio a disco y lo transcodifica a PCM.
    async fn materialize(&self, format: &MediaFormat, paths: &ArtifactPaths) -> Result<(), PipelineError> {
        let dir = self.slots.guild_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PipelineError::io("create dirs", dir, e))?;

        let mut stream = self
            .services
            .media
            .open(format)
            .await
            .map_err(PipelineError::Stream)?;

        let mut file = tokio::fs::File::create(&paths.source)
            .await
            .map_err(|e| PipelineError::io("create file", &paths.source, e))?;

        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::io("download into", &paths.source, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::io("copy file", &paths.source, e))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| PipelineError::io("copy file", &paths.source, e))?;
        drop(file);

        debug!(
            "💾 {} bytes en {} ({} artefactos vivos)",
            written,
            paths.source.display(),
            self.session.artifacts.len()
        );

        self.services
            .transcoder
            .transcode(&paths.source, &paths.pcm)
            .await
    }

    async fn announce(&self, request: &DownloadRequest, info: &MediaInfo) {
        let content = if self.session.is_busy() {
            messages::added_to_queue(&info.title)
        } else {
            messages::now_playing(&info.title)
        };

        let notice = Notice {
            title: info.title.clone(),
            requested_by: request.requester,
            image: info.best_thumbnail().cloned(),
        };

        self.tell(request.origin, &content, Some(notice)).await;
    }

    async fn tell(&self, channel: serenity::model::id::ChannelId, content: &str, notice: Option<Notice>) {
        if let Err(e) = self.services.chat.send_message(channel, content, notice).await {
            self.services
                .report(self.session.guild(), &PipelineError::Transport(e))
                .await;
        }
    }
}
