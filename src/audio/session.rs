use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use super::{artifacts::ArtifactLedger, signal::ControlSignal};

/// Petición de descarga tal como la empuja el router de comandos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub requester: UserId,
    pub origin: ChannelId,
    pub media_id: String,
    pub looped: bool,
}

/// Petición de reproducción de un artefacto ya transcodificado
#[derive(Debug, PartialEq, Eq)]
pub struct PlayRequest {
    pub requester: UserId,
    pub path: PathBuf,
    pub title: String,
    pub looped: bool,
}

/// Cola FIFO acotada de [`PlayRequest`]; nunca bloquea al productor.
#[derive(Debug, Clone)]
pub struct PlayQueue {
    tx: mpsc::Sender<PlayRequest>,
}

impl PlayQueue {
    fn channel(capacity: usize) -> (Self, mpsc::Receiver<PlayRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Encola si hay lugar. Si la cola está llena o el Playback Worker ya
    /// terminó, la petición vuelve dentro del error.
    pub fn try_push(&self, request: PlayRequest) -> Result<(), TrySendError<PlayRequest>> {
        self.tx.try_send(request)
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Extremos receptores de una sesión; cada uno pertenece a un worker.
pub struct SessionChannels {
    pub downloads: mpsc::Receiver<DownloadRequest>,
    pub plays: mpsc::Receiver<PlayRequest>,
}

/// Estado compartido de una guild
#[derive(Debug)]
pub struct GuildSession {
    guild: GuildId,
    downloads: mpsc::Sender<DownloadRequest>,
    play_queue: PlayQueue,
    pub skip: ControlSignal,
    pub disconnect: ControlSignal,
    pub artifacts: ArtifactLedger,
    busy: AtomicBool,
    downloading: AtomicBool,
    last_activity: Mutex<Instant>,
    shutdown: CancellationToken,
}

impl GuildSession {
    pub fn new(guild: GuildId, play_capacity: usize) -> (Arc<Self>, SessionChannels) {
        // Handoff de capacidad 1: el router espera al Download Worker
        let (downloads, downloads_rx) = mpsc::channel(1);
        let (play_queue, plays_rx) = PlayQueue::channel(play_capacity);

        let session = Arc::new(Self {
            guild,
            downloads,
            play_queue,
            skip: ControlSignal::new(),
            disconnect: ControlSignal::new(),
            artifacts: ArtifactLedger::default(),
            busy: AtomicBool::new(false),
            downloading: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            shutdown: CancellationToken::new(),
        });

        let channels = SessionChannels {
            downloads: downloads_rx,
            plays: plays_rx,
        };
        (session, channels)
    }

    pub fn guild(&self) -> GuildId {
        self.guild
    }

    /// Entrega una petición al Download Worker, esperando a que la tome.
    /// Devuelve la petición si la sesión ya fue desmontada.
    pub async fn submit(&self, request: DownloadRequest) -> Result<(), DownloadRequest> {
        self.touch();
        self.downloads.send(request).await.map_err(|e| e.0)
    }

    pub fn play_queue(&self) -> &PlayQueue {
        &self.play_queue
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Solo el Playback Worker escribe este flag.
    pub(super) fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }

    pub(super) fn set_downloading(&self, downloading: bool) {
        self.downloading.store(downloading, Ordering::Release);
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn is_idle(&self) -> bool {
        !self.is_busy()
            && !self.downloading.load(Ordering::Acquire)
            && self.play_queue.is_empty()
            && self.artifacts.is_empty()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
