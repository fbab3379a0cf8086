use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, info};

use super::{
    downloader::Downloader,
    player::Player,
    services::Services,
    session::{DownloadRequest, GuildSession},
};

/// Mapa guild -> sesión.
///
/// Crear una sesión arranca sus dos workers; es seguro llamarlo desde varios
/// handlers a la vez, cada guild termina con una sola sesión.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    services: Arc<Services>,
    active_workers: Arc<AtomicUsize>,
}

/// Decrementa el contador de workers vivos al terminar la tarea
struct WorkerGuard(Arc<AtomicUsize>);

impl WorkerGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionRegistry {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            sessions: DashMap::new(),
            services,
            active_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Devuelve la sesión de la guild, creándola (y arrancando sus workers)
    /// la primera vez.
    pub fn get_or_create(&self, guild: GuildId) -> Arc<GuildSession> {
        self.sessions
            .entry(guild)
            .or_insert_with(|| self.start_session(guild))
            .value()
            .clone()
    }

    pub fn get(&self, guild: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Entrega la petición al Download Worker de la guild.
    ///
    /// Si la sesión fue desmontada entre la búsqueda y el envío, se reintenta
    /// una vez con una sesión nueva.
    pub async fn submit_download(
        &self,
        guild: GuildId,
        request: DownloadRequest,
    ) -> Result<(), DownloadRequest> {
        let session = self.get_or_create(guild);
        let request = match session.submit(request).await {
            Ok(()) => return Ok(()),
            Err(request) => request,
        };

        debug!("♻️ Sesión de guild {} desmontada, recreando", guild);
        self.sessions.remove_if(&guild, |_, s| Arc::ptr_eq(s, &session));
        self.get_or_create(guild).submit(request).await
    }

    /// Desmonta las sesiones inactivas desde hace al menos `timeout`.
    /// Devuelve cuántas se quitaron.
    pub fn reap_idle(&self, timeout: Duration) -> usize {
        let idle: Vec<GuildId> = self
            .sessions
            .iter()
            .filter(|s| s.is_idle() && s.idle_for() >= timeout)
            .map(|s| *s.key())
            .collect();

        let mut reaped = 0;
        for guild in idle {
            // Volver a comprobar bajo el lock del shard
            let removed = self
                .sessions
                .remove_if(&guild, |_, s| s.is_idle() && s.idle_for() >= timeout);
            if let Some((_, session)) = removed {
                session.shutdown();
                info!("💤 Sesión de guild {} desmontada por inactividad", guild);
                reaped += 1;
            }
        }
        reaped
    }

    /// Revisa periódicamente las sesiones y desmonta las inactivas.
    pub fn spawn_reaper(self: &Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = (timeout / 2).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let reaped = registry.reap_idle(timeout);
                if reaped > 0 {
                    debug!("💤 {} sesiones desmontadas, {} activas", reaped, registry.len());
                }
            }
        })
    }

    fn start_session(&self, guild: GuildId) -> Arc<GuildSession> {
        let (session, channels) =
            GuildSession::new(guild, self.services.settings.play_queue_capacity);

        let downloader = Downloader::new(session.clone(), self.services.clone());
        let guard = WorkerGuard::new(&self.active_workers);
        let shutdown = session.shutdown_token();
        tokio::spawn(async move {
            let _guard = guard;
            downloader.run(channels.downloads, shutdown).await;
        });

        let player = Player::new(session.clone(), self.services.clone(), channels.plays);
        let guard = WorkerGuard::new(&self.active_workers);
        let shutdown = session.shutdown_token();
        tokio::spawn(async move {
            let _guard = guard;
            player.run(shutdown).await;
        });

        info!("🆕 Sesión creada para guild {}", guild);
        session
    }
}
