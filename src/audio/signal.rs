use parking_lot::Mutex;
use serenity::model::id::ChannelId;
use tokio::sync::Notify;

/// Señal de control de una sola ranura (skip / disconnect).
///
/// Guarda el canal de texto que la emitió (`None` cuando viene del propio
/// sistema). Una señal nueva sobrescribe a la pendiente; el único consumidor
/// es el Playback Worker de la guild.
#[derive(Debug, Default)]
pub struct ControlSignal {
    slot: Mutex<Option<Option<ChannelId>>>,
    notify: Notify,
}

impl ControlSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, origin: Option<ChannelId>) {
        *self.slot.lock() = Some(origin);
        self.notify.notify_one();
    }

    /// Consulta y limpia. `Some(origin)` si había una señal pendiente.
    pub fn take(&self) -> Option<Option<ChannelId>> {
        self.slot.lock().take()
    }

    /// Descarta señales viejas antes de empezar un track nuevo.
    pub fn clear(&self) -> bool {
        self.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Espera a que alguien levante la señal. Puede despertar con la ranura
    /// ya vacía si la señal fue consumida en otro punto, por eso hay que
    /// llamar a [`take`](Self::take) después.
    pub async fn raised(&self) {
        if self.is_pending() {
            return;
        }
        self.notify.notified().await;
    }
}
