use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Ubicación en disco de los archivos de un track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Bytes del medio tal como se descargaron
    pub source: PathBuf,
    /// PCM s16le estéreo 48kHz
    pub pcm: PathBuf,
}

/// Artefactos PCM que todavía pertenecen a una petición viva.
///
/// El Download Worker reserva la ruta al elegir ranura y quien borra los
/// archivos (Playback Worker o el propio Download Worker) la libera.
#[derive(Debug, Default)]
pub struct ArtifactLedger {
    in_use: Mutex<HashSet<PathBuf>>,
}

impl ArtifactLedger {
    pub fn release(&self, pcm: &Path) {
        self.in_use.lock().remove(pcm);
    }

    pub fn len(&self) -> usize {
        self.in_use.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_use.lock().is_empty()
    }
}

/// Genera nombres `audio<n>` rotando entre un número fijo de ranuras.
///
/// Una ranura reservada en el [`ArtifactLedger`] se salta. Si todas están
/// ocupadas se usa el primer índice libre fuera del rango.
#[derive(Debug)]
pub struct ArtifactSlots {
    guild_dir: PathBuf,
    slots: usize,
    next: usize,
}

impl ArtifactSlots {
    pub fn new(assets_dir: &Path, guild: GuildId, slots: usize) -> Self {
        Self {
            guild_dir: guild_dir(assets_dir, guild),
            slots: slots.max(1),
            next: 0,
        }
    }

    pub fn guild_dir(&self) -> &Path {
        &self.guild_dir
    }

    /// Reserva la siguiente ranura libre.
    pub fn next(&mut self, extension: &str, ledger: &ArtifactLedger) -> ArtifactPaths {
        let mut in_use = ledger.in_use.lock();

        let mut attempt = 0;
        loop {
            let slot = if attempt < self.slots {
                (self.next + attempt) % self.slots
            } else {
                attempt
            };

            let base = self.guild_dir.join(format!("audio{}", slot));
            let pcm = base.with_extension("pcm");
            if in_use.insert(pcm.clone()) {
                if attempt < self.slots {
                    self.next = (slot + 1) % self.slots;
                } else {
                    warn!("⚠️ Todas las ranuras ocupadas, usando audio{}", slot);
                }
                return ArtifactPaths {
                    source: base.with_extension(extension),
                    pcm,
                };
            }
            attempt += 1;
        }
    }
}

pub fn guild_dir(assets_dir: &Path, guild: GuildId) -> PathBuf {
    assets_dir.join(format!("guild_{}", guild))
}

/// Borra todos los archivos del directorio cuyo nombre base coincide con el
/// del artefacto PCM (`audio3.pcm`, `audio3.webm`, ...).
///
/// Sigue adelante ante fallos individuales y los devuelve todos.
pub async fn remove_artifacts(pcm: &Path) -> Vec<PipelineError> {
    let mut failures = Vec::new();

    let (Some(dir), Some(stem)) = (pcm.parent(), pcm.file_stem()) else {
        return failures;
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            failures.push(PipelineError::io("find files to delete in", dir, e));
            return failures;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                failures.push(PipelineError::io("list", dir, e));
                break;
            }
        };

        let path = entry.path();
        if path.file_stem() != Some(stem) {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("🗑️ Artefacto eliminado: {}", path.display()),
            Err(source) => failures.push(PipelineError::Cleanup { path, source }),
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slots_round_robin() {
        let ledger = ArtifactLedger::default();
        let mut slots = ArtifactSlots::new(Path::new("assets"), GuildId::new(42), 10);

        let first = slots.next("webm", &ledger);
        assert_eq!(
            first,
            ArtifactPaths {
                source: PathBuf::from("assets/guild_42/audio0.webm"),
                pcm: PathBuf::from("assets/guild_42/audio0.pcm"),
            }
        );
        ledger.release(&first.pcm);

        for _ in 1..10 {
            let paths = slots.next("m4a", &ledger);
            ledger.release(&paths.pcm);
        }
        assert_eq!(
            slots.next("webm", &ledger).pcm,
            PathBuf::from("assets/guild_42/audio0.pcm")
        );
    }

    #[test]
    fn claimed_slots_are_skipped() {
        let ledger = ArtifactLedger::default();
        let mut slots = ArtifactSlots::new(Path::new("assets"), GuildId::new(42), 3);

        let playing = slots.next("webm", &ledger);
        let queued = slots.next("webm", &ledger);
        let freed = slots.next("webm", &ledger);
        ledger.release(&freed.pcm);

        // Las ranuras 0 y 1 siguen reservadas: se pasa a la 2
        assert_eq!(slots.next("webm", &ledger).pcm, freed.pcm);
        assert_eq!(ledger.len(), 3);

        ledger.release(&playing.pcm);
        ledger.release(&queued.pcm);
        ledger.release(&freed.pcm);
        assert!(ledger.is_empty());
    }

    #[test]
    fn full_ring_overflows_instead_of_overwriting() {
        let ledger = ArtifactLedger::default();
        let mut slots = ArtifactSlots::new(Path::new("assets"), GuildId::new(42), 2);

        slots.next("webm", &ledger);
        slots.next("webm", &ledger);
        let overflow = slots.next("webm", &ledger);
        assert_eq!(overflow.pcm, PathBuf::from("assets/guild_42/audio2.pcm"));

        // Al liberarse una ranura del anillo se vuelve a usar
        ledger.release(&PathBuf::from("assets/guild_42/audio0.pcm"));
        assert_eq!(
            slots.next("webm", &ledger).pcm,
            PathBuf::from("assets/guild_42/audio0.pcm")
        );
    }

    #[tokio::test]
    async fn removes_only_matching_stem() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["audio3.pcm", "audio3.webm", "audio30.pcm", "audio4.pcm"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let failures = remove_artifacts(&dir.path().join("audio3.pcm")).await;
        assert!(failures.is_empty());

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["audio30.pcm", "audio4.pcm"]);
    }

    #[tokio::test]
    async fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let failures = remove_artifacts(&dir.path().join("gone/audio0.pcm")).await;
        assert_eq!(failures.len(), 1);
    }
}
