//! Textos que el bot escribe en el canal.

pub const DISCONNECTING: &str = "🔌 Desconectando";
pub const LOOKUP_FAILED: &str = "❌ No pude obtener ese video, revisa el link";
pub const MISSING_PROMPT: &str = "❓ Tienes que escribir algo para buscar";
pub const NOT_FOUND: &str = "🔍 No encontré resultados para esa búsqueda";

pub fn now_playing(title: &str) -> String {
    format!("🎵 Reproduciendo {}", title)
}

pub fn added_to_queue(title: &str) -> String {
    format!("✅ {} agregado a la cola", title)
}

pub fn skipped(title: &str) -> String {
    format!("⏭️ {} saltado", title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_embedded() {
        assert!(now_playing("Song").contains("Song"));
        assert!(added_to_queue("Song").starts_with("✅ Song"));
        assert!(skipped("Song").contains("Song saltado"));
    }
}
