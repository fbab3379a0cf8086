use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::platform::Notice;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

/// Embed que acompaña a los avisos de "reproduciendo" y "agregado a la cola"
pub fn notice_embed(notice: &Notice) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(&notice.title)
        .description(format!("👤 Solicitado por <@{}>", notice.requested_by))
        .color(colors::MUSIC_PURPLE);

    if let Some(image) = &notice.image {
        embed = embed.image(&image.url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
