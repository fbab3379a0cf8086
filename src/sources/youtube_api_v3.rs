use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::QueryResolver;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

impl SearchResponse {
    fn first_video_id(self) -> Option<String> {
        self.items.into_iter().find_map(|item| item.id.video_id)
    }
}

/// Convierte una frase de búsqueda o un link en un identificador de video
pub struct YouTubeSearch {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl YouTubeSearch {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { api_key, client })
    }

    async fn search_first(&self, query: &str) -> Result<Option<String>> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("YOUTUBE_API_KEY no configurada, solo se aceptan links");
        };

        debug!("🔍 Búsqueda YouTube API v3: {}", query);

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("part", "id"),
                ("type", "video"),
                ("maxResults", "1"),
                ("key", api_key),
                ("q", query),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("❌ YouTube API error: {} - {}", status, error_text);
            anyhow::bail!("YouTube API error: {} - {}", status, error_text);
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.first_video_id())
    }
}

#[async_trait]
impl QueryResolver for YouTubeSearch {
    async fn resolve(&self, query: &str) -> Result<Option<String>> {
        if let Some(id) = video_id_from_link(query) {
            return Ok(Some(id));
        }
        self.search_first(query).await
    }
}

/// Extrae el id de `youtube.com/watch?v=<id>` o `youtu.be/<id>`.
pub fn video_id_from_link(text: &str) -> Option<String> {
    let text = text.trim();
    let parsed = Url::parse(text)
        .or_else(|_| Url::parse(&format!("https://{}", text)))
        .ok()?;

    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let id = match host {
        "youtube.com" | "music.youtube.com" if parsed.path() == "/watch" => parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned()),
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        _ => None,
    }?;

    (!id.is_empty()).then_some(id)
}
