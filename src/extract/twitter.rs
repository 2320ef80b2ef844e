use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use url::Url;

use super::{media_url, ExtractError, Extraction, MediaCandidate, MediaResolver, Transport};

static STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"status/(?P<id>\d+)").unwrap());

/// Resolves tweets through the vxtwitter mirror API
pub struct TwitterResolver;

#[derive(Debug, Deserialize)]
struct Status {
    media_extended: Option<Vec<Media>>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(rename = "type")]
    kind: String,
    url: String,
    width: Option<u32>,
    height: Option<u32>,
    size: Option<Size>,
}

#[derive(Debug, Deserialize)]
struct Size {
    width: u32,
    height: u32,
}

impl Media {
    fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height, &self.size) {
            (Some(width), Some(height), _) => Some((width, height)),
            (_, _, Some(size)) => Some((size.width, size.height)),
            _ => None,
        }
    }
}

impl MediaResolver for TwitterResolver {
    async fn resolve<T: Transport>(
        &self,
        transport: &T,
        source_url: &str,
    ) -> Result<Extraction, ExtractError> {
        let id = status_id(source_url).ok_or(ExtractError::InvalidUrl)?;
        let endpoint = Url::parse(&format!("https://api.vxtwitter.com/Twitter/status/{id}"))
            .context("bad status endpoint")?;

        let body = transport.get_text(&endpoint, HeaderMap::new()).await?;
        let status: Status = serde_json::from_str(&body).context("unexpected vxtwitter response")?;

        let candidates: Vec<_> = status
            .media_extended
            .unwrap_or_default()
            .into_iter()
            .filter(|media| media.kind == "video")
            .filter_map(|media| {
                let quality = media
                    .dimensions()
                    .map(|(width, height)| format!("{width}x{height}"));
                media_url(&media.url).map(|url| MediaCandidate { quality, url })
            })
            .collect();
        if candidates.is_empty() {
            return Err(ExtractError::NoVideoFound);
        }
        Ok(Extraction::Candidates(candidates))
    }
}

fn status_id(source_url: &str) -> Option<&str> {
    STATUS_RE
        .captures(source_url)
        .and_then(|cap| cap.name("id"))
        .map(|m| m.as_str())
}
