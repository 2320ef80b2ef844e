use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use url::Url;

use super::{media_url, ExtractError, Extraction, MediaCandidate, MediaResolver, Transport};

static SHORTCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:p|reels?|tv)/(?P<shortcode>[A-Za-z0-9_-]+)").unwrap());

pub struct InstagramResolver<'a> {
    user_agent: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    items: Option<Vec<PostItem>>,
}

#[derive(Debug, Deserialize)]
struct PostItem {
    video_versions: Option<Vec<VideoVersion>>,
}

#[derive(Debug, Deserialize)]
struct VideoVersion {
    height: Option<u32>,
    url: String,
}

impl<'a> InstagramResolver<'a> {
    pub fn new(user_agent: &'a str) -> Self {
        Self { user_agent }
    }
}

impl MediaResolver for InstagramResolver<'_> {
    async fn resolve<T: Transport>(
        &self,
        transport: &T,
        source_url: &str,
    ) -> Result<Extraction, ExtractError> {
        let shortcode = shortcode(source_url).ok_or(ExtractError::InvalidUrl)?;
        let endpoint = endpoint(shortcode)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(self.user_agent).context("invalid user agent")?,
        );

        let body = transport.get_text(&endpoint, headers).await?;
        let response: PostResponse =
            serde_json::from_str(&body).context("unexpected instagram response")?;
        let media = response
            .items
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or(ExtractError::PrivateOrMissing)?;

        let candidates: Vec<_> = media
            .video_versions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|version| {
                media_url(&version.url).map(|url| MediaCandidate {
                    quality: version.height.map(|height| format!("{height}p")),
                    url,
                })
            })
            .collect();
        if candidates.is_empty() {
            return Err(ExtractError::NoVideoFound);
        }
        Ok(Extraction::Candidates(candidates))
    }
}

fn shortcode(source_url: &str) -> Option<&str> {
    SHORTCODE_RE
        .captures(source_url)
        .and_then(|cap| cap.name("shortcode"))
        .map(|m| m.as_str())
}

fn endpoint(shortcode: &str) -> anyhow::Result<Url> {
    let url = Url::parse(&format!(
        "https://www.instagram.com/p/{shortcode}/?__a=1&__d=dis"
    ))?;
    Ok(url)
}
