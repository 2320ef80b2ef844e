mod instagram;
mod page;
mod twitter;
mod ytdlp;

use std::fmt::Display;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use self::instagram::InstagramResolver;
use self::page::PageResolver;
use self::twitter::TwitterResolver;
use self::ytdlp::YtDlpResolver;
use crate::config::{Config, GenericBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Instagram,
    Twitter,
    Generic,
}

impl Category {
    /// Guess the category from the host of `url`, falling back to generic
    pub fn detect(url: &str) -> Self {
        let host = Url::parse(url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));
        match host.as_deref() {
            Some("instagram.com") | Some("www.instagram.com") => Self::Instagram,
            Some("twitter.com") | Some("www.twitter.com") | Some("mobile.twitter.com")
            | Some("x.com") | Some("www.x.com") | Some("vxtwitter.com")
            | Some("fxtwitter.com") => Self::Twitter,
            _ => Self::Generic,
        }
    }

    /// Short client-facing message for a failed extraction
    pub fn failure_message(&self, error: &ExtractError) -> &'static str {
        match (self, error) {
            (Self::Instagram, ExtractError::InvalidUrl) => "Bad IG URL",
            (Self::Twitter, ExtractError::InvalidUrl) => "Bad Tweet URL",
            (Self::Generic, ExtractError::InvalidUrl) => "Bad URL",
            (_, ExtractError::PrivateOrMissing) => "Private / removed",
            (Self::Instagram, ExtractError::NoVideoFound) => "No video in post",
            (Self::Twitter, ExtractError::NoVideoFound) => "No video in tweet",
            (Self::Generic, ExtractError::NoVideoFound) => "No video found",
            (_, ExtractError::Unsupported) => "Unsupported URL",
            (Self::Instagram, ExtractError::Upstream(_)) => "Instagram fetch failed",
            (Self::Twitter, ExtractError::Upstream(_)) => "Twitter fetch failed",
            (Self::Generic, ExtractError::Upstream(_)) => "Unsupported URL",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instagram => write!(f, "instagram"),
            Self::Twitter => write!(f, "twitter"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaCandidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    pub url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Every usable variant, in the order the source listed them
    Candidates(Vec<MediaCandidate>),
    /// A lone address found in page metadata
    Single(Url),
}

impl Extraction {
    pub fn into_candidates(self) -> Vec<MediaCandidate> {
        match self {
            Self::Candidates(candidates) => candidates,
            Self::Single(url) => vec![MediaCandidate { quality: None, url }],
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no identifier found in url")]
    InvalidUrl,
    #[error("media is private or missing")]
    PrivateOrMissing,
    #[error("no video found")]
    NoVideoFound,
    #[error("no video tag found on page")]
    Unsupported,
    #[error("upstream failure: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

/// Outbound HTTP used by the resolvers
pub trait Transport {
    async fn get_text(&self, url: &Url, headers: HeaderMap) -> anyhow::Result<String>;
}

impl Transport for reqwest::Client {
    async fn get_text(&self, url: &Url, headers: HeaderMap) -> anyhow::Result<String> {
        let text = self
            .get(url.clone())
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }
}

/// Turns a source url into direct media links, making at most one outbound call
pub trait MediaResolver {
    async fn resolve<T: Transport>(
        &self,
        transport: &T,
        source_url: &str,
    ) -> Result<Extraction, ExtractError>;
}

pub struct Dispatcher<T> {
    transport: T,
    user_agent: String,
    generic_backend: GenericBackend,
    yt_dlp: YtDlpResolver,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            user_agent: config.user_agent.clone(),
            generic_backend: config.generic_backend,
            yt_dlp: YtDlpResolver::new(&config.yt_dlp_path, config.timeout()),
        }
    }

    pub async fn extract(
        &self,
        category: Category,
        source_url: &str,
    ) -> Result<Extraction, ExtractError> {
        let transport = &self.transport;
        let result = match category {
            Category::Instagram => {
                let resolver = InstagramResolver::new(&self.user_agent);
                resolver.resolve(transport, source_url).await
            }
            Category::Twitter => TwitterResolver.resolve(transport, source_url).await,
            Category::Generic => match self.generic_backend {
                GenericBackend::Scrape => {
                    let resolver = PageResolver::new(&self.user_agent);
                    resolver.resolve(transport, source_url).await
                }
                GenericBackend::YtDlp => self.yt_dlp.resolve(transport, source_url).await,
            },
        };

        match &result {
            Ok(extraction) => tracing::debug!(%category, source_url, ?extraction, "extracted"),
            Err(e) => tracing::warn!(%category, source_url, "extraction failed: {e}"),
        }
        result
    }
}

/// Parse a media address, dropping anything that is not an absolute http(s) url
fn media_url(address: &str) -> Option<Url> {
    Url::parse(address)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}
