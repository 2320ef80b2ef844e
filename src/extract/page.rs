use anyhow::Context;
use once_cell::sync::Lazy;
use reqwest::header::{self, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use url::Url;

use super::{ExtractError, Extraction, MediaResolver, Transport};

static VIDEO_SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("video source[src]").unwrap());
static OG_VIDEO: Lazy<[Selector; 3]> = Lazy::new(|| {
    [
        r#"meta[property="og:video"][content]"#,
        r#"meta[property="og:video:secure_url"][content]"#,
        r#"meta[property="og:video:url"][content]"#,
    ]
    .map(|s| Selector::parse(s).unwrap())
});

/// Scrapes a page for a `<video>` source or an Open-Graph video tag
pub struct PageResolver<'a> {
    user_agent: &'a str,
}

impl<'a> PageResolver<'a> {
    pub fn new(user_agent: &'a str) -> Self {
        Self { user_agent }
    }
}

impl MediaResolver for PageResolver<'_> {
    async fn resolve<T: Transport>(
        &self,
        transport: &T,
        source_url: &str,
    ) -> Result<Extraction, ExtractError> {
        let page_url = Url::parse(source_url)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or(ExtractError::InvalidUrl)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(self.user_agent).context("invalid user agent")?,
        );
        let html = transport.get_text(&page_url, headers).await?;

        find_video(&html, &page_url)
            .map(Extraction::Single)
            .ok_or(ExtractError::Unsupported)
    }
}

/// `<video><source>` wins over Open-Graph; relative addresses resolve against the page
fn find_video(html: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    let source = document
        .select(&VIDEO_SOURCE)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty());
    let address = source.or_else(|| {
        OG_VIDEO.iter().find_map(|selector| {
            document
                .select(selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|content| !content.is_empty())
        })
    })?;

    page_url
        .join(address)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}
