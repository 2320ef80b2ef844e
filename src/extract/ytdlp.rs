use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tokio::process::Command;
use url::Url;

use super::{media_url, ExtractError, Extraction, MediaCandidate, MediaResolver, Transport};

static TARGET_EXT: &str = "mp4";

/// Lists formats by running yt-dlp against the source url
pub struct YtDlpResolver {
    program: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Info {
    formats: Option<Vec<Format>>,
}

#[derive(Debug, Deserialize)]
struct Format {
    ext: Option<String>,
    url: Option<String>,
    height: Option<u32>,
}

impl YtDlpResolver {
    pub fn new(program: &str, timeout: Duration) -> Self {
        Self {
            program: program.to_owned(),
            timeout,
        }
    }

    async fn dump_json(&self, url: &Url) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .args(["-J", "--no-playlist", "--no-warnings"])
            .arg(url.as_str())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| anyhow!("{} timed out after {:?}", self.program, self.timeout))?
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

impl MediaResolver for YtDlpResolver {
    async fn resolve<T: Transport>(
        &self,
        _transport: &T,
        source_url: &str,
    ) -> Result<Extraction, ExtractError> {
        let url = Url::parse(source_url)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or(ExtractError::InvalidUrl)?;

        let json = self.dump_json(&url).await?;
        let candidates = parse_formats(&json)?;
        if candidates.is_empty() {
            return Err(ExtractError::NoVideoFound);
        }
        Ok(Extraction::Candidates(candidates))
    }
}

fn parse_formats(json: &str) -> anyhow::Result<Vec<MediaCandidate>> {
    let info: Info = serde_json::from_str(json).context("unexpected yt-dlp output")?;
    let candidates = info
        .formats
        .unwrap_or_default()
        .into_iter()
        .filter(|format| format.ext.as_deref() == Some(TARGET_EXT))
        .filter_map(|format| {
            let url = format.url.as_deref().and_then(media_url)?;
            let quality = format
                .height
                .map_or_else(|| "unknown".to_owned(), |height| format!("{height}p"));
            Some(MediaCandidate {
                quality: Some(quality),
                url,
            })
        })
        .collect();
    Ok(candidates)
}
