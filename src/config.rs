use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub static CONFIG_FILE: &str = "vidrelay.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenericBackend {
    /// Read `<video>` and Open-Graph tags from the page
    Scrape,
    /// Ask yt-dlp for the format list
    YtDlp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub generic_backend: GenericBackend,
    pub yt_dlp_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10000,
            timeout_secs: 10,
            user_agent: "Mozilla/5.0".into(),
            generic_backend: GenericBackend::Scrape,
            yt_dlp_path: "yt-dlp".into(),
        }
    }
}

impl Config {
    pub fn get_config() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("VIDRELAY_"))
            .merge(Env::raw().only(&["PORT"]))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
