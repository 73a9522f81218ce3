// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::{fs, path::Path, time::Duration};
use tracing::{debug, instrument};
use url::Url;

use crate::error::EtlError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pulls raw text from either an http(s) URL or a local snapshot file.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("econ_etl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    /// One blocking GET, or a file read when `location` is not a web URL.
    #[instrument(level = "debug", skip(self))]
    pub fn get_text(&self, location: &str) -> Result<String> {
        match remote_url(location) {
            Some(url) => self.get_remote(&url),
            None => {
                debug!("reading local snapshot {}", location);
                fs::read_to_string(Path::new(location))
                    .with_context(|| format!("reading {}", location))
            }
        }
    }

    fn get_remote(&self, url: &Url) -> Result<String> {
        debug!("Fetching text from {}", url);
        let fail = |e: reqwest::Error| EtlError::Fetch {
            location: url.to_string(),
            reason: e.to_string(),
        };
        let text = self
            .client
            .get(url.clone())
            .send()
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?
            .text()
            .map_err(fail)?;
        Ok(text)
    }
}

/// `Some(url)` only for http/https; drive letters and bare paths stay local.
pub fn remote_url(location: &str) -> Option<Url> {
    Url::parse(location)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}
