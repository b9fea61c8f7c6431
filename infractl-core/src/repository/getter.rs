use std::{path::PathBuf, time::Duration};

use log::debug;
use reqwest::Url;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("infractl/", env!("CARGO_PKG_VERSION"));
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GetterError {
    #[error("Invalid URL '{}'! Reason: {}", .url, .reason)]
    InvalidUrl { url: String, reason: String },
    #[error("Unsupported URL scheme '{}', expected http, https or file!", .0)]
    UnsupportedScheme(String),
    #[error("HTTP request failed! Reason: {}", .0)]
    Http(reqwest::Error),
    #[error("'{}' responded with {}!", .url, .status)]
    Status { url: String, status: u16 },
    #[error("Couldn't read {:?}! Reason: {}", .0, .1)]
    File(PathBuf, std::io::Error),
}

pub fn parse_url(url: &str) -> Result<Url, GetterError> {
    Url::parse(url).map_err(|error| GetterError::InvalidUrl {
        url: url.to_owned(),
        reason: error.to_string(),
    })
}

/// Fetches raw bytes from a repository URL.
#[allow(async_fn_in_trait)]
pub trait IndexGetter {
    fn supports(&self, _url: &Url) -> bool {
        true
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, GetterError>;
}

/// Plain HTTP(S) GET.
#[derive(Debug, Clone)]
pub struct HttpGetter {
    client: reqwest::Client,
}

impl Default for HttpGetter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpGetter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

impl IndexGetter for HttpGetter {
    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, GetterError> {
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(GetterError::Http)?;

        let status = response.status();

        if !status.is_success() {
            return Err(GetterError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await.map_err(GetterError::Http)?.to_vec())
    }
}

/// Reads `file://` URLs from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileGetter;

impl IndexGetter for FileGetter {
    fn supports(&self, url: &Url) -> bool {
        url.scheme() == "file"
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, GetterError> {
        let path = parse_url(url)?
            .to_file_path()
            .map_err(|_| GetterError::InvalidUrl {
                url: url.to_owned(),
                reason: "not a local path".to_owned(),
            })?;

        tokio::fs::read(&path)
            .await
            .map_err(|error| GetterError::File(path, error))
    }
}

/// The transports a chart repository can be served over, picked by URL scheme.
#[derive(Debug, Clone, Default)]
pub struct TransportGetters {
    http: HttpGetter,
    file: FileGetter,
}

impl IndexGetter for TransportGetters {
    fn supports(&self, url: &Url) -> bool {
        self.http.supports(url) || self.file.supports(url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, GetterError> {
        let parsed = parse_url(url)?;

        if self.http.supports(&parsed) {
            self.http.get(url).await
        } else if self.file.supports(&parsed) {
            self.file.get(url).await
        } else {
            Err(GetterError::UnsupportedScheme(parsed.scheme().to_owned()))
        }
    }
}
