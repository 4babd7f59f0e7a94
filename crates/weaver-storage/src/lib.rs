//! HTTP fetch utilities + the bundled historical match dataset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info_span, Instrument};
use weaver_core::MatchRecord;

pub const CRATE_NAME: &str = "weaver-storage";

/// How an upstream failure is reported in logs. Both kinds advance a fallback cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Unavailable,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Unavailable => "upstream_unavailable",
        }
    }
}

pub fn classify_status(status: StatusCode) -> FailureKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FailureKind::RateLimited
    } else {
        FailureKind::Unavailable
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// `url` never carries the query string and `source` is stripped of its URL.
    #[error("request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Request { .. } => FailureKind::Unavailable,
            FetchError::HttpStatus { status, .. } => StatusCode::from_u16(*status)
                .map(classify_status)
                .unwrap_or(FailureKind::Unavailable),
        }
    }
}

/// Single-shot GET client. Failures are returned immediately; callers fall back instead of retrying.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    /// GET `url` with query pairs and extra headers. Query values are kept out of the
    /// tracing span since they may carry API keys.
    pub async fn fetch_bytes(
        &self,
        source_id: &str,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", source_id, url);
        async move {
            let mut request = self.client.get(url).query(query);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let resp = request.send().await.map_err(|err| request_error(url, err))?;
            let status = resp.status();
            let mut final_url = resp.url().clone();
            final_url.set_query(None);
            let final_url = final_url.to_string();

            if !status.is_success() {
                debug!(status = status.as_u16(), "upstream returned non-success status");
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|err| request_error(url, err))?
                .to_vec();
            debug!(bytes = body.len(), "upstream response received");
            Ok(FetchedResponse {
                status,
                final_url,
                body,
            })
        }
        .instrument(span)
        .await
    }
}

fn request_error(url: &str, err: reqwest::Error) -> FetchError {
    let url = url.split('?').next().unwrap_or(url).to_string();
    FetchError::Request {
        url,
        source: err.without_url(),
    }
}

/// The bundled dataset could not be used. No further fallback exists past this point.
#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("reading historical dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing historical dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("historical dataset {path} contains no matches")]
    Empty { path: PathBuf },
}

/// Read a static JSON array of match records, preserving file order.
pub async fn load_historical_matches(
    path: impl AsRef<Path>,
) -> Result<Vec<MatchRecord>, FallbackError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| FallbackError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let records: Vec<MatchRecord> =
        serde_json::from_str(&text).map_err(|source| FallbackError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if records.is_empty() {
        return Err(FallbackError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(records)
}
