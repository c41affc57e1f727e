use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("building request failed: {0}")]
    Build(#[source] reqwest::Error),
    #[error(transparent)]
    Http(#[from] reqwest_middleware::Error),
    #[error("reading response body failed: {0}")]
    Body(#[source] reqwest::Error),
}

impl TransportError {
    /// Connection-level failures are worth another attempt; nothing else is.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(reqwest_middleware::Error::Reqwest(err)) => err.is_connect(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("Cache parameter is not provided")]
    MissingCacheDirective,
    #[error("Bad Status code. Expected {expected}, Actual status code: {actual}, URL: {url}")]
    UnexpectedStatus {
        expected: u16,
        actual: u16,
        url: String,
    },
    #[error("decoding JSON response from {url} failed: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reading attachment {} failed: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
