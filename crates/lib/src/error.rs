//! Error types for the forwarding pipeline.
//!
//! Fetch errors propagate into the upload that triggered them; upload errors stop at the
//! per-item boundary in the forwarder.

use std::path::PathBuf;
use thiserror::Error;

/// Remote media could not be retrieved into a local file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination API rejected the request or could not be reached.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("telegram {method} request failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("telegram {method} rejected: {status} {description}")]
    Rejected {
        method: &'static str,
        status: u16,
        description: String,
    },

    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding {method} body: {source}")]
    Encode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
