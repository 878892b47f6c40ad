//! Error types for pipeline operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while fetching, verifying, or recompressing an artifact.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Connection failure, timeout, or non-success HTTP status while fetching.
    #[error("download failed for {url}: {source}")]
    Network {
        /// Source URL of the artifact being fetched.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Local storage failure (scratch buffer, output file, sidecar).
    #[error(transparent)]
    Write(#[from] io::Error),

    /// Computed digest of the fetched bytes differs from the expected one.
    #[error("hash mismatch for {url} [expected={expected}, actual={actual}]")]
    Integrity {
        /// Source URL of the artifact that failed verification.
        url: String,
        /// Digest from the input manifest.
        expected: String,
        /// Digest computed from the fetched bytes.
        actual: String,
    },

    /// Malformed or truncated xz stream on the transcode input side.
    #[error("xz decode failed: {0}")]
    Decode(#[source] io::Error),

    /// zstd encoder failure on the transcode output side.
    #[error("zstd encode failed: {0}")]
    Encode(#[source] io::Error),

    /// Invalid or unreadable artifact manifest. Fatal to the whole run.
    #[error("invalid manifest: {0}")]
    Manifest(String),
}

impl PipelineError {
    /// Folds a tokio task join failure into an I/O error. The pipeline never
    /// cancels tasks mid-run, so a join failure means the task panicked.
    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        PipelineError::Write(io::Error::other(format!("task join error: {}", err)))
    }
}
