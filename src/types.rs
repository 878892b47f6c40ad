//! Data structures for pipeline operations.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::PipelineError;

/// One remote artifact to fetch, verify, and recompress.
///
/// Identity is the source URL; the expected digest comes from the input
/// manifest and is normalized to lowercase hex at load time.
#[derive(Deserialize, Debug, Clone)]
pub struct ArtifactSpec {
    /// HTTP(S) URL of the source `.tar.xz` archive.
    pub url: String,
    /// Expected SHA-256 of the raw (still xz-compressed) artifact bytes,
    /// as 64 lowercase hex characters.
    pub expected_sha256: String,
}

/// Pipeline stage an artifact was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Streaming the remote body into scratch storage.
    Fetch,
    /// Hashing the scratch buffer against the expected digest.
    Verify,
    /// Decompressing xz and re-encoding as zstd.
    Transcode,
    /// Writing the output's `.sha256` sidecar.
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Transcode => "transcode",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// A recompressed output that reached the end of the pipeline.
#[derive(Debug, Clone)]
pub struct PublishedArtifact {
    /// Path of the `.zst` output file.
    pub output_path: PathBuf,
    /// Size of the output file in bytes.
    pub byte_size: u64,
}

/// Terminal state of one artifact's pipeline pass.
#[derive(Debug)]
pub enum ArtifactOutcome {
    /// Output and sidecar written.
    Published(PublishedArtifact),
    /// The artifact failed at `stage`; siblings were not affected.
    Failed {
        /// Stage at which the failure occurred.
        stage: Stage,
        /// The underlying error.
        error: PipelineError,
    },
}

/// Per-artifact result surfaced to the caller after the whole batch settles.
#[derive(Debug)]
pub struct ArtifactReport {
    /// Source URL identifying the artifact.
    pub url: String,
    /// Terminal state.
    pub outcome: ArtifactOutcome,
}

impl ArtifactReport {
    /// True if the artifact reached `Published`.
    pub fn is_published(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Published(_))
    }
}

/// Configuration for a pipeline run.
///
/// # Example
///
/// ```
/// use rezstd::PipelineConfig;
///
/// let config = PipelineConfig {
///     output_dir: "out".into(),
///     compression_level: 19,
///     max_concurrent_downloads: 8,
///     max_concurrent_transcodes: 2,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for `.zst` outputs and their sidecars. Created if absent;
    /// failure to create it is fatal to the whole run.
    pub output_dir: PathBuf,
    /// zstd compression level (1-22). Defaults to 19.
    ///
    /// The encoder runs multithreaded across all cores, so high levels stay
    /// practical; 20-22 buy a little extra ratio for a lot more memory.
    pub compression_level: i32,
    /// Maximum number of concurrent downloads (default: 4).
    ///
    /// Note: This is not limited by CPU cores. Since downloads are I/O-bound,
    /// even low-core CPUs can handle 8-16 concurrent downloads efficiently.
    /// The limiting factor is network bandwidth, not CPU.
    pub max_concurrent_downloads: usize,
    /// Maximum number of artifacts transcoding at once (default: 2).
    ///
    /// Each transcode already spreads its encoder over every core, so this
    /// caps worst-case CPU demand at roughly `max_concurrent_transcodes`
    /// times the core count.
    pub max_concurrent_transcodes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            compression_level: 19,
            max_concurrent_downloads: 4,
            max_concurrent_transcodes: 2,
        }
    }
}
