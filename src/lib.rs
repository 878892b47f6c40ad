//! rezstd - Fetch, verify, and recompress release archives from xz to zstd
//!
//! This library downloads a configured set of remote `.tar.xz` artifacts,
//! verifies each against a known-good SHA-256 digest, recompresses each to
//! zstd under a streaming, memory-bounded discipline, and publishes `.sha256`
//! checksum sidecars for the outputs.
//!
//! # Features
//!
//! - **Streaming**: No artifact is ever materialized in memory; downloads
//!   land in disk-backed scratch buffers read in fixed chunks
//! - **SHA-256 Verification**: Every artifact is checked against the input
//!   manifest before it is recompressed
//! - **Multithreaded zstd**: The encoder spreads each transcode over all
//!   available cores, keeping high compression levels practical
//! - **Stage Barriers**: All artifacts finish a stage before any advances,
//!   so downloads and CPU-heavy transcodes never compete at full fan-out
//! - **Failure Isolation**: One bad artifact never aborts its siblings
//!
//! # Example
//!
//! ```no_run
//! use rezstd::{default_artifacts, run_pipeline, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig {
//!     output_dir: "out".into(),
//!     ..PipelineConfig::default()
//! };
//!
//! let reports = run_pipeline(&config, default_artifacts()).await?;
//! assert!(reports.iter().all(|r| r.is_published()));
//! # Ok(())
//! # }
//! ```

mod error;
mod fetch;
mod hash;
mod manifest;
mod orchestrator;
mod scratch;
mod transcode;
mod types;
mod verify;

pub use error::PipelineError;
pub use fetch::fetch;
pub use hash::{digest_file, digest_reader, sidecar_path_for, write_digest_sidecar};
pub use manifest::{default_artifacts, load_manifest};
pub use orchestrator::run_pipeline;
pub use scratch::ScratchBuffer;
pub use transcode::{derive_output_path, transcode_to_zstd};
pub use types::{
    ArtifactOutcome, ArtifactReport, ArtifactSpec, PipelineConfig, PublishedArtifact, Stage,
};
pub use verify::verify_digest;
