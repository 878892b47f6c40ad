//! Integrity verification of fetched artifacts.

use tracing::info;

use crate::error::PipelineError;
use crate::hash::digest_reader;
use crate::scratch::ScratchBuffer;

/// Checks the scratch buffer's SHA-256 against the manifest digest.
///
/// Rewinds the buffer and hashes it end to end on the blocking pool; there is
/// no early-exit shortcut since the digest is only meaningful over the
/// complete byte stream. Consumes the read cursor — the caller must rewind
/// again before the transcode pass. The expected digest is compared after
/// lowercase normalization.
pub async fn verify_digest(
    scratch: &mut ScratchBuffer,
    url: &str,
    expected: &str,
) -> Result<(), PipelineError> {
    info!("Verifying hash for {}", url);

    scratch.rewind().await?;
    let mut reader = scratch.blocking_reader().await?;

    let actual = tokio::task::spawn_blocking(move || digest_reader(&mut reader))
        .await
        .map_err(PipelineError::from_join)??;

    let expected = expected.to_ascii_lowercase();
    if actual != expected {
        return Err(PipelineError::Integrity {
            url: url.to_string(),
            expected,
            actual,
        });
    }

    Ok(())
}
