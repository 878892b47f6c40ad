//! Streaming artifact download.

use futures_util::StreamExt;
use tracing::info;

use crate::error::PipelineError;
use crate::scratch::ScratchBuffer;

/// Downloads `url` into a fresh scratch buffer.
///
/// Streams the response body chunk by chunk so peak memory stays bounded
/// regardless of artifact size; redirects are followed by the client's
/// default policy. A connection failure, timeout, or non-success status
/// maps to [`PipelineError::Network`]; a scratch-store failure maps to
/// [`PipelineError::Write`]. No retry logic lives at this layer — a failure
/// is terminal for the artifact within this run.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<ScratchBuffer, PipelineError> {
    info!("Downloading {}", url);

    let network_err = |source: reqwest::Error| PipelineError::Network {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(network_err)?
        .error_for_status()
        .map_err(network_err)?;

    let mut scratch = ScratchBuffer::new()?;
    let mut byte_stream = response.bytes_stream();

    while let Some(piece) = byte_stream.next().await {
        let chunk = piece.map_err(network_err)?;
        scratch.write_chunk(&chunk).await?;
    }
    scratch.finish_write().await?;

    info!("Completed {} ({} bytes)", url, scratch.len());
    Ok(scratch)
}
