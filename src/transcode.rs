//! Streaming xz to zstd recompression.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;
use xz2::read::XzDecoder;

use crate::error::PipelineError;
use crate::hash::CHUNK_SIZE;
use crate::scratch::ScratchBuffer;

/// Target extension for recompressed outputs.
const OUTPUT_EXT: &str = "zst";

/// Derives the output path for an artifact from its source URL.
///
/// Takes the basename of the URL's path component, strips the source
/// compression extension, and appends `.zst` — so
/// `.../clang+llvm-14.0.0.tar.xz` lands at `<out_dir>/clang+llvm-14.0.0.tar.zst`.
/// Deterministic for a given URL.
pub fn derive_output_path(url: &str, out_dir: &Path) -> Result<PathBuf, PipelineError> {
    let parsed =
        Url::parse(url).map_err(|e| PipelineError::Manifest(format!("bad url {}: {}", url, e)))?;

    let basename = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| PipelineError::Manifest(format!("url {} has no file basename", url)))?;

    let stem = Path::new(basename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(basename);

    Ok(out_dir.join(format!("{}.{}", stem, OUTPUT_EXT)))
}

/// Recompresses the scratch buffer's xz stream into a zstd file at `out_path`.
///
/// Ensures the output directory exists, rewinds the buffer, then copies
/// decoded bytes straight from the xz decoder into a multithreaded zstd
/// encoder in fixed chunks — no full-size intermediate buffer. The encoder
/// spreads its work over every available core, which is what keeps high
/// compression levels affordable; the whole pass runs on the blocking pool.
///
/// Returns the output file's size in bytes.
pub async fn transcode_to_zstd(
    scratch: &mut ScratchBuffer,
    out_path: &Path,
    level: i32,
) -> Result<u64, PipelineError> {
    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Recompressing to {}", out_path.display());

    scratch.rewind().await?;
    let input = scratch.blocking_reader().await?;
    let out_path = out_path.to_path_buf();

    tokio::task::spawn_blocking(move || recompress_stream(input, &out_path, level))
        .await
        .map_err(PipelineError::from_join)?
}

/// Blocking decoder-to-encoder copy loop.
fn recompress_stream(
    input: std::fs::File,
    out_path: &Path,
    level: i32,
) -> Result<u64, PipelineError> {
    let reader = std::io::BufReader::with_capacity(CHUNK_SIZE, input);
    let mut decoder = XzDecoder::new(reader);

    let out_file = std::fs::File::create(out_path)?;
    let writer = std::io::BufWriter::new(out_file);
    let mut encoder = zstd::stream::Encoder::new(writer, level).map_err(PipelineError::Encode)?;

    let workers = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    encoder.multithread(workers).map_err(PipelineError::Encode)?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        // Read-side failures here mean a malformed or truncated xz stream.
        let n = decoder.read(&mut buffer).map_err(PipelineError::Decode)?;
        if n == 0 {
            break;
        }
        encoder
            .write_all(&buffer[..n])
            .map_err(PipelineError::Encode)?;
    }

    let mut writer = encoder.finish().map_err(PipelineError::Encode)?;
    writer.flush()?;

    Ok(std::fs::metadata(out_path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchBuffer;

    fn xz_compress(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    async fn scratch_with(bytes: &[u8]) -> ScratchBuffer {
        let mut scratch = ScratchBuffer::new().unwrap();
        scratch.write_chunk(bytes).await.unwrap();
        scratch.finish_write().await.unwrap();
        scratch
    }

    #[test]
    fn output_path_strips_xz_and_appends_zst() {
        let out = derive_output_path(
            "https://github.com/llvm/llvm-project/releases/download/llvmorg-14.0.0/clang+llvm-14.0.0-x86_64-linux-gnu-ubuntu-18.04.tar.xz",
            Path::new("/out"),
        )
        .unwrap();
        assert_eq!(
            out,
            Path::new("/out/clang+llvm-14.0.0-x86_64-linux-gnu-ubuntu-18.04.tar.zst")
        );
    }

    #[test]
    fn output_path_ignores_query_string() {
        let out =
            derive_output_path("https://example.com/dist/pkg.tar.xz?token=abc", Path::new("o"))
                .unwrap();
        assert_eq!(out, Path::new("o/pkg.tar.zst"));
    }

    #[test]
    fn output_path_without_extension_gets_zst() {
        let out = derive_output_path("https://example.com/dist/blob", Path::new("o")).unwrap();
        assert_eq!(out, Path::new("o/blob.zst"));
    }

    #[test]
    fn rejects_url_without_basename() {
        assert!(derive_output_path("https://example.com/", Path::new("o")).is_err());
    }

    #[tokio::test]
    async fn round_trip_is_lossless() {
        let payload: Vec<u8> = (0..200_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let mut scratch = scratch_with(&xz_compress(&payload)).await;

        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("payload.tar.zst");
        let size = transcode_to_zstd(&mut scratch, &out_path, 3).await.unwrap();
        assert_eq!(size, std::fs::metadata(&out_path).unwrap().len());

        let out_bytes = std::fs::read(&out_path).unwrap();
        let restored = zstd::decode_all(&out_bytes[..]).unwrap();
        assert_eq!(restored, payload);
    }

    #[tokio::test]
    async fn repeated_runs_are_byte_identical() {
        let payload = b"deterministic output expected".repeat(1000);
        let compressed = xz_compress(&payload);
        let dir = tempfile::tempdir().unwrap();

        let mut first = scratch_with(&compressed).await;
        let first_path = dir.path().join("run1.tar.zst");
        transcode_to_zstd(&mut first, &first_path, 3).await.unwrap();

        let mut second = scratch_with(&compressed).await;
        let second_path = dir.path().join("run2.tar.zst");
        transcode_to_zstd(&mut second, &second_path, 3)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(first_path).unwrap(),
            std::fs::read(second_path).unwrap()
        );
    }

    #[tokio::test]
    async fn empty_decompressed_stream_produces_valid_empty_zstd() {
        let mut scratch = scratch_with(&xz_compress(b"")).await;
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("empty.tar.zst");

        transcode_to_zstd(&mut scratch, &out_path, 3).await.unwrap();

        let out_bytes = std::fs::read(&out_path).unwrap();
        assert!(zstd::decode_all(&out_bytes[..]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_input_fails_with_decode_error() {
        let mut scratch = scratch_with(b"this is not an xz stream at all").await;
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("bad.tar.zst");

        let err = transcode_to_zstd(&mut scratch, &out_path, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }
}
