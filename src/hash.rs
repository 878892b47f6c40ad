//! SHA-256 hashing and checksum sidecar publishing.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::PipelineError;

/// Chunk size for all streaming reads in the pipeline.
pub(crate) const CHUNK_SIZE: usize = 32 * 1024;

/// Computes the SHA-256 of everything remaining in `reader`, as lowercase hex.
///
/// Reads fixed-size chunks so arbitrarily large inputs never sit in memory.
/// No side effects beyond advancing the reader's cursor.
pub fn digest_reader<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Computes the SHA-256 of a file on disk.
///
/// Runs on the blocking worker pool to keep chunked reads off the async
/// runtime.
pub async fn digest_file(path: &Path) -> Result<String, PipelineError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        digest_reader(&mut file).map_err(PipelineError::Write)
    })
    .await
    .map_err(PipelineError::from_join)?
}

/// Computes the digest of the file at `path` and writes the
/// `<path>.sha256` sidecar next to it.
///
/// Sidecar content is `"<digest>  <basename>\n"` (two spaces), the
/// conventional format understood by `sha256sum -c`.
pub async fn write_digest_sidecar(path: &Path) -> Result<(), PipelineError> {
    let digest = digest_file(path).await?;

    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let sidecar_path = sidecar_path_for(path);

    tokio::fs::write(&sidecar_path, format!("{}  {}\n", digest, basename)).await?;
    info!("Wrote checksum sidecar {}", sidecar_path.display());
    Ok(())
}

/// Path of the checksum sidecar for an output file.
pub fn sidecar_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".sha256");
    std::path::PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn digest_of_empty_stream_is_well_known() {
        let mut empty = Cursor::new(Vec::new());
        assert_eq!(digest_reader(&mut empty).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn digest_of_known_bytes() {
        let mut input = Cursor::new(b"abc".to_vec());
        assert_eq!(
            digest_reader(&mut input).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_spans_chunk_boundaries() {
        // Input longer than one read chunk hashes the same as a single slab.
        let bytes = vec![0xa7u8; CHUNK_SIZE * 3 + 17];
        let mut chunked = Cursor::new(bytes.clone());

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let expected = hex::encode(hasher.finalize());

        assert_eq!(digest_reader(&mut chunked).unwrap(), expected);
    }

    #[tokio::test]
    async fn sidecar_has_exact_two_space_format() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("payload.tar.zst");
        tokio::fs::write(&out_path, b"payload bytes").await.unwrap();

        write_digest_sidecar(&out_path).await.unwrap();

        let digest = digest_file(&out_path).await.unwrap();
        let sidecar = tokio::fs::read_to_string(dir.path().join("payload.tar.zst.sha256"))
            .await
            .unwrap();
        assert_eq!(sidecar, format!("{}  payload.tar.zst\n", digest));
    }
}
