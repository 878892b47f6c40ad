//! Scratch storage for one in-flight artifact.

use std::io::{self, SeekFrom};

use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Exclusively-owned byte store holding one artifact's raw fetched bytes for
/// the duration of its pipeline pass.
///
/// Backed by an anonymous temp file, so large artifacts never sit in memory
/// and the storage is released automatically when the buffer is dropped.
/// Written sequentially during fetch, then read twice from offset 0 (verify,
/// then transcode); each read pass must [`rewind`](Self::rewind) first since
/// all handles share one cursor.
#[derive(Debug)]
pub struct ScratchBuffer {
    file: File,
    len: u64,
}

impl ScratchBuffer {
    /// Creates an empty scratch buffer backed by an unlinked temp file.
    pub fn new() -> io::Result<Self> {
        let file = tempfile::tempfile()?;
        Ok(Self {
            file: File::from_std(file),
            len: 0,
        })
    }

    /// Appends one chunk of fetched bytes.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Flushes buffered writes. Call once after the last chunk.
    pub async fn finish_write(&mut self) -> io::Result<()> {
        self.file.flush().await
    }

    /// Total bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Seeks the shared cursor back to offset 0 for the next full read pass.
    pub async fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Returns a blocking handle for CPU-bound passes (hashing, transcoding)
    /// run on the worker pool. The handle shares this buffer's cursor.
    pub async fn blocking_reader(&self) -> io::Result<std::fs::File> {
        let clone = self.file.try_clone().await?;
        Ok(clone.into_std().await)
    }
}
