use crate::prelude::{Error, Result};
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Reads a local file as a sequence of fixed-size chunks.
///
/// Every chunk except the last one is exactly `chunk_size` bytes long. Once
/// the file is exhausted each further read returns an empty chunk, which is
/// the end-of-stream signal for the transport.
///
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
    path: PathBuf,
    chunk_size: usize,
    total_len: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// # Arguments
    ///
    /// * `path`: Local file to upload.
    /// * `chunk_size`: Number of bytes per read, must not be zero.
    ///
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("upload chunk size must be positive".to_owned()));
        }

        let file = File::open(path).await?;
        let total_len = file.metadata().await?.len();
        tracing::debug!(target: "upload", ?path, total_len, chunk_size, "File opened for upload");

        Ok(Self {
            file,
            path: path.to_owned(),
            chunk_size,
            total_len,
        })
    }

    /// Total length advertised as `Content-Length`.
    ///
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Reads the next chunk; an empty chunk means the file is exhausted.
    ///
    pub async fn read_chunk(&mut self) -> Result<Vec<u8>> {
        Ok(self.fill_chunk().await?)
    }

    async fn fill_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let mut chunk = vec![0; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let read = self.file.read(&mut chunk[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        chunk.truncate(filled);
        Ok(chunk)
    }

    /// Converts the reader into a byte stream ending at the first empty read.
    ///
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
        futures::stream::try_unfold(self, |mut reader| async move {
            let chunk = reader.fill_chunk().await?;
            if chunk.is_empty() {
                tracing::debug!(target: "upload", path = ?reader.path, "Upload stream exhausted");
                Ok::<_, std::io::Error>(None)
            } else {
                Ok(Some((chunk, reader)))
            }
        })
    }
}
