//! Session input sources.
//!
//! Stream variants yield a finite, non-restartable sequence of byte chunks.
//! Text input yields nothing here; its content travels inside the init
//! payload.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Default audio chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Default number of buffered pushes an audio pipe accepts before pushing waits
pub const DEFAULT_PIPE_CAPACITY: usize = 64;

/// What a session sends after init
pub enum InputSource {
    /// Audio read from a file or any async reader
    File(FileStream),
    /// Audio pushed by a live producer
    Pipe(PipeReader),
    /// Text request, embedded into the init payload
    Text(String),
}

impl InputSource {
    /// Stream audio from a file
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(file))
    }

    /// Stream audio from any async reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        InputSource::File(FileStream::new(reader))
    }

    /// Stream audio from an in-memory buffer
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::from_reader(io::Cursor::new(data.into()))
    }

    /// Text request
    pub fn text(text: impl Into<String>) -> Self {
        InputSource::Text(text.into())
    }

    /// Live audio pipe; push into the returned writer
    pub fn pipe(capacity: usize) -> (PipeWriter, Self) {
        let (writer, reader) = audio_pipe(capacity);
        (writer, InputSource::Pipe(reader))
    }

    /// Change the chunk size of a stream source
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        match self {
            InputSource::File(stream) => InputSource::File(stream.with_chunk_size(chunk_size)),
            InputSource::Pipe(reader) => InputSource::Pipe(reader.with_chunk_size(chunk_size)),
            text => text,
        }
    }

    /// Whether the source streams binary frames
    pub fn is_stream(&self) -> bool {
        !matches!(self, InputSource::Text(_))
    }

    /// Next chunk of a stream source, `None` when exhausted
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        match self {
            InputSource::File(stream) => stream.next_chunk().await,
            InputSource::Pipe(reader) => Ok(reader.next_chunk().await),
            InputSource::Text(_) => Ok(None),
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::File(stream) => f
                .debug_tuple("File")
                .field(&stream.chunk_size)
                .finish(),
            InputSource::Pipe(reader) => f
                .debug_tuple("Pipe")
                .field(&reader.chunk_size)
                .finish(),
            InputSource::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// Chunked reader over an async byte source
pub struct FileStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    chunk_size: usize,
}

impl FileStream {
    /// Wrap a reader with the default chunk size
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Change the chunk size; zero falls back to the default
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = effective_chunk_size(chunk_size);
        self
    }

    /// Read a full chunk; only the final chunk may be shorter
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.reader.read(&mut buf[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }
}

/// Pushing into a pipe whose reading side is gone
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("audio pipe closed")]
pub struct PipeClosed;

/// Producer side of an audio pipe
///
/// Dropping every writer (or calling [`close`](Self::close)) ends the stream.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
}

impl PipeWriter {
    /// Push bytes, waiting while the pipe is full
    pub async fn push(&self, data: impl Into<Bytes>) -> Result<(), PipeClosed> {
        self.tx.send(data.into()).await.map_err(|_| PipeClosed)
    }

    /// Push bytes from a thread outside the async runtime
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_push(&self, data: impl Into<Bytes>) -> Result<(), PipeClosed> {
        self.tx.blocking_send(data.into()).map_err(|_| PipeClosed)
    }

    /// Whether the reading side stopped consuming
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// End the stream from this writer
    pub fn close(self) {}
}

/// Consumer side of an audio pipe, re-chunked to a fixed size
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    pending: BytesMut,
    chunk_size: usize,
    finished: bool,
}

impl PipeReader {
    /// Change the chunk size; zero falls back to the default
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = effective_chunk_size(chunk_size);
        self
    }

    /// Next chunk, waiting for the producer; only the final chunk may be shorter
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        while self.pending.len() < self.chunk_size && !self.finished {
            match self.rx.recv().await {
                Some(data) => self.pending.extend_from_slice(&data),
                None => self.finished = true,
            }
        }
        if self.pending.is_empty() {
            return None;
        }
        let take = self.chunk_size.min(self.pending.len());
        Some(self.pending.split_to(take).freeze())
    }
}

/// Create a bounded audio pipe holding up to `capacity` pushes
pub fn audio_pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            pending: BytesMut::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            finished: false,
        },
    )
}

fn effective_chunk_size(chunk_size: usize) -> usize {
    if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(source: &mut InputSource) -> Vec<usize> {
        let mut sizes = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }
        sizes
    }

    #[tokio::test]
    async fn test_file_chunks() {
        let mut source = InputSource::from_bytes(vec![7u8; 5000]);
        assert_eq!(drain(&mut source).await, vec![2048, 2048, 904]);
        assert!(source.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_exact_multiple_and_empty() {
        let mut exact = InputSource::from_bytes(vec![1u8; 4096]);
        assert_eq!(drain(&mut exact).await, vec![2048, 2048]);

        let mut empty = InputSource::from_bytes(Vec::new());
        assert!(drain(&mut empty).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_chunk_size() {
        let mut source = InputSource::from_bytes(vec![0u8; 10]).with_chunk_size(4);
        assert_eq!(drain(&mut source).await, vec![4, 4, 2]);

        let mut zero = InputSource::from_bytes(vec![0u8; 10]).with_chunk_size(0);
        assert_eq!(drain(&mut zero).await, vec![10]);
    }

    #[tokio::test]
    async fn test_pipe_rechunks() {
        let (writer, source) = InputSource::pipe(8);
        let mut source = source.with_chunk_size(1000);
        let source_sizes = tokio::spawn(async move { drain(&mut source).await });

        for _ in 0..5 {
            writer.push(vec![0u8; 300]).await.unwrap();
        }
        writer.close();

        assert_eq!(source_sizes.await.unwrap(), vec![1000, 500]);
    }

    #[tokio::test]
    async fn test_push_after_reader_dropped() {
        let (writer, reader) = audio_pipe(1);
        assert!(!writer.is_closed());
        drop(reader);
        assert!(writer.is_closed());
        assert_eq!(writer.push(vec![1u8]).await, Err(PipeClosed));
    }

    #[tokio::test]
    async fn test_blocking_push_from_thread() {
        let (writer, mut reader) = audio_pipe(4);
        let producer = std::thread::spawn(move || {
            for _ in 0..3 {
                writer.blocking_push(vec![9u8; 1024]).unwrap();
            }
        });

        let mut total = 0;
        while let Some(chunk) = reader.next_chunk().await {
            total += chunk.len();
        }
        producer.join().unwrap();
        assert_eq!(total, 3072);
    }

    #[test]
    fn test_text_is_not_streamed() {
        assert!(!InputSource::text("HBO").is_stream());
        assert!(InputSource::from_bytes(vec![1u8]).is_stream());
    }
}
