//! Compress-mode stream adapter.

use strix_core::{Backend, ByteStream, CompressionLevel, Error, Flush, Result, StreamCompress};
use tracing::{debug, trace};

use crate::{clamp_buffer_size, StageBuffer, DEFAULT_BUFFER_SIZE};

/// A writer that compresses data into an underlying [`ByteStream`].
///
/// Plaintext fed to [`write`](DeflateWriter::write) is compressed
/// incrementally; compressed bytes stage in an internal buffer and drain to
/// the underlying stream as the buffer fills. The adapter owns the stream
/// it is given: closing the adapter releases it. To keep ownership, wrap a
/// `&mut` borrow instead - the adapter then releases only the borrow.
pub struct DeflateWriter<S: ByteStream> {
    inner: Option<S>,
    codec: Box<dyn StreamCompress + Send>,
    stage: StageBuffer,
    finished: bool,
}

impl<S: ByteStream> core::fmt::Debug for DeflateWriter<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeflateWriter")
            .field("stage", &self.stage)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<S: ByteStream> DeflateWriter<S> {
    /// Create a compressing adapter with the default backend and buffer
    /// size.
    pub fn new(inner: S, level: CompressionLevel) -> Result<Self> {
        Self::with_options(inner, level, Backend::default(), DEFAULT_BUFFER_SIZE)
    }

    /// Create a compressing adapter with an explicit backend.
    pub fn with_backend(inner: S, level: CompressionLevel, backend: Backend) -> Result<Self> {
        Self::with_options(inner, level, backend, DEFAULT_BUFFER_SIZE)
    }

    /// Create a compressing adapter with explicit backend and buffer size.
    pub fn with_options(
        inner: S,
        level: CompressionLevel,
        backend: Backend,
        buffer_size: usize,
    ) -> Result<Self> {
        if !inner.is_open() {
            return Err(Error::invalid_argument(
                "stream",
                "stream is already closed",
            ));
        }
        if !inner.can_write() {
            return Err(Error::invalid_argument(
                "stream",
                "compression requires a writable stream",
            ));
        }

        debug!(backend = backend.name(), ?level, "opening compression stream");
        Ok(Self {
            inner: Some(inner),
            codec: strix_deflate::compressor(backend, level),
            stage: StageBuffer::with_capacity(clamp_buffer_size(buffer_size)),
            finished: false,
        })
    }

    /// The configured compression level.
    pub fn level(&self) -> CompressionLevel {
        self.codec.level()
    }

    /// The underlying stream, while the adapter is open.
    pub fn get_ref(&self) -> Option<&S> {
        self.inner.as_ref()
    }

    /// The underlying stream, mutably, while the adapter is open.
    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.inner.as_mut()
    }

    /// Compress `buf` into the stream. A zero-length write is a no-op that
    /// never touches the underlying stream.
    pub fn write(&mut self, mut buf: &[u8]) -> Result<()> {
        if self.inner.is_none() {
            return Err(Error::disposed("write"));
        }
        if buf.is_empty() {
            return Ok(());
        }
        if self.finished {
            return Err(Error::invalid_operation(
                "stream is already finalized",
            ));
        }

        while !buf.is_empty() {
            let spare = self.stage.spare();
            if spare.is_empty() {
                self.drain_stage()?;
                continue;
            }
            let (consumed, produced) = self.codec.compress(buf, spare, Flush::None)?;
            self.stage.commit(produced);
            buf = &buf[consumed..];

            if consumed == 0 && produced == 0 {
                self.drain_stage()?;
            }
        }
        Ok(())
    }

    /// Push all compressed bytes produced so far to the underlying stream
    /// without finalizing; more writes may follow.
    pub fn flush(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Err(Error::disposed("flush"));
        }
        if !self.finished {
            self.pump(Flush::Sync)?;
        } else {
            self.drain_stage()?;
        }
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }

    /// Finalize the compressed stream (final block and trailing bits)
    /// without releasing the underlying stream. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Err(Error::disposed("finish"));
        }
        if self.finished {
            return Ok(());
        }
        self.pump(Flush::Finish)?;
        self.finished = true;
        trace!("compression stream finalized");
        Ok(())
    }

    /// Finalize and release the underlying stream. Idempotent: a second
    /// call is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.inner.is_none() {
            return Ok(());
        }
        let finalize = self.finish();
        let flushed = match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        };
        // An owned stream drops (and closes) here; a borrowed one returns
        // to its owner untouched.
        self.inner = None;
        finalize.and(flushed)
    }

    /// Finalize the stream and hand the underlying stream back.
    pub fn into_inner(mut self) -> Result<S> {
        self.finish()?;
        match self.inner.take() {
            Some(inner) => Ok(inner),
            None => Err(Error::disposed("into_inner")),
        }
    }

    /// Run a flush mode to completion and drain everything staged.
    fn pump(&mut self, mode: Flush) -> Result<()> {
        let mut flush = mode;
        loop {
            if self.stage.spare().is_empty() {
                self.drain_stage()?;
            }
            let spare = self.stage.spare();
            let (_, produced) = self.codec.compress(&[], spare, flush)?;
            self.stage.commit(produced);

            if mode == Flush::Finish {
                if self.codec.is_finished() {
                    break;
                }
            } else if flush == Flush::None && produced == 0 {
                break;
            }
            flush = if mode == Flush::Finish {
                Flush::Finish
            } else {
                Flush::None
            };
        }
        self.drain_stage()
    }

    fn drain_stage(&mut self) -> Result<()> {
        if self.stage.is_empty() {
            return Ok(());
        }
        let inner = self.inner.as_mut().ok_or(Error::Disposed { operation: "write" })?;
        inner.write(self.stage.readable())?;
        self.stage.clear();
        Ok(())
    }
}

impl<S: ByteStream> ByteStream for DeflateWriter<S> {
    fn can_read(&self) -> bool {
        false
    }

    fn can_write(&self) -> bool {
        self.inner.is_some()
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::invalid_operation(
            "cannot read from a compression stream",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        DeflateWriter::write(self, buf)
    }

    fn flush(&mut self) -> Result<()> {
        DeflateWriter::flush(self)
    }
}

impl<S: ByteStream> std::io::Write for DeflateWriter<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        DeflateWriter::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        DeflateWriter::flush(self)?;
        Ok(())
    }
}

impl<S: ByteStream> Drop for DeflateWriter<S> {
    fn drop(&mut self) {
        // Best-effort finalize; errors have nowhere to go from drop.
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStream;

    #[test]
    fn test_writer_produces_valid_deflate() {
        let mut sink = MemoryStream::new();
        {
            let mut writer =
                DeflateWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
            writer.write(b"Hello, compression!").unwrap();
            writer.close().unwrap();
        }

        let mut out = Vec::new();
        strix_deflate::inflate(sink.as_slice(), &mut out).unwrap();
        assert_eq!(out, b"Hello, compression!");
    }

    #[test]
    fn test_writer_rejects_readonly_stream() {
        let stream = MemoryStream::read_only(Vec::new());
        let err = DeflateWriter::new(stream, CompressionLevel::Fastest).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_writer_rejects_closed_stream() {
        let mut stream = MemoryStream::new();
        stream.close();
        let err = DeflateWriter::new(stream, CompressionLevel::Fastest).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_zero_write_is_noop() {
        let mut sink = MemoryStream::new();
        let mut writer = DeflateWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
        writer.write(&[]).unwrap();
        // Nothing reached the underlying stream.
        assert!(writer.get_ref().unwrap().as_slice().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut writer =
            DeflateWriter::new(MemoryStream::new(), CompressionLevel::Optimal).unwrap();
        writer.write(b"data").unwrap();
        writer.close().unwrap();
        writer.close().unwrap();

        assert!(matches!(
            writer.write(b"more"),
            Err(Error::Disposed { .. })
        ));
        assert!(matches!(writer.flush(), Err(Error::Disposed { .. })));
        assert!(writer.get_ref().is_none());
    }

    #[test]
    fn test_seek_family_unsupported() {
        let mut writer =
            DeflateWriter::new(MemoryStream::new(), CompressionLevel::Optimal).unwrap();
        assert!(!writer.can_seek());
        assert!(matches!(writer.stream_len(), Err(Error::Unsupported(_))));
        assert!(matches!(writer.position(), Err(Error::Unsupported(_))));
        assert!(matches!(
            writer.seek(std::io::SeekFrom::Start(0)),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(writer.set_len(0), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_flush_emits_sync_point() {
        let mut sink = MemoryStream::new();
        let mut writer = DeflateWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
        writer.write(b"partial data").unwrap();
        writer.flush().unwrap();

        // After a sync flush the bytes written so far decode on their own.
        let flushed = writer.get_ref().unwrap().as_slice().to_vec();
        assert!(!flushed.is_empty());

        let mut codec = strix_deflate::RustDecompressor::new();
        let mut plain = [0u8; 64];
        let (_, n) =
            strix_core::StreamDecompress::decompress(&mut codec, &flushed, &mut plain).unwrap();
        assert_eq!(&plain[..n], b"partial data");

        writer.close().unwrap();
    }

    #[test]
    fn test_empty_stream_finalizes_cleanly() {
        // Write nothing, flush, close: the output is a complete stream.
        let mut sink = MemoryStream::new();
        {
            let mut writer =
                DeflateWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
            writer.write(&[]).unwrap();
            writer.flush().unwrap();
            writer.close().unwrap();
        }

        let mut out = Vec::new();
        strix_deflate::inflate(sink.as_slice(), &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_into_inner_returns_stream() {
        let mut writer =
            DeflateWriter::new(MemoryStream::new(), CompressionLevel::Fastest).unwrap();
        writer.write(b"abc").unwrap();
        let sink = writer.into_inner().unwrap();

        let mut out = Vec::new();
        strix_deflate::inflate(sink.as_slice(), &mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_drop_finalizes_output() {
        let mut sink = MemoryStream::new();
        {
            let mut writer =
                DeflateWriter::new(&mut sink, CompressionLevel::Optimal).unwrap();
            writer.write(b"dropped without close").unwrap();
        }

        let mut out = Vec::new();
        strix_deflate::inflate(sink.as_slice(), &mut out).unwrap();
        assert_eq!(out, b"dropped without close");
    }
}
