//! Decompress-mode stream adapter.

use strix_core::{Backend, ByteStream, Error, Result, StreamDecompress};
use tracing::{debug, trace};

use crate::{clamp_buffer_size, StageBuffer, DEFAULT_BUFFER_SIZE};

/// A reader that decompresses data from an underlying [`ByteStream`].
///
/// Compressed bytes refill an internal staging buffer on demand; decoded
/// bytes are handed out as soon as the codec produces them, so a read
/// never waits for more input than the next decodable piece. A short read
/// from the underlying stream is retried transparently; end-of-stream
/// before the codec's final block is malformed data.
pub struct DeflateReader<S: ByteStream> {
    inner: Option<S>,
    codec: Box<dyn StreamDecompress + Send>,
    stage: StageBuffer,
    total_in: usize,
}

impl<S: ByteStream> core::fmt::Debug for DeflateReader<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeflateReader")
            .field("stage", &self.stage)
            .field("total_in", &self.total_in)
            .finish_non_exhaustive()
    }
}

impl<S: ByteStream> DeflateReader<S> {
    /// Create a decompressing adapter with the default backend and buffer
    /// size.
    pub fn new(inner: S) -> Result<Self> {
        Self::with_options(inner, Backend::default(), DEFAULT_BUFFER_SIZE)
    }

    /// Create a decompressing adapter with an explicit backend.
    pub fn with_backend(inner: S, backend: Backend) -> Result<Self> {
        Self::with_options(inner, backend, DEFAULT_BUFFER_SIZE)
    }

    /// Create a decompressing adapter with explicit backend and buffer
    /// size.
    pub fn with_options(inner: S, backend: Backend, buffer_size: usize) -> Result<Self> {
        if !inner.is_open() {
            return Err(Error::invalid_argument(
                "stream",
                "stream is already closed",
            ));
        }
        if !inner.can_read() {
            return Err(Error::invalid_argument(
                "stream",
                "decompression requires a readable stream",
            ));
        }

        debug!(backend = backend.name(), "opening decompression stream");
        Ok(Self {
            inner: Some(inner),
            codec: strix_deflate::decompressor(backend),
            stage: StageBuffer::with_capacity(clamp_buffer_size(buffer_size)),
            total_in: 0,
        })
    }

    /// The underlying stream, while the adapter is open.
    pub fn get_ref(&self) -> Option<&S> {
        self.inner.as_ref()
    }

    /// The underlying stream, mutably, while the adapter is open.
    pub fn get_mut(&mut self) -> Option<&mut S> {
        self.inner.as_mut()
    }

    /// Read decompressed bytes into `buf`, returning the count produced.
    ///
    /// A zero-length request returns 0 without touching the underlying
    /// stream. Returns fewer bytes than requested (including 0) only when
    /// the compressed stream has logically ended.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.inner.is_none() {
            return Err(Error::disposed("read"));
        }
        if buf.is_empty() || self.codec.is_finished() {
            return Ok(0);
        }

        loop {
            let (consumed, produced) = {
                let Self {
                    ref mut codec,
                    ref stage,
                    ..
                } = *self;
                codec.decompress(stage.readable(), buf)?
            };
            self.stage.consume(consumed);
            self.total_in += consumed;

            if produced > 0 {
                return Ok(produced);
            }
            if self.codec.is_finished() {
                return Ok(0);
            }

            if self.refill()? == 0 {
                return Err(Error::unexpected_eof(self.total_in));
            }
        }
    }

    /// Release the underlying stream. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.inner = None;
        Ok(())
    }

    /// Hand the underlying stream back. Bytes already staged are dropped.
    pub fn into_inner(mut self) -> Result<S> {
        match self.inner.take() {
            Some(inner) => Ok(inner),
            None => Err(Error::disposed("into_inner")),
        }
    }

    /// Whether the codec has decoded the final block.
    pub(crate) fn decoder_finished(&self) -> bool {
        self.codec.is_finished()
    }

    /// Staged compressed bytes not yet fed to the codec. The envelope
    /// reads its header and trailer from here.
    pub(crate) fn stage_readable(&self) -> &[u8] {
        self.stage.readable()
    }

    pub(crate) fn stage_consume(&mut self, n: usize) {
        self.stage.consume(n);
        self.total_in += n;
    }

    /// Pull more compressed bytes from the underlying stream. Returns the
    /// count added; 0 means end of stream.
    pub(crate) fn refill(&mut self) -> Result<usize> {
        self.stage.compact();
        let inner = self.inner.as_mut().ok_or(Error::Disposed { operation: "read" })?;
        let spare = self.stage.spare();
        let spare_len = spare.len();
        if spare_len == 0 {
            return Err(Error::InvalidState {
                expected: "staging space",
                actual: "full buffer",
            });
        }

        let n = inner.read(spare)?;
        if n > spare_len {
            // A read count larger than the buffer is a broken collaborator,
            // not data.
            return Err(Error::corrupted(format!(
                "underlying stream returned {n} bytes for a {spare_len}-byte read"
            )));
        }
        trace!(bytes = n, "refilled compressed input");
        self.stage.commit(n);
        Ok(n)
    }
}

impl<S: ByteStream> ByteStream for DeflateReader<S> {
    fn can_read(&self) -> bool {
        self.inner.is_some()
    }

    fn can_write(&self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        DeflateReader::read(self, buf)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        Err(Error::invalid_operation(
            "cannot write to a decompression stream",
        ))
    }

    fn flush(&mut self) -> Result<()> {
        Err(Error::invalid_operation(
            "cannot flush a decompression stream",
        ))
    }
}

impl<S: ByteStream> std::io::Read for DeflateReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(DeflateReader::read(self, buf)?)
    }
}
