//! The byte-stream capability surface the engine consumes and exposes.

use std::io::SeekFrom;

use crate::error::{Error, Result};

/// Flush modes for streaming compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    /// No flush - buffer data for optimal compression.
    #[default]
    None,

    /// Sync flush - emit all pending output at a byte-aligned point,
    /// leaving the stream continuable.
    Sync,

    /// Finish - complete the stream, emitting the final block and
    /// trailing bits.
    Finish,
}

/// A byte stream with an explicit capability surface.
///
/// This is the engine's only boundary: the compression adapters consume one
/// of these and expose the same surface themselves. Capabilities are queried
/// up front (`can_read`/`can_write`/`can_seek`); calling an operation the
/// stream does not support is an error, never a panic.
///
/// The seek family defaults to [`Error::Unsupported`] since most transform
/// streams are forward-only.
pub trait ByteStream {
    /// Whether the stream supports `read`.
    fn can_read(&self) -> bool;

    /// Whether the stream supports `write`.
    fn can_write(&self) -> bool;

    /// Whether the stream supports the seek family.
    fn can_seek(&self) -> bool {
        false
    }

    /// Whether the stream is still open.
    fn is_open(&self) -> bool {
        true
    }

    /// Read up to `buf.len()` bytes, returning the count actually read.
    /// A return of 0 with a non-empty `buf` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `buf` to the stream.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush buffered bytes to the stream's destination.
    fn flush(&mut self) -> Result<()>;

    /// Total length of the stream in bytes.
    fn stream_len(&self) -> Result<u64> {
        Err(Error::unsupported("stream does not track a length"))
    }

    /// Current position within the stream.
    fn position(&self) -> Result<u64> {
        Err(Error::unsupported("stream does not track a position"))
    }

    /// Reposition the stream.
    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::unsupported("stream does not support seeking"))
    }

    /// Truncate or extend the stream.
    fn set_len(&mut self, _len: u64) -> Result<()> {
        Err(Error::unsupported("stream does not support resizing"))
    }
}

/// A mutable borrow of a stream is itself a stream. Wrapping `&mut S`
/// instead of `S` is how a caller keeps ownership of the underlying stream:
/// the wrapper's disposal releases the borrow, never the stream.
impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }

    fn can_seek(&self) -> bool {
        (**self).can_seek()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn stream_len(&self) -> Result<u64> {
        (**self).stream_len()
    }

    fn position(&self) -> Result<u64> {
        (**self).position()
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        (**self).seek(pos)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        (**self).set_len(len)
    }
}
