//! Runtime-mode stream construction.
//!
//! [`DeflateWriter`](crate::DeflateWriter)/[`DeflateReader`](crate::DeflateReader)
//! make mode misuse unrepresentable when the direction is known statically.
//! When it is not (configuration-driven pipelines), these tagged unions
//! carry the direction and enforce it at call time: mode-illegal calls fail
//! with an invalid-operation error instead of being expressible.

use strix_core::{Backend, ByteStream, CompressionLevel, Error, Mode, Result};

use crate::gzip::{GzipReader, GzipWriter};
use crate::reader::DeflateReader;
use crate::writer::DeflateWriter;
use crate::DEFAULT_BUFFER_SIZE;

/// A raw DEFLATE stream whose direction was chosen at run time.
pub enum DeflateStream<S: ByteStream> {
    Compress(DeflateWriter<S>),
    Decompress(DeflateReader<S>),
}

impl<S: ByteStream> core::fmt::Debug for DeflateStream<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Compress(w) => f.debug_tuple("Compress").field(w).finish(),
            Self::Decompress(r) => f.debug_tuple("Decompress").field(r).finish(),
        }
    }
}

impl<S: ByteStream> DeflateStream<S> {
    /// Construct with a mode and defaults for everything else.
    pub fn new(stream: S, mode: Mode) -> Result<Self> {
        Self::with_options(
            stream,
            mode,
            CompressionLevel::default(),
            Backend::default(),
            DEFAULT_BUFFER_SIZE,
        )
    }

    /// Construct a compressing stream; the level implies the mode.
    pub fn compress(stream: S, level: CompressionLevel) -> Result<Self> {
        Ok(Self::Compress(DeflateWriter::new(stream, level)?))
    }

    pub fn with_options(
        stream: S,
        mode: Mode,
        level: CompressionLevel,
        backend: Backend,
        buffer_size: usize,
    ) -> Result<Self> {
        match mode {
            Mode::Compress => Ok(Self::Compress(DeflateWriter::with_options(
                stream,
                level,
                backend,
                buffer_size,
            )?)),
            Mode::Decompress => Ok(Self::Decompress(DeflateReader::with_options(
                stream,
                backend,
                buffer_size,
            )?)),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Compress(_) => Mode::Compress,
            Self::Decompress(_) => Mode::Decompress,
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Decompress(reader) => reader.read(buf),
            Self::Compress(_) => Err(Error::invalid_operation(
                "cannot read from a compression stream",
            )),
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Self::Compress(writer) => writer.write(buf),
            Self::Decompress(_) => Err(Error::invalid_operation(
                "cannot write to a decompression stream",
            )),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            Self::Compress(writer) => writer.flush(),
            Self::Decompress(_) => Err(Error::invalid_operation(
                "cannot flush a decompression stream",
            )),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            Self::Compress(writer) => writer.close(),
            Self::Decompress(reader) => reader.close(),
        }
    }
}

impl<S: ByteStream> ByteStream for DeflateStream<S> {
    fn can_read(&self) -> bool {
        match self {
            Self::Decompress(reader) => reader.can_read(),
            Self::Compress(_) => false,
        }
    }

    fn can_write(&self) -> bool {
        match self {
            Self::Compress(writer) => writer.can_write(),
            Self::Decompress(_) => false,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Compress(writer) => writer.is_open(),
            Self::Decompress(reader) => reader.is_open(),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        DeflateStream::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        DeflateStream::write(self, buf)
    }

    fn flush(&mut self) -> Result<()> {
        DeflateStream::flush(self)
    }
}

/// A gzip stream whose direction was chosen at run time.
pub enum GzipStream<S: ByteStream> {
    Compress(GzipWriter<S>),
    Decompress(GzipReader<S>),
}

impl<S: ByteStream> GzipStream<S> {
    pub fn new(stream: S, mode: Mode) -> Result<Self> {
        Self::with_options(
            stream,
            mode,
            CompressionLevel::default(),
            Backend::default(),
            DEFAULT_BUFFER_SIZE,
        )
    }

    /// Construct a compressing stream; the level implies the mode.
    pub fn compress(stream: S, level: CompressionLevel) -> Result<Self> {
        Ok(Self::Compress(GzipWriter::new(stream, level)?))
    }

    pub fn with_options(
        stream: S,
        mode: Mode,
        level: CompressionLevel,
        backend: Backend,
        buffer_size: usize,
    ) -> Result<Self> {
        match mode {
            Mode::Compress => Ok(Self::Compress(GzipWriter::with_options(
                stream,
                level,
                backend,
                buffer_size,
            )?)),
            Mode::Decompress => Ok(Self::Decompress(GzipReader::with_options(
                stream,
                backend,
                buffer_size,
            )?)),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Compress(_) => Mode::Compress,
            Self::Decompress(_) => Mode::Decompress,
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Decompress(reader) => reader.read(buf),
            Self::Compress(_) => Err(Error::invalid_operation(
                "cannot read from a compression stream",
            )),
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Self::Compress(writer) => writer.write(buf),
            Self::Decompress(_) => Err(Error::invalid_operation(
                "cannot write to a decompression stream",
            )),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            Self::Compress(writer) => writer.flush(),
            Self::Decompress(_) => Err(Error::invalid_operation(
                "cannot flush a decompression stream",
            )),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            Self::Compress(writer) => writer.close(),
            Self::Decompress(reader) => reader.close(),
        }
    }
}

impl<S: ByteStream> ByteStream for GzipStream<S> {
    fn can_read(&self) -> bool {
        match self {
            Self::Decompress(reader) => reader.can_read(),
            Self::Compress(_) => false,
        }
    }

    fn can_write(&self) -> bool {
        match self {
            Self::Compress(writer) => writer.can_write(),
            Self::Decompress(_) => false,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Self::Compress(writer) => writer.is_open(),
            Self::Decompress(reader) => reader.is_open(),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        GzipStream::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        GzipStream::write(self, buf)
    }

    fn flush(&mut self) -> Result<()> {
        GzipStream::flush(self)
    }
}
