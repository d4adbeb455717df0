//! # Strix Stream
//!
//! Buffered compression stream adapters for the Strix engine.
//!
//! The adapters wrap any [`ByteStream`](strix_core::ByteStream) and a codec
//! backend into forward-only compress/decompress streams:
//!
//! - [`DeflateWriter`] / [`DeflateReader`] - raw DEFLATE (RFC 1951)
//! - [`GzipWriter`] / [`GzipReader`] - gzip envelope (RFC 1952)
//! - [`DeflateStream`] / [`GzipStream`] - direction chosen at run time
//! - `Async*` variants (behind the `async` feature) over tokio I/O, with
//!   cancellable operations
//!
//! ## Ownership
//!
//! An adapter owns the stream it wraps and releases it on close. Wrap a
//! `&mut` borrow to keep ownership at the call site; the adapter then
//! releases only the borrow and the stream stays usable afterwards.
//!
//! ## Example
//!
//! ```ignore
//! use strix_core::CompressionLevel;
//! use strix_stream::{DeflateWriter, MemoryStream};
//!
//! let mut sink = MemoryStream::new();
//! let mut writer = DeflateWriter::new(&mut sink, CompressionLevel::Optimal)?;
//! writer.write(b"Hello, compression!")?;
//! writer.close()?;
//! ```

mod buffer;
mod dynamic;
mod gzip;
mod memory;
mod reader;
mod writer;

#[cfg(feature = "async")]
mod async_io;

pub use buffer::StageBuffer;
pub use dynamic::{DeflateStream, GzipStream};
pub use gzip::{gzip_compress, gzip_decompress, GzipReader, GzipWriter};
pub use memory::{IoReader, IoWriter, MemoryStream};
pub use reader::DeflateReader;
pub use writer::DeflateWriter;

#[cfg(feature = "async")]
pub use async_io::{AsyncDeflateReader, AsyncDeflateWriter, AsyncGzipReader, AsyncGzipWriter};

/// Default staging buffer size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Minimum staging buffer size allowed.
pub const MIN_BUFFER_SIZE: usize = 4 * 1024;

/// Maximum staging buffer size allowed (1 MiB).
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Clamp a requested buffer size to the valid range.
#[inline]
pub fn clamp_buffer_size(size: usize) -> usize {
    size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)
}
