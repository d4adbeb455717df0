//! # Strix Deflate
//!
//! DEFLATE codec backends (RFC 1951) for the Strix streaming engine.
//!
//! Two interchangeable backends implement the incremental
//! [`StreamCompress`]/[`StreamDecompress`] contracts:
//!
//! - [`ZlibCompressor`]/[`ZlibDecompressor`] - bridged through `flate2`
//! - [`RustCompressor`]/[`RustDecompressor`] - self-contained, no native
//!   lineage
//!
//! The backend is picked per stream with [`Backend`]; both produce
//! interchangeable raw DEFLATE streams.
//!
//! ## Example
//!
//! ```ignore
//! use strix_core::{Backend, CompressionLevel};
//! use strix_deflate::{compressor, decompressor};
//!
//! let mut codec = compressor(Backend::Rust, CompressionLevel::Fastest);
//! ```

pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod zlib;

pub use deflate::{deflate, RustCompressor};
pub use inflate::{inflate, RustDecompressor};
pub use zlib::{ZlibCompressor, ZlibDecompressor};

use strix_core::{Backend, CompressionLevel, StreamCompress, StreamDecompress};

/// Create a compressor for the selected backend.
pub fn compressor(backend: Backend, level: CompressionLevel) -> Box<dyn StreamCompress + Send> {
    match backend {
        Backend::Zlib => Box::new(ZlibCompressor::new(level)),
        Backend::Rust => Box::new(RustCompressor::new(level)),
    }
}

/// Create a decompressor for the selected backend.
pub fn decompressor(backend: Backend) -> Box<dyn StreamDecompress + Send> {
    match backend {
        Backend::Zlib => Box::new(ZlibDecompressor::new()),
        Backend::Rust => Box::new(RustDecompressor::new()),
    }
}
